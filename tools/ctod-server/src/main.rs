#![warn(clippy::unwrap_used)]
use std::str::FromStr;

use clap::Parser;
use env_logger::{Env, TimestampPrecision};

use ctod_server::{opt::Opt, tileapihandler};

#[tokio::main]
async fn main() {
    let opt = Opt::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(opt.logging_level.as_str()))
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let app = match tileapihandler::create_router(&opt) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("failed to start ctod-server: {err}");
            std::process::exit(1);
        }
    };

    let ip_addr = match &opt.addr {
        Some(addr) => match std::net::IpAddr::from_str(addr) {
            Ok(addr) => addr,
            Err(err) => {
                eprintln!("invalid --addr {addr}: {err}");
                std::process::exit(1);
            }
        },
        None => std::net::IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
    };

    let sock_addr = std::net::SocketAddr::from((ip_addr, opt.port));
    log::info!("listening on {sock_addr}");

    let listener = match tokio::net::TcpListener::bind(&sock_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("failed to bind {sock_addr}: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }

    std::process::exit(0);
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("failed to install ctrl-c handler: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("received shutdown signal");
}
