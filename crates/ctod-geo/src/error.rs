use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No such tile matrix set: {0}")]
    NoSuchTms(String),
    #[error("Tile out of range for zoom {z}: ({x}, {y})")]
    TileOutOfRange { z: i32, x: i64, y: i64 },
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("GDAL error: {0}")]
    GdalError(#[from] gdal::errors::GdalError),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
