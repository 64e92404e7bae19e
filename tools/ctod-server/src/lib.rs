mod apperror;
pub mod opt;
pub mod registry;
pub mod tileapihandler;

pub use apperror::AppError;

type Error = ctod_core::Error;
type Result<T> = ctod_core::Result<T>;
