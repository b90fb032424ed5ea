pub mod archive;
pub mod commands;
pub mod download;
pub mod error;
pub mod http;
pub mod manifest;
pub mod platform;
pub mod resolver;
pub mod runtime;
pub mod wrapper;

pub use error::ShimError;
