pub mod archive;
pub mod cleanup;
pub mod commands;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod package;
pub mod registry;
pub mod runtime;

pub use error::Error;
