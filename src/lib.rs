pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod inline;
pub mod logging;
pub mod multipart;
pub mod server;
pub mod store;
pub mod upload;
pub mod xml;
pub mod xop;

pub use error::{Result, SoapError};
