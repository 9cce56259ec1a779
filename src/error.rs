use std::io;

use axum::{
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::envelope;

pub type Result<T> = std::result::Result<T, SoapError>;

#[derive(Debug, Error)]
pub enum SoapError {
    #[error("invalid XML: {0}")]
    InvalidXml(String),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("failed to decode base64 data: {0}")]
    InvalidFileData(String),
    #[error("could not determine SOAP operation from request")]
    UnknownOperation,
    #[error("record with id {0} not found")]
    RecordNotFound(String),
    #[error("boundary not found in content-type")]
    BoundaryNotFound,
    #[error("payload too large: {size} bytes exceeds limit of {max}")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("invalid multipart framing: {0}")]
    InvalidMultipart(String),
    #[error("missing control part in multipart message")]
    MissingControlPart,
    #[error("ambiguous control part: message contains more than one XML part")]
    AmbiguousControlPart,
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl SoapError {
    /// SOAP 1.1 fault code: `Client` for caller mistakes, `Server` for
    /// failures in collaborators (filesystem, configuration).
    pub fn fault_code(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Storage(_) | Self::Io(_) => "Server",
            _ => "Client",
        }
    }

    pub fn fault_string(&self) -> &'static str {
        match self {
            Self::InvalidXml(_) => "Invalid XML format",
            Self::MissingField(_) => "Invalid input",
            Self::InvalidFileData(_) => "Invalid file data",
            Self::UnknownOperation => "Unknown operation",
            Self::RecordNotFound(_) => "Record not found",
            Self::BoundaryNotFound
            | Self::PayloadTooLarge { .. }
            | Self::InvalidMultipart(_)
            | Self::MissingControlPart
            | Self::AmbiguousControlPart
            | Self::ReferenceNotFound(_) => "Invalid MTOM request",
            Self::Config(_) => "Configuration error",
            Self::Storage(_) | Self::Io(_) => "Internal error",
        }
    }
}

impl IntoResponse for SoapError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        let body = envelope::encode_fault(self.fault_code(), self.fault_string(), &detail);
        ([(CONTENT_TYPE, envelope::TEXT_XML)], body).into_response()
    }
}
