use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::format::{SupportedFormat, TargetFormat};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("no conversion route from {from} to {to}")]
    NoRouteAvailable {
        from: SupportedFormat,
        to: TargetFormat,
    },

    #[error("conversion failed: {reason}")]
    ConversionFailed { reason: String },

    #[error("conversion timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("cannot write output {}: {reason}", .path.display())]
    OutputWriteError { path: PathBuf, reason: String },
}

/// Discriminant of [`Error`], cheap to copy into a [`crate::ConversionResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedFormat,
    NoRouteAvailable,
    ConversionFailed,
    Timeout,
    OutputWriteError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::NoRouteAvailable => "NoRouteAvailable",
            ErrorKind::ConversionFailed => "ConversionFailed",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::OutputWriteError => "OutputWriteError",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Error::NoRouteAvailable { .. } => ErrorKind::NoRouteAvailable,
            Error::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::OutputWriteError { .. } => ErrorKind::OutputWriteError,
        }
    }

    pub(crate) fn conversion(reason: impl Into<String>) -> Self {
        Error::ConversionFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn output(path: &Path, reason: impl fmt::Display) -> Self {
        Error::OutputWriteError {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::conversion(format!("ZIP error: {e}"))
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::conversion(format!("XML error: {e}"))
    }
}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Error::conversion(format!("PDF error: {e}"))
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::conversion(format!("image error: {e}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::conversion(format!("IO error: {e}"))
    }
}
