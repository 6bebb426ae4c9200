use std::{fmt, io, path::PathBuf};

/// Everything that can go wrong between reading MNIST off disk and printing a prediction.
#[derive(Debug)]
pub enum Error {
    /// A dataset or image file could not be read.
    Io { path: PathBuf, source: io::Error },
    /// An IDX file did not have the layout it claims to have.
    InvalidIdx(String),
    /// A raw digit image was not a 28x28 greyscale bitmap.
    InvalidImage(String),
    /// A setting is outside the range it can meaningfully take.
    InvalidConfig(String),
    /// Array dimensions did not line up.
    Shape(ndarray::ShapeError),
    /// Terminal setup, drawing or event polling failed.
    Terminal(io::Error),
    /// The user closed the drawing window without submitting a digit.
    DrawingAborted,
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::InvalidIdx(msg) => write!(f, "invalid IDX data: {msg}"),
            Self::InvalidImage(msg) => write!(f, "invalid image: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Shape(e) => write!(f, "shape mismatch: {e}"),
            Self::Terminal(e) => write!(f, "terminal error: {e}"),
            Self::DrawingAborted => write!(f, "drawing aborted"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Shape(e) => Some(e),
            Self::Terminal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Self::Shape(e)
    }
}
