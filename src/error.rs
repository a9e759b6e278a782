use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum FixtureError {
    #[error("{op}: {msg}")]
    InvalidArgument { op: &'static str, msg: String },
    #[error("{op}: expected shape {expected:?}, got {actual:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("{op}: invalid layout shape={shape:?} strides={strides:?}: {msg}")]
    InvalidLayout {
        op: &'static str,
        shape: Vec<usize>,
        strides: Vec<usize>,
        msg: String,
    },
    #[error("{op}: {path}: {msg}")]
    Io {
        op: &'static str,
        path: String,
        msg: String,
    },
    #[error("{op}: {msg}")]
    Format { op: &'static str, msg: String },
    #[error("{op}: verification failed: {msg}")]
    Verification { op: &'static str, msg: String },
}

impl FixtureError {
    pub(crate) fn io(op: &'static str, path: &std::path::Path, err: std::io::Error) -> Self {
        FixtureError::Io {
            op,
            path: path.display().to_string(),
            msg: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FixtureError>;
