use std::path::PathBuf;
use thiserror::Error;

/// Errors shared by the loaders, the model and the sweep driver.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}:{line}: expected {expected} columns, found {found}", path.display())]
    RaggedRow {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("label {label} is outside the encoder's class domain")]
    InvalidLabel { label: f64 },

    #[error("dataset has no rows")]
    EmptyDataset,

    #[error("feature matrix cannot be standardized: standard deviation is {std}")]
    DegenerateFeatures { std: f64 },

    #[error("shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("batch size {batch_size} yields no full batch over {rows} rows")]
    NoFullBatch { rows: usize, batch_size: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("malformed MNIST file: {0}")]
    Mnist(String),

    #[error("training cost became non-finite in epoch {epoch}")]
    NonFiniteCost { epoch: usize },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn shape(what: &'static str, expected: impl ToString, found: impl ToString) -> Self {
        Error::ShapeMismatch {
            what,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RaggedRow {
            path: PathBuf::from("sat_train.txt"),
            line: 3,
            expected: 37,
            found: 36,
        };
        assert_eq!(
            err.to_string(),
            "sat_train.txt:3: expected 37 columns, found 36"
        );

        let err = Error::NoFullBatch {
            rows: 3,
            batch_size: 4,
        };
        assert!(err.to_string().contains("no full batch"));

        let err = Error::InvalidLabel { label: 8.0 };
        assert!(err.to_string().contains("label 8"));

        let err = Error::DegenerateFeatures { std: 0.0 };
        assert_eq!(
            err.to_string(),
            "feature matrix cannot be standardized: standard deviation is 0"
        );
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = Error::io(
            "missing.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("failed to read missing.txt"));
    }
}
