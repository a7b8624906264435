//! Error type shared by every stage of the pipeline.

use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, PatternError>;

#[derive(thiserror::Error, Debug)]
pub enum PatternError {
    #[error("i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("format error: {0}")]
    Format(String),
}

impl PatternError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingInput(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

/// Read a whole file, attaching the path to any failure.
pub(crate) fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| PatternError::io(path, e))
}

/// Write a whole file, creating parent folders first.
pub(crate) fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PatternError::io(parent, e))?;
        }
    }
    std::fs::write(path, contents).map_err(|e| PatternError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(PatternError::missing("x").to_string().contains("missing input:"));
        assert!(PatternError::format("x").to_string().contains("format error:"));
    }

    #[test]
    fn io_error_names_the_path() {
        let err = PatternError::io("some/file.csv", std::io::Error::other("boom"));
        let msg = err.to_string();
        assert!(msg.contains("some/file.csv"));
        assert!(msg.contains("boom"));
    }
}
