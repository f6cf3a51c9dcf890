use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReductionError {
    #[error("property {0} is not declared for this instrument")]
    #[diagnostic(help("only properties present in the instrument defaults can be read or set"))]
    UndeclaredProperty(String),

    #[error("property {name} can not have value: {value}")]
    InvalidValue { name: String, value: String },

    #[error("{0}")]
    FileNotFound(String),

    #[error("files needed for the run are missing: {}", MissingList(.missing))]
    FilesMissing { missing: Vec<MissingFile> },

    #[error("{0}")]
    CalibrationSource(String),

    #[error("{0}")]
    TypeMismatch(String),

    #[error("dataset not found in store: {0}")]
    DatasetNotFound(String),

    #[error("missing instrument defaults file instrument-defaults.json in current directory")]
    MissingConfig,

    #[error("failed to read instrument defaults at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse instrument defaults: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFile {
    pub property: String,
    pub file: String,
}

struct MissingList<'a>(&'a [MissingFile]);

impl fmt::Display for MissingList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, item) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} ({})", item.property, item.file)?;
        }
        Ok(())
    }
}

impl ReductionError {
    pub fn invalid_value(name: &str, value: impl fmt::Display) -> Self {
        ReductionError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}
