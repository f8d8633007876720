//! Error taxonomy shared by the store, the load/save collaborator and the
//! render pipeline.
//!
//! Every error here is recoverable: callers report it and keep the previous
//! state. User-triggered store operations that are expected to fail now and then
//! (merge, rename, save) fold their result into an [`OpStatus`].

use std::path::PathBuf;

use thiserror::Error;

/// Reading a table from disk failed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unsupported file format: '{0}'")]
    UnsupportedFormat(String),
    #[error("loaded data is not a well-formed table: {0}")]
    Invalid(String),
}

/// Writing a table to disk failed.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("could not save dataframe - dataframe is not set or empty")]
    Empty,
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write {path}: {message}")]
    Write { path: PathBuf, message: String },
    #[error("unsupported file format: '{0}'")]
    UnsupportedFormat(String),
}

/// Failures of [`crate::data::store::DatasetStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no table is loaded")]
    NoTable,
    #[error("column '{0}' does not exist")]
    InvalidColumn(String),
    #[error("could not convert to {target}: {cause}")]
    TypeCoercion { target: String, cause: String },
    #[error("{0}")]
    Unsupported(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Save(#[from] SaveError),
}

/// Failures of a single redraw. The previous frame stays on screen.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no table is loaded")]
    NoTable,
    #[error("no x-axis column is selected")]
    NoXAxis,
    #[error("column '{0}' does not exist")]
    InvalidColumn(String),
    #[error("spectrogram needs the x-axis to be the timestamp column, not '{0}'")]
    SpectrogramAxis(String),
    #[error("column '{0}' is not a spectrogram (array) column")]
    NotAnArrayColumn(String),
    #[error("no rows left to plot after hiding, filtering and domain restriction")]
    EmptyView,
    #[error("coloring by label needs a color column")]
    MissingColorColumn,
}

/// Failure raised by a user-supplied row filter or script hook.
#[derive(Debug, Error)]
#[error("hook '{name}' failed: {source}")]
pub struct HookError {
    pub name: String,
    #[source]
    pub source: anyhow::Error,
}

/// Outcome of a user-triggered store operation: a success flag and a message
/// meant for a human.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpStatus {
    pub success: bool,
    pub message: String,
}

impl OpStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<Result<String, StoreError>> for OpStatus {
    fn from(res: Result<String, StoreError>) -> Self {
        match res {
            Ok(msg) => OpStatus::ok(msg),
            Err(e) => OpStatus::failed(e.to_string()),
        }
    }
}
