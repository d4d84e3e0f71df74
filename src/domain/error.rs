//! Domain error types.

use std::fmt;

use crate::domain::trade::TradeId;

/// A parse error with position information for the command language.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    ///
    /// `position` is a byte offset; the caret column counts characters.
    pub fn display_with_context(&self, input: &str) -> String {
        let column = input
            .char_indices()
            .take_while(|&(i, _)| i < self.position)
            .count();
        let caret = " ".repeat(column) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Fatal failure while loading the trade source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read trade source {path}: {reason}")]
    SourceUnreadable { path: String, reason: String },

    #[error("trade source is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("trade source has {rows} rows but none are valid")]
    NoValidRows { rows: usize },
}

/// A single rejected row. The row is excluded and loading continues.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadWarning {
    pub row_index: usize,
    pub reason: String,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row_index, self.reason)
    }
}

/// A command the session refused. State is left unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown trade id {0}")]
    UnknownTrade(TradeId),

    #[error("unknown symbol {0}")]
    UnknownSymbol(String),

    #[error("sort key '{key}' does not apply to the {view} view")]
    InvalidSortKey { key: String, view: String },

    #[error("'{command}' is not allowed in the {state} state")]
    NotAllowed { command: String, state: String },

    #[error("cannot amend trade {id}: {reason}")]
    InvalidAmendment { id: TradeId, reason: String },

    #[error("nothing to undo")]
    NothingToUndo,
}

/// Top-level error type for trade-analyzer.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&AnalyzerError> for std::process::ExitCode {
    fn from(err: &AnalyzerError) -> Self {
        let code: u8 = match err {
            AnalyzerError::Io(_) => 1,
            AnalyzerError::ConfigParse { .. }
            | AnalyzerError::ConfigMissing { .. }
            | AnalyzerError::ConfigInvalid { .. } => 2,
            AnalyzerError::Load(_) => 3,
        };
        std::process::ExitCode::from(code)
    }
}
