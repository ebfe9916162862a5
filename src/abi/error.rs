//! ABI error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("Cannot encode argument at {}: {reason}", format_path(.path))]
    Encode { reason: String, path: Vec<usize> },

    #[error("Invalid edit at {}: {reason}", format_path(.path))]
    ValueTree { reason: String, path: Vec<usize> },

    #[error("Failed to load contract ABI: {0}")]
    Source(String),
}

impl AbiError {
    pub fn encode(reason: impl Into<String>, path: &[usize]) -> Self {
        Self::Encode {
            reason: reason.into(),
            path: path.to_vec(),
        }
    }

    pub fn value_tree(reason: impl Into<String>, path: &[usize]) -> Self {
        Self::ValueTree {
            reason: reason.into(),
            path: path.to_vec(),
        }
    }

    /// Path of the offending node, if this is a validation error.
    pub fn path(&self) -> Option<&[usize]> {
        match self {
            Self::Encode { path, .. } | Self::ValueTree { path, .. } => Some(path),
            Self::Source(_) => None,
        }
    }
}

/// Render a value tree path as "args[0][2]", or "args" for the root.
pub fn format_path(path: &[usize]) -> String {
    let mut out = String::from("args");
    for index in path {
        out.push_str(&format!("[{}]", index));
    }
    out
}
