use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::source::Strategy;

/// Why one resolver strategy could not unwrap a payload.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("missing gzip magic")]
    MissingGzipMagic,

    #[error("shorter than the {0} byte length prefix")]
    TooShort(usize),

    #[error("unable to inflate: {0}")]
    Inflate(#[source] std::io::Error),

    #[error("decompressed size exceeds the {limit} byte limit")]
    LimitExceeded { limit: u64 },

    #[error("decompressed payload is not UTF-8: {0}")]
    NotUtf8(#[source] std::str::Utf8Error),

    #[error("not a JSON document or RFR1 container")]
    NotPassthrough,
}

/// A single resolver strategy that did not produce a usable payload.
#[derive(Debug)]
pub struct StrategyFailure {
    pub strategy: Strategy,
    pub reason: StrategyError,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

/// Wrapper so the attempt list renders as one line in the error message.
#[derive(Debug)]
pub struct StrategyFailures(pub Vec<StrategyFailure>);

impl fmt::Display for StrategyFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, failure) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }

            write!(f, "{failure}")?;
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("unable to read replay {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no strategy produced a readable payload ({0})")]
    UnreadableSource(StrategyFailures),

    #[error("payload is neither a JSON replay nor an RFR1 container: {0}")]
    UnrecognizedContainer(String),

    #[error("unsupported replay version {0:?}")]
    UnsupportedVersion(String),

    #[error("replay is corrupt: {0}")]
    StructuralCorruption(String),

    #[error("the {section} section does not match the replay model: {source}")]
    MalformedSection {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("mapping table {table} has a non-integer key {key:?}")]
    InvalidMappingKey { table: &'static str, key: String },

    #[error("players have differing state counts: {counts:?}")]
    StateCountMismatch { counts: Vec<usize> },

    #[error("no {kind} entry for {key}")]
    NotFound { kind: &'static str, key: String },
}

impl ReplayError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::StructuralCorruption(message.into())
    }

    pub(crate) fn not_found(kind: &'static str, key: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Whether this is a lookup miss rather than a decode failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
