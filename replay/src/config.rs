use std::env;
use std::fs;
use std::path::Path;

use reframed_logger::Log;
use serde::Deserialize;

use crate::errors::ReplayError;

/// Default cap on any single decompression stream: 512 MiB.
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: u64 = 512 * 1024 * 1024;

/// Knobs controlling how strict the decoder is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// When set, the identity strategy only accepts bytes that look like a JSON
    /// document or an RFR1 container. Clearing it makes identity always succeed.
    pub strict_passthrough: bool,

    /// Reject documents where players have different numbers of states.
    pub require_uniform_state_counts: bool,

    /// Upper bound for the output of any one decompression stream.
    pub max_decompressed_bytes: Option<u64>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            strict_passthrough: true,
            require_uniform_state_counts: true,
            max_decompressed_bytes: Some(DEFAULT_MAX_DECOMPRESSED_BYTES),
        }
    }
}

impl DecoderConfig {
    /// Reads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();

        let txt = fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&txt).map_err(|source| ReplayError::MalformedSection {
            section: "config",
            source,
        })
    }

    /// Applies `REFRAMED_*` environment variables on top of this config.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn with_env_overrides(self) -> Self {
        self.merge_overrides(|key| env::var(key).ok())
    }

    fn merge_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("REFRAMED_STRICT_PASSTHROUGH") {
            match parse_flag(&value) {
                Some(flag) => self.strict_passthrough = flag,
                None => tracing::warn!(target: Log::Source, ?value, "Ignoring REFRAMED_STRICT_PASSTHROUGH"),
            }
        }

        if let Some(value) = lookup("REFRAMED_UNIFORM_STATES") {
            match parse_flag(&value) {
                Some(flag) => self.require_uniform_state_counts = flag,
                None => tracing::warn!(target: Log::Normalize, ?value, "Ignoring REFRAMED_UNIFORM_STATES"),
            }
        }

        if let Some(value) = lookup("REFRAMED_MAX_DECOMPRESSED_BYTES") {
            match value.trim() {
                "" | "none" | "unlimited" => self.max_decompressed_bytes = None,
                limit => match limit.parse::<u64>() {
                    Ok(limit) => self.max_decompressed_bytes = Some(limit),
                    Err(error) => {
                        tracing::warn!(target: Log::Source, ?value, ?error, "Ignoring REFRAMED_MAX_DECOMPRESSED_BYTES")
                    },
                },
            }
        }

        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
