//! Decodes ReFramed replay files (`.rfr`) into a [`Document`].
//!
//! ReFramed has written replays in several shapes over its lifetime: JSON
//! documents (plain, gzip'd, or run through Qt's `qCompress`) carrying a base64
//! blob of frame states, and the newer RFR1 tagged binary container. They're all
//! read through the one entry point and come out as the same document:
//!
//! ```no_run
//! use reframed_replay::Document;
//!
//! let replay = Document::from_path("Game 1.rfr")?;
//! let stage = replay.game_stage_name()?;
//!
//! for (index, player) in replay.player_info().iter().enumerate() {
//!     let fighter = replay.fighter_name(player.fighter_id)?;
//!     let states = replay.states(index).map_or(0, <[_]>::len);
//!     println!("{:?} ({fighter}) on {stage}: {states} states", player.name);
//! }
//! # Ok::<(), reframed_replay::ReplayError>(())
//! ```
//!
//! Decoding happens in stages, each its own module: [`source`] strips outer
//! compression, [`container`] picks the format family, [`codec`] reads the
//! frame states, and `normalize` re-keys the mapping tables and builds the
//! document. Lookups live in [`query`].

use std::fs;
use std::path::Path;

use reframed_logger::Log;

pub mod codec;
pub mod config;
pub mod container;
pub mod mapping;
pub mod query;
pub mod source;
pub mod types;

mod errors;
mod normalize;

pub use config::DecoderConfig;
pub use errors::{ReplayError, StrategyError, StrategyFailure, StrategyFailures};
pub use mapping::{FighterId, FighterStatus, HitStatusId, MappingInfo, StageId, StatusId, StatusTable, Table};
pub use source::Strategy;
pub use types::{ContainerKind, Document, FrameState, GameInfo, LegacyVersion, PlayerInfo};

use codec::{FrameData, FrameSource};
use container::Container;
use normalize::RawDocument;

pub type Result<T> = std::result::Result<T, ReplayError>;

/// Reads replays with a fixed configuration. Each decode is independent, so one
/// decoder can be shared freely between threads.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// A decoder using the default config with `REFRAMED_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::new(DecoderConfig::default().with_env_overrides())
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Reads the whole file at `path` and decodes it.
    pub fn decode_path(&self, path: impl AsRef<Path>) -> Result<Document> {
        let path = path.as_ref();

        let raw = fs::read(path).map_err(|source| {
            tracing::error!(target: Log::Source, ?path, error = ?source, "Unable to read replay");

            ReplayError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;

        self.decode_bytes(&raw)
    }

    /// Decodes a complete replay held in memory.
    pub fn decode_bytes(&self, raw: &[u8]) -> Result<Document> {
        let resolved = source::resolve(raw, &self.config)?;
        let limit = self.config.max_decompressed_bytes;

        match container::classify(&resolved.bytes)? {
            Container::Legacy {
                version,
                root,
                encoded_states,
            } => {
                let document = RawDocument::from_root(root)?;

                let frames = codec::decode(
                    FrameSource::Legacy {
                        version,
                        encoded: &encoded_states,
                        player_count: document.player_count(),
                    },
                    limit,
                )?;

                normalize::normalize(
                    document,
                    frames,
                    ContainerKind::Legacy { version },
                    resolved.strategy,
                    &self.config,
                )
            },

            Container::Modern(modern) => {
                let document = RawDocument::from_root(modern.json_root()?)?;

                let frames = match modern.section(container::Tag::Fdat) {
                    Some(section) => codec::decode(FrameSource::Modern { section }, limit)?,
                    None => {
                        tracing::warn!(target: Log::Container, "RFR1 container has no FDAT section");

                        FrameData {
                            version: None,
                            states: vec![Vec::new(); document.player_count()],
                        }
                    },
                };

                let container = ContainerKind::Modern {
                    frame_data_version: frames.version,
                };

                normalize::normalize(document, frames, container, resolved.strategy, &self.config)
            },
        }
    }
}

impl Document {
    /// Decodes the replay at `path` with the default configuration.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Decoder::default().decode_path(path)
    }

    /// Decodes an in-memory replay with the default configuration.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Decoder::default().decode_bytes(raw)
    }
}
