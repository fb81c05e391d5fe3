//! Undoes whatever compression wraps a replay payload.
//!
//! Replays have been written a few different ways over the years: gzip'd JSON,
//! JSON run through Qt's `qCompress` (a 4 byte length followed by a zlib stream),
//! plain JSON, and the RFR1 binary container (which compresses internally). There
//! is no flag to tell these apart, so the strategies below are tried in order and
//! the first one to produce a usable payload wins.

use std::borrow::Cow;
use std::fmt;
use std::io::Read;

use flate2::read::{MultiGzDecoder, ZlibDecoder};
use reframed_logger::Log;

use crate::config::DecoderConfig;
use crate::container::{MODERN_MAGIC, UTF8_BOM};
use crate::errors::{ReplayError, StrategyError, StrategyFailure, StrategyFailures};

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Size of the big-endian length that `qCompress` prepends to its zlib stream.
const QT_LENGTH_PREFIX: usize = 4;

/// The ways a payload can be unwrapped, in the order they're attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Gzip,
    QtDeflate,
    Identity,
}

impl Strategy {
    pub const ORDER: [Strategy; 3] = [Strategy::Gzip, Strategy::QtDeflate, Strategy::Identity];

    fn attempt<'a>(&self, raw: &'a [u8], config: &DecoderConfig) -> Result<Cow<'a, [u8]>, StrategyError> {
        match self {
            Self::Gzip => gunzip(raw, config.max_decompressed_bytes).map(Cow::Owned),
            Self::QtDeflate => qt_uncompress(raw, config.max_decompressed_bytes).map(Cow::Owned),
            Self::Identity => passthrough(raw, config.strict_passthrough).map(Cow::Borrowed),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gzip => write!(f, "gzip"),
            Self::QtDeflate => write!(f, "qt-deflate"),
            Self::Identity => write!(f, "identity"),
        }
    }
}

/// A payload with its outer wrapping removed.
#[derive(Debug)]
pub struct Resolved<'a> {
    pub strategy: Strategy,
    pub bytes: Cow<'a, [u8]>,
}

/// Runs each strategy against `raw` and returns the first payload produced.
///
/// Individual strategy failures are expected (a plain JSON file is not gzip'd)
/// and are only logged. If nothing works, every attempt's reason is returned.
/// A stream that inflates past the configured limit stops resolution outright.
pub fn resolve<'a>(raw: &'a [u8], config: &DecoderConfig) -> Result<Resolved<'a>, ReplayError> {
    let mut failures = Vec::with_capacity(Strategy::ORDER.len());

    for strategy in Strategy::ORDER {
        match strategy.attempt(raw, config) {
            Ok(bytes) => {
                tracing::debug!(target: Log::Source, %strategy, size = bytes.len(), "Resolved replay payload");
                return Ok(Resolved { strategy, bytes });
            },

            Err(reason @ StrategyError::LimitExceeded { .. }) => {
                tracing::error!(target: Log::Source, %strategy, %reason, "Replay payload is too large");
                return Err(ReplayError::corrupt(format!("{strategy} payload {reason}")));
            },

            Err(reason) => {
                tracing::debug!(target: Log::Source, %strategy, %reason, "Strategy did not apply");
                failures.push(StrategyFailure { strategy, reason });
            },
        }
    }

    let failures = StrategyFailures(failures);
    tracing::error!(target: Log::Source, %failures, "Unable to resolve replay payload");

    Err(ReplayError::UnreadableSource(failures))
}

fn gunzip(raw: &[u8], limit: Option<u64>) -> Result<Vec<u8>, StrategyError> {
    if !raw.starts_with(&GZIP_MAGIC) {
        return Err(StrategyError::MissingGzipMagic);
    }

    // Concatenated members are read through to the last one.
    let text = read_capped(MultiGzDecoder::new(raw), limit)?;
    require_utf8(text)
}

fn qt_uncompress(raw: &[u8], limit: Option<u64>) -> Result<Vec<u8>, StrategyError> {
    let stream = raw
        .get(QT_LENGTH_PREFIX..)
        .ok_or(StrategyError::TooShort(QT_LENGTH_PREFIX))?;

    let text = read_capped(ZlibDecoder::new(stream), limit)?;
    require_utf8(text)
}

fn passthrough(raw: &[u8], strict: bool) -> Result<&[u8], StrategyError> {
    if !strict || raw.starts_with(MODERN_MAGIC) || looks_like_json(raw) {
        return Ok(raw);
    }

    Err(StrategyError::NotPassthrough)
}

fn looks_like_json(raw: &[u8]) -> bool {
    let body = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{')
}

fn require_utf8(bytes: Vec<u8>) -> Result<Vec<u8>, StrategyError> {
    match std::str::from_utf8(&bytes) {
        Ok(_) => Ok(bytes),
        Err(error) => Err(StrategyError::NotUtf8(error)),
    }
}

/// Drains a decompression stream, refusing to produce more than `limit` bytes.
pub(crate) fn read_capped(reader: impl Read, limit: Option<u64>) -> Result<Vec<u8>, StrategyError> {
    let mut out = Vec::new();

    let result = match limit {
        Some(limit) => reader.take(limit.saturating_add(1)).read_to_end(&mut out),
        None => {
            let mut reader = reader;
            reader.read_to_end(&mut out)
        },
    };

    result.map_err(StrategyError::Inflate)?;

    match limit {
        Some(limit) if out.len() as u64 > limit => Err(StrategyError::LimitExceeded { limit }),
        _ => Ok(out),
    }
}
