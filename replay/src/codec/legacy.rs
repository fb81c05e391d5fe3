//! JSON-era frame state blobs (1.2, 1.3 and 1.4).
//!
//! The states were written to a buffer that was base64 encoded into the
//! `playerstates` field, with the padding stripped. The buffer is a sequence of
//! player blocks, each a `u32` record count followed by that many records.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use reframed_logger::Log;

use super::{ByteReader, FrameData, Schema};
use crate::errors::ReplayError;

/// Standard alphabet, padding optional. URL-safe input is mapped onto the
/// standard alphabet before decoding.
const BLOB_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

pub(super) fn decode(schema: Schema, encoded: &str, player_count: usize) -> Result<FrameData, ReplayError> {
    let blob = decode_base64(encoded)?;
    let mut reader = ByteReader::new(&blob, schema.byte_order());
    let mut states = Vec::with_capacity(player_count);

    for player in 0..player_count {
        let count = reader.u32().map_err(|_| {
            ReplayError::corrupt(format!("frame state blob ends before the record count of player {player}"))
        })?;

        states.push(schema.read_block(&mut reader, count as usize, player)?);
    }

    if reader.remaining() > 0 {
        tracing::debug!(
            target: Log::Codec,
            trailing = reader.remaining(),
            "Ignoring bytes after the last player block"
        );
    }

    Ok(FrameData { version: None, states })
}

/// Decodes the `playerstates` text, tolerating the missing padding and either
/// base64 alphabet.
fn decode_base64(encoded: &str) -> Result<Vec<u8>, ReplayError> {
    let normalized: String = encoded
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();

    BLOB_ENGINE
        .decode(normalized)
        .map_err(|error| ReplayError::corrupt(format!("playerstates is not valid base64: {error}")))
}
