//! FDAT sections of RFR1 containers.
//!
//! The section starts with a 6 byte header (`u8` major, `u8` minor, `u32` LE
//! uncompressed size) followed by a zlib stream. Once inflated, a `u32` frame
//! count and `u8` player count precede `players * frames` records, player-major.

use flate2::read::ZlibDecoder;
use reframed_logger::Log;

use super::{ByteOrder, ByteReader, FrameData, Schema};
use crate::errors::ReplayError;
use crate::source::read_capped;

const SECTION_HEADER_LEN: usize = 6;

pub(super) fn decode(section: &[u8], max_decompressed_bytes: Option<u64>) -> Result<FrameData, ReplayError> {
    let mut header = ByteReader::new(section, ByteOrder::Little);
    let (major, minor) = (header.u8()?, header.u8()?);

    // Only informational, the stream is inflated until it ends regardless.
    let declared_size = header.u32()?;
    let compressed = &section[SECTION_HEADER_LEN..];

    let frames = read_capped(ZlibDecoder::new(compressed), max_decompressed_bytes)
        .map_err(|error| ReplayError::corrupt(format!("FDAT section: {error}")))?;

    if frames.len() as u64 != u64::from(declared_size) {
        tracing::debug!(
            target: Log::Codec,
            declared_size,
            actual_size = frames.len(),
            "FDAT size field disagrees with the inflated data"
        );
    }

    let mut reader = ByteReader::new(&frames, ByteOrder::Little);
    let frame_count = reader.u32()? as usize;
    let player_count = reader.u8()? as usize;

    tracing::debug!(target: Log::Codec, major, minor, frame_count, player_count, "Reading FDAT section");

    let mut states = Vec::with_capacity(player_count);

    for player in 0..player_count {
        states.push(Schema::Modern.read_block(&mut reader, frame_count, player)?);
    }

    Ok(FrameData {
        version: Some((major, minor)),
        states,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    use super::*;
    use crate::codec::tests::{encode_record, sample_state};
    use crate::types::FrameState;

    /// Builds a complete FDAT section for `players`, which must all be the same length.
    fn section(players: &[Vec<FrameState>]) -> Vec<u8> {
        let frames = players.first().map_or(0, Vec::len) as u32;

        let mut body = frames.to_le_bytes().to_vec();
        body.push(players.len() as u8);
        for state in players.iter().flatten() {
            body.extend(encode_record(Schema::Modern, state));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body).unwrap();

        let mut out = vec![1, 0];
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend(encoder.finish().unwrap());
        out
    }

    fn players(frames: u32) -> Vec<Vec<FrameState>> {
        (0..2).map(|_| (0..frames).map(|frame| sample_state(Schema::Modern, frame)).collect()).collect()
    }

    #[test]
    fn test_decodes_section() {
        let expected = players(3);
        let data = decode(&section(&expected), None).unwrap();

        assert_eq!(data.version, Some((1, 0)));
        assert_eq!(data.states, expected);
        assert_eq!(data.states[1][2].frame, 2);
    }

    #[test]
    fn test_size_field_is_informational() {
        let mut bytes = section(&players(2));
        bytes[2..6].copy_from_slice(&7u32.to_le_bytes());

        assert_eq!(decode(&bytes, None).unwrap().states, players(2));
    }

    #[test]
    fn test_short_header_is_corruption() {
        assert!(matches!(decode(&[1, 0, 0], None), Err(ReplayError::StructuralCorruption(_))));
    }

    #[test]
    fn test_bad_zlib_is_corruption() {
        let error = decode(&[1, 0, 0, 0, 0, 0, 0xDE, 0xAD], None).unwrap_err();
        assert!(error.to_string().contains("inflate"), "{error}");
    }

    #[test]
    fn test_overstated_frame_count_is_corruption() {
        // Claim 4 frames per player while only carrying 3.
        let expected = players(3);
        let mut body = 4u32.to_le_bytes().to_vec();
        body.push(2);
        for state in expected.iter().flatten() {
            body.extend(encode_record(Schema::Modern, state));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body).unwrap();
        let mut bytes = vec![1, 0, 0, 0, 0, 0];
        bytes.extend(encoder.finish().unwrap());

        assert!(matches!(decode(&bytes, None), Err(ReplayError::StructuralCorruption(_))));
    }
}
