//! Frame state decoding.
//!
//! Every replay version stores one fixed-size record per player per frame, but
//! the record layout has changed with nearly every release. Each layout is a
//! [`Schema`]; [`decode`] picks the right one and walks the player blocks.
//!
//! | Schema | Order  | Record | Layout                                                     |
//! |--------|--------|--------|------------------------------------------------------------|
//! | RFR1   | little | 42     | u64 ts, u32 frames left, 5x f32, u16, u32+u8 motion, 4x u8 |
//! | 1.2    | big    | 57     | u32 frame, 5x f64, u16, u64 motion, 3x u8                  |
//! | 1.3    | little | 34     | u32 frame, 5x f32, u16, u32+u8 motion, 3x u8               |
//! | 1.4    | little | 42     | u32+u32 ts, u32 frame, 5x f32, u16, u32+u8 motion, 3x u8   |
//!
//! (The last `u8` of every layout is a flags byte.)

mod legacy;
mod modern;
mod reader;

pub use reader::{ByteOrder, ByteReader};

use reframed_logger::Log;

use crate::errors::ReplayError;
use crate::types::{FrameState, LegacyVersion};

const ATTACK_CONNECTED: u8 = 0x01;
const FACING_DIRECTION: u8 = 0x02;

/// A frame state record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// The FDAT section of an RFR1 container.
    Modern,
    V1_2,
    V1_3,
    V1_4,
}

impl Schema {
    pub const fn record_size(self) -> usize {
        match self {
            Self::Modern => 42,
            Self::V1_2 => 57,
            Self::V1_3 => 34,
            Self::V1_4 => 42,
        }
    }

    pub const fn byte_order(self) -> ByteOrder {
        match self {
            Self::V1_2 => ByteOrder::Big,
            Self::Modern | Self::V1_3 | Self::V1_4 => ByteOrder::Little,
        }
    }

    /// Reads one record. `index` is the record's position within its player
    /// block, which is the only frame number the RFR1 layout has.
    pub(crate) fn read_record(self, reader: &mut ByteReader<'_>, index: u32) -> Result<FrameState, ReplayError> {
        let mut state = FrameState::default();

        match self {
            Self::Modern => {
                state.frame_timestamp = Some(reader.u64()?);
                state.frames_left = Some(reader.u32()?);
                state.frame = index;
            },

            Self::V1_2 | Self::V1_3 => {
                state.frame = reader.u32()?;
            },

            Self::V1_4 => {
                let low = reader.u32()?;
                let high = reader.u32()?;
                state.frame_timestamp = Some(join_halves(high, low));
                state.frame = reader.u32()?;
            },
        }

        if self == Self::V1_2 {
            state.pos_x = reader.f64()?;
            state.pos_y = reader.f64()?;
            state.damage = reader.f64()?;
            state.hitstun = reader.f64()?;
            state.shield = reader.f64()?;
            state.status = reader.u16()?;
            state.motion = reader.u64()?;
        } else {
            state.pos_x = f64::from(reader.f32()?);
            state.pos_y = f64::from(reader.f32()?);
            state.damage = f64::from(reader.f32()?);
            state.hitstun = f64::from(reader.f32()?);
            state.shield = f64::from(reader.f32()?);
            state.status = reader.u16()?;

            let low = reader.u32()?;
            let high = reader.u8()?;
            state.motion = join_halves(u32::from(high), low);
        }

        state.hit_status = reader.u8()?;
        state.stocks = reader.u8()?;

        let flags = reader.u8()?;
        state.attack_connected = flags & ATTACK_CONNECTED != 0;
        state.facing_direction = flags & FACING_DIRECTION != 0;

        Ok(state)
    }

    /// Reads `count` consecutive records for `player`.
    pub(crate) fn read_block(
        self,
        reader: &mut ByteReader<'_>,
        count: usize,
        player: usize,
    ) -> Result<Vec<FrameState>, ReplayError> {
        reader.ensure_records(count, self.record_size(), player)?;

        let mut states = Vec::with_capacity(count);

        for index in 0..count {
            // `count` comes from a u32 on disk, so this can't truncate.
            states.push(self.read_record(reader, index as u32)?);
        }

        Ok(states)
    }
}

impl From<LegacyVersion> for Schema {
    fn from(version: LegacyVersion) -> Self {
        match version {
            LegacyVersion::V1_2 => Self::V1_2,
            LegacyVersion::V1_3 => Self::V1_3,
            LegacyVersion::V1_4 => Self::V1_4,
        }
    }
}

/// `(high << 32) | low`, used for split motion and timestamp fields.
pub const fn join_halves(high: u32, low: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

/// Where a replay's frame states live.
#[derive(Debug, Clone, Copy)]
pub enum FrameSource<'a> {
    /// The `playerstates` string of a JSON replay. Legacy blobs carry no player
    /// count of their own, so it comes from `playerinfo`.
    Legacy {
        version: LegacyVersion,
        encoded: &'a str,
        player_count: usize,
    },

    /// The raw bytes of an FDAT section.
    Modern { section: &'a [u8] },
}

/// Decoded frame states plus whatever header information came with them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameData {
    /// (major, minor) from the FDAT header.
    pub version: Option<(u8, u8)>,
    pub states: Vec<Vec<FrameState>>,
}

/// Decodes every player's frame states from `source`.
pub fn decode(source: FrameSource<'_>, max_decompressed_bytes: Option<u64>) -> Result<FrameData, ReplayError> {
    let data = match source {
        FrameSource::Legacy {
            version,
            encoded,
            player_count,
        } => legacy::decode(Schema::from(version), encoded, player_count)?,

        FrameSource::Modern { section } => modern::decode(section, max_decompressed_bytes)?,
    };

    tracing::debug!(
        target: Log::Codec,
        players = data.states.len(),
        states = ?data.states.iter().map(Vec::len).collect::<Vec<_>>(),
        "Decoded frame states"
    );

    Ok(data)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Record writer for building synthetic blobs in tests.
    pub(crate) fn encode_record(schema: Schema, state: &FrameState) -> Vec<u8> {
        let mut out = Vec::with_capacity(schema.record_size());
        let little = schema.byte_order() == ByteOrder::Little;

        macro_rules! put {
            ($value:expr) => {
                if little {
                    out.extend_from_slice(&$value.to_le_bytes())
                } else {
                    out.extend_from_slice(&$value.to_be_bytes())
                }
            };
        }

        let timestamp = state.frame_timestamp.unwrap_or_default();

        match schema {
            Schema::Modern => {
                put!(timestamp);
                put!(state.frames_left.unwrap_or_default());
            },
            Schema::V1_2 | Schema::V1_3 => put!(state.frame),
            Schema::V1_4 => {
                put!(timestamp as u32);
                put!((timestamp >> 32) as u32);
                put!(state.frame);
            },
        }

        if schema == Schema::V1_2 {
            for value in [state.pos_x, state.pos_y, state.damage, state.hitstun, state.shield] {
                put!(value);
            }
            put!(state.status);
            put!(state.motion);
        } else {
            for value in [state.pos_x, state.pos_y, state.damage, state.hitstun, state.shield] {
                put!(value as f32);
            }
            put!(state.status);
            put!(state.motion as u32);
            out.push((state.motion >> 32) as u8);
        }

        let flags = u8::from(state.attack_connected) | (u8::from(state.facing_direction) << 1);
        out.extend_from_slice(&[state.hit_status, state.stocks, flags]);

        assert_eq!(out.len(), schema.record_size());
        out
    }

    /// A state whose values survive narrowing to f32 and the schema's field set.
    pub(crate) fn sample_state(schema: Schema, frame: u32) -> FrameState {
        FrameState {
            frame,
            frame_timestamp: match schema {
                Schema::Modern | Schema::V1_4 => Some(0x0000_0187_5A3C_0000 + u64::from(frame) * 16),
                _ => None,
            },
            frames_left: (schema == Schema::Modern).then(|| 25_200 - frame),
            pos_x: -41.5 + f64::from(frame),
            pos_y: 12.25,
            damage: 37.5,
            hitstun: 3.0,
            shield: 50.0,
            status: 0x1F4 + frame as u16,
            motion: 0xAB_1234_5678,
            hit_status: 1,
            stocks: 3,
            attack_connected: frame % 2 == 0,
            facing_direction: frame % 3 == 0,
        }
    }

    #[test]
    fn test_record_sizes() {
        for schema in [Schema::Modern, Schema::V1_2, Schema::V1_3, Schema::V1_4] {
            let encoded = encode_record(schema, &sample_state(schema, 7));
            let mut reader = ByteReader::new(&encoded, schema.byte_order());

            assert_eq!(schema.read_record(&mut reader, 7).unwrap(), sample_state(schema, 7));
            assert_eq!(reader.remaining(), 0, "{schema:?} consumed the wrong number of bytes");
        }
    }

    #[test]
    fn test_join_halves() {
        assert_eq!(join_halves(0, 0), 0);
        assert_eq!(join_halves(0, 0xFFFF_FFFF), 0xFFFF_FFFF);
        assert_eq!(join_halves(1, 0), 0x1_0000_0000);
        assert_eq!(join_halves(0xFFFF_FFFF, 0xFFFF_FFFF), u64::MAX);
        assert_eq!(join_halves(0xAB, 0x1234_5678), 0xAB_1234_5678);
    }

    #[test]
    fn test_split_timestamp_boundary() {
        let state = FrameState {
            frame_timestamp: Some(u64::MAX),
            ..FrameState::default()
        };
        let encoded = encode_record(Schema::V1_4, &state);
        let mut reader = ByteReader::new(&encoded, ByteOrder::Little);

        let decoded = Schema::V1_4.read_record(&mut reader, 0).unwrap();
        assert_eq!(decoded.frame_timestamp, Some(u64::MAX));
    }

    #[test]
    fn test_split_motion_boundary() {
        // The RFR1 and 1.3/1.4 layouts carry 40 bits of motion: 32 low bits plus one high byte.
        let mut record = vec![0u8; Schema::V1_3.record_size()];
        record[26..30].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        record[30] = 0xFF;

        let mut reader = ByteReader::new(&record, ByteOrder::Little);
        let decoded = Schema::V1_3.read_record(&mut reader, 0).unwrap();
        assert_eq!(decoded.motion, 0xFF_FFFF_FFFF);
    }

    #[test]
    fn test_flag_bits() {
        let cases = [(0x00, false, false), (0x01, true, false), (0x02, false, true), (0x03, true, true)];

        for (flags, attack_connected, facing_direction) in cases {
            let mut record = vec![0u8; Schema::V1_3.record_size()];
            *record.last_mut().unwrap() = flags;

            let mut reader = ByteReader::new(&record, ByteOrder::Little);
            let decoded = Schema::V1_3.read_record(&mut reader, 0).unwrap();

            assert_eq!(decoded.attack_connected, attack_connected, "flags {flags:#04x}");
            assert_eq!(decoded.facing_direction, facing_direction, "flags {flags:#04x}");
        }
    }

    #[test]
    fn test_v1_2_keeps_double_precision() {
        let state = FrameState {
            pos_x: std::f64::consts::PI,
            damage: 0.1,
            motion: u64::MAX,
            ..FrameState::default()
        };
        let encoded = encode_record(Schema::V1_2, &state);
        let mut reader = ByteReader::new(&encoded, ByteOrder::Big);

        let decoded = Schema::V1_2.read_record(&mut reader, 0).unwrap();
        assert_eq!(decoded.pos_x.to_bits(), std::f64::consts::PI.to_bits());
        assert_eq!(decoded.damage.to_bits(), 0.1f64.to_bits());
        assert_eq!(decoded.motion, u64::MAX);
    }
}
