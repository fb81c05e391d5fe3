use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::mapping::{FighterId, MappingInfo, StageId};
use crate::source::Strategy;

/// The JSON-era replay versions, each with its own frame state layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyVersion {
    V1_2,
    V1_3,
    V1_4,
}

impl LegacyVersion {
    pub fn parse(version: &str) -> Option<Self> {
        match version {
            "1.2" => Some(Self::V1_2),
            "1.3" => Some(Self::V1_3),
            "1.4" => Some(Self::V1_4),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1_2 => "1.2",
            Self::V1_3 => "1.3",
            Self::V1_4 => "1.4",
        }
    }
}

impl fmt::Display for LegacyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which on-disk family a document was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// JSON document with the frame states embedded as base64.
    Legacy { version: LegacyVersion },

    /// RFR1 tagged container. `frame_data_version` is the (major, minor) pair
    /// from the FDAT header, if the container had frame data.
    Modern { frame_data_version: Option<(u8, u8)> },
}

/// One player's state on one captured frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameState {
    pub frame: u32,

    /// Millisecond clock value. Missing from the 1.2 and 1.3 layouts.
    pub frame_timestamp: Option<u64>,

    /// Frames remaining on the match timer. Only the RFR1 layout records it.
    pub frames_left: Option<u32>,

    pub pos_x: f64,
    pub pos_y: f64,
    pub damage: f64,
    pub hitstun: f64,
    pub shield: f64,
    pub status: u16,

    /// hash40 of the current animation.
    pub motion: u64,
    pub hit_status: u8,
    pub stocks: u8,
    pub attack_connected: bool,
    pub facing_direction: bool,
}

/// Match metadata. Fields that vary between replay versions are optional; anything
/// not modeled here is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GameInfo {
    pub date: Option<String>,
    pub format: Option<String>,
    pub set: Option<i64>,
    pub number: Option<i64>,

    #[serde(rename = "stageid", alias = "stageId")]
    pub stage_id: Option<StageId>,

    /// Index into the player list.
    pub winner: Option<i64>,

    #[serde(rename = "timestampstart", alias = "timestampStart")]
    pub timestamp_start: Option<u64>,

    #[serde(rename = "timestampend", alias = "timestampEnd")]
    pub timestamp_end: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GameInfo {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_start.and_then(millis_to_datetime)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_end.and_then(millis_to_datetime)
    }
}

fn millis_to_datetime(millis: u64) -> Option<DateTime<Utc>> {
    i64::try_from(millis).ok().and_then(DateTime::from_timestamp_millis)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayerInfo {
    pub name: Option<String>,
    pub tag: Option<String>,

    #[serde(rename = "fighterid", alias = "fighterId")]
    pub fighter_id: FighterId,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A fully decoded replay.
///
/// Built once by the decoder and read-only afterwards; see the `query` module for
/// the name lookups.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) version: String,
    pub(crate) container: ContainerKind,
    pub(crate) source: Strategy,
    pub(crate) game_info: GameInfo,
    pub(crate) player_info: Vec<PlayerInfo>,
    pub(crate) mapping_info: MappingInfo,
    pub(crate) player_states: Vec<Vec<FrameState>>,
    pub(crate) video_info: Option<Value>,
    pub(crate) extra: Map<String, Value>,
}

impl Document {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn container(&self) -> ContainerKind {
        self.container
    }

    /// The strategy that unwrapped the file's outer compression.
    pub fn source_strategy(&self) -> Strategy {
        self.source
    }

    pub fn frame_data_version(&self) -> Option<(u8, u8)> {
        match self.container {
            ContainerKind::Modern { frame_data_version } => frame_data_version,
            ContainerKind::Legacy { .. } => None,
        }
    }

    pub fn game_info(&self) -> &GameInfo {
        &self.game_info
    }

    pub fn player_info(&self) -> &[PlayerInfo] {
        &self.player_info
    }

    pub fn mapping_info(&self) -> &MappingInfo {
        &self.mapping_info
    }

    /// Per-player state sequences, indexed by player.
    pub fn player_states(&self) -> &[Vec<FrameState>] {
        &self.player_states
    }

    pub fn states(&self, player_index: usize) -> Option<&[FrameState]> {
        self.player_states.get(player_index).map(Vec::as_slice)
    }

    pub fn video_info(&self) -> Option<&Value> {
        self.video_info.as_ref()
    }

    /// Top level fields not otherwise modeled.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_game_info_accepts_replay_keys() {
        let info: GameInfo = serde_json::from_value(json!({
            "date": "2021-10-30",
            "format": "Friendlies",
            "set": 3,
            "number": 2,
            "stageid": 87,
            "winner": 1,
            "timestampstart": 1640995200000u64,
            "timestampend": 1640995380500u64,
            "tournament": "Weekly"
        }))
        .unwrap();

        assert_eq!(info.stage_id, Some(87));
        assert_eq!(info.winner, Some(1));
        assert_eq!(info.extra.get("tournament"), Some(&json!("Weekly")));
        assert_eq!(info.started_at().unwrap().timestamp(), 1640995200);
        assert_eq!(info.ended_at().unwrap().timestamp_millis(), 1640995380500);
    }

    #[test]
    fn test_legacy_version_gate() {
        assert_eq!(LegacyVersion::parse("1.3"), Some(LegacyVersion::V1_3));
        assert_eq!(LegacyVersion::parse("1.5"), None);
        assert_eq!(LegacyVersion::V1_4.to_string(), "1.4");
    }
}
