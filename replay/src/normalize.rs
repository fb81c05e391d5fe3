//! Turns the loosely typed JSON sections into a [`Document`].
//!
//! JSON object keys are always strings, so every mapping table arrives keyed by
//! `"10"` rather than `10`. All keys are re-keyed to integers here, once, and a
//! key that doesn't parse fails the whole decode.

use reframed_logger::Log;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::codec::FrameData;
use crate::config::DecoderConfig;
use crate::container::PLAYER_STATES_KEY;
use crate::errors::ReplayError;
use crate::mapping::{FighterStatus, MappingInfo, StatusTable, Table};
use crate::source::Strategy;
use crate::types::{ContainerKind, Document, GameInfo, PlayerInfo};

/// The document root as it appears on disk, minus the frame states.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDocument {
    #[serde(default, deserialize_with = "version_text")]
    pub version: Option<String>,

    #[serde(default, rename = "gameinfo", alias = "gameInfo")]
    pub game_info: GameInfo,

    #[serde(default, rename = "playerinfo", alias = "playerInfo")]
    pub player_info: Vec<PlayerInfo>,

    #[serde(rename = "mappinginfo", alias = "mappingInfo")]
    pub mapping_info: RawMappingInfo,

    #[serde(default, rename = "videoinfo", alias = "videoInfo")]
    pub video_info: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawDocument {
    pub(crate) fn from_root(root: Map<String, Value>) -> Result<Self, ReplayError> {
        serde_json::from_value(Value::Object(root)).map_err(|source| ReplayError::MalformedSection {
            section: "document",
            source,
        })
    }

    pub(crate) fn player_count(&self) -> usize {
        self.player_info.len()
    }
}

/// RFR1 versions are informational, so a non-string version is kept as its JSON text.
fn version_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(version)) => Some(version),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawMappingInfo {
    #[serde(default, alias = "fighterId")]
    pub fighterid: Map<String, Value>,

    #[serde(default, alias = "stageId")]
    pub stageid: Map<String, Value>,

    #[serde(default, alias = "hitStatusId", alias = "hitstatusid")]
    pub hitstatus: Map<String, Value>,

    #[serde(default, alias = "fighterStatus")]
    pub fighterstatus: RawFighterStatus,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawFighterStatus {
    #[serde(default)]
    pub base: Map<String, Value>,

    #[serde(default)]
    pub specific: Map<String, Value>,
}

/// Re-keys every mapping table to integers.
pub(crate) fn normalize_mapping(raw: RawMappingInfo) -> Result<MappingInfo, ReplayError> {
    let specific = raw
        .fighterstatus
        .specific
        .into_iter()
        .map(|(key, value)| {
            let fighter = parse_key("fighterstatus.specific", &key)?;
            let statuses = match value {
                Value::Object(statuses) => status_table("fighterstatus.specific", statuses)?,
                other => return Err(malformed_mapping(&format!("fighterstatus.specific.{key}"), other)),
            };

            Ok((fighter, statuses))
        })
        .collect::<Result<Table<StatusTable>, ReplayError>>()?;

    Ok(MappingInfo {
        fighter_id: name_table("fighterid", raw.fighterid)?,
        stage_id: name_table("stageid", raw.stageid)?,
        hit_status_id: name_table("hitstatus", raw.hitstatus)?,
        fighter_status: FighterStatus {
            base: status_table("fighterstatus.base", raw.fighterstatus.base)?,
            specific,
        },
    })
}

fn parse_key(table: &'static str, key: &str) -> Result<i32, ReplayError> {
    key.trim().parse().map_err(|_| ReplayError::InvalidMappingKey {
        table,
        key: key.to_owned(),
    })
}

fn name_table(table: &'static str, raw: Map<String, Value>) -> Result<Table<String>, ReplayError> {
    raw.into_iter()
        .map(|(key, value)| match value {
            Value::String(name) => Ok((parse_key(table, &key)?, name)),
            other => Err(malformed_mapping(&format!("{table}.{key}"), other)),
        })
        .collect()
}

/// Status entries are lists of aliases; a bare string is treated as a single alias.
fn status_table(table: &'static str, raw: Map<String, Value>) -> Result<StatusTable, ReplayError> {
    raw.into_iter()
        .map(|(key, value)| {
            let id = parse_key(table, &key)?;
            let names = match value {
                Value::String(name) => vec![name],
                Value::Array(names) => names
                    .into_iter()
                    .map(|name| match name {
                        Value::String(name) => Ok(name),
                        other => Err(malformed_mapping(&format!("{table}.{key}"), other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => return Err(malformed_mapping(&format!("{table}.{key}"), other)),
            };

            Ok((id, names))
        })
        .collect()
}

fn malformed_mapping(path: &str, value: Value) -> ReplayError {
    let message = format!("unexpected value {value} at mappinginfo.{path}");

    ReplayError::MalformedSection {
        section: "mappinginfo",
        source: serde::de::Error::custom(message),
    }
}

/// Assembles the final document from its on-disk root and decoded frame states.
pub(crate) fn normalize(
    raw: RawDocument,
    frames: FrameData,
    container: ContainerKind,
    source: Strategy,
    config: &DecoderConfig,
) -> Result<Document, ReplayError> {
    let mapping_info = normalize_mapping(raw.mapping_info)?;
    let player_states = frames.states;

    // Whatever placeholder sat at the frame state key is replaced by the decoded states.
    let mut extra = raw.extra;
    extra.remove(PLAYER_STATES_KEY);

    let counts: Vec<usize> = player_states.iter().map(Vec::len).collect();
    if counts.windows(2).any(|pair| pair[0] != pair[1]) {
        if config.require_uniform_state_counts {
            tracing::error!(target: Log::Normalize, ?counts, "Players have differing state counts");
            return Err(ReplayError::StateCountMismatch { counts });
        }

        tracing::warn!(target: Log::Normalize, ?counts, "Players have differing state counts");
    }

    if player_states.len() != raw.player_info.len() {
        tracing::warn!(
            target: Log::Normalize,
            players = raw.player_info.len(),
            state_blocks = player_states.len(),
            "Frame data player count disagrees with playerinfo"
        );
    }

    tracing::info!(
        target: Log::Normalize,
        version = raw.version.as_deref().unwrap_or_default(),
        ?container,
        %source,
        players = raw.player_info.len(),
        frames = counts.first().copied().unwrap_or_default(),
        "Decoded replay"
    );

    Ok(Document {
        version: raw.version.unwrap_or_default(),
        container,
        source,
        game_info: raw.game_info,
        player_info: raw.player_info,
        mapping_info,
        player_states,
        video_info: raw.video_info,
        extra,
    })
}
