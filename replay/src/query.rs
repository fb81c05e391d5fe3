//! Name lookups against a decoded [`Document`].
//!
//! Nothing here mutates the document, and a failed lookup only affects that call.

use reframed_logger::Log;

use crate::errors::ReplayError;
use crate::mapping::{FighterId, HitStatusId, StageId, StatusId, StatusTable};
use crate::types::{Document, PlayerInfo};

impl Document {
    pub fn player_count(&self) -> usize {
        self.player_info.len()
    }

    pub fn player(&self, player_index: usize) -> Result<&PlayerInfo, ReplayError> {
        self.player_info
            .get(player_index)
            .ok_or_else(|| ReplayError::not_found("player", player_index))
    }

    pub fn fighter_name(&self, fighter_id: FighterId) -> Result<&str, ReplayError> {
        self.mapping_info
            .fighter_id
            .get(fighter_id)
            .map(String::as_str)
            .ok_or_else(|| ReplayError::not_found("fighter", fighter_id))
    }

    pub fn stage_name(&self, stage_id: StageId) -> Result<&str, ReplayError> {
        self.mapping_info
            .stage_id
            .get(stage_id)
            .map(String::as_str)
            .ok_or_else(|| ReplayError::not_found("stage", stage_id))
    }

    pub fn hit_status_name(&self, hit_status_id: HitStatusId) -> Result<&str, ReplayError> {
        self.mapping_info
            .hit_status_id
            .get(hit_status_id)
            .map(String::as_str)
            .ok_or_else(|| ReplayError::not_found("hit status", hit_status_id))
    }

    /// The fighter name for the player at `player_index`.
    pub fn player_fighter_name(&self, player_index: usize) -> Result<&str, ReplayError> {
        self.fighter_name(self.player(player_index)?.fighter_id)
    }

    /// The name of the stage the match was played on.
    pub fn game_stage_name(&self) -> Result<&str, ReplayError> {
        let stage_id = self
            .game_info
            .stage_id
            .ok_or_else(|| ReplayError::not_found("stage", "<unset>"))?;

        self.stage_name(stage_id)
    }

    /// The winning player, if the replay records one and it's a valid index.
    pub fn winner(&self) -> Option<&PlayerInfo> {
        let index = usize::try_from(self.game_info.winner?).ok()?;
        self.player_info.get(index)
    }

    /// Resolves a status id to its canonical name.
    ///
    /// The shared table is checked first. If the id isn't there and a player is
    /// given, that player's fighter-specific table is checked next.
    pub fn status_name(&self, status_id: StatusId, player_index: Option<usize>) -> Result<&str, ReplayError> {
        if let Some(name) = first_alias(&self.mapping_info.fighter_status.base, status_id) {
            return Ok(name);
        }

        let Some(player_index) = player_index else {
            return Err(ReplayError::not_found("status", status_id));
        };

        let fighter_id = self.player(player_index)?.fighter_id;

        self.specific_statuses(fighter_id)
            .and_then(|table| first_alias(table, status_id))
            .ok_or_else(|| {
                tracing::trace!(target: Log::Query, status_id, fighter_id, "Status missing from both tables");
                ReplayError::not_found("status", format!("{status_id} (fighter {fighter_id})"))
            })
    }

    /// Finds the id of the status whose canonical name is `name`.
    ///
    /// Only the first alias of each entry is compared. The shared table is
    /// scanned first, then (if a player is given) that player's fighter table;
    /// the first match in source order wins.
    pub fn find_status(&self, name: &str, player_index: Option<usize>) -> Result<StatusId, ReplayError> {
        if let Some(id) = scan_first_alias(&self.mapping_info.fighter_status.base, name) {
            return Ok(id);
        }

        if let Some(player_index) = player_index {
            let fighter_id = self.player(player_index)?.fighter_id;

            if let Some(id) = self.specific_statuses(fighter_id).and_then(|table| scan_first_alias(table, name)) {
                return Ok(id);
            }
        }

        Err(ReplayError::not_found("status name", name))
    }

    fn specific_statuses(&self, fighter_id: FighterId) -> Option<&StatusTable> {
        self.mapping_info.fighter_status.specific.get(fighter_id)
    }
}

fn first_alias(table: &StatusTable, status_id: StatusId) -> Option<&str> {
    table.get(status_id).and_then(|names| names.first()).map(String::as_str)
}

fn scan_first_alias(table: &StatusTable, name: &str) -> Option<StatusId> {
    table
        .iter()
        .find(|(_, names)| names.first().is_some_and(|first| first == name))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::codec::FrameData;
    use crate::config::DecoderConfig;
    use crate::normalize::{RawDocument, normalize};
    use crate::source::Strategy;
    use crate::types::{ContainerKind, LegacyVersion};

    fn document() -> Document {
        let root = json!({
            "version": "1.3",
            "gameinfo": {"stageid": 87, "winner": 1},
            "playerinfo": [
                {"name": "Player 1", "tag": "P1", "fighterid": 10},
                {"name": "Player 2", "tag": "P2", "fighterid": 2}
            ],
            "mappinginfo": {
                "fighterid": {"10": "Fox", "2": "Falco"},
                "stageid": {"87": "Town and City"},
                "hitstatus": {"0": "Normal"},
                "fighterstatus": {
                    "base": {
                        "0": ["FIGHTER_STATUS_KIND_WAIT", "Wait"],
                        "1": ["FIGHTER_STATUS_KIND_WALK"],
                        "2": ["FIGHTER_STATUS_KIND_WALK"]
                    },
                    "specific": {
                        "10": {
                            "1": ["FIGHTER_FOX_STATUS_KIND_SHADOWED"],
                            "480": ["FIGHTER_FOX_STATUS_KIND_SPECIAL_LW_HIT"],
                            "481": ["FIGHTER_STATUS_KIND_WAIT"]
                        }
                    }
                }
            }
        });

        let Value::Object(root) = root else { unreachable!() };
        let raw = RawDocument::from_root(root).unwrap();
        let frames = FrameData {
            version: None,
            states: vec![Vec::new(), Vec::new()],
        };

        normalize(
            raw,
            frames,
            ContainerKind::Legacy {
                version: LegacyVersion::V1_3,
            },
            Strategy::Identity,
            &DecoderConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_direct_lookups() {
        let document = document();

        assert_eq!(document.player_count(), 2);
        assert_eq!(document.fighter_name(10).unwrap(), "Fox");
        assert_eq!(document.fighter_name(2).unwrap(), "Falco");
        assert_eq!(document.stage_name(87).unwrap(), "Town and City");
        assert_eq!(document.game_stage_name().unwrap(), "Town and City");
        assert_eq!(document.hit_status_name(0).unwrap(), "Normal");
        assert_eq!(document.player_fighter_name(1).unwrap(), "Falco");
        assert_eq!(document.winner().and_then(|p| p.tag.as_deref()), Some("P2"));

        assert!(document.fighter_name(99).unwrap_err().is_not_found());
        assert!(document.stage_name(1).unwrap_err().is_not_found());
        assert!(document.player(5).unwrap_err().is_not_found());
    }

    #[test]
    fn test_status_name_prefers_base_table() {
        let document = document();

        // 1 lives in both tables; the shared one wins even with a player given.
        assert_eq!(document.status_name(1, Some(0)).unwrap(), "FIGHTER_STATUS_KIND_WALK");
        assert_eq!(document.status_name(0, None).unwrap(), "FIGHTER_STATUS_KIND_WAIT");
    }

    #[test]
    fn test_status_name_falls_through_to_fighter() {
        let document = document();

        assert_eq!(document.status_name(480, Some(0)).unwrap(), "FIGHTER_FOX_STATUS_KIND_SPECIAL_LW_HIT");

        // No player means no fallback.
        assert!(document.status_name(480, None).unwrap_err().is_not_found());

        // Falco has no specific table at all.
        assert!(document.status_name(480, Some(1)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_find_status() {
        let document = document();

        assert_eq!(document.find_status("FIGHTER_STATUS_KIND_WAIT", None).unwrap(), 0);

        // Only the first alias counts.
        assert!(document.find_status("Wait", None).unwrap_err().is_not_found());

        // Two base entries share a name: the first listed wins.
        assert_eq!(document.find_status("FIGHTER_STATUS_KIND_WALK", None).unwrap(), 1);

        assert_eq!(
            document.find_status("FIGHTER_FOX_STATUS_KIND_SPECIAL_LW_HIT", Some(0)).unwrap(),
            480
        );
        assert!(
            document
                .find_status("FIGHTER_FOX_STATUS_KIND_SPECIAL_LW_HIT", None)
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            document
                .find_status("FIGHTER_FOX_STATUS_KIND_SPECIAL_LW_HIT", Some(1))
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn test_lookups_leave_document_usable() {
        let document = document();
        let _ = document.fighter_name(12345);

        assert_eq!(document.fighter_name(10).unwrap(), "Fox");
    }
}
