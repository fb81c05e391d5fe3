use std::collections::HashMap;

/// Fighter, stage, status and hit status ids as they appear in replays.
pub type FighterId = i32;
pub type StageId = i32;
pub type StatusId = i32;
pub type HitStatusId = i32;

/// Integer-keyed lookup table that remembers the order entries were listed in.
///
/// Iteration follows source order, which is what name searches scan; lookups by
/// key go through a side index.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<V> {
    entries: Vec<(i32, V)>,
    index: HashMap<i32, usize>,
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> Table<V> {
    /// Inserts `value` under `key`. A repeated key replaces the earlier value but
    /// keeps its original position.
    pub(crate) fn insert(&mut self, key: i32, value: V) {
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot].1 = value,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key, value));
            },
        }
    }

    pub fn get(&self, key: i32) -> Option<&V> {
        self.index.get(&key).map(|&slot| &self.entries[slot].1)
    }

    pub fn contains_key(&self, key: i32) -> bool {
        self.index.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in source order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &V)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = i32> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }
}

impl<V> FromIterator<(i32, V)> for Table<V> {
    fn from_iter<I: IntoIterator<Item = (i32, V)>>(iter: I) -> Self {
        let mut table = Self::default();

        for (key, value) in iter {
            table.insert(key, value);
        }

        table
    }
}

/// Status names. Each status can carry several aliases; the first is the
/// canonical name.
pub type StatusTable = Table<Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FighterStatus {
    /// Statuses shared by every fighter.
    pub base: StatusTable,

    /// Per-fighter statuses, keyed by fighter id.
    pub specific: Table<StatusTable>,
}

/// The name tables shipped with a replay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingInfo {
    pub fighter_id: Table<String>,
    pub stage_id: Table<String>,
    pub hit_status_id: Table<String>,
    pub fighter_status: FighterStatus,
}
