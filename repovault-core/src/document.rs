//! Typed view over a raw save: team, run stats, players, and item ledgers.
//!
//! The document owns a private copy of everything it models. Loading never
//! keeps references into the raw tree and materializing writes into a caller
//! supplied working copy, so unmodeled fields can never be disturbed by
//! edits made through the typed view.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::items::{ItemLedger, TotalsPolicy};
use crate::player::{BASE_HEALTH, PlayerRecord, UpgradeKind, fallback_name};
use crate::raw::{
    ITEMS_PURCHASED, ITEMS_PURCHASED_TOTAL, ITEMS_UPGRADES_PURCHASED, PLAYER_HAS_CROWN,
    PLAYER_HEALTH, RUN_STATS, RawDocument,
};

/// The game refuses lobbies beyond six players; a save that names a seventh
/// corrupts the engine's expectations.
pub const MAX_PLAYERS: usize = 6;

const DEFAULT_TEAM_NAME: &str = "Default Team";

/// Known run-stat keys with the defaults the game starts a run with.
const RUN_STAT_DEFAULTS: [(&str, i64); 6] = [
    ("level", 1),
    ("currency", 0),
    ("lives", 3),
    ("chargingStationCharge", 0),
    ("totalHaul", 0),
    ("save level", 0),
];

/// Editable typed view of one save.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSaveDocument {
    team_name: String,
    run_stats: Map<String, Value>,
    players: BTreeMap<String, PlayerRecord>,
    items: ItemLedger,
    totals_policy: TotalsPolicy,
}

impl GameSaveDocument {
    /// Build the typed view from a raw save.
    ///
    /// Absent entries fall back to defaults: team name `"Default Team"`,
    /// player name `"Unknown"`, health 100, upgrade levels 0. The player set
    /// is the union of the name map and the health map.
    #[must_use]
    pub fn load(raw: &RawDocument) -> Self {
        let team_name = raw
            .team_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_TEAM_NAME)
            .to_string();

        let run_stats = raw
            .sub_map(RUN_STATS)
            .cloned()
            .unwrap_or_else(default_run_stats);

        let name_map = raw.player_names().cloned().unwrap_or_default();
        let health_map = raw.sub_map(PLAYER_HEALTH).cloned().unwrap_or_default();

        let mut players = BTreeMap::new();
        for id in health_map.keys().chain(name_map.keys()) {
            if players.contains_key(id) {
                continue;
            }
            let mut player = PlayerRecord::new(
                id.clone(),
                name_map
                    .get(id)
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown"),
            );
            player.health = health_map
                .get(id)
                .and_then(Value::as_i64)
                .unwrap_or(BASE_HEALTH);
            for kind in UpgradeKind::ALL {
                let level = raw
                    .sub_map(kind.save_key())
                    .and_then(|levels| levels.get(id))
                    .and_then(Value::as_i64)
                    .unwrap_or_default();
                player.upgrades.set_level(kind, level);
            }
            players.insert(id.clone(), player);
        }

        let items = ItemLedger {
            purchased: raw.sub_map(ITEMS_PURCHASED).cloned().unwrap_or_default(),
            purchased_total: raw
                .sub_map(ITEMS_PURCHASED_TOTAL)
                .cloned()
                .unwrap_or_default(),
            upgrades_purchased: raw
                .sub_map(ITEMS_UPGRADES_PURCHASED)
                .cloned()
                .unwrap_or_default(),
        };

        Self {
            team_name,
            run_stats,
            players,
            items,
            totals_policy: TotalsPolicy::default(),
        }
    }

    #[must_use]
    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    /// Rename the team. An empty or whitespace-only name is ignored; the
    /// save must never persist a blank team name.
    pub fn set_team_name(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.team_name = name.to_string();
        }
    }

    #[must_use]
    pub fn run_stat(&self, stat: &str) -> Option<i64> {
        self.run_stats.get(stat)?.as_i64()
    }

    pub fn set_run_stat(&mut self, stat: &str, value: i64) {
        self.run_stats.insert(stat.to_string(), Value::from(value));
    }

    fn run_stat_or_default(&self, stat: &str) -> i64 {
        self.run_stat(stat).unwrap_or_else(|| {
            RUN_STAT_DEFAULTS
                .iter()
                .find(|(name, _)| *name == stat)
                .map_or(0, |(_, default)| *default)
        })
    }

    #[must_use]
    pub fn level(&self) -> i64 {
        self.run_stat_or_default("level")
    }

    #[must_use]
    pub fn currency(&self) -> i64 {
        self.run_stat_or_default("currency")
    }

    #[must_use]
    pub fn lives(&self) -> i64 {
        self.run_stat_or_default("lives")
    }

    #[must_use]
    pub fn total_haul(&self) -> i64 {
        self.run_stat_or_default("totalHaul")
    }

    #[must_use]
    pub fn charging_station_charge(&self) -> i64 {
        self.run_stat_or_default("chargingStationCharge")
    }

    #[must_use]
    pub fn save_level(&self) -> i64 {
        self.run_stat_or_default("save level")
    }

    /// All run stats in save order, unknown keys included.
    pub fn run_stats(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.run_stats.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn player(&self, player_id: &str) -> Option<&PlayerRecord> {
        self.players.get(player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut PlayerRecord> {
        self.players.get_mut(player_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.values()
    }

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Add a player with default health and zeroed upgrades. A blank name is
    /// replaced with `Player_` plus the last four characters of the id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capacity`] when the save already holds
    /// [`MAX_PLAYERS`] players and [`Error::DuplicatePlayer`] when the id is
    /// already present.
    pub fn add_player(&mut self, player_id: &str, name: &str) -> Result<&PlayerRecord> {
        if self.players.len() >= MAX_PLAYERS {
            return Err(Error::Capacity { max: MAX_PLAYERS });
        }
        if self.players.contains_key(player_id) {
            return Err(Error::DuplicatePlayer {
                id: player_id.to_string(),
            });
        }

        let name = if name.trim().is_empty() {
            fallback_name(player_id)
        } else {
            name.to_string()
        };
        let record = self
            .players
            .entry(player_id.to_string())
            .or_insert_with(|| PlayerRecord::new(player_id, name));
        Ok(record)
    }

    #[must_use]
    pub fn items(&self) -> &ItemLedger {
        &self.items
    }

    /// Policy governing the cumulative item ledger; defaults to
    /// [`TotalsPolicy::SignedDelta`].
    #[must_use]
    pub fn totals_policy(&self) -> TotalsPolicy {
        self.totals_policy
    }

    pub fn set_totals_policy(&mut self, policy: TotalsPolicy) {
        self.totals_policy = policy;
    }

    /// Set the current count of an already-tracked item, advancing the
    /// cumulative ledger under the active totals policy. Returns `false` for
    /// untracked items.
    pub fn update_item_purchased(&mut self, item: &str, count: i64) -> bool {
        self.items.update_purchased(item, count, self.totals_policy)
    }

    /// Set the level of an already-tracked upgrade item. Returns `false` for
    /// untracked items.
    pub fn update_upgrade_purchased(&mut self, item: &str, count: i64) -> bool {
        self.items.update_upgrade_purchased(item, count)
    }

    /// Write the typed state into `raw`, a working copy of the save this
    /// document was loaded from. Owned entries are replaced; every other key
    /// is left exactly as it was.
    ///
    /// Every player is seeded into the health map, all nine upgrade maps,
    /// and the crown map when the save has one, so no per-player map is ever
    /// missing an id the name map knows about.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] when the save lacks `dictionaryOfDictionaries`,
    /// or lacks `playerNames` while there are players to write. Nothing is
    /// partially written in that case beyond the team name.
    pub fn materialize(&self, raw: &mut RawDocument) -> Result<()> {
        if raw.team_name().is_some() {
            raw.set_team_name(&self.team_name)?;
        }

        if !self.players.is_empty() {
            // Probe before mutating so a schema failure leaves the tree as
            // close to untouched as possible.
            raw.player_names()?;
        }
        let has_crown_map = raw.sub_map(PLAYER_HAS_CROWN).is_some();

        let dicts = raw.dictionaries_mut()?;
        dicts.insert(
            RUN_STATS.to_string(),
            Value::Object(self.run_stats.clone()),
        );

        for player in self.players.values() {
            let health_map = entry_map(dicts, PLAYER_HEALTH);
            health_map.insert(player.player_id.clone(), Value::from(player.health));
            for kind in UpgradeKind::ALL {
                let levels = entry_map(dicts, kind.save_key());
                levels.insert(
                    player.player_id.clone(),
                    Value::from(player.upgrades.level(kind)),
                );
            }
            if has_crown_map {
                entry_map(dicts, PLAYER_HAS_CROWN)
                    .entry(player.player_id.clone())
                    .or_insert(json!(0));
            }
        }

        for (key, ledger) in [
            (ITEMS_PURCHASED, &self.items.purchased),
            (ITEMS_PURCHASED_TOTAL, &self.items.purchased_total),
            (ITEMS_UPGRADES_PURCHASED, &self.items.upgrades_purchased),
        ] {
            if dicts.contains_key(key) || !ledger.is_empty() {
                dicts.insert(key.to_string(), Value::Object(ledger.clone()));
            }
        }

        if !self.players.is_empty() {
            let names = raw.player_names_mut()?;
            for player in self.players.values() {
                names.insert(
                    player.player_id.clone(),
                    Value::String(player.name.clone()),
                );
            }
        }

        Ok(())
    }
}

fn default_run_stats() -> Map<String, Value> {
    let mut stats = Map::new();
    for (name, default) in RUN_STAT_DEFAULTS {
        stats.insert(name.to_string(), Value::from(default));
    }
    stats
}

/// Fetch a named sub-map, creating it as an empty object when absent. Used
/// for the per-player maps, which must all carry every player id.
fn entry_map<'a>(
    dicts: &'a mut Map<String, Value>,
    name: &str,
) -> &'a mut Map<String, Value> {
    let slot = dicts
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}
