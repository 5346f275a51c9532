//! Per-player typed view: identity, health, and the nine persistent upgrades.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base health before any health upgrades.
pub const BASE_HEALTH: i64 = 100;

/// Extra max health granted per health-upgrade level.
pub const HEALTH_PER_UPGRADE: i64 = 20;

/// The fixed set of per-player upgrades the game persists. Each lives in its
/// own sub-map of `dictionaryOfDictionaries`, keyed by player id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeKind {
    Health,
    Stamina,
    ExtraJump,
    Launch,
    MapPlayerCount,
    Speed,
    Strength,
    Range,
    Throw,
}

impl UpgradeKind {
    pub const ALL: [Self; 9] = [
        Self::Health,
        Self::Stamina,
        Self::ExtraJump,
        Self::Launch,
        Self::MapPlayerCount,
        Self::Speed,
        Self::Strength,
        Self::Range,
        Self::Throw,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Stamina => "stamina",
            Self::ExtraJump => "extraJump",
            Self::Launch => "launch",
            Self::MapPlayerCount => "mapPlayerCount",
            Self::Speed => "speed",
            Self::Strength => "strength",
            Self::Range => "range",
            Self::Throw => "throw",
        }
    }

    /// Name of the sub-map this upgrade is stored under in the save.
    #[must_use]
    pub const fn save_key(self) -> &'static str {
        match self {
            Self::Health => "playerUpgradeHealth",
            Self::Stamina => "playerUpgradeStamina",
            Self::ExtraJump => "playerUpgradeExtraJump",
            Self::Launch => "playerUpgradeLaunch",
            Self::MapPlayerCount => "playerUpgradeMapPlayerCount",
            Self::Speed => "playerUpgradeSpeed",
            Self::Strength => "playerUpgradeStrength",
            Self::Range => "playerUpgradeRange",
            Self::Throw => "playerUpgradeThrow",
        }
    }
}

impl fmt::Display for UpgradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Levels for all nine upgrades, defaulting to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeLevels {
    pub health: i64,
    pub stamina: i64,
    pub extra_jump: i64,
    pub launch: i64,
    pub map_player_count: i64,
    pub speed: i64,
    pub strength: i64,
    pub range: i64,
    pub throw: i64,
}

impl UpgradeLevels {
    #[must_use]
    pub const fn level(&self, kind: UpgradeKind) -> i64 {
        match kind {
            UpgradeKind::Health => self.health,
            UpgradeKind::Stamina => self.stamina,
            UpgradeKind::ExtraJump => self.extra_jump,
            UpgradeKind::Launch => self.launch,
            UpgradeKind::MapPlayerCount => self.map_player_count,
            UpgradeKind::Speed => self.speed,
            UpgradeKind::Strength => self.strength,
            UpgradeKind::Range => self.range,
            UpgradeKind::Throw => self.throw,
        }
    }

    pub const fn set_level(&mut self, kind: UpgradeKind, level: i64) {
        match kind {
            UpgradeKind::Health => self.health = level,
            UpgradeKind::Stamina => self.stamina = level,
            UpgradeKind::ExtraJump => self.extra_jump = level,
            UpgradeKind::Launch => self.launch = level,
            UpgradeKind::MapPlayerCount => self.map_player_count = level,
            UpgradeKind::Speed => self.speed = level,
            UpgradeKind::Strength => self.strength = level,
            UpgradeKind::Range => self.range = level,
            UpgradeKind::Throw => self.throw = level,
        }
    }
}

/// One player's editable state.
///
/// `max_health` is never stored in the save; it is always derived from the
/// health-upgrade level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Opaque stable identifier, in practice a 17-digit account id.
    pub player_id: String,
    pub name: String,
    pub health: i64,
    pub upgrades: UpgradeLevels,
}

impl PlayerRecord {
    #[must_use]
    pub fn new(player_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            name: name.into(),
            health: BASE_HEALTH,
            upgrades: UpgradeLevels::default(),
        }
    }

    /// Derived maximum health: base plus the health-upgrade bonus.
    #[must_use]
    pub const fn max_health(&self) -> i64 {
        BASE_HEALTH + self.upgrades.health * HEALTH_PER_UPGRADE
    }
}

/// Placeholder name for players added without one: `Player_` plus the last
/// four characters of the id.
#[must_use]
pub fn fallback_name(player_id: &str) -> String {
    let tail_start = player_id
        .char_indices()
        .rev()
        .nth(3)
        .map_or(0, |(idx, _)| idx);
    format!("Player_{}", &player_id[tail_start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_health_tracks_health_upgrade() {
        let mut player = PlayerRecord::new("76561198000000001", "Alice");
        assert_eq!(player.max_health(), 100);
        player.upgrades.set_level(UpgradeKind::Health, 3);
        assert_eq!(player.max_health(), 160);
    }

    #[test]
    fn upgrade_kind_round_trips_through_levels() {
        let mut levels = UpgradeLevels::default();
        for (i, kind) in UpgradeKind::ALL.into_iter().enumerate() {
            levels.set_level(kind, i as i64 + 1);
        }
        for (i, kind) in UpgradeKind::ALL.into_iter().enumerate() {
            assert_eq!(levels.level(kind), i as i64 + 1);
        }
    }

    #[test]
    fn fallback_name_uses_id_tail() {
        assert_eq!(fallback_name("76561198000000001"), "Player_0001");
        assert_eq!(fallback_name("abc"), "Player_abc");
    }
}
