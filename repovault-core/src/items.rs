//! Item ledgers and the totals-accounting policy.
//!
//! The save tracks three parallel ledgers keyed by item name: the current
//! count, the cumulative count, and the level for items that are upgrades.
//! Only already-tracked items can be edited; the set of tracked items is the
//! game's to decide.

use serde_json::{Map, Value};

// Stock item catalog used when creating a save from scratch.
pub const STOCK_ITEMS: [&str; 39] = [
    "Item Cart Medium",
    "Item Cart Small",
    "Item Drone Battery",
    "Item Drone Feather",
    "Item Drone Indestructible",
    "Item Drone Torque",
    "Item Drone Zero Gravity",
    "Item Extraction Tracker",
    "Item Grenade Duct Taped",
    "Item Grenade Explosive",
    "Item Grenade Human",
    "Item Grenade Shockwave",
    "Item Grenade Stun",
    "Item Gun Handgun",
    "Item Gun Shotgun",
    "Item Gun Tranq",
    "Item Health Pack Large",
    "Item Health Pack Medium",
    "Item Health Pack Small",
    "Item Melee Baseball Bat",
    "Item Melee Frying Pan",
    "Item Melee Inflatable Hammer",
    "Item Melee Sledge Hammer",
    "Item Melee Sword",
    "Item Mine Explosive",
    "Item Mine Shockwave",
    "Item Mine Stun",
    "Item Orb Zero Gravity",
    "Item Power Crystal",
    "Item Rubber Duck",
    "Item Upgrade Map Player Count",
    "Item Upgrade Player Energy",
    "Item Upgrade Player Extra Jump",
    "Item Upgrade Player Grab Range",
    "Item Upgrade Player Grab Strength",
    "Item Upgrade Player Health",
    "Item Upgrade Player Sprint Speed",
    "Item Upgrade Player Tumble Launch",
    "Item Valuable Tracker",
];

/// How the cumulative ledger reacts when the current count changes.
///
/// The game's own accounting is unclear on downward edits, so the rule is a
/// named policy instead of inline arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TotalsPolicy {
    /// Advance the total by the signed delta. Lowering the count lowers the
    /// total too. This is what the game-facing tooling has always done.
    #[default]
    SignedDelta,
    /// Advance by the signed delta but never below the new current count.
    ClampAtFloor,
    /// Advance only on increases; downward edits leave the total alone.
    IgnoreDecrease,
}

impl TotalsPolicy {
    /// Compute the new cumulative total. `previous_total` is `None` when the
    /// item was not tracked in the cumulative ledger, in which case every
    /// policy adopts the new count outright.
    #[must_use]
    pub fn advance(self, previous_total: Option<i64>, old_count: i64, new_count: i64) -> i64 {
        let Some(total) = previous_total else {
            return new_count;
        };
        let delta = new_count - old_count;
        match self {
            Self::SignedDelta => total + delta,
            Self::ClampAtFloor => (total + delta).max(new_count),
            Self::IgnoreDecrease => total + delta.max(0),
        }
    }
}

/// The three item ledgers, in save order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemLedger {
    pub(crate) purchased: Map<String, Value>,
    pub(crate) purchased_total: Map<String, Value>,
    pub(crate) upgrades_purchased: Map<String, Value>,
}

impl ItemLedger {
    #[must_use]
    pub fn purchased(&self, item: &str) -> Option<i64> {
        self.purchased.get(item)?.as_i64()
    }

    #[must_use]
    pub fn purchased_total(&self, item: &str) -> Option<i64> {
        self.purchased_total.get(item)?.as_i64()
    }

    #[must_use]
    pub fn upgrade_purchased(&self, item: &str) -> Option<i64> {
        self.upgrades_purchased.get(item)?.as_i64()
    }

    /// Iterate tracked items with their current and cumulative counts.
    pub fn iter_purchased(&self) -> impl Iterator<Item = (&str, i64, Option<i64>)> {
        self.purchased.iter().map(|(name, count)| {
            (
                name.as_str(),
                count.as_i64().unwrap_or_default(),
                self.purchased_total(name),
            )
        })
    }

    /// Set the current count of an already-tracked item and advance the
    /// cumulative ledger under `policy`. Returns `false` when the item is not
    /// tracked; untracked items are never created here.
    pub fn update_purchased(&mut self, item: &str, count: i64, policy: TotalsPolicy) -> bool {
        let Some(old_count) = self.purchased(item) else {
            return false;
        };
        self.purchased
            .insert(item.to_string(), Value::from(count));
        let total = policy.advance(self.purchased_total(item), old_count, count);
        self.purchased_total
            .insert(item.to_string(), Value::from(total));
        true
    }

    /// Set the level of an already-tracked upgrade item. No delta logic.
    /// Returns `false` when the item is not tracked.
    pub fn update_upgrade_purchased(&mut self, item: &str, count: i64) -> bool {
        if !self.upgrades_purchased.contains_key(item) {
            return false;
        }
        self.upgrades_purchased
            .insert(item.to_string(), Value::from(count));
        true
    }
}
