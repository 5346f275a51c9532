//! Raw save structure: the ordered key/value tree exactly as it exists in the
//! container, with `{"__type": ..., "value": ...}` tagged top-level entries.
//!
//! The raw tree is the fidelity boundary. Only the handful of entries the
//! typed model understands are ever interpreted; everything else is carried
//! through load → edit → materialize untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::items::STOCK_ITEMS;
use crate::player::UpgradeKind;

pub(crate) const TEAM_NAME: &str = "teamName";
pub(crate) const PLAYER_NAMES: &str = "playerNames";
pub(crate) const DICTIONARIES: &str = "dictionaryOfDictionaries";
pub(crate) const TIME_PLAYED: &str = "timePlayed";
pub(crate) const DATE_AND_TIME: &str = "dateAndTime";

pub(crate) const RUN_STATS: &str = "runStats";
pub(crate) const PLAYER_HEALTH: &str = "playerHealth";
pub(crate) const PLAYER_HAS_CROWN: &str = "playerHasCrown";
pub(crate) const ITEMS_PURCHASED: &str = "itemsPurchased";
pub(crate) const ITEMS_PURCHASED_TOTAL: &str = "itemsPurchasedTotal";
pub(crate) const ITEMS_UPGRADES_PURCHASED: &str = "itemsUpgradesPurchased";

const VALUE: &str = "value";
const TYPE_TAG: &str = "__type";

// ES3 serializes the .NET runtime type of each entry. The strings must be
// reproduced verbatim or the game refuses to load the save.
const ES3_TYPE_STRING: &str = "string";
const ES3_TYPE_FLOAT: &str = "float";
const ES3_TYPE_NAME_MAP: &str = "System.Collections.Generic.Dictionary`2[[System.String, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089],[System.String, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089]],mscorlib";
const ES3_TYPE_DICT_OF_DICTS: &str = "System.Collections.Generic.Dictionary`2[[System.String, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089],[System.Collections.Generic.Dictionary`2[[System.String, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089],[System.Int32, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089]], mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089]],mscorlib";

/// An entire decrypted save, top-level key order preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawDocument(Map<String, Value>);

impl RawDocument {
    /// Parse a decrypted payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] when the payload is not valid UTF-8 JSON
    /// with an object at the root.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        Ok(Self(serde_json::from_slice(payload)?))
    }

    /// Serialize back to the compact JSON the game writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    /// Build the skeleton of a brand-new save: empty player maps, the stock
    /// item catalog zeroed out, and the exact ES3 type tags the game expects.
    #[must_use]
    pub fn new_game(team_name: &str, date: &str) -> Self {
        let mut dicts = Map::new();
        dicts.insert(
            RUN_STATS.to_string(),
            json!({
                "level": 1,
                "currency": 0,
                "lives": 0,
                "chargingStationCharge": 0,
                "totalHaul": 0,
                "save level": 0
            }),
        );
        dicts.insert(PLAYER_HEALTH.to_string(), json!({}));
        for upgrade in UpgradeKind::ALL {
            dicts.insert(upgrade.save_key().to_string(), json!({}));
        }
        dicts.insert(PLAYER_HAS_CROWN.to_string(), json!({}));
        for ledger in [
            ITEMS_PURCHASED,
            ITEMS_PURCHASED_TOTAL,
            ITEMS_UPGRADES_PURCHASED,
            "itemBatteryUpgrades",
            "item",
            "itemStatBattery",
        ] {
            let mut zeroed = Map::new();
            for item in STOCK_ITEMS {
                zeroed.insert(item.to_string(), json!(0));
            }
            dicts.insert(ledger.to_string(), Value::Object(zeroed));
        }

        let mut root = Map::new();
        root.insert(
            DICTIONARIES.to_string(),
            tagged_entry(ES3_TYPE_DICT_OF_DICTS, Value::Object(dicts)),
        );
        root.insert(
            PLAYER_NAMES.to_string(),
            tagged_entry(ES3_TYPE_NAME_MAP, json!({})),
        );
        root.insert(
            TIME_PLAYED.to_string(),
            tagged_entry(ES3_TYPE_FLOAT, json!(0.0)),
        );
        root.insert(
            DATE_AND_TIME.to_string(),
            tagged_entry(ES3_TYPE_STRING, Value::String(date.to_string())),
        );
        root.insert(
            TEAM_NAME.to_string(),
            tagged_entry(ES3_TYPE_STRING, Value::String(team_name.to_string())),
        );
        Self(root)
    }

    fn tagged(&self, key: &str) -> Option<&Value> {
        self.0.get(key)?.get(VALUE)
    }

    fn tagged_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)?.get_mut(VALUE)
    }

    #[must_use]
    pub fn team_name(&self) -> Option<&str> {
        self.tagged(TEAM_NAME)?.as_str()
    }

    /// Overwrite the team name inside its tagged entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] when the save has no `teamName` entry.
    pub fn set_team_name(&mut self, name: &str) -> Result<()> {
        let slot = self
            .tagged_mut(TEAM_NAME)
            .ok_or(Error::Schema { key: TEAM_NAME })?;
        *slot = Value::String(name.to_string());
        Ok(())
    }

    #[must_use]
    pub fn time_played(&self) -> Option<f64> {
        self.tagged(TIME_PLAYED)?.as_f64()
    }

    #[must_use]
    pub fn date_and_time(&self) -> Option<&str> {
        self.tagged(DATE_AND_TIME)?.as_str()
    }

    pub(crate) fn player_names(&self) -> Result<&Map<String, Value>> {
        self.tagged(PLAYER_NAMES)
            .and_then(Value::as_object)
            .ok_or(Error::Schema { key: PLAYER_NAMES })
    }

    pub(crate) fn player_names_mut(&mut self) -> Result<&mut Map<String, Value>> {
        self.tagged_mut(PLAYER_NAMES)
            .and_then(Value::as_object_mut)
            .ok_or(Error::Schema { key: PLAYER_NAMES })
    }

    pub(crate) fn dictionaries(&self) -> Result<&Map<String, Value>> {
        self.tagged(DICTIONARIES)
            .and_then(Value::as_object)
            .ok_or(Error::Schema { key: DICTIONARIES })
    }

    pub(crate) fn dictionaries_mut(&mut self) -> Result<&mut Map<String, Value>> {
        self.tagged_mut(DICTIONARIES)
            .and_then(Value::as_object_mut)
            .ok_or(Error::Schema { key: DICTIONARIES })
    }

    /// A named sub-map of `dictionaryOfDictionaries`, if both exist.
    pub(crate) fn sub_map(&self, name: &str) -> Option<&Map<String, Value>> {
        self.dictionaries().ok()?.get(name)?.as_object()
    }

    pub(crate) fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn tagged_entry(type_tag: &str, value: Value) -> Value {
    let mut entry = Map::new();
    entry.insert(TYPE_TAG.to_string(), Value::String(type_tag.to_string()));
    entry.insert(VALUE.to_string(), value);
    Value::Object(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_entries() {
        let raw = RawDocument::from_slice(
            br#"{"teamName":{"__type":"string","value":"Night Shift"},"timePlayed":{"__type":"float","value":12.5}}"#,
        )
        .unwrap();
        assert_eq!(raw.team_name(), Some("Night Shift"));
        assert_eq!(raw.time_played(), Some(12.5));
        assert_eq!(raw.date_and_time(), None);
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert!(matches!(
            RawDocument::from_slice(b"[1,2,3]"),
            Err(Error::Encoding(_))
        ));
        assert!(matches!(
            RawDocument::from_slice(b"\xff\xfe"),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn round_trip_preserves_key_order() {
        let payload = br#"{"zeta":{"__type":"string","value":"z"},"alpha":{"__type":"string","value":"a"}}"#;
        let raw = RawDocument::from_slice(payload).unwrap();
        assert_eq!(raw.to_bytes().unwrap(), payload.to_vec());
    }

    #[test]
    fn new_game_has_every_stock_item_zeroed() {
        let raw = RawDocument::new_game("Night Shift", "2025-03-01");
        assert_eq!(raw.team_name(), Some("Night Shift"));
        assert_eq!(raw.date_and_time(), Some("2025-03-01"));
        let purchased = raw.sub_map(ITEMS_PURCHASED).unwrap();
        assert_eq!(purchased.len(), STOCK_ITEMS.len());
        assert!(purchased.values().all(|v| v.as_i64() == Some(0)));
        assert!(raw.player_names().unwrap().is_empty());
    }

    #[test]
    fn set_team_name_requires_the_entry() {
        let mut raw = RawDocument::from_slice(b"{}").unwrap();
        assert!(matches!(
            raw.set_team_name("Night Shift"),
            Err(Error::Schema { key: TEAM_NAME })
        ));
    }
}
