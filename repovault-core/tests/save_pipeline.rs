//! End-to-end pipeline coverage: container on disk → typed edits → write →
//! reopen, with fidelity checks on everything the model does not own.

use repovault_core::{
    DEFAULT_PASSWORD, GameSaveDocument, RawDocument, SaveFile, SaveOptions, UpgradeKind, decrypt,
    diff_documents, encrypt, structural_diff, write_container,
};
use serde_json::{Value, json};
use tempfile::tempdir;

const ALICE: &str = "76561198000000001";

fn empty_save_raw() -> RawDocument {
    RawDocument::from_slice(
        br#"{
            "dictionaryOfDictionaries": {"__type": "t", "value": {
                "runStats": {"level": 1, "currency": 0, "lives": 3,
                             "chargingStationCharge": 0, "totalHaul": 0, "save level": 0},
                "playerHealth": {},
                "playerUpgradeHealth": {},
                "playerUpgradeStamina": {},
                "playerUpgradeExtraJump": {},
                "playerUpgradeLaunch": {},
                "playerUpgradeMapPlayerCount": {},
                "playerUpgradeSpeed": {},
                "playerUpgradeStrength": {},
                "playerUpgradeRange": {},
                "playerUpgradeThrow": {},
                "itemsPurchased": {"Item Rubber Duck": 2},
                "itemsPurchasedTotal": {"Item Rubber Duck": 5},
                "itemsUpgradesPurchased": {"Item Upgrade Player Health": 0},
                "itemBatteryUpgrades": {"Item Gun Handgun": 3}
            }},
            "playerNames": {"__type": "t", "value": {}},
            "teamName": {"__type": "string", "value": "Night Shift"}
        }"#,
    )
    .unwrap()
}

#[test]
fn codec_round_trips_any_payload_shape() {
    for compress in [false, true] {
        for payload in [&b"x"[..], &[0u8; 4096][..], br#"{"k":"v"}"#] {
            let container = encrypt(payload, DEFAULT_PASSWORD, compress).unwrap();
            assert_eq!(decrypt(&container, DEFAULT_PASSWORD).unwrap(), payload);
        }
    }
}

#[test]
fn add_player_to_empty_save_seeds_all_maps() {
    let mut raw = empty_save_raw();
    let mut document = GameSaveDocument::load(&raw);
    document.add_player(ALICE, "Alice").unwrap();
    document.materialize(&mut raw).unwrap();

    let names = raw.as_value_at(&["playerNames", "value"]);
    assert_eq!(names, json!({"76561198000000001": "Alice"}));
    let health = raw.as_value_at(&["dictionaryOfDictionaries", "value", "playerHealth"]);
    assert_eq!(health, json!({"76561198000000001": 100}));
    for kind in UpgradeKind::ALL {
        let levels = raw.as_value_at(&["dictionaryOfDictionaries", "value", kind.save_key()]);
        assert_eq!(levels, json!({"76561198000000001": 0}), "bad default in {kind}");
    }
}

#[test]
fn rubber_duck_totals_follow_the_signed_delta() {
    let raw = empty_save_raw();
    let mut document = GameSaveDocument::load(&raw);
    assert!(document.update_item_purchased("Item Rubber Duck", 5));
    assert_eq!(document.items().purchased("Item Rubber Duck"), Some(5));
    assert_eq!(document.items().purchased_total("Item Rubber Duck"), Some(8));
}

#[test]
fn full_pipeline_preserves_unmodeled_bytes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("REPO_SAVE_2025_03_01_10_00_00.Es3");
    write_container(&path, &empty_save_raw(), DEFAULT_PASSWORD, false).unwrap();

    let mut save = SaveFile::open(&path, DEFAULT_PASSWORD).unwrap();
    save.document_mut().add_player(ALICE, "Alice").unwrap();
    save.document_mut().set_run_stat("currency", 12_000);
    let report = save.save(&SaveOptions::default()).unwrap();
    assert_eq!(report.verified, Some(true));
    assert!(!report.changes.is_empty());

    let reopened = SaveFile::open(&path, DEFAULT_PASSWORD).unwrap();
    assert_eq!(reopened.document().team_name(), "Night Shift");
    assert_eq!(reopened.document().currency(), 12_000);
    let alice = reopened.document().player(ALICE).unwrap();
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.health, 100);

    // The battery ledger is not modeled; it must come back identical.
    assert_eq!(
        reopened
            .raw()
            .as_value_at(&["dictionaryOfDictionaries", "value", "itemBatteryUpgrades"]),
        json!({"Item Gun Handgun": 3})
    );
}

#[test]
fn compressed_saves_read_back_identically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("REPO_SAVE_2025_03_01_10_00_00.Es3");
    write_container(&path, &empty_save_raw(), DEFAULT_PASSWORD, true).unwrap();

    let save = SaveFile::open(&path, DEFAULT_PASSWORD).unwrap();
    assert_eq!(save.raw(), &empty_save_raw());
}

#[test]
fn diff_between_two_saves_pinpoints_the_edit() {
    let raw = empty_save_raw();
    let mut edited = raw.clone();
    let mut document = GameSaveDocument::load(&edited);
    document.update_item_purchased("Item Rubber Duck", 5);
    document.materialize(&mut edited).unwrap();

    let entries = diff_documents(&raw, &edited);
    let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(
        &"dictionaryOfDictionaries.value.itemsPurchased.Item Rubber Duck"
    ));
    assert!(paths.contains(
        &"dictionaryOfDictionaries.value.itemsPurchasedTotal.Item Rubber Duck"
    ));
    assert_eq!(entries.len(), 2);
}

#[test]
fn diff_of_identical_trees_is_empty() {
    let value: Value = serde_json::to_value(empty_save_raw()).unwrap();
    assert!(structural_diff(&value, &value).is_empty());
}

trait ValueAt {
    fn as_value_at(&self, path: &[&str]) -> Value;
}

impl ValueAt for RawDocument {
    fn as_value_at(&self, path: &[&str]) -> Value {
        let mut value = serde_json::to_value(self).unwrap();
        for key in path {
            value = value
                .get_mut(key)
                .unwrap_or_else(|| panic!("missing {key}"))
                .take();
        }
        value
    }
}
