// Not every test binary uses every fixture.
#![allow(dead_code)]

use anyhow::{Context, Result};
use oot3drando_game::{EventIdx, GameData, ItemIdx, RegionIdx};
use oot3drando_logic::{LogicState, SettingsContext};
use std::path::Path;

pub fn load_world(text: &str) -> Result<GameData> {
    let data = json::parse(text)?;
    GameData::from_json(&data)
}

pub fn sample_game_data() -> Result<GameData> {
    GameData::load(&Path::new(env!("CARGO_MANIFEST_DIR")).join("../data/sample"))
}

pub fn item(game_data: &GameData, name: &str) -> Result<ItemIdx> {
    game_data
        .item_isv
        .index_by_key
        .get(name)
        .copied()
        .with_context(|| format!("no item {name}"))
}

pub fn region(game_data: &GameData, name: &str) -> Result<RegionIdx> {
    game_data
        .region_isv
        .index_by_key
        .get(name)
        .copied()
        .with_context(|| format!("no region {name}"))
}

pub fn event(game_data: &GameData, name: &str) -> Result<EventIdx> {
    game_data
        .event_isv
        .index_by_key
        .get(name)
        .copied()
        .with_context(|| format!("no event {name}"))
}

/// Logic state holding the named items, with every setting at its default.
pub fn logic_with(game_data: &GameData, items: &[&str]) -> Result<LogicState> {
    let mut logic = LogicState::new(game_data, SettingsContext::default());
    for name in items {
        logic.apply_item(game_data, item(game_data, name)?);
    }
    Ok(logic)
}

/// Six locations behind a sword, two hookshots and bombs. The pool fills it exactly.
pub const CHAIN_WORLD: &str = r#"{
    "world": {"root": "Root", "goal": "Done", "filler": "Rupee",
              "item_pool": {"Sword": 1, "Hookshot": 2, "Bombs": 1, "Heart": 2}},
    "items": [
        {"name": "Rupee", "kind": "Junk", "get_item_id": 1},
        {"name": "Heart", "kind": "Junk", "get_item_id": 2, "counter": "Hearts"},
        {"name": "Sword", "kind": "Equipment", "get_item_id": 3, "advancement": true},
        {"name": "Hookshot", "kind": "Equipment", "get_item_id": 4, "advancement": true,
         "counter": "Hookshots"},
        {"name": "Bombs", "kind": "Equipment", "get_item_id": 5, "advancement": true}
    ],
    "locations": [
        {"name": "L1", "scene": 0, "flag": 1},
        {"name": "L2", "scene": 0, "flag": 2},
        {"name": "L3", "scene": 1, "flag": 1},
        {"name": "L4", "scene": 1, "flag": 2},
        {"name": "L5", "scene": 2, "flag": 1},
        {"name": "L6", "scene": 3, "flag": 1}
    ],
    "dungeons": [],
    "helpers": [
        {"name": "CanLongshot", "requires": {"counter": {"name": "Hookshot", "min": 2}}}
    ],
    "regions": [
        {"name": "Root",
         "locations": [{"location": "L1"}, {"location": "L2"}],
         "exits": [{"to": "Cave", "requires": "Sword"}, {"to": "Cliff", "requires": "Hookshot"}]},
        {"name": "Cave",
         "locations": [{"location": "L3"}, {"location": "L4"}],
         "exits": [{"to": "Root"}, {"to": "Deep", "requires": "CanLongshot"}]},
        {"name": "Cliff",
         "locations": [{"location": "L5", "requires": "Bombs"}],
         "exits": [{"to": "Root"}]},
        {"name": "Deep",
         "events": [{"event": "Done", "requires": "Bombs"}],
         "locations": [{"location": "L6"}],
         "exits": [{"to": "Cave"}]}
    ]
}"#;
