pub mod requirement;

pub use crate::requirement::{CountMin, Requirement};

use anyhow::{bail, ensure, Context, Result};
use hashbrown::{HashMap, HashSet};
use json::JsonValue;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::borrow::ToOwned;
use std::fs::File;
use std::hash::Hash;
use std::path::Path;
use std::str::FromStr;
use strum_macros::{EnumString, VariantNames};

pub type ItemIdx = usize; // Index into GameData.item_isv.keys: distinct item names from items.json
pub type FlagIdx = usize; // Index into GameData.flag_isv.keys: boolean item effects
pub type CounterIdx = usize; // Index into GameData.counter_isv.keys: bounded (u8) item effects
pub type EventIdx = usize; // Index into GameData.event_isv.keys: events set by region event edges
pub type HelperIdx = usize; // Index into GameData.helper_isv.keys: named derived predicates
pub type SettingIdx = usize; // Index into GameData.setting_isv.keys: setting names referenced by logic
pub type LocationIdx = usize; // Index into GameData.locations
pub type RegionIdx = usize; // Index into GameData.regions
pub type DungeonIdx = usize; // Index into GameData.dungeons
pub type SceneId = u8; // Scene number used as the first half of the item override key
pub type GetItemId = u16; // Get-item ID written into the item override table
pub type Price = u16;

#[derive(Default, Clone, Debug)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumString, VariantNames, Serialize, Deserialize,
)]
pub enum ItemKind {
    Equipment,
    Song,
    Map,
    Compass,
    SmallKey,
    BossKey,
    Token,
    DungeonReward,
    Refill,
    Shop,
    Junk,
}

impl ItemKind {
    pub fn is_junk(self) -> bool {
        matches!(self, ItemKind::Junk | ItemKind::Refill)
    }
}

/// What collecting an item changes in the logic state. An item targets exactly
/// one flag or one counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ItemEffect {
    Flag(FlagIdx),
    Counter(CounterIdx),
}

#[derive(Clone, Debug)]
pub struct Item {
    pub name: String,
    pub kind: ItemKind,
    pub get_item_id: GetItemId,
    pub advancement: bool,
    pub effect: ItemEffect,
    // Default price of shop variants when no location price applies.
    pub price: Option<Price>,
    // Extra condition for buying this item when it sits in a priced slot (e.g. a bottle for potions).
    pub buy_requires: Requirement,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumString, VariantNames, Serialize, Deserialize,
)]
pub enum Category {
    VanillaMap,
    VanillaCompass,
    VanillaSmallKey,
    VanillaBossKey,
    VanillaGerudoKey,
    DungeonReward,
    Song,
    Shop,
    Skulltula,
    Cow,
    DekuScrub,
    KokiriSword,
    Ocarina,
    WeirdEgg,
    GerudoToken,
    MagicBean,
}

#[derive(Clone, Debug)]
pub struct ItemLocation {
    pub name: String,
    pub scene: SceneId,
    pub flag: u8,
    pub categories: Vec<Category>,
    pub vanilla_item: Option<ItemIdx>,
    pub price: Option<Price>,
}

impl ItemLocation {
    pub fn has_category(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumString, VariantNames, Serialize, Deserialize,
)]
pub enum TimeOfDay {
    Day,
    Night,
    Both,
}

#[derive(Clone, Debug)]
pub struct EventEdge {
    pub event: EventIdx,
    pub requires: Requirement,
}

#[derive(Clone, Debug)]
pub struct LocationEdge {
    pub location: LocationIdx,
    pub requires: Requirement,
}

#[derive(Clone, Debug)]
pub struct RegionEdge {
    pub to: RegionIdx,
    pub requires: Requirement,
    pub time: TimeOfDay,
    // Crossing this edge travels through time: child bits land on adult bits and vice versa.
    pub age_switch: bool,
}

#[derive(Clone, Debug)]
pub struct Region {
    pub name: String,
    pub scene: Option<SceneId>,
    pub time_passes: bool,
    pub events: Vec<EventEdge>,
    pub locations: Vec<LocationEdge>,
    pub exits: Vec<RegionEdge>,
}

#[derive(Clone, Debug)]
pub struct DungeonInfo {
    pub name: String,
    pub map: Option<ItemIdx>,
    pub compass: Option<ItemIdx>,
    pub small_key: Option<ItemIdx>,
    pub boss_key: Option<ItemIdx>,
    pub vanilla_key_count: u8,
    pub mq_key_count: u8,
    pub vanilla_locations: Vec<LocationIdx>,
    pub mq_locations: Vec<LocationIdx>,
    pub shared_locations: Vec<LocationIdx>,
}

impl DungeonInfo {
    /// Locations that exist in the selected layout: the variant's own locations
    /// plus those shared by both layouts, in index order.
    pub fn get_dungeon_locations(&self, mq: bool) -> Vec<LocationIdx> {
        let variant = if mq {
            &self.mq_locations
        } else {
            &self.vanilla_locations
        };
        let mut out: Vec<LocationIdx> = variant
            .iter()
            .chain(self.shared_locations.iter())
            .copied()
            .collect();
        out.sort();
        out
    }

    pub fn get_every_location(&self) -> Vec<LocationIdx> {
        let mut out: Vec<LocationIdx> = self
            .vanilla_locations
            .iter()
            .chain(self.mq_locations.iter())
            .chain(self.shared_locations.iter())
            .copied()
            .collect();
        out.sort();
        out
    }

    pub fn key_count(&self, mq: bool) -> u8 {
        if mq {
            self.mq_key_count
        } else {
            self.vanilla_key_count
        }
    }

    /// Slots in the selected layout tagged with the given category.
    pub fn vanilla_slots(
        &self,
        game_data: &GameData,
        mq: bool,
        category: Category,
    ) -> Vec<LocationIdx> {
        self.get_dungeon_locations(mq)
            .into_iter()
            .filter(|&loc| game_data.locations[loc].has_category(category))
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct Wallet {
    pub counter: CounterIdx,
    // Capacity by number of wallet upgrades held; the last entry covers any higher count.
    pub capacities: Vec<Price>,
}

impl Wallet {
    pub fn capacity(&self, upgrades: u8) -> Price {
        let idx = std::cmp::min(upgrades as usize, self.capacities.len() - 1);
        self.capacities[idx]
    }

    pub fn max_capacity(&self) -> Price {
        self.capacities.iter().copied().max().unwrap_or(0)
    }
}

/// Junk item that can pose as another item, and the get-item IDs it may show.
#[derive(Clone, Debug)]
pub struct IceTrap {
    pub item: ItemIdx,
    pub disguises: Vec<GetItemId>,
}

/// Keys opening the fortress cells, placed outside the regular item pool.
#[derive(Clone, Debug)]
pub struct FortressKeys {
    pub item: ItemIdx,
    pub count: u8,
}

#[derive(Default, Clone, Debug)]
pub struct GameData {
    pub item_isv: IndexedVec<String>,
    pub items: Vec<Item>,
    pub flag_isv: IndexedVec<String>,
    pub counter_isv: IndexedVec<String>,
    pub event_isv: IndexedVec<String>,
    pub helper_isv: IndexedVec<String>,
    pub helpers: Vec<Requirement>,
    pub setting_isv: IndexedVec<String>,
    pub location_isv: IndexedVec<String>,
    pub locations: Vec<ItemLocation>,
    pub location_dungeon: Vec<Option<DungeonIdx>>,
    pub region_isv: IndexedVec<String>,
    pub regions: Vec<Region>,
    pub dungeon_isv: IndexedVec<String>,
    pub dungeons: Vec<DungeonInfo>,
    pub root_region: RegionIdx,
    pub goal_event: EventIdx,
    pub wallet: Option<Wallet>,
    pub filler_item: ItemIdx,
    pub item_pool: Vec<(ItemIdx, usize)>,
    // Pool count overrides keyed by pool value name (e.g. "Plentiful", "Scarce").
    pub item_pool_values: HashMap<String, Vec<(ItemIdx, usize)>>,
    pub ice_trap: Option<IceTrap>,
    pub gerudo_keys: Option<FortressKeys>,
    pub links_pocket: Option<LocationIdx>,
    pub ganons_dungeon: Option<DungeonIdx>,
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
    let json_str = std::io::read_to_string(file)
        .with_context(|| format!("unable to read {}", path.display()))?;
    let json_data =
        json::parse(&json_str).with_context(|| format!("unable to parse {}", path.display()))?;
    Ok(json_data)
}

fn get_str<'a>(value: &'a JsonValue, key: &str) -> Result<&'a str> {
    value[key]
        .as_str()
        .with_context(|| format!("missing/invalid string '{key}' in {value}"))
}

fn get_bool_or(value: &JsonValue, key: &str, default: bool) -> Result<bool> {
    if value[key].is_null() {
        return Ok(default);
    }
    value[key]
        .as_bool()
        .with_context(|| format!("invalid bool '{key}' in {value}"))
}

impl GameData {
    /// Loads the catalog from a directory holding world.json, items.json,
    /// locations.json, dungeons.json, helpers.json and regions.json.
    pub fn load(base_path: &Path) -> Result<GameData> {
        let mut data = JsonValue::new_object();
        for name in [
            "world",
            "items",
            "locations",
            "dungeons",
            "helpers",
            "regions",
        ] {
            let path = base_path.join(format!("{name}.json"));
            data[name] = read_json(&path)?;
        }
        let game_data = Self::from_json(&data)
            .with_context(|| format!("unable to load game data from {}", base_path.display()))?;
        info!(
            "Loaded {} items, {} locations, {} regions, {} dungeons",
            game_data.items.len(),
            game_data.locations.len(),
            game_data.regions.len(),
            game_data.dungeons.len()
        );
        Ok(game_data)
    }

    pub fn from_json(data: &JsonValue) -> Result<GameData> {
        let mut game_data = GameData::default();
        game_data
            .load_items(&data["items"])
            .context("Unable to load items")?;
        game_data
            .load_locations(&data["locations"])
            .context("Unable to load locations")?;
        game_data
            .load_dungeons(&data["dungeons"])
            .context("Unable to load dungeons")?;
        for region_json in data["regions"].members() {
            game_data.region_isv.add(get_str(region_json, "name")?);
        }
        game_data
            .load_helpers(&data["helpers"])
            .context("Unable to load helpers")?;
        game_data
            .load_buy_requirements(&data["items"])
            .context("Unable to load item purchase requirements")?;
        game_data
            .load_regions(&data["regions"])
            .context("Unable to load regions")?;
        game_data
            .load_world(&data["world"])
            .context("Unable to load world")?;
        game_data.validate_events()?;
        Ok(game_data)
    }

    fn load_items(&mut self, items_json: &JsonValue) -> Result<()> {
        ensure!(items_json.is_array(), "items must be an array");
        for item_json in items_json.members() {
            let name = get_str(item_json, "name")?;
            ensure!(
                !self.item_isv.index_by_key.contains_key(name),
                "duplicate item {name}"
            );
            let kind_str = get_str(item_json, "kind")?;
            let kind = ItemKind::from_str(kind_str)
                .with_context(|| format!("unrecognized item kind {kind_str} for {name}"))?;
            let get_item_id = item_json["get_item_id"]
                .as_u16()
                .with_context(|| format!("missing/invalid get_item_id for {name}"))?;
            let effect = match (item_json["flag"].as_str(), item_json["counter"].as_str()) {
                (Some(_), Some(_)) => bail!("item {name} has both a flag and a counter effect"),
                (None, Some(counter)) => ItemEffect::Counter(self.counter_isv.add(counter)),
                (Some(flag), None) => ItemEffect::Flag(self.flag_isv.add(flag)),
                (None, None) => ItemEffect::Flag(self.flag_isv.add(name)),
            };
            self.item_isv.add(name);
            self.items.push(Item {
                name: name.to_string(),
                kind,
                get_item_id,
                advancement: get_bool_or(item_json, "advancement", false)?,
                effect,
                price: item_json["price"].as_u16(),
                buy_requires: Requirement::Free,
            });
        }
        Ok(())
    }

    fn get_item_idx(&self, name: &str) -> Result<ItemIdx> {
        self.item_isv
            .index_by_key
            .get(name)
            .copied()
            .with_context(|| format!("unknown item {name}"))
    }

    fn get_optional_item(&self, value: &JsonValue) -> Result<Option<ItemIdx>> {
        if value.is_null() {
            return Ok(None);
        }
        let name = value
            .as_str()
            .with_context(|| format!("invalid item reference {value}"))?;
        Ok(Some(self.get_item_idx(name)?))
    }

    pub fn get_location_idx(&self, name: &str) -> Result<LocationIdx> {
        self.location_isv
            .index_by_key
            .get(name)
            .copied()
            .with_context(|| format!("unknown location {name}"))
    }

    fn load_locations(&mut self, locations_json: &JsonValue) -> Result<()> {
        ensure!(locations_json.is_array(), "locations must be an array");
        let mut override_keys: HashSet<(SceneId, u8)> = HashSet::new();
        for loc_json in locations_json.members() {
            let name = get_str(loc_json, "name")?;
            ensure!(
                !self.location_isv.index_by_key.contains_key(name),
                "duplicate location {name}"
            );
            let scene = loc_json["scene"]
                .as_u8()
                .with_context(|| format!("missing/invalid scene for {name}"))?;
            let flag = loc_json["flag"]
                .as_u8()
                .with_context(|| format!("missing/invalid flag for {name}"))?;
            ensure!(
                override_keys.insert((scene, flag)),
                "location {name} reuses override key ({scene}, {flag})"
            );
            let mut categories = vec![];
            for cat_json in loc_json["categories"].members() {
                let cat_str = cat_json
                    .as_str()
                    .with_context(|| format!("invalid category in {name}"))?;
                categories.push(
                    Category::from_str(cat_str)
                        .with_context(|| format!("unrecognized category {cat_str} in {name}"))?,
                );
            }
            let vanilla_item = self.get_optional_item(&loc_json["vanilla_item"])?;
            self.location_isv.add(name);
            self.locations.push(ItemLocation {
                name: name.to_string(),
                scene,
                flag,
                categories,
                vanilla_item,
                price: loc_json["price"].as_u16(),
            });
        }
        self.location_dungeon = vec![None; self.locations.len()];
        Ok(())
    }

    fn load_location_list(&self, list_json: &JsonValue) -> Result<Vec<LocationIdx>> {
        let mut out = vec![];
        for loc_json in list_json.members() {
            let name = loc_json
                .as_str()
                .with_context(|| format!("invalid location reference {loc_json}"))?;
            out.push(self.get_location_idx(name)?);
        }
        Ok(out)
    }

    fn load_dungeons(&mut self, dungeons_json: &JsonValue) -> Result<()> {
        for dungeon_json in dungeons_json.members() {
            let name = get_str(dungeon_json, "name")?;
            let dungeon_idx = self.dungeon_isv.add(name);
            ensure!(dungeon_idx == self.dungeons.len(), "duplicate dungeon {name}");
            let dungeon = DungeonInfo {
                name: name.to_string(),
                map: self.get_optional_item(&dungeon_json["map"])?,
                compass: self.get_optional_item(&dungeon_json["compass"])?,
                small_key: self.get_optional_item(&dungeon_json["small_key"])?,
                boss_key: self.get_optional_item(&dungeon_json["boss_key"])?,
                vanilla_key_count: dungeon_json["vanilla_key_count"].as_u8().unwrap_or(0),
                mq_key_count: dungeon_json["mq_key_count"].as_u8().unwrap_or(0),
                vanilla_locations: self.load_location_list(&dungeon_json["vanilla_locations"])?,
                mq_locations: self.load_location_list(&dungeon_json["mq_locations"])?,
                shared_locations: self.load_location_list(&dungeon_json["shared_locations"])?,
            };
            for loc in dungeon.get_every_location() {
                if let Some(other) = self.location_dungeon[loc] {
                    bail!(
                        "location {} is listed more than once (dungeons {} and {name})",
                        self.locations[loc].name,
                        self.dungeons
                            .get(other)
                            .map(|d| d.name.as_str())
                            .unwrap_or(name)
                    );
                }
                self.location_dungeon[loc] = Some(dungeon_idx);
            }
            self.dungeons.push(dungeon);
        }
        Ok(())
    }

    fn load_helpers(&mut self, helpers_json: &JsonValue) -> Result<()> {
        for helper_json in helpers_json.members() {
            let name = get_str(helper_json, "name")?;
            ensure!(
                !self.helper_isv.index_by_key.contains_key(name),
                "duplicate helper {name}"
            );
            let req = self
                .parse_requirement(&helper_json["requires"], None)
                .with_context(|| format!("parsing helper {name}"))?;
            // Helpers are cached from item state alone, so they cannot look at traversal state.
            ensure!(
                !req.uses_traversal_state(),
                "helper {name} references an event or region"
            );
            self.helper_isv.add(name);
            self.helpers.push(req);
        }
        Ok(())
    }

    fn load_buy_requirements(&mut self, items_json: &JsonValue) -> Result<()> {
        for (idx, item_json) in items_json.members().enumerate() {
            if item_json["buy_requires"].is_null() {
                continue;
            }
            let req = self
                .parse_requirement(&item_json["buy_requires"], None)
                .with_context(|| format!("parsing buy_requires of {}", self.items[idx].name))?;
            ensure!(
                !req.uses_traversal_state(),
                "buy_requires of {} references an event or region",
                self.items[idx].name
            );
            self.items[idx].buy_requires = req;
        }
        Ok(())
    }

    fn load_regions(&mut self, regions_json: &JsonValue) -> Result<()> {
        for region_json in regions_json.members() {
            let name = get_str(region_json, "name")?;
            ensure!(
                self.regions.len() == self.region_isv.index_by_key[name],
                "duplicate region {name}"
            );
            let region_idx = self.regions.len();
            let mut events = vec![];
            for event_json in region_json["events"].members() {
                let event = self.event_isv.add(get_str(event_json, "event")?);
                let requires = self
                    .parse_requirement(&event_json["requires"], Some(region_idx))
                    .with_context(|| format!("parsing event edge in {name}"))?;
                events.push(EventEdge { event, requires });
            }
            let mut locations = vec![];
            for loc_json in region_json["locations"].members() {
                let location = self.get_location_idx(get_str(loc_json, "location")?)?;
                let requires = self
                    .parse_requirement(&loc_json["requires"], Some(region_idx))
                    .with_context(|| format!("parsing location edge in {name}"))?;
                locations.push(LocationEdge { location, requires });
            }
            let mut exits = vec![];
            for exit_json in region_json["exits"].members() {
                let to_name = get_str(exit_json, "to")?;
                let to = *self
                    .region_isv
                    .index_by_key
                    .get(to_name)
                    .with_context(|| format!("unknown region {to_name} in exits of {name}"))?;
                let requires = self
                    .parse_requirement(&exit_json["requires"], Some(region_idx))
                    .with_context(|| format!("parsing exit {name} -> {to_name}"))?;
                let time = match exit_json["time"].as_str() {
                    None => TimeOfDay::Both,
                    Some(s) => TimeOfDay::from_str(s)
                        .with_context(|| format!("unrecognized time {s} in exit {name}"))?,
                };
                exits.push(RegionEdge {
                    to,
                    requires,
                    time,
                    age_switch: get_bool_or(exit_json, "age_switch", false)?,
                });
            }
            self.regions.push(Region {
                name: name.to_string(),
                scene: region_json["scene"].as_u8(),
                time_passes: get_bool_or(region_json, "time_passes", false)?,
                events,
                locations,
                exits,
            });
        }
        Ok(())
    }

    fn load_world(&mut self, world_json: &JsonValue) -> Result<()> {
        let root = get_str(world_json, "root")?;
        self.root_region = *self
            .region_isv
            .index_by_key
            .get(root)
            .with_context(|| format!("unknown root region {root}"))?;
        let goal = get_str(world_json, "goal")?;
        self.goal_event = *self
            .event_isv
            .index_by_key
            .get(goal)
            .with_context(|| format!("goal event {goal} is never set by any region"))?;
        self.filler_item = self.get_item_idx(get_str(world_json, "filler")?)?;
        if !world_json["wallet"].is_null() {
            let wallet_json = &world_json["wallet"];
            let item = self.get_item_idx(get_str(wallet_json, "item")?)?;
            let ItemEffect::Counter(counter) = self.items[item].effect else {
                bail!("wallet item {} must use a counter effect", self.items[item].name);
            };
            let mut capacities = vec![];
            for cap in wallet_json["capacities"].members() {
                capacities.push(
                    cap.as_u16()
                        .with_context(|| format!("invalid wallet capacity {cap}"))?,
                );
            }
            ensure!(!capacities.is_empty(), "wallet capacities must not be empty");
            self.wallet = Some(Wallet {
                counter,
                capacities,
            });
        }
        self.item_pool = self.load_pool_counts(&world_json["item_pool"])?;
        for (value_name, counts_json) in world_json["item_pool_values"].entries() {
            let counts = self
                .load_pool_counts(counts_json)
                .with_context(|| format!("parsing item pool value {value_name}"))?;
            self.item_pool_values.insert(value_name.to_string(), counts);
        }
        if !world_json["ice_trap"].is_null() {
            let ice_trap_json = &world_json["ice_trap"];
            let item = self.get_item_idx(get_str(ice_trap_json, "item")?)?;
            ensure!(
                self.items[item].kind.is_junk(),
                "ice trap {} must be a junk item",
                self.items[item].name
            );
            let mut disguises = vec![];
            for disguise_json in ice_trap_json["disguises"].members() {
                let name = disguise_json
                    .as_str()
                    .with_context(|| format!("invalid ice trap disguise {disguise_json}"))?;
                disguises.push(self.items[self.get_item_idx(name)?].get_item_id);
            }
            ensure!(!disguises.is_empty(), "ice trap disguises must not be empty");
            self.ice_trap = Some(IceTrap { item, disguises });
        }
        if !world_json["gerudo_keys"].is_null() {
            let keys_json = &world_json["gerudo_keys"];
            let item = self.get_item_idx(get_str(keys_json, "item")?)?;
            let count = keys_json["count"]
                .as_u8()
                .context("missing/invalid gerudo key count")?;
            if count > 1 {
                ensure!(
                    matches!(self.items[item].effect, ItemEffect::Counter(_)),
                    "gerudo key {} must use a counter",
                    self.items[item].name
                );
            }
            self.gerudo_keys = Some(FortressKeys { item, count });
        }
        if let Some(name) = world_json["links_pocket"].as_str() {
            self.links_pocket = Some(self.get_location_idx(name)?);
        }
        if let Some(name) = world_json["ganons_dungeon"].as_str() {
            self.ganons_dungeon = Some(
                *self
                    .dungeon_isv
                    .index_by_key
                    .get(name)
                    .with_context(|| format!("unknown dungeon {name}"))?,
            );
        }
        Ok(())
    }

    fn load_pool_counts(&self, counts_json: &JsonValue) -> Result<Vec<(ItemIdx, usize)>> {
        let mut counts = vec![];
        for (name, count_json) in counts_json.entries() {
            let item = self.get_item_idx(name)?;
            let count = count_json
                .as_usize()
                .with_context(|| format!("invalid pool count for {name}"))?;
            if count > 1 {
                ensure!(
                    matches!(self.items[item].effect, ItemEffect::Counter(_)),
                    "item {name} appears {count} times in the pool but does not use a counter"
                );
            }
            counts.push((item, count));
        }
        Ok(counts)
    }

    fn validate_events(&self) -> Result<()> {
        let mut set_events: HashSet<EventIdx> = HashSet::new();
        for region in &self.regions {
            for edge in &region.events {
                set_events.insert(edge.event);
            }
        }
        for (idx, name) in self.event_isv.keys.iter().enumerate() {
            ensure!(
                set_events.contains(&idx),
                "event {name} is required but never set"
            );
        }
        let mut reachable_locations: HashSet<LocationIdx> = HashSet::new();
        for region in &self.regions {
            for edge in &region.locations {
                reachable_locations.insert(edge.location);
            }
        }
        for (idx, loc) in self.locations.iter().enumerate() {
            if !reachable_locations.contains(&idx) {
                warn!("location {} has no location edge in any region", loc.name);
            }
        }
        Ok(())
    }

    /// Requirement satisfied by holding at least one copy of the item.
    pub fn item_requirement(&self, item: ItemIdx) -> Requirement {
        match self.items[item].effect {
            ItemEffect::Flag(flag) => Requirement::Flag(flag),
            ItemEffect::Counter(counter) => Requirement::Counter { counter, min: 1 },
        }
    }

    fn parse_requires_list(
        &mut self,
        reqs_json: &JsonValue,
        region: Option<RegionIdx>,
    ) -> Result<Vec<Requirement>> {
        ensure!(reqs_json.is_array(), "expected array, got {reqs_json}");
        let mut reqs = vec![];
        for req_json in reqs_json.members() {
            reqs.push(self.parse_requirement(req_json, region)?);
        }
        Ok(reqs)
    }

    // `region` is the region owning the edge, or None for helpers and purchase conditions.
    fn parse_requirement(
        &mut self,
        req_json: &JsonValue,
        region: Option<RegionIdx>,
    ) -> Result<Requirement> {
        if req_json.is_null() {
            return Ok(Requirement::Free);
        }
        if let Some(value) = req_json.as_str() {
            if value == "free" {
                return Ok(Requirement::Free);
            } else if value == "never" {
                return Ok(Requirement::Never);
            } else if value == "is_child" {
                return Ok(Requirement::IsChild);
            } else if value == "is_adult" {
                return Ok(Requirement::IsAdult);
            } else if value == "at_day" {
                return Ok(Requirement::AtDay);
            } else if value == "at_night" {
                return Ok(Requirement::AtNight);
            } else if let Some(&helper) = self.helper_isv.index_by_key.get(value) {
                return Ok(Requirement::Helper(helper));
            } else if let Some(&flag) = self.flag_isv.index_by_key.get(value) {
                return Ok(Requirement::Flag(flag));
            } else if let Some(&counter) = self.counter_isv.index_by_key.get(value) {
                return Ok(Requirement::Counter { counter, min: 1 });
            } else if let Some(&item) = self.item_isv.index_by_key.get(value) {
                return Ok(self.item_requirement(item));
            }
            bail!("Unrecognized requirement: {value}");
        }
        ensure!(
            req_json.is_object() && req_json.len() == 1,
            "Unrecognized requirement: {req_json}"
        );
        let (key, value) = req_json
            .entries()
            .next()
            .context("empty requirement object")?;
        match key {
            "and" => Ok(Requirement::make_and(
                self.parse_requires_list(value, region)?,
            )),
            "or" => Ok(Requirement::make_or(
                self.parse_requires_list(value, region)?,
            )),
            "not" => Ok(Requirement::Not(Box::new(
                self.parse_requirement(value, region)?,
            ))),
            "event" => {
                let name = value
                    .as_str()
                    .with_context(|| format!("invalid event name {value}"))?;
                Ok(Requirement::Event(self.event_isv.add(name)))
            }
            "setting" => {
                let name = value
                    .as_str()
                    .with_context(|| format!("invalid setting name {value}"))?;
                Ok(Requirement::Setting(self.setting_isv.add(name)))
            }
            "option" => {
                let name = get_str(value, "name")?;
                let is = get_str(value, "is")?;
                Ok(Requirement::OptionIs {
                    setting: self.setting_isv.add(name),
                    value: is.to_string(),
                })
            }
            "counter" => {
                let name = get_str(value, "name")?;
                let counter = match self.counter_isv.index_by_key.get(name) {
                    Some(&c) => c,
                    None => match self.item_isv.index_by_key.get(name) {
                        Some(&item) => match self.items[item].effect {
                            ItemEffect::Counter(c) => c,
                            ItemEffect::Flag(_) => bail!("item {name} does not use a counter"),
                        },
                        None => bail!("unknown counter {name}"),
                    },
                };
                let min = value["min"]
                    .as_u8()
                    .with_context(|| format!("missing/invalid counter min in {req_json}"))?;
                Ok(Requirement::Counter { counter, min })
            }
            "count" => {
                let of = self.parse_requires_list(&value["of"], region)?;
                let min = if let Some(n) = value["min"].as_u8() {
                    CountMin::Fixed(n)
                } else if let Some(name) = value["min"].as_str() {
                    CountMin::Setting(self.setting_isv.add(name))
                } else {
                    bail!("missing/invalid count min in {req_json}");
                };
                Ok(Requirement::Count { of, min })
            }
            "here" => {
                ensure!(region.is_some(), "'here' is only allowed on region edges");
                let region_name = get_str(value, "region")?;
                let here_region = *self
                    .region_isv
                    .index_by_key
                    .get(region_name)
                    .with_context(|| format!("unknown region {region_name}"))?;
                let requires = self.parse_requirement(&value["requires"], region)?;
                Ok(Requirement::Here {
                    region: here_region,
                    requires: Box::new(requires),
                })
            }
            "mq" => {
                let name = value
                    .as_str()
                    .with_context(|| format!("invalid dungeon name {value}"))?;
                let dungeon = *self
                    .dungeon_isv
                    .index_by_key
                    .get(name)
                    .with_context(|| format!("unknown dungeon {name}"))?;
                Ok(Requirement::MasterQuest(dungeon))
            }
            "can_afford" => {
                let price = value
                    .as_u16()
                    .with_context(|| format!("invalid price {value}"))?;
                Ok(Requirement::CanAfford(price))
            }
            _ => bail!("Unrecognized requirement: {req_json}"),
        }
    }
}
