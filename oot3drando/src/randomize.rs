use crate::settings::{
    build_settings_context, draw_selections, DungeonItemShuffle, GerudoFortress, GerudoKeys,
    IceTrapValue, LinksPocket, RandomizerSettings, RewardShuffle, SeedSelections, SongShuffle,
    StartingAge, StartingTime, Trial,
};
use crate::spoiler_log::{build_spoiler_log, generate_playthrough, prune_playthrough, SpoilerLog};
use crate::traverse::{start_origins, Placement, Traverser, UnsatisfiableShopPrice};
use log::{debug, info, warn};
use oot3drando_game::{
    Category, DungeonIdx, GameData, GetItemId, ItemEffect, ItemIdx, ItemKind, LocationIdx, Price,
    RegionIdx, SceneId,
};
use oot3drando_logic::{helpers, AccessBits, LogicState};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

// Separate random streams so that redrawing the placement order on a retry
// does not disturb the per-seed selections.
const SELECTION_STREAM: u8 = 0;
const PLACEMENT_STREAM: u8 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FillError {
    #[error("no reachable location for advancement item {item} (last placed at {})", .last_location.as_deref().unwrap_or("<none>"))]
    UnreachableAdvancementItem {
        item: String,
        last_location: Option<String>,
    },
    #[error("exhausted {attempts} randomization attempts (last stall: item {}, after location {})", .item.as_deref().unwrap_or("<none>"), .location.as_deref().unwrap_or("<none>"))]
    RetryLimitExceeded {
        attempts: usize,
        item: Option<String>,
        location: Option<String>,
    },
    #[error("dungeon {dungeon} mixes vanilla and master quest locations")]
    InconsistentDungeonVariant { dungeon: String },
    #[error("{items} items do not fit in {locations} open locations")]
    InsufficientLocations { items: usize, locations: usize },
    #[error("the goal is not reachable with the final placement")]
    NotBeatable,
    #[error("unknown {kind} '{name}' in settings")]
    UnknownName { kind: &'static str, name: String },
    #[error("item {0} is in the pool more than once but does not use a counter")]
    DuplicateFlagItem(String),
}

impl FillError {
    // Placement stalls are worth another attempt; anything else is a data or settings problem.
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            FillError::UnreachableAdvancementItem { .. } | FillError::NotBeatable
        )
    }
}

/// Row of the item override table consumed by the patch writer, keyed by (scene, flag).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ItemOverride {
    pub scene: SceneId,
    pub flag: u8,
    pub item_id: GetItemId,
    // Item an ice trap shows itself as.
    pub looks_like_item_id: Option<GetItemId>,
    pub price: Option<Price>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LocationAssignment {
    pub location: String,
    pub item: String,
}

/// Everything the patch writer needs from a finished seed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AssignmentTable {
    pub seed: u64,
    pub locations: Vec<LocationAssignment>,
    pub item_overrides: Vec<ItemOverride>,
    pub dungeon_rewards: Vec<LocationAssignment>,
    pub mq_dungeons: Vec<String>,
    pub starting_age: StartingAge,
    pub skipped_trials: Vec<Trial>,
    pub starting_items: Vec<String>,
}

/// A finished placement together with the state a playthrough starts from.
#[derive(Clone, Debug)]
pub struct Assignment {
    pub placement: Placement,
    pub starting_logic: LogicState,
    pub starting_items: Vec<ItemIdx>,
    pub origins: Vec<(RegionIdx, AccessBits)>,
    pub disguises: Vec<Option<GetItemId>>,
}

#[derive(Clone, Debug)]
pub struct Randomization {
    pub assignment: Assignment,
    pub table: AssignmentTable,
    pub spoiler_log: SpoilerLog,
}

pub struct Randomizer<'a> {
    pub game_data: &'a GameData,
    pub settings: &'a RandomizerSettings,
    excluded: Vec<bool>,
    starting_items: Vec<(ItemIdx, usize)>,
    item_pool: Vec<(ItemIdx, usize)>,
}

// Per-attempt mutable state. Rebuilt from scratch on every attempt.
struct FillState<'a> {
    placement: Placement,
    open: Vec<bool>,
    // Starting items plus every unplaced advancement item.
    assumed: LogicState,
    origins: Vec<(RegionIdx, AccessBits)>,
    traverser: Traverser<'a>,
    last_location: Option<LocationIdx>,
}

fn make_rng(seed: u64, attempt_num: usize, stream: u8) -> StdRng {
    let mut rng_seed = [0u8; 32];
    rng_seed[..8].copy_from_slice(&seed.to_le_bytes());
    rng_seed[8..16].copy_from_slice(&(attempt_num as u64).to_le_bytes());
    rng_seed[16] = stream;
    StdRng::from_seed(rng_seed)
}

fn take_from_pool(pool: &mut Vec<ItemIdx>, item: ItemIdx) -> bool {
    if let Some(pos) = pool.iter().position(|&i| i == item) {
        pool.remove(pos);
        true
    } else {
        false
    }
}

impl<'a> Randomizer<'a> {
    pub fn new(
        game_data: &'a GameData,
        settings: &'a RandomizerSettings,
    ) -> Result<Randomizer<'a>, FillError> {
        let item_idx = |name: &str| -> Result<ItemIdx, FillError> {
            game_data
                .item_isv
                .index_by_key
                .get(name)
                .copied()
                .ok_or_else(|| FillError::UnknownName {
                    kind: "item",
                    name: name.to_string(),
                })
        };

        let mut excluded = vec![false; game_data.locations.len()];
        for name in &settings.excluded_locations {
            let loc = game_data
                .location_isv
                .index_by_key
                .get(name.as_str())
                .copied()
                .ok_or_else(|| FillError::UnknownName {
                    kind: "location",
                    name: name.clone(),
                })?;
            excluded[loc] = true;
        }

        let mut starting_items = vec![];
        for (name, &count) in &settings.starting_items {
            starting_items.push((item_idx(name)?, count));
        }
        starting_items.sort();

        let mut item_pool = game_data.item_pool.clone();
        let mut set_count = |item: ItemIdx, count: usize| {
            match item_pool.iter_mut().find(|(i, _)| *i == item) {
                Some(entry) => entry.1 = count,
                None => item_pool.push((item, count)),
            }
        };
        let value_name = settings.item_pool_value.to_string();
        for &(item, count) in game_data.item_pool_values.get(&value_name).into_iter().flatten() {
            set_count(item, count);
        }
        for (name, &count) in &settings.item_pool {
            set_count(item_idx(name)?, count);
        }
        item_pool.sort();
        for &(item, count) in &item_pool {
            if count > 1 && !matches!(game_data.items[item].effect, ItemEffect::Counter(_)) {
                return Err(FillError::DuplicateFlagItem(
                    game_data.items[item].name.clone(),
                ));
            }
        }

        Ok(Randomizer {
            game_data,
            settings,
            excluded,
            starting_items,
            item_pool,
        })
    }

    fn item_name(&self, item: ItemIdx) -> String {
        self.game_data.items[item].name.clone()
    }

    fn location_name(&self, loc: LocationIdx) -> String {
        self.game_data.locations[loc].name.clone()
    }

    /// Locations that exist in this seed: the overworld plus each dungeon's selected layout.
    fn active_locations(&self, mq: &[bool]) -> Result<Vec<bool>, FillError> {
        let game_data = self.game_data;
        let mut active = vec![true; game_data.locations.len()];
        for dungeon in &game_data.dungeons {
            for loc in dungeon.get_every_location() {
                active[loc] = false;
            }
        }
        for (d, dungeon) in game_data.dungeons.iter().enumerate() {
            for loc in dungeon.get_dungeon_locations(mq[d]) {
                active[loc] = true;
            }
        }
        for dungeon in &game_data.dungeons {
            let vanilla = dungeon.vanilla_locations.iter().any(|&l| active[l]);
            let master_quest = dungeon.mq_locations.iter().any(|&l| active[l]);
            if vanilla && master_quest {
                return Err(FillError::InconsistentDungeonVariant {
                    dungeon: dungeon.name.clone(),
                });
            }
        }
        Ok(active)
    }

    fn place(&self, state: &mut FillState, loc: LocationIdx, item: ItemIdx) {
        debug!(
            "Placing {} at {}",
            self.game_data.items[item].name, self.game_data.locations[loc].name
        );
        state.placement.items[loc] = Some(item);
        state.last_location = Some(loc);
    }

    /// Places `item` into every open, empty slot of the dungeon tagged with `category`,
    /// up to `count` copies. Returns the number of copies that found no slot.
    /// Does nothing for a dungeon without that item.
    fn place_vanilla_dungeon_item(
        &self,
        state: &mut FillState,
        dungeon_idx: DungeonIdx,
        mq: bool,
        item: Option<ItemIdx>,
        count: usize,
        category: Category,
    ) -> usize {
        let Some(item) = item else {
            return 0;
        };
        let dungeon = &self.game_data.dungeons[dungeon_idx];
        let mut remaining = count;
        for loc in dungeon.vanilla_slots(self.game_data, mq, category) {
            if remaining == 0 {
                break;
            }
            if state.open[loc] && state.placement.items[loc].is_none() {
                self.place(state, loc, item);
                remaining -= 1;
            }
        }
        remaining
    }

    /// Assumed fill: each item goes to a random location that is reachable while every
    /// other unplaced advancement item is assumed to be held.
    fn assumed_fill<R: Rng>(
        &self,
        state: &mut FillState,
        mut items: Vec<ItemIdx>,
        allowed: impl Fn(LocationIdx) -> bool,
        rng: &mut R,
    ) -> Result<(), FillError> {
        let game_data = self.game_data;
        items.shuffle(rng);
        for item in items {
            if game_data.items[item].advancement {
                state.assumed.undo_item(game_data, item);
            }
            let mut logic = state.assumed.clone();
            let mut collected = vec![false; game_data.locations.len()];
            state
                .traverser
                .sweep(&state.origins, &mut logic, &state.placement, &mut collected);
            let candidates: Vec<LocationIdx> = state
                .traverser
                .reach
                .reachable_locations()
                .filter(|&loc| {
                    state.open[loc] && state.placement.items[loc].is_none() && allowed(loc)
                })
                .collect();
            if candidates.is_empty() {
                return Err(FillError::UnreachableAdvancementItem {
                    item: self.item_name(item),
                    last_location: state.last_location.map(|loc| self.location_name(loc)),
                });
            }
            let loc = candidates[rng.gen_range(0..candidates.len())];
            self.place(state, loc, item);
        }
        Ok(())
    }

    fn dungeon_item_mode(&self, dungeon_idx: DungeonIdx, category: Category) -> DungeonItemShuffle {
        let dungeon_items = &self.settings.dungeon_items;
        match category {
            Category::VanillaMap | Category::VanillaCompass => dungeon_items.maps_and_compasses,
            Category::VanillaSmallKey => dungeon_items.small_keys,
            _ if self.game_data.ganons_dungeon == Some(dungeon_idx) => {
                dungeon_items.ganons_boss_key
            }
            _ => dungeon_items.boss_keys,
        }
    }

    pub fn randomize(
        &self,
        attempt_num: usize,
        seed: u64,
        selections: &SeedSelections,
    ) -> Result<Randomization, FillError> {
        let game_data = self.game_data;
        let settings = self.settings;
        let num_locations = game_data.locations.len();
        let mut rng = make_rng(seed, attempt_num, PLACEMENT_STREAM);

        let active = self.active_locations(&selections.mq)?;
        let open: Vec<bool> = (0..num_locations)
            .map(|loc| active[loc] && !self.excluded[loc])
            .collect();

        let settings_ctx = build_settings_context(settings, game_data, selections);
        let mut starting_logic = LogicState::new(game_data, settings_ctx);
        let mut starting_items: Vec<ItemIdx> = vec![];
        let mut pool: Vec<ItemIdx> = vec![];
        for &(item, count) in &self.item_pool {
            pool.extend(std::iter::repeat(item).take(count));
        }
        // Starting copies not drawn from the pool stand in for dungeon and fortress keys.
        let mut unclaimed_starting: Vec<ItemIdx> = vec![];
        for &(item, count) in &self.starting_items {
            for _ in 0..count {
                if !take_from_pool(&mut pool, item) {
                    unclaimed_starting.push(item);
                }
                starting_items.push(item);
            }
        }

        let origins = start_origins(
            game_data,
            selections.starting_age == StartingAge::Child,
            settings.world.starting_time == StartingTime::Day,
        );
        let mut state = FillState {
            placement: Placement::new(num_locations),
            open,
            assumed: starting_logic.clone(),
            origins: origins.clone(),
            traverser: Traverser::new(game_data),
            last_location: None,
        };
        let pocket_holds_reward = settings.shuffle.links_pocket == LinksPocket::DungeonReward;

        // Categories kept vanilla by the settings.
        for loc in 0..num_locations {
            if !state.open[loc] {
                continue;
            }
            let location = &game_data.locations[loc];
            let in_dungeon = game_data.location_dungeon[loc].is_some();
            let keep = location
                .categories
                .iter()
                .any(|&c| settings.shuffle.keeps_vanilla(c, in_dungeon));
            if let (true, Some(item)) = (keep, location.vanilla_item) {
                take_from_pool(&mut pool, item);
                self.place(&mut state, loc, item);
            }
        }

        if let (LinksPocket::Nothing, Some(pocket)) =
            (settings.shuffle.links_pocket, game_data.links_pocket)
        {
            if state.open[pocket] && state.placement.items[pocket].is_none() {
                self.place(&mut state, pocket, game_data.filler_item);
            }
        }

        // Dungeon items, by class.
        let mut own_dungeon_boss_keys: Vec<(ItemIdx, DungeonIdx)> = vec![];
        let mut own_dungeon_small_keys: Vec<(ItemIdx, DungeonIdx)> = vec![];
        let mut own_dungeon_maps: Vec<(ItemIdx, DungeonIdx)> = vec![];
        for (d, dungeon) in game_data.dungeons.iter().enumerate() {
            let mq = selections.mq[d];
            let classes = [
                (Category::VanillaBossKey, dungeon.boss_key, 1),
                (
                    Category::VanillaSmallKey,
                    dungeon.small_key,
                    dungeon.key_count(mq) as usize,
                ),
                (Category::VanillaMap, dungeon.map, 1),
                (Category::VanillaCompass, dungeon.compass, 1),
            ];
            for (category, item, count) in classes {
                let mut count = count;
                if let Some(item) = item {
                    while count > 0 && take_from_pool(&mut unclaimed_starting, item) {
                        count -= 1;
                    }
                }
                let mut leftover = count;
                let mode = self.dungeon_item_mode(d, category);
                if mode == DungeonItemShuffle::Vanilla {
                    leftover =
                        self.place_vanilla_dungeon_item(&mut state, d, mq, item, count, category);
                }
                let Some(item) = item else {
                    continue;
                };
                for _ in 0..leftover {
                    match mode {
                        DungeonItemShuffle::StartWith => starting_items.push(item),
                        DungeonItemShuffle::Anywhere => pool.push(item),
                        // Copies with no vanilla slot left stay inside their dungeon.
                        DungeonItemShuffle::Vanilla | DungeonItemShuffle::OwnDungeon => {
                            let target = match category {
                                Category::VanillaBossKey => &mut own_dungeon_boss_keys,
                                Category::VanillaSmallKey => &mut own_dungeon_small_keys,
                                _ => &mut own_dungeon_maps,
                            };
                            target.push((item, d));
                        }
                    }
                }
            }
        }

        let mut fortress_keys: Vec<ItemIdx> = vec![];
        if let Some(keys) = &game_data.gerudo_keys {
            let mut count = match settings.world.gerudo_fortress {
                GerudoFortress::Normal => keys.count as usize,
                GerudoFortress::Fast => std::cmp::min(1, keys.count as usize),
                GerudoFortress::Open => 0,
            };
            while count > 0 && take_from_pool(&mut unclaimed_starting, keys.item) {
                count -= 1;
            }
            let mode = settings.dungeon_items.gerudo_keys;
            if mode == GerudoKeys::Vanilla {
                for loc in 0..num_locations {
                    if count == 0 {
                        break;
                    }
                    if state.open[loc]
                        && state.placement.items[loc].is_none()
                        && game_data.locations[loc].has_category(Category::VanillaGerudoKey)
                    {
                        self.place(&mut state, loc, keys.item);
                        count -= 1;
                    }
                }
            }
            match mode {
                // Keys left over after the vanilla slots are taken go anywhere.
                GerudoKeys::Vanilla | GerudoKeys::Anywhere => {
                    pool.extend(std::iter::repeat(keys.item).take(count))
                }
                GerudoKeys::AnyDungeon | GerudoKeys::Overworld => {
                    fortress_keys.extend(std::iter::repeat(keys.item).take(count))
                }
            }
        }

        for &item in &starting_items {
            starting_logic.apply_item(game_data, item);
        }

        let is_reward_slot = |loc: LocationIdx| {
            game_data.locations[loc].has_category(Category::DungeonReward)
                && (pocket_holds_reward || game_data.links_pocket != Some(loc))
        };

        let mut rewards: Vec<ItemIdx> = vec![];
        if settings.shuffle.rewards == RewardShuffle::EndOfDungeon {
            rewards = pool
                .iter()
                .copied()
                .filter(|&i| game_data.items[i].kind == ItemKind::DungeonReward)
                .collect();
            pool.retain(|&i| game_data.items[i].kind != ItemKind::DungeonReward);
            let reward_slots = (0..num_locations)
                .filter(|&loc| {
                    state.open[loc] && state.placement.items[loc].is_none() && is_reward_slot(loc)
                })
                .count();
            // Rewards without a slot of their own (e.g. when the pocket holds something else)
            // join the main pool.
            if rewards.len() > reward_slots {
                rewards.shuffle(&mut rng);
                pool.extend(rewards.drain(reward_slots..));
            }
        }
        let mut songs: Vec<ItemIdx> = vec![];
        if settings.shuffle.songs == SongShuffle::SongLocations {
            songs = pool
                .iter()
                .copied()
                .filter(|&i| game_data.items[i].kind == ItemKind::Song)
                .collect();
            pool.retain(|&i| game_data.items[i].kind != ItemKind::Song);
        }

        // Match the pool to the number of open slots: trim junk, or pad with filler.
        let open_slots = (0..num_locations)
            .filter(|&loc| state.open[loc] && state.placement.items[loc].is_none())
            .count();
        let restricted_count = rewards.len()
            + songs.len()
            + own_dungeon_boss_keys.len()
            + own_dungeon_small_keys.len()
            + own_dungeon_maps.len()
            + fortress_keys.len();
        while restricted_count + pool.len() > open_slots {
            let junk_pos = pool.iter().rposition(|&i| {
                let item = &game_data.items[i];
                item.kind.is_junk() && !item.advancement
            });
            match junk_pos {
                Some(pos) => {
                    pool.remove(pos);
                }
                None => {
                    return Err(FillError::InsufficientLocations {
                        items: restricted_count + pool.len(),
                        locations: open_slots,
                    })
                }
            }
        }
        while restricted_count + pool.len() < open_slots {
            pool.push(game_data.filler_item);
        }

        // Priced slots: shopsanity prices, else the slot's vanilla price, else the price
        // of the vanilla shop item now sitting there.
        let max_capacity = helpers::max_wallet_capacity(game_data);
        for loc in 0..num_locations {
            if !active[loc] {
                continue;
            }
            let location = &game_data.locations[loc];
            let price = selections.prices[loc].or(location.price).or_else(|| {
                if location.has_category(Category::Shop) {
                    state.placement.items[loc].and_then(|i| game_data.items[i].price)
                } else {
                    None
                }
            });
            if let Some(price) = price {
                if price > max_capacity {
                    warn!(
                        "[attempt {attempt_num}] {}",
                        UnsatisfiableShopPrice {
                            location: location.name.clone(),
                            price,
                            max_capacity,
                        }
                    );
                }
            }
            state.placement.prices[loc] = price;
        }

        // Everything still to be placed that matters to logic starts out assumed.
        let mut assumed = starting_logic.clone();
        for &item in rewards
            .iter()
            .chain(songs.iter())
            .chain(own_dungeon_boss_keys.iter().map(|(i, _)| i))
            .chain(own_dungeon_small_keys.iter().map(|(i, _)| i))
            .chain(own_dungeon_maps.iter().map(|(i, _)| i))
            .chain(fortress_keys.iter())
            .chain(pool.iter())
        {
            if game_data.items[item].advancement {
                assumed.apply_item(game_data, item);
            }
        }
        state.assumed = assumed;

        info!(
            "[attempt {attempt_num}] Placing {} restricted and {} pooled items into {} open locations",
            restricted_count,
            pool.len(),
            open_slots
        );

        self.assumed_fill(&mut state, rewards, is_reward_slot, &mut rng)?;
        for own_dungeon in [own_dungeon_boss_keys, own_dungeon_small_keys, own_dungeon_maps] {
            for (d, dungeon) in game_data.dungeons.iter().enumerate() {
                let items: Vec<ItemIdx> = own_dungeon
                    .iter()
                    .filter(|&&(_, dd)| dd == d)
                    .map(|&(i, _)| i)
                    .collect();
                if items.is_empty() {
                    continue;
                }
                let slots = dungeon.get_dungeon_locations(selections.mq[d]);
                self.assumed_fill(&mut state, items, |loc| slots.contains(&loc), &mut rng)?;
            }
        }
        if !fortress_keys.is_empty() {
            let in_dungeon = settings.dungeon_items.gerudo_keys == GerudoKeys::AnyDungeon;
            self.assumed_fill(
                &mut state,
                fortress_keys,
                |loc| game_data.location_dungeon[loc].is_some() == in_dungeon,
                &mut rng,
            )?;
        }
        self.assumed_fill(
            &mut state,
            songs,
            |loc| game_data.locations[loc].has_category(Category::Song),
            &mut rng,
        )?;
        let (mut advancement, junk): (Vec<ItemIdx>, Vec<ItemIdx>) = pool
            .into_iter()
            .partition(|&i| game_data.items[i].advancement);
        if let (LinksPocket::Advancement, Some(pocket)) =
            (settings.shuffle.links_pocket, game_data.links_pocket)
        {
            let pocket_empty = state.open[pocket] && state.placement.items[pocket].is_none();
            if pocket_empty && !advancement.is_empty() {
                let item = advancement.remove(rng.gen_range(0..advancement.len()));
                self.assumed_fill(&mut state, vec![item], |loc| loc == pocket, &mut rng)?;
            }
        }
        self.assumed_fill(&mut state, advancement, |_| true, &mut rng)?;

        let assignment_so_far = Assignment {
            placement: state.placement.clone(),
            starting_logic: starting_logic.clone(),
            starting_items: starting_items.clone(),
            origins: origins.clone(),
            disguises: vec![],
        };
        if !is_beatable(game_data, &assignment_so_far) {
            return Err(FillError::NotBeatable);
        }

        // Junk phase: no reachability constraints.
        let mut junk = junk;
        junk.shuffle(&mut rng);
        if let Some(ice_trap) = &game_data.ice_trap {
            if settings.ice_traps == IceTrapValue::Off {
                for item in junk.iter_mut().filter(|i| **i == ice_trap.item) {
                    *item = game_data.filler_item;
                }
            } else {
                let regular: Vec<usize> = (0..junk.len())
                    .filter(|&p| junk[p] != ice_trap.item && game_data.items[junk[p]].kind.is_junk())
                    .collect();
                let extra = settings.ice_traps.extra_traps(regular.len());
                for &p in regular.iter().take(extra) {
                    junk[p] = ice_trap.item;
                }
            }
        }
        let mut empty_slots: Vec<LocationIdx> = (0..num_locations)
            .filter(|&loc| state.open[loc] && state.placement.items[loc].is_none())
            .collect();
        empty_slots.shuffle(&mut rng);
        if empty_slots.len() != junk.len() {
            return Err(FillError::InsufficientLocations {
                items: junk.len(),
                locations: empty_slots.len(),
            });
        }
        for (loc, item) in empty_slots.into_iter().zip(junk) {
            state.placement.items[loc] = Some(item);
        }

        let mut disguises = vec![None; num_locations];
        if let Some(ice_trap) = &game_data.ice_trap {
            for loc in 0..num_locations {
                if state.placement.items[loc] == Some(ice_trap.item) {
                    disguises[loc] = ice_trap.disguises.choose(&mut rng).copied();
                }
            }
        }

        let assignment = Assignment {
            placement: state.placement,
            starting_logic,
            starting_items,
            origins,
            disguises,
        };
        let playthrough = generate_playthrough(game_data, &assignment)?;
        let required_playthrough = prune_playthrough(game_data, &assignment, &playthrough)?;
        info!(
            "[attempt {attempt_num}] Success: {} spheres, {} required",
            playthrough.spheres.len(),
            required_playthrough.spheres.len()
        );

        let table = self.get_assignment_table(seed, &assignment, &active, selections);
        let spoiler_log = build_spoiler_log(
            game_data,
            settings,
            seed,
            attempt_num,
            &table,
            &assignment,
            &playthrough,
            &required_playthrough,
        );
        Ok(Randomization {
            assignment,
            table,
            spoiler_log,
        })
    }

    fn get_assignment_table(
        &self,
        seed: u64,
        assignment: &Assignment,
        active: &[bool],
        selections: &SeedSelections,
    ) -> AssignmentTable {
        let game_data = self.game_data;
        let mut locations = vec![];
        let mut item_overrides = vec![];
        let mut dungeon_rewards = vec![];
        for (loc, location) in game_data.locations.iter().enumerate() {
            if !active[loc] {
                continue;
            }
            let Some(item) = assignment.placement.items[loc] else {
                continue;
            };
            let entry = LocationAssignment {
                location: location.name.clone(),
                item: game_data.items[item].name.clone(),
            };
            if game_data.items[item].kind == ItemKind::DungeonReward {
                dungeon_rewards.push(entry.clone());
            }
            locations.push(entry);
            item_overrides.push(ItemOverride {
                scene: location.scene,
                flag: location.flag,
                item_id: game_data.items[item].get_item_id,
                looks_like_item_id: assignment.disguises.get(loc).copied().flatten(),
                price: assignment.placement.prices[loc],
            });
        }
        item_overrides.sort_by_key(|o| (o.scene, o.flag));
        let mq_dungeons = game_data
            .dungeons
            .iter()
            .zip(selections.mq.iter())
            .filter(|&(_, &mq)| mq)
            .map(|(d, _)| d.name.clone())
            .collect();
        AssignmentTable {
            seed,
            locations,
            item_overrides,
            dungeon_rewards,
            mq_dungeons,
            starting_age: selections.starting_age,
            skipped_trials: selections.skipped_trials.clone(),
            starting_items: assignment
                .starting_items
                .iter()
                .map(|&i| self.item_name(i))
                .collect(),
        }
    }
}

/// Runs a full sweep from the starting state and reports whether the goal event is reached.
pub fn is_beatable(game_data: &GameData, assignment: &Assignment) -> bool {
    let mut traverser = Traverser::new(game_data);
    let mut logic = assignment.starting_logic.clone();
    let mut collected = vec![false; game_data.locations.len()];
    traverser.sweep(
        &assignment.origins,
        &mut logic,
        &assignment.placement,
        &mut collected,
    );
    traverser.reach.has_event(game_data.goal_event)
}

/// Generates a completable placement, retrying from scratch on placement stalls.
/// Each attempt redraws the placement order; with `reseed_on_retry` the per-seed
/// selections are redrawn as well.
pub fn fill(
    game_data: &GameData,
    settings: &RandomizerSettings,
    seed: u64,
) -> Result<Randomization, FillError> {
    let randomizer = Randomizer::new(game_data, settings)?;
    let max_attempts = std::cmp::max(1, settings.generation.max_attempts);
    let mut selections = draw_selections(
        settings,
        game_data,
        &mut make_rng(seed, 0, SELECTION_STREAM),
    );
    let mut last_item: Option<String> = None;
    let mut last_location: Option<String> = None;
    for attempt_num in 0..max_attempts {
        if attempt_num > 0 && settings.generation.reseed_on_retry {
            selections = draw_selections(
                settings,
                game_data,
                &mut make_rng(seed, attempt_num, SELECTION_STREAM),
            );
        }
        info!(
            "[attempt {attempt_num}] Attempt {}/{max_attempts}",
            attempt_num + 1
        );
        match randomizer.randomize(attempt_num, seed, &selections) {
            Ok(randomization) => return Ok(randomization),
            Err(e) if e.is_retryable() => {
                info!("[attempt {attempt_num}] Failed: {e}");
                if let FillError::UnreachableAdvancementItem {
                    item,
                    last_location: loc,
                } = e
                {
                    last_item = Some(item);
                    last_location = loc;
                }
            }
            Err(e) => return Err(e),
        }
    }
    Err(FillError::RetryLimitExceeded {
        attempts: max_attempts,
        item: last_item,
        location: last_location,
    })
}
