use crate::randomize::{is_beatable, Assignment, AssignmentTable, FillError, LocationAssignment};
use crate::settings::{RandomizerSettings, StartingAge, Trial};
use crate::traverse::Traverser;
use oot3drando_game::{GameData, ItemIdx, LocationIdx, Price};
use serde_derive::{Deserialize, Serialize};

/// Advancement items in the order they become obtainable, grouped by sphere.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Playthrough {
    pub spheres: Vec<Vec<(LocationIdx, ItemIdx)>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerSphere {
    pub sphere: usize,
    pub items: Vec<LocationAssignment>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerShopPrice {
    pub location: String,
    pub price: Price,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerLog {
    pub seed: u64,
    pub attempt_num: usize,
    pub settings: RandomizerSettings,
    pub starting_age: StartingAge,
    pub starting_items: Vec<String>,
    pub mq_dungeons: Vec<String>,
    pub skipped_trials: Vec<Trial>,
    pub dungeon_rewards: Vec<LocationAssignment>,
    pub shop_prices: Vec<SpoilerShopPrice>,
    pub playthrough: Vec<SpoilerSphere>,
    pub required_playthrough: Vec<SpoilerSphere>,
    pub locations: Vec<LocationAssignment>,
}

/// Replays the search sphere by sphere: sphere 0 holds what is obtainable from the
/// starting state, and each later sphere what becomes obtainable after collecting
/// everything before it. Stops once the goal event is reached.
pub fn generate_playthrough(
    game_data: &GameData,
    assignment: &Assignment,
) -> Result<Playthrough, FillError> {
    let mut traverser = Traverser::new(game_data);
    let mut logic = assignment.starting_logic.clone();
    let mut collected = vec![false; game_data.locations.len()];
    let mut spheres = vec![];
    loop {
        traverser.reset();
        for &(region, bits) in &assignment.origins {
            traverser.add_origin(region, bits);
        }
        traverser.traverse(&logic, &assignment.placement);
        if traverser.reach.has_event(game_data.goal_event) {
            break;
        }
        let new_items: Vec<(LocationIdx, ItemIdx)> = traverser
            .reach
            .reachable_locations()
            .filter(|&loc| !collected[loc])
            .filter_map(|loc| assignment.placement.items[loc].map(|item| (loc, item)))
            .collect();
        if new_items.is_empty() {
            return Err(FillError::NotBeatable);
        }
        for &(loc, item) in &new_items {
            collected[loc] = true;
            logic.apply_item(game_data, item);
        }
        let sphere: Vec<(LocationIdx, ItemIdx)> = new_items
            .into_iter()
            .filter(|&(_, item)| game_data.items[item].advancement)
            .collect();
        if !sphere.is_empty() {
            spheres.push(sphere);
        }
    }
    Ok(Playthrough { spheres })
}

/// Drops every playthrough item whose removal still leaves the goal reachable, latest
/// spheres first, and recomputes the spheres over what remains.
pub fn prune_playthrough(
    game_data: &GameData,
    assignment: &Assignment,
    playthrough: &Playthrough,
) -> Result<Playthrough, FillError> {
    let mut pruned = assignment.clone();
    for &(loc, item) in playthrough.spheres.iter().flatten().rev() {
        pruned.placement.items[loc] = None;
        if !is_beatable(game_data, &pruned) {
            pruned.placement.items[loc] = Some(item);
        }
    }
    generate_playthrough(game_data, &pruned)
}

fn get_spoiler_spheres(game_data: &GameData, playthrough: &Playthrough) -> Vec<SpoilerSphere> {
    playthrough
        .spheres
        .iter()
        .enumerate()
        .map(|(i, sphere)| SpoilerSphere {
            sphere: i,
            items: sphere
                .iter()
                .map(|&(loc, item)| LocationAssignment {
                    location: game_data.locations[loc].name.clone(),
                    item: game_data.items[item].name.clone(),
                })
                .collect(),
        })
        .collect()
}

pub fn build_spoiler_log(
    game_data: &GameData,
    settings: &RandomizerSettings,
    seed: u64,
    attempt_num: usize,
    table: &AssignmentTable,
    assignment: &Assignment,
    playthrough: &Playthrough,
    required_playthrough: &Playthrough,
) -> SpoilerLog {
    let shop_prices = assignment
        .placement
        .prices
        .iter()
        .enumerate()
        .filter_map(|(loc, price)| {
            price.map(|price| SpoilerShopPrice {
                location: game_data.locations[loc].name.clone(),
                price,
            })
        })
        .collect();
    SpoilerLog {
        seed,
        attempt_num,
        settings: settings.clone(),
        starting_age: table.starting_age,
        starting_items: table.starting_items.clone(),
        mq_dungeons: table.mq_dungeons.clone(),
        skipped_trials: table.skipped_trials.clone(),
        dungeon_rewards: table.dungeon_rewards.clone(),
        shop_prices,
        playthrough: get_spoiler_spheres(game_data, playthrough),
        required_playthrough: get_spoiler_spheres(game_data, required_playthrough),
        locations: table.locations.clone(),
    }
}
