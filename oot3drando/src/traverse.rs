use log::debug;
use oot3drando_game::{EventIdx, GameData, ItemIdx, LocationIdx, Price, RegionIdx, TimeOfDay};
use oot3drando_logic::{helpers, AccessBits, AgeTime, EvalContext, LogicState};
use thiserror::Error;

/// Items currently placed, and the resolved price of every priced slot.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub items: Vec<Option<ItemIdx>>,
    pub prices: Vec<Option<Price>>,
}

impl Placement {
    pub fn new(num_locations: usize) -> Self {
        Placement {
            items: vec![None; num_locations],
            prices: vec![None; num_locations],
        }
    }
}

/// A priced slot that no wallet can pay for. The slot is treated as unreachable.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("location {location} costs {price} rupees but the largest wallet holds {max_capacity}")]
pub struct UnsatisfiableShopPrice {
    pub location: String,
    pub price: Price,
    pub max_capacity: Price,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReachabilitySet {
    pub regions: Vec<AccessBits>,
    pub events: Vec<bool>,
    pub locations: Vec<bool>,
    // Number of full scans made, including the final one that changed nothing.
    pub passes: usize,
    pub unsatisfiable_prices: Vec<LocationIdx>,
}

impl ReachabilitySet {
    pub fn new(game_data: &GameData) -> Self {
        ReachabilitySet {
            regions: vec![AccessBits::NONE; game_data.regions.len()],
            events: vec![false; game_data.event_isv.keys.len()],
            locations: vec![false; game_data.locations.len()],
            passes: 0,
            unsatisfiable_prices: vec![],
        }
    }

    pub fn reset(&mut self) {
        self.regions.fill(AccessBits::NONE);
        self.events.fill(false);
        self.locations.fill(false);
        self.passes = 0;
        self.unsatisfiable_prices.clear();
    }

    /// True if every bit, event and location set in `other` is also set here.
    pub fn is_superset_of(&self, other: &ReachabilitySet) -> bool {
        self.regions
            .iter()
            .zip(other.regions.iter())
            .all(|(a, b)| a.is_superset(*b))
            && self
                .events
                .iter()
                .zip(other.events.iter())
                .all(|(a, b)| *a || !*b)
            && self
                .locations
                .iter()
                .zip(other.locations.iter())
                .all(|(a, b)| *a || !*b)
    }

    pub fn has_event(&self, event: EventIdx) -> bool {
        self.events[event]
    }

    pub fn reachable_locations(&self) -> impl Iterator<Item = LocationIdx> + '_ {
        self.locations
            .iter()
            .enumerate()
            .filter(|&(_, &r)| r)
            .map(|(i, _)| i)
    }
}

/// Where a search starts: the root region reached with the starting age at the starting time.
pub fn start_origins(game_data: &GameData, child: bool, day: bool) -> Vec<(RegionIdx, AccessBits)> {
    vec![(game_data.root_region, AgeTime::new(child, day).bit())]
}

pub struct Traverser<'a> {
    game_data: &'a GameData,
    pub reach: ReachabilitySet,
}

impl<'a> Traverser<'a> {
    pub fn new(game_data: &'a GameData) -> Self {
        Traverser {
            game_data,
            reach: ReachabilitySet::new(game_data),
        }
    }

    /// Clears every reachability bit, event and location. Required before searching
    /// again under a different item state.
    pub fn reset(&mut self) {
        self.reach.reset();
    }

    pub fn add_origin(&mut self, region: RegionIdx, bits: AccessBits) {
        let r = &mut self.reach.regions[region];
        *r = r.union(bits);
    }

    pub fn traverse(&mut self, logic: &LogicState, placement: &Placement) {
        self.traverse_observed(logic, placement, |_| {});
    }

    /// Scans every region's edges repeatedly until a scan sets nothing new.
    /// `observer` sees the reachability set after every scan.
    pub fn traverse_observed<F: FnMut(&ReachabilitySet)>(
        &mut self,
        logic: &LogicState,
        placement: &Placement,
        mut observer: F,
    ) {
        let game_data = self.game_data;
        let max_capacity = helpers::max_wallet_capacity(game_data);
        loop {
            let mut changed = false;
            for (region_idx, region) in game_data.regions.iter().enumerate() {
                let mut bits = self.reach.regions[region_idx];
                if !bits.has_access() {
                    continue;
                }
                if region.time_passes {
                    let widened = bits.with_time_passing();
                    if widened != bits {
                        self.reach.regions[region_idx] = widened;
                        bits = widened;
                        changed = true;
                    }
                }

                let new_events: Vec<EventIdx> = {
                    let ctx = self.eval_context(logic);
                    region
                        .events
                        .iter()
                        .filter(|edge| !ctx.events[edge.event])
                        .filter(|edge| bits.iter().any(|at| ctx.eval(&edge.requires, at)))
                        .map(|edge| edge.event)
                        .collect()
                };
                for event in new_events {
                    if !self.reach.events[event] {
                        self.reach.events[event] = true;
                        changed = true;
                    }
                }

                let mut new_locations: Vec<LocationIdx> = vec![];
                let mut unaffordable: Vec<(LocationIdx, Price)> = vec![];
                {
                    let ctx = self.eval_context(logic);
                    for edge in &region.locations {
                        let loc = edge.location;
                        if self.reach.locations[loc] {
                            continue;
                        }
                        let price = placement.prices[loc];
                        if let Some(price) = price {
                            if price > max_capacity {
                                unaffordable.push((loc, price));
                                continue;
                            }
                        }
                        let reachable = bits.iter().any(|at| {
                            ctx.eval(&edge.requires, at)
                                && price.map_or(true, |p| {
                                    helpers::can_buy(&ctx, placement.items[loc], p, at)
                                })
                        });
                        if reachable {
                            new_locations.push(loc);
                        }
                    }
                }
                for loc in new_locations {
                    self.reach.locations[loc] = true;
                    changed = true;
                }
                for (loc, price) in unaffordable {
                    if !self.reach.unsatisfiable_prices.contains(&loc) {
                        debug!(
                            "{}",
                            UnsatisfiableShopPrice {
                                location: game_data.locations[loc].name.clone(),
                                price,
                                max_capacity,
                            }
                        );
                        self.reach.unsatisfiable_prices.push(loc);
                    }
                }

                let mut new_bits: Vec<(RegionIdx, AgeTime)> = vec![];
                {
                    let ctx = self.eval_context(logic);
                    for edge in &region.exits {
                        for at in bits.iter() {
                            let time_ok = match edge.time {
                                TimeOfDay::Day => at.is_day(),
                                TimeOfDay::Night => !at.is_day(),
                                TimeOfDay::Both => true,
                            };
                            let target = if edge.age_switch { at.swap_age() } else { at };
                            if time_ok
                                && !ctx.regions[edge.to].contains(target)
                                && ctx.eval(&edge.requires, at)
                            {
                                new_bits.push((edge.to, target));
                            }
                        }
                    }
                }
                for (to, at) in new_bits {
                    if self.reach.regions[to].insert(at) {
                        changed = true;
                    }
                }
            }
            self.reach.passes += 1;
            observer(&self.reach);
            if !changed {
                break;
            }
        }
    }

    fn eval_context<'b>(&'b self, logic: &'b LogicState) -> EvalContext<'b> {
        EvalContext {
            game_data: self.game_data,
            logic,
            events: &self.reach.events,
            regions: &self.reach.regions,
        }
    }

    /// Searches, picks up every item at a newly reachable location, and searches again
    /// from a reset until nothing new is picked up. `collected` marks locations already
    /// taken; their items are assumed to be reflected in `logic`.
    pub fn sweep(
        &mut self,
        origins: &[(RegionIdx, AccessBits)],
        logic: &mut LogicState,
        placement: &Placement,
        collected: &mut [bool],
    ) {
        loop {
            self.reset();
            for &(region, bits) in origins {
                self.add_origin(region, bits);
            }
            self.traverse(logic, placement);
            let new_items: Vec<(LocationIdx, ItemIdx)> = self
                .reach
                .reachable_locations()
                .filter(|&loc| !collected[loc])
                .filter_map(|loc| placement.items[loc].map(|item| (loc, item)))
                .collect();
            if new_items.is_empty() {
                break;
            }
            for (loc, item) in new_items {
                collected[loc] = true;
                logic.apply_item(self.game_data, item);
            }
        }
    }
}

/// Maximal reachability from `origins` under the given item state.
pub fn search(
    game_data: &GameData,
    origins: &[(RegionIdx, AccessBits)],
    logic: &LogicState,
    placement: &Placement,
) -> ReachabilitySet {
    let mut traverser = Traverser::new(game_data);
    for &(region, bits) in origins {
        traverser.add_origin(region, bits);
    }
    traverser.traverse(logic, placement);
    traverser.reach
}
