pub mod helpers;

use num_enum::TryFromPrimitive;
use oot3drando_game::{
    CountMin, CounterIdx, GameData, HelperIdx, ItemEffect, ItemIdx, Requirement, SettingIdx,
};
use serde::{Deserialize, Serialize};

/// One of the four (age, time of day) combinations a region can be reached with.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum AgeTime {
    DayChild = 0,
    NightChild = 1,
    DayAdult = 2,
    NightAdult = 3,
}

impl AgeTime {
    pub const ALL: [AgeTime; 4] = [
        AgeTime::DayChild,
        AgeTime::NightChild,
        AgeTime::DayAdult,
        AgeTime::NightAdult,
    ];

    pub fn new(child: bool, day: bool) -> AgeTime {
        match (child, day) {
            (true, true) => AgeTime::DayChild,
            (true, false) => AgeTime::NightChild,
            (false, true) => AgeTime::DayAdult,
            (false, false) => AgeTime::NightAdult,
        }
    }

    pub fn is_child(self) -> bool {
        matches!(self, AgeTime::DayChild | AgeTime::NightChild)
    }

    pub fn is_day(self) -> bool {
        matches!(self, AgeTime::DayChild | AgeTime::DayAdult)
    }

    pub fn with_age(self, child: bool) -> AgeTime {
        AgeTime::new(child, self.is_day())
    }

    pub fn swap_age(self) -> AgeTime {
        AgeTime::new(!self.is_child(), self.is_day())
    }

    pub fn bit(self) -> AccessBits {
        AccessBits(1 << self as u8)
    }
}

/// Reachability bits of a region: {day-child, night-child, day-adult, night-adult}.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessBits(pub u8);

impl AccessBits {
    pub const NONE: AccessBits = AccessBits(0);
    pub const DAY_CHILD: AccessBits = AccessBits(1);
    pub const NIGHT_CHILD: AccessBits = AccessBits(2);
    pub const DAY_ADULT: AccessBits = AccessBits(4);
    pub const NIGHT_ADULT: AccessBits = AccessBits(8);
    pub const ALL: AccessBits = AccessBits(15);

    pub fn child(self) -> bool {
        self.0 & (Self::DAY_CHILD.0 | Self::NIGHT_CHILD.0) != 0
    }

    pub fn adult(self) -> bool {
        self.0 & (Self::DAY_ADULT.0 | Self::NIGHT_ADULT.0) != 0
    }

    pub fn both_ages(self) -> bool {
        self.child() && self.adult()
    }

    pub fn has_access(self) -> bool {
        self.child() || self.adult()
    }

    pub fn all_access(self) -> bool {
        self.0 & Self::ALL.0 == Self::ALL.0
    }

    pub fn contains(self, at: AgeTime) -> bool {
        self.0 & at.bit().0 != 0
    }

    pub fn is_superset(self, other: AccessBits) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: AccessBits) -> AccessBits {
        AccessBits(self.0 | other.0)
    }

    /// Sets the bit, returning true if it was not already set.
    pub fn insert(&mut self, at: AgeTime) -> bool {
        let new = !self.contains(at);
        self.0 |= at.bit().0;
        new
    }

    pub fn iter(self) -> impl Iterator<Item = AgeTime> {
        (0..4u8)
            .filter(move |i| self.0 & (1 << i) != 0)
            .filter_map(|i| AgeTime::try_from(i).ok())
    }

    /// Waiting in a region where time passes reaches both times of day for each age present.
    pub fn with_time_passing(self) -> AccessBits {
        let mut out = self;
        if self.child() {
            out = out.union(Self::DAY_CHILD).union(Self::NIGHT_CHILD);
        }
        if self.adult() {
            out = out.union(Self::DAY_ADULT).union(Self::NIGHT_ADULT);
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingValue {
    Switch(bool),
    Number(u8),
    Option(String),
}

/// Setting values resolved for one seed, indexed like `GameData.setting_isv`.
#[derive(Clone, Debug, Default)]
pub struct SettingsContext {
    pub values: Vec<SettingValue>,
    pub mq: Vec<bool>,
    pub no_logic: bool,
}

impl SettingsContext {
    pub fn switch(&self, idx: SettingIdx) -> bool {
        match self.values.get(idx) {
            Some(SettingValue::Switch(b)) => *b,
            Some(SettingValue::Number(n)) => *n > 0,
            _ => false,
        }
    }

    pub fn number(&self, idx: SettingIdx) -> u8 {
        match self.values.get(idx) {
            Some(SettingValue::Number(n)) => *n,
            Some(SettingValue::Switch(b)) => *b as u8,
            _ => 0,
        }
    }

    pub fn option_is(&self, idx: SettingIdx, value: &str) -> bool {
        matches!(self.values.get(idx), Some(SettingValue::Option(v)) if v == value)
    }
}

/// Item state plus the derived helper predicates computed from it.
#[derive(Clone, Debug)]
pub struct LogicState {
    pub flags: Vec<bool>,
    pub counters: Vec<u8>,
    pub settings: SettingsContext,
    helper_cache: Vec<[bool; 4]>,
    recompute_count: usize,
}

impl LogicState {
    pub fn new(game_data: &GameData, settings: SettingsContext) -> LogicState {
        let mut state = LogicState {
            flags: vec![false; game_data.flag_isv.keys.len()],
            counters: vec![0; game_data.counter_isv.keys.len()],
            settings,
            helper_cache: vec![],
            recompute_count: 0,
        };
        state.recompute_helpers(game_data);
        state.recompute_count = 0;
        state
    }

    pub fn apply_item(&mut self, game_data: &GameData, item: ItemIdx) {
        match game_data.items[item].effect {
            ItemEffect::Flag(flag) => self.flags[flag] = true,
            ItemEffect::Counter(counter) => {
                self.counters[counter] = self.counters[counter].saturating_add(1)
            }
        }
        self.recompute_helpers(game_data);
    }

    pub fn undo_item(&mut self, game_data: &GameData, item: ItemIdx) {
        match game_data.items[item].effect {
            ItemEffect::Flag(flag) => self.flags[flag] = false,
            ItemEffect::Counter(counter) => {
                self.counters[counter] = self.counters[counter].saturating_sub(1)
            }
        }
        self.recompute_helpers(game_data);
    }

    pub fn has_item(&self, game_data: &GameData, item: ItemIdx) -> bool {
        match game_data.items[item].effect {
            ItemEffect::Flag(flag) => self.flags[flag],
            ItemEffect::Counter(counter) => self.counters[counter] > 0,
        }
    }

    pub fn counter(&self, counter: CounterIdx) -> u8 {
        self.counters[counter]
    }

    /// Re-evaluates every helper, in definition order, for all four age/time combinations.
    /// Helpers only reference earlier helpers, so a single pass is enough.
    pub fn recompute_helpers(&mut self, game_data: &GameData) {
        self.helper_cache.resize(game_data.helpers.len(), [false; 4]);
        for (idx, req) in game_data.helpers.iter().enumerate() {
            let ctx = EvalContext::new_static(game_data, self);
            let values = AgeTime::ALL.map(|at| ctx.eval(req, at));
            self.helper_cache[idx] = values;
        }
        self.recompute_count += 1;
    }

    pub fn helper(&self, helper: HelperIdx, at: AgeTime) -> bool {
        self.helper_cache[helper][at as usize]
    }

    pub fn recompute_count(&self) -> usize {
        self.recompute_count
    }
}

/// Everything a requirement can look at. `events` and `regions` belong to the
/// search in progress; helper evaluation passes them empty.
pub struct EvalContext<'a> {
    pub game_data: &'a GameData,
    pub logic: &'a LogicState,
    pub events: &'a [bool],
    pub regions: &'a [AccessBits],
}

impl<'a> EvalContext<'a> {
    pub fn new_static(game_data: &'a GameData, logic: &'a LogicState) -> Self {
        EvalContext {
            game_data,
            logic,
            events: &[],
            regions: &[],
        }
    }

    pub fn eval(&self, req: &Requirement, at: AgeTime) -> bool {
        if self.logic.settings.no_logic {
            return true;
        }
        self.eval_inner(req, at)
    }

    fn eval_inner(&self, req: &Requirement, at: AgeTime) -> bool {
        let settings = &self.logic.settings;
        match req {
            Requirement::Free => true,
            Requirement::Never => false,
            Requirement::Flag(flag) => self.logic.flags[*flag],
            Requirement::Counter { counter, min } => self.logic.counters[*counter] >= *min,
            Requirement::Event(event) => self.events.get(*event).copied().unwrap_or(false),
            Requirement::Helper(helper) => self.logic.helper(*helper, at),
            Requirement::Setting(setting) => settings.switch(*setting),
            Requirement::OptionIs { setting, value } => settings.option_is(*setting, value),
            Requirement::MasterQuest(dungeon) => settings.mq.get(*dungeon).copied().unwrap_or(false),
            Requirement::CanAfford(price) => helpers::can_afford(self.game_data, self.logic, *price),
            Requirement::IsChild => at.is_child(),
            Requirement::IsAdult => !at.is_child(),
            Requirement::AtDay => at.is_day(),
            Requirement::AtNight => !at.is_day(),
            Requirement::Count { of, min } => {
                let needed = match min {
                    CountMin::Fixed(n) => *n,
                    CountMin::Setting(setting) => settings.number(*setting),
                };
                of.iter().filter(|r| self.eval_inner(r, at)).count() >= needed as usize
            }
            Requirement::Here { region, requires } => {
                // Ages come from the region's current reachability, time from the caller.
                let bits = self.regions.get(*region).copied().unwrap_or_default();
                (bits.child() && self.eval_inner(requires, at.with_age(true)))
                    || (bits.adult() && self.eval_inner(requires, at.with_age(false)))
            }
            Requirement::Not(req) => !self.eval_inner(req, at),
            Requirement::And(reqs) => reqs.iter().all(|r| self.eval_inner(r, at)),
            Requirement::Or(reqs) => reqs.iter().any(|r| self.eval_inner(r, at)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn game_data() -> Result<GameData> {
        let data = json::parse(
            r#"{
            "world": {"root": "Root", "goal": "Done", "filler": "Rupee",
                      "wallet": {"item": "Wallet", "capacities": [99, 200, 500]},
                      "item_pool": {"Bomb Bag": 3, "Wallet": 2}},
            "items": [
                {"name": "Rupee", "kind": "Junk", "get_item_id": 1},
                {"name": "Bomb Bag", "kind": "Equipment", "get_item_id": 2,
                 "advancement": true, "counter": "Bombs"},
                {"name": "Wallet", "kind": "Equipment", "get_item_id": 3,
                 "advancement": true, "counter": "Wallet"},
                {"name": "Fire Arrows", "kind": "Equipment", "get_item_id": 4, "advancement": true},
                {"name": "Dins Fire", "kind": "Equipment", "get_item_id": 5, "advancement": true}
            ],
            "locations": [{"name": "A", "scene": 0, "flag": 0}],
            "dungeons": [],
            "helpers": [
                {"name": "HasExplosives", "requires": "Bombs"},
                {"name": "CanUseFire", "requires": {"or": [
                    {"and": ["is_adult", "Fire Arrows"]}, "Dins Fire"]}},
                {"name": "BlastOrBurn", "requires": {"or": ["HasExplosives", "CanUseFire"]}}
            ],
            "regions": [
                {"name": "Root", "events": [{"event": "Done", "requires": "BlastOrBurn"}],
                 "locations": [{"location": "A"}]}
            ]
        }"#,
        )?;
        GameData::from_json(&data)
    }

    #[test]
    fn access_bits_predicates() {
        let mut bits = AccessBits::NONE;
        assert!(!bits.has_access());
        assert!(bits.insert(AgeTime::NightChild));
        assert!(!bits.insert(AgeTime::NightChild));
        assert!(bits.child() && !bits.adult() && !bits.all_access());
        assert!(!bits.both_ages());
        assert!(bits.union(AccessBits::DAY_ADULT).both_ages());
        let passed = bits.with_time_passing();
        assert_eq!(passed, AccessBits::DAY_CHILD.union(AccessBits::NIGHT_CHILD));
        assert_eq!(
            AccessBits::ALL.iter().collect::<Vec<_>>(),
            AgeTime::ALL.to_vec()
        );
        assert_eq!(AgeTime::DayChild.swap_age(), AgeTime::DayAdult);
    }

    #[test]
    fn counter_apply_and_undo() -> Result<()> {
        let game_data = game_data()?;
        let bomb_bag = game_data.item_isv.index_by_key["Bomb Bag"];
        let ItemEffect::Counter(bombs) = game_data.items[bomb_bag].effect else {
            panic!("bomb bag should use a counter");
        };
        let mut state = LogicState::new(&game_data, SettingsContext::default());
        assert_eq!(state.recompute_count(), 0);

        state.apply_item(&game_data, bomb_bag);
        assert_eq!(state.counter(bombs), 1);
        assert_eq!(state.recompute_count(), 1);
        assert!(state.helper(0, AgeTime::DayChild));

        state.undo_item(&game_data, bomb_bag);
        assert_eq!(state.counter(bombs), 0);
        assert_eq!(state.recompute_count(), 2);
        assert!(!state.helper(0, AgeTime::DayChild));

        state.undo_item(&game_data, bomb_bag);
        assert_eq!(state.counter(bombs), 0);
        Ok(())
    }

    #[test]
    fn recompute_is_idempotent() -> Result<()> {
        let game_data = game_data()?;
        let fire_arrows = game_data.item_isv.index_by_key["Fire Arrows"];
        let mut state = LogicState::new(&game_data, SettingsContext::default());
        state.apply_item(&game_data, fire_arrows);
        let before = state.helper_cache.clone();
        state.recompute_helpers(&game_data);
        assert_eq!(state.helper_cache, before);
        // Fire arrows only count as adult.
        assert!(!state.helper(1, AgeTime::DayChild));
        assert!(state.helper(1, AgeTime::NightAdult));
        assert!(state.helper(2, AgeTime::DayAdult));
        Ok(())
    }

    #[test]
    fn here_uses_region_ages() -> Result<()> {
        let game_data = game_data()?;
        let fire_arrows = game_data.item_isv.index_by_key["Fire Arrows"];
        let mut state = LogicState::new(&game_data, SettingsContext::default());
        state.apply_item(&game_data, fire_arrows);
        let req = Requirement::Here {
            region: 0,
            requires: Box::new(Requirement::Helper(1)),
        };
        let child_only = [AccessBits::DAY_CHILD];
        let ctx = EvalContext {
            game_data: &game_data,
            logic: &state,
            events: &[],
            regions: &child_only,
        };
        assert!(!ctx.eval(&req, AgeTime::DayAdult));
        let with_adult = [AccessBits::NIGHT_ADULT];
        let ctx = EvalContext {
            regions: &with_adult,
            ..ctx
        };
        assert!(ctx.eval(&req, AgeTime::DayChild));
        Ok(())
    }

    #[test]
    fn wallet_capacity_tracks_upgrades() -> Result<()> {
        let game_data = game_data()?;
        let wallet = game_data.item_isv.index_by_key["Wallet"];
        let mut state = LogicState::new(&game_data, SettingsContext::default());
        assert_eq!(helpers::wallet_capacity(&game_data, &state), 99);
        assert!(!helpers::can_afford(&game_data, &state, 150));
        state.apply_item(&game_data, wallet);
        assert!(helpers::can_afford(&game_data, &state, 150));
        state.apply_item(&game_data, wallet);
        state.apply_item(&game_data, wallet);
        assert_eq!(helpers::wallet_capacity(&game_data, &state), 500);
        assert_eq!(helpers::max_wallet_capacity(&game_data), 500);
        Ok(())
    }
}
