use anyhow::Result;
use hashbrown::HashMap;
use oot3drando_game::{Category, GameData, Price};
use oot3drando_logic::{helpers, SettingValue, SettingsContext};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::VariantNames;
use strum_macros::{Display, EnumString, VariantNames};

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
#[serde(default)]
pub struct RandomizerSettings {
    pub name: Option<String>,
    pub world: WorldSettings,
    pub shuffle: ShuffleSettings,
    pub dungeon_items: DungeonItemSettings,
    pub logic: LogicSettings,
    // Overrides of the world's default pool counts, by item name.
    pub item_pool: HashMap<String, usize>,
    pub item_pool_value: ItemPoolValue,
    pub ice_traps: IceTrapValue,
    pub starting_items: HashMap<String, usize>,
    pub excluded_locations: Vec<String>,
    pub generation: GenerationSettings,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct WorldSettings {
    pub open_forest: OpenForest,
    pub open_kakariko: bool,
    pub open_door_of_time: bool,
    pub zoras_fountain_open: bool,
    pub gerudo_fortress: GerudoFortress,
    pub bridge: BridgeCondition,
    pub bridge_count: u8,
    pub ganons_trials: GanonsTrials,
    pub trial_count: u8,
    pub starting_age: StartingAgeSetting,
    pub starting_time: StartingTime,
    pub mq_dungeons: MqDungeons,
    pub mq_dungeon_count: u8,
}

impl Default for WorldSettings {
    fn default() -> Self {
        WorldSettings {
            open_forest: OpenForest::Closed,
            open_kakariko: false,
            open_door_of_time: false,
            zoras_fountain_open: false,
            gerudo_fortress: GerudoFortress::Normal,
            bridge: BridgeCondition::Medallions,
            bridge_count: 1,
            ganons_trials: GanonsTrials::Skip,
            trial_count: 0,
            starting_age: StartingAgeSetting::Child,
            starting_time: StartingTime::Day,
            mq_dungeons: MqDungeons::None,
            mq_dungeon_count: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct ShuffleSettings {
    pub rewards: RewardShuffle,
    pub links_pocket: LinksPocket,
    pub songs: SongShuffle,
    pub shopsanity: bool,
    pub tokensanity: Tokensanity,
    pub scrubsanity: Scrubsanity,
    pub cows: bool,
    pub kokiri_sword: bool,
    pub ocarinas: bool,
    pub weird_egg: bool,
    pub gerudo_token: bool,
    pub magic_beans: bool,
}

impl Default for ShuffleSettings {
    fn default() -> Self {
        ShuffleSettings {
            rewards: RewardShuffle::EndOfDungeon,
            links_pocket: LinksPocket::DungeonReward,
            songs: SongShuffle::SongLocations,
            shopsanity: false,
            tokensanity: Tokensanity::Off,
            scrubsanity: Scrubsanity::Off,
            cows: false,
            kokiri_sword: true,
            ocarinas: true,
            weird_egg: true,
            gerudo_token: false,
            magic_beans: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct DungeonItemSettings {
    pub maps_and_compasses: DungeonItemShuffle,
    pub small_keys: DungeonItemShuffle,
    pub boss_keys: DungeonItemShuffle,
    pub ganons_boss_key: DungeonItemShuffle,
    pub gerudo_keys: GerudoKeys,
}

impl Default for DungeonItemSettings {
    fn default() -> Self {
        DungeonItemSettings {
            maps_and_compasses: DungeonItemShuffle::OwnDungeon,
            small_keys: DungeonItemShuffle::OwnDungeon,
            boss_keys: DungeonItemShuffle::OwnDungeon,
            ganons_boss_key: DungeonItemShuffle::OwnDungeon,
            gerudo_keys: GerudoKeys::Vanilla,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
#[serde(default)]
pub struct LogicSettings {
    pub rules: LogicRules,
    // Enabled tricks, by the setting name the logic uses for them.
    pub tricks: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct GenerationSettings {
    pub max_attempts: usize,
    // Redraw per-seed selections (master quest, age, trials, prices) on each retry.
    pub reseed_on_retry: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationSettings {
            max_attempts: 50,
            reseed_on_retry: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Display, EnumString)]
pub enum OpenForest {
    Open,
    ClosedDeku,
    Closed,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Display, EnumString)]
pub enum GerudoFortress {
    Normal,
    Fast,
    Open,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Display, EnumString)]
pub enum BridgeCondition {
    Open,
    Vanilla,
    Stones,
    Medallions,
    Rewards,
    Tokens,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum GanonsTrials {
    Skip,
    // `trial_count` trials are required.
    Count,
    Random,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum StartingAgeSetting {
    Child,
    Adult,
    Random,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum StartingAge {
    Child,
    Adult,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum StartingTime {
    Day,
    Night,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum MqDungeons {
    None,
    All,
    // `mq_dungeon_count` dungeons, chosen at random.
    Count,
    Random,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum RewardShuffle {
    EndOfDungeon,
    Anywhere,
}

// What Link starts the game holding in his pocket.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum LinksPocket {
    DungeonReward,
    Advancement,
    Anything,
    Nothing,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum SongShuffle {
    Vanilla,
    SongLocations,
    Anywhere,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum Tokensanity {
    Off,
    Dungeons,
    Overworld,
    AllTokens,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum Scrubsanity {
    Off,
    // Every scrub sells for 10 rupees.
    Affordable,
    // Scrubs keep their listed prices.
    Expensive,
    RandomPrices,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum GerudoKeys {
    Vanilla,
    AnyDungeon,
    Overworld,
    Anywhere,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default, Display)]
pub enum ItemPoolValue {
    Plentiful,
    #[default]
    Balanced,
    Scarce,
    Minimal,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum IceTrapValue {
    Off,
    #[default]
    Normal,
    Extra,
    Mayhem,
    Onslaught,
}

impl IceTrapValue {
    /// How many of `junk` regular junk items turn into ice traps.
    pub fn extra_traps(self, junk: usize) -> usize {
        match self {
            IceTrapValue::Off | IceTrapValue::Normal => 0,
            IceTrapValue::Extra => junk / 4,
            IceTrapValue::Mayhem => junk / 2,
            IceTrapValue::Onslaught => junk,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum DungeonItemShuffle {
    StartWith,
    Vanilla,
    OwnDungeon,
    Anywhere,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LogicRules {
    #[default]
    Glitchless,
    NoLogic,
}

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Display,
    EnumString,
    VariantNames,
)]
pub enum Trial {
    Forest,
    Fire,
    Water,
    Spirit,
    Shadow,
    Light,
}

pub const ALL_TRIALS: [Trial; 6] = [
    Trial::Forest,
    Trial::Fire,
    Trial::Water,
    Trial::Spirit,
    Trial::Shadow,
    Trial::Light,
];

/// Per-seed choices drawn before item placement.
#[derive(Clone, Debug, PartialEq)]
pub struct SeedSelections {
    pub mq: Vec<bool>,
    pub starting_age: StartingAge,
    pub skipped_trials: Vec<Trial>,
    // Prices replacing a slot's listed price (shopsanity and scrub settings), by location.
    pub prices: Vec<Option<Price>>,
}

impl ShuffleSettings {
    /// Whether a location with this category keeps its vanilla item.
    pub fn keeps_vanilla(&self, category: Category, in_dungeon: bool) -> bool {
        match category {
            Category::Song => self.songs == SongShuffle::Vanilla,
            Category::Shop => !self.shopsanity,
            Category::Skulltula => match self.tokensanity {
                Tokensanity::Off => true,
                Tokensanity::Dungeons => !in_dungeon,
                Tokensanity::Overworld => in_dungeon,
                Tokensanity::AllTokens => false,
            },
            Category::DekuScrub => self.scrubsanity == Scrubsanity::Off,
            Category::Cow => !self.cows,
            Category::KokiriSword => !self.kokiri_sword,
            Category::Ocarina => !self.ocarinas,
            Category::WeirdEgg => !self.weird_egg,
            Category::GerudoToken => !self.gerudo_token,
            Category::MagicBean => !self.magic_beans,
            // Dungeon items and rewards are handled by their own placement rules.
            Category::VanillaMap
            | Category::VanillaCompass
            | Category::VanillaSmallKey
            | Category::VanillaBossKey
            | Category::VanillaGerudoKey
            | Category::DungeonReward => false,
        }
    }
}

// Random prices are drawn in steps of 5 rupees from 0 to 300, capped by the largest wallet.
fn random_shop_price<R: Rng>(rng: &mut R, max_capacity: Price) -> Price {
    let max = std::cmp::min(300, max_capacity);
    rng.gen_range(0..=max / 5) * 5
}

pub fn draw_selections<R: Rng>(
    settings: &RandomizerSettings,
    game_data: &GameData,
    rng: &mut R,
) -> SeedSelections {
    let world = &settings.world;

    // Only dungeons that actually have a master quest layout can be selected.
    let mq_capable: Vec<usize> = game_data
        .dungeons
        .iter()
        .enumerate()
        .filter(|(_, d)| !d.mq_locations.is_empty())
        .map(|(i, _)| i)
        .collect();
    let mut mq = vec![false; game_data.dungeons.len()];
    match world.mq_dungeons {
        MqDungeons::None => {}
        MqDungeons::All => {
            for &d in &mq_capable {
                mq[d] = true;
            }
        }
        MqDungeons::Count => {
            let mut order = mq_capable.clone();
            order.shuffle(rng);
            for &d in order.iter().take(world.mq_dungeon_count as usize) {
                mq[d] = true;
            }
        }
        MqDungeons::Random => {
            for &d in &mq_capable {
                mq[d] = rng.gen_bool(0.5);
            }
        }
    }

    let starting_age = match world.starting_age {
        StartingAgeSetting::Child => StartingAge::Child,
        StartingAgeSetting::Adult => StartingAge::Adult,
        StartingAgeSetting::Random => {
            if rng.gen_bool(0.5) {
                StartingAge::Child
            } else {
                StartingAge::Adult
            }
        }
    };

    let required_trials = match world.ganons_trials {
        GanonsTrials::Skip => 0,
        GanonsTrials::Count => std::cmp::min(world.trial_count as usize, ALL_TRIALS.len()),
        GanonsTrials::Random => rng.gen_range(0..=ALL_TRIALS.len()),
    };
    let mut trials = ALL_TRIALS.to_vec();
    trials.shuffle(rng);
    let mut skipped_trials: Vec<Trial> = trials[required_trials..].to_vec();
    skipped_trials.sort();

    let max_capacity = helpers::max_wallet_capacity(game_data);
    let prices = game_data
        .locations
        .iter()
        .map(|loc| {
            if settings.shuffle.shopsanity && loc.has_category(Category::Shop) {
                return Some(random_shop_price(rng, max_capacity));
            }
            if !loc.has_category(Category::DekuScrub) {
                return None;
            }
            match settings.shuffle.scrubsanity {
                Scrubsanity::Affordable => Some(10),
                Scrubsanity::RandomPrices => Some(random_shop_price(rng, max_capacity)),
                Scrubsanity::Off | Scrubsanity::Expensive => None,
            }
        })
        .collect();

    SeedSelections {
        mq,
        starting_age,
        skipped_trials,
        prices,
    }
}

/// Resolves the settings into the named values the logic refers to. Names
/// not produced here are tricks: on if listed in `logic.tricks`, off otherwise.
pub fn build_settings_context(
    settings: &RandomizerSettings,
    game_data: &GameData,
    selections: &SeedSelections,
) -> SettingsContext {
    let world = &settings.world;
    let shuffle = &settings.shuffle;
    let mut named: HashMap<String, SettingValue> = HashMap::new();
    let mut set = |name: &str, value: SettingValue| {
        named.insert(name.to_string(), value);
    };
    set("OpenForest", SettingValue::Option(world.open_forest.to_string()));
    set("OpenKakariko", SettingValue::Switch(world.open_kakariko));
    set("OpenDoorOfTime", SettingValue::Switch(world.open_door_of_time));
    set("ZorasFountainOpen", SettingValue::Switch(world.zoras_fountain_open));
    set(
        "GerudoFortress",
        SettingValue::Option(world.gerudo_fortress.to_string()),
    );
    set("Bridge", SettingValue::Option(world.bridge.to_string()));
    set("BridgeCount", SettingValue::Number(world.bridge_count));
    set(
        "StartingAge",
        SettingValue::Option(selections.starting_age.to_string()),
    );
    set(
        "StartingTime",
        SettingValue::Option(world.starting_time.to_string()),
    );
    set("Shopsanity", SettingValue::Switch(shuffle.shopsanity));
    set(
        "Tokensanity",
        SettingValue::Option(shuffle.tokensanity.to_string()),
    );
    set(
        "Scrubsanity",
        SettingValue::Option(shuffle.scrubsanity.to_string()),
    );
    set(
        "GerudoKeys",
        SettingValue::Option(settings.dungeon_items.gerudo_keys.to_string()),
    );
    set(
        "ItemPoolValue",
        SettingValue::Option(settings.item_pool_value.to_string()),
    );
    set("ShuffleCows", SettingValue::Switch(shuffle.cows));
    set("ShuffleMagicBeans", SettingValue::Switch(shuffle.magic_beans));
    let required = ALL_TRIALS.len() - selections.skipped_trials.len();
    set("RequiredTrialCount", SettingValue::Number(required as u8));
    for (trial, name) in ALL_TRIALS.iter().zip(Trial::VARIANTS) {
        set(
            &format!("{name}TrialSkip"),
            SettingValue::Switch(selections.skipped_trials.contains(trial)),
        );
    }

    let values = game_data
        .setting_isv
        .keys
        .iter()
        .map(|name| match named.get(name) {
            Some(value) => value.clone(),
            None => SettingValue::Switch(settings.logic.tricks.contains(name)),
        })
        .collect();
    SettingsContext {
        values,
        mq: selections.mq.clone(),
        no_logic: settings.logic.rules == LogicRules::NoLogic,
    }
}

pub fn parse_randomizer_settings(settings_json: &str) -> Result<RandomizerSettings> {
    let mut des = serde_json::Deserializer::from_str(settings_json);
    let settings = serde_path_to_error::deserialize(&mut des)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn partial_settings_use_defaults() -> Result<()> {
        let settings = parse_randomizer_settings(
            r#"{"world": {"ganons_trials": "Count", "trial_count": 2},
                "logic": {"tricks": ["LogicGrottosWithoutAgony"]}}"#,
        )?;
        assert_eq!(settings.world.trial_count, 2);
        assert_eq!(settings.world.open_forest, OpenForest::Closed);
        assert_eq!(settings.generation.max_attempts, 50);
        assert_eq!(settings.logic.tricks, vec!["LogicGrottosWithoutAgony"]);
        Ok(())
    }

    #[test]
    fn bad_settings_report_path() {
        let err = parse_randomizer_settings(r#"{"world": {"bridge": "Rainbow"}}"#)
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("world.bridge"), "{err}");
    }

    #[test]
    fn trial_count_selects_skips() {
        let mut settings = RandomizerSettings::default();
        settings.world.ganons_trials = GanonsTrials::Count;
        settings.world.trial_count = 2;
        let game_data = GameData::default();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let selections = draw_selections(&settings, &game_data, &mut rng);
        assert_eq!(selections.skipped_trials.len(), 4);
        assert!(selections.mq.is_empty());
    }

    #[test]
    fn vanilla_tokens_by_area() {
        let shuffle = ShuffleSettings {
            tokensanity: Tokensanity::Dungeons,
            ..ShuffleSettings::default()
        };
        assert!(shuffle.keeps_vanilla(Category::Skulltula, false));
        assert!(!shuffle.keeps_vanilla(Category::Skulltula, true));
        assert!(!shuffle.keeps_vanilla(Category::VanillaMap, true));
    }

    #[test]
    fn scrubs_keep_vanilla_only_when_off() {
        let mut shuffle = ShuffleSettings::default();
        assert!(shuffle.keeps_vanilla(Category::DekuScrub, false));
        shuffle.scrubsanity = Scrubsanity::Expensive;
        assert!(!shuffle.keeps_vanilla(Category::DekuScrub, false));
    }

    #[test]
    fn ice_trap_share_of_junk() {
        assert_eq!(IceTrapValue::Off.extra_traps(12), 0);
        assert_eq!(IceTrapValue::Normal.extra_traps(12), 0);
        assert_eq!(IceTrapValue::Extra.extra_traps(12), 3);
        assert_eq!(IceTrapValue::Mayhem.extra_traps(12), 6);
        assert_eq!(IceTrapValue::Onslaught.extra_traps(12), 12);
    }

    #[test]
    fn random_prices_fit_the_wallet() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let price = random_shop_price(&mut rng, 99);
            assert!(price <= 95 && price % 5 == 0, "{price}");
        }
    }
}
