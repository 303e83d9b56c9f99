use crate::{AgeTime, EvalContext, LogicState};
use oot3drando_game::{GameData, ItemIdx, Price};

pub fn wallet_capacity(game_data: &GameData, logic: &LogicState) -> Price {
    match &game_data.wallet {
        Some(wallet) => wallet.capacity(logic.counter(wallet.counter)),
        None => Price::MAX,
    }
}

pub fn max_wallet_capacity(game_data: &GameData) -> Price {
    match &game_data.wallet {
        Some(wallet) => wallet.max_capacity(),
        None => Price::MAX,
    }
}

pub fn can_afford(game_data: &GameData, logic: &LogicState, price: Price) -> bool {
    price <= wallet_capacity(game_data, logic)
}

/// A priced slot can be bought if the wallet covers the price and whatever the
/// placed item needs for purchase (e.g. an empty bottle) is available.
pub fn can_buy(ctx: &EvalContext, item: Option<ItemIdx>, price: Price, at: AgeTime) -> bool {
    if ctx.logic.settings.no_logic {
        return true;
    }
    if !can_afford(ctx.game_data, ctx.logic, price) {
        return false;
    }
    match item {
        Some(item) => ctx.eval(&ctx.game_data.items[item].buy_requires, at),
        None => true,
    }
}
