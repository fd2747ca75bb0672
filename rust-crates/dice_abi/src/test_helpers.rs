use crate::{
    bet::BetDirection,
    codec::encode_struct,
    schema::{
        BET_STRUCT,
        TypeSchema,
    },
};

/// Fields of a `Bet` as the contract would emit them. `bet_type` is the raw
/// discriminant so tests can produce undeclared values.
#[derive(Clone, Copy, Debug)]
pub struct BetFixture {
    pub bet_type: u32,
    pub bet_value: u32,
    pub dice_value: u32,
    pub multiplier: u32,
    pub is_winner: bool,
}

impl BetFixture {
    pub fn new(direction: BetDirection, bet_value: u32, dice_value: u32) -> Self {
        Self {
            bet_type: direction.discriminant().into(),
            bet_value,
            dice_value,
            multiplier: 100,
            is_winner: false,
        }
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn winning(mut self, is_winner: bool) -> Self {
        self.is_winner = is_winner;
        self
    }

    pub fn with_bet_type(mut self, bet_type: u32) -> Self {
        self.bet_type = bet_type;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let schema = TypeSchema::bundled().expect("bundled ABI parses");
        encode_struct(
            &[
                self.bet_type.into(),
                self.bet_value.into(),
                self.dice_value.into(),
                self.multiplier.into(),
                self.is_winner.into(),
            ],
            BET_STRUCT,
            &schema,
        )
        .expect("fixture matches the Bet layout")
    }

    /// Hex text as carried in a `ReturnData` event.
    pub fn return_data(&self) -> String {
        hex::encode(self.encode())
    }
}
