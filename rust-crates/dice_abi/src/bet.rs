use crate::{
    codec::{
        self,
        AbiValue,
        DecodeError,
        DecodedStruct,
    },
    schema::{
        BET_STRUCT,
        BET_TYPE_ENUM,
        TypeSchema,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    ops::RangeInclusive,
    str::FromStr,
};

pub const FIELD_BET_TYPE: &str = "bet_type";
pub const FIELD_BET_VALUE: &str = "bet_value";
pub const FIELD_DICE_VALUE: &str = "dice_value";
pub const FIELD_MULTIPLIER: &str = "multiplier";
pub const FIELD_IS_WINNER: &str = "is_winner";

const UNDER_PREDICTIONS: RangeInclusive<u32> = 1..=94;
const OVER_PREDICTIONS: RangeInclusive<u32> = 5..=98;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetDirection {
    Under,
    Over,
}

impl BetDirection {
    pub fn discriminant(self) -> u8 {
        match self {
            BetDirection::Under => 0,
            BetDirection::Over => 1,
        }
    }

    pub fn from_discriminant(discriminant: u64) -> Option<Self> {
        match discriminant {
            0 => Some(BetDirection::Under),
            1 => Some(BetDirection::Over),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BetDirection::Under => "under",
            BetDirection::Over => "over",
        }
    }

    /// Predictions the game accepts for this direction.
    pub fn prediction_bounds(self) -> RangeInclusive<u32> {
        match self {
            BetDirection::Under => UNDER_PREDICTIONS,
            BetDirection::Over => OVER_PREDICTIONS,
        }
    }

    pub fn clamp_prediction(self, prediction: u32) -> u32 {
        let bounds = self.prediction_bounds();
        prediction.clamp(*bounds.start(), *bounds.end())
    }
}

impl fmt::Display for BetDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for BetDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "under" => Ok(BetDirection::Under),
            "over" => Ok(BetDirection::Over),
            other => Err(format!("unknown bet direction '{other}'")),
        }
    }
}

/// A `Bet` record as returned by the contract.
///
/// Only the decode path builds these, so a value in hand always carries a
/// declared direction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawBetRecord {
    direction: BetDirection,
    prediction_value: u32,
    rolled_value: u32,
    payout_multiplier: u32,
    is_winner: bool,
}

impl RawBetRecord {
    pub fn direction(&self) -> BetDirection {
        self.direction
    }

    pub fn prediction_value(&self) -> u32 {
        self.prediction_value
    }

    pub fn rolled_value(&self) -> u32 {
        self.rolled_value
    }

    /// Fixed point, scaled by 100.
    pub fn payout_multiplier(&self) -> u32 {
        self.payout_multiplier
    }

    pub fn is_winner(&self) -> bool {
        self.is_winner
    }

    pub fn from_decoded(
        decoded: &DecodedStruct,
        schema: &TypeSchema,
    ) -> Result<Self, DecodeError> {
        let bet_type = u64::from(u32_field(decoded, FIELD_BET_TYPE)?);
        let direction = schema
            .declares_discriminant(BET_TYPE_ENUM, bet_type)
            .then(|| BetDirection::from_discriminant(bet_type))
            .flatten()
            .ok_or_else(|| DecodeError::UnknownDiscriminant {
                enum_name: BET_TYPE_ENUM.to_string(),
                discriminant: bet_type,
            })?;
        let is_winner = match decoded.field(FIELD_IS_WINNER)? {
            AbiValue::Bool(b) => *b,
            other => {
                return Err(DecodeError::UnexpectedValue {
                    field: FIELD_IS_WINNER.to_string(),
                    value: other.clone(),
                    expected: "bool",
                });
            }
        };
        Ok(Self {
            direction,
            prediction_value: u32_field(decoded, FIELD_BET_VALUE)?,
            rolled_value: u32_field(decoded, FIELD_DICE_VALUE)?,
            payout_multiplier: u32_field(decoded, FIELD_MULTIPLIER)?,
            is_winner,
        })
    }
}

fn u32_field(decoded: &DecodedStruct, name: &str) -> Result<u32, DecodeError> {
    match decoded.field(name)? {
        AbiValue::Int(n) => {
            u32::try_from(*n).map_err(|_| DecodeError::UnexpectedValue {
                field: name.to_string(),
                value: AbiValue::Int(*n),
                expected: "u32",
            })
        }
        other => Err(DecodeError::UnexpectedValue {
            field: name.to_string(),
            value: other.clone(),
            expected: "u32",
        }),
    }
}

/// Decodes a `Bet` list payload into typed records.
pub fn decode_bets(
    bytes: &[u8],
    schema: &TypeSchema,
) -> Result<Vec<RawBetRecord>, DecodeError> {
    codec::decode_struct_list(bytes, BET_STRUCT, schema)?
        .iter()
        .map(|decoded| RawBetRecord::from_decoded(decoded, schema))
        .collect()
}
