use dice_abi::{
    BetDirection,
    RawBetRecord,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// A settled wager as shown to the player and kept in the result cache.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedBetResult {
    pub direction: BetDirection,
    pub prediction_value: u32,
    pub rolled_value: u32,
    /// Scaled by 100: `198` pays 1.98x.
    pub payout_multiplier: u32,
    pub is_winner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_reference: Option<String>,
}

pub fn map_record(record: &RawBetRecord) -> FormattedBetResult {
    FormattedBetResult {
        direction: record.direction(),
        prediction_value: record.prediction_value(),
        rolled_value: record.rolled_value(),
        payout_multiplier: record.payout_multiplier(),
        is_winner: record.is_winner(),
        transaction_reference: None,
    }
}

impl From<&RawBetRecord> for FormattedBetResult {
    fn from(record: &RawBetRecord) -> Self {
        map_record(record)
    }
}

impl FormattedBetResult {
    pub fn with_transaction_reference(mut self, reference: impl Into<String>) -> Self {
        self.transaction_reference = Some(reference.into());
        self
    }

    pub fn multiplier_display(&self) -> String {
        format!(
            "{}.{:02}x",
            self.payout_multiplier / 100,
            self.payout_multiplier % 100
        )
    }
}

impl fmt::Display for FormattedBetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.is_winner { "WIN" } else { "LOSS" };
        write!(
            f,
            "{outcome}: rolled {} betting {} {} at {}",
            self.rolled_value,
            self.direction,
            self.prediction_value,
            self.multiplier_display()
        )?;
        if let Some(reference) = &self.transaction_reference {
            write!(f, " ({reference})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use dice_abi::{
        TypeSchema,
        decode_bets,
        test_helpers::BetFixture,
    };
    use serde_json::json;

    fn record(fixture: BetFixture) -> RawBetRecord {
        let schema = TypeSchema::bundled().unwrap();
        decode_bets(&fixture.encode(), &schema).unwrap()[0]
    }

    #[test]
    fn map_record__copies_every_field() {
        // given
        let raw = record(
            BetFixture::new(BetDirection::Under, 30, 12)
                .with_multiplier(330)
                .winning(true),
        );

        // when
        let result = map_record(&raw);

        // then
        assert_eq!(
            result,
            FormattedBetResult {
                direction: BetDirection::Under,
                prediction_value: 30,
                rolled_value: 12,
                payout_multiplier: 330,
                is_winner: true,
                transaction_reference: None,
            }
        );
    }

    #[test]
    fn map_record__labels_each_direction() {
        let under = map_record(&record(BetFixture::new(BetDirection::Under, 30, 12)));
        let over = map_record(&record(BetFixture::new(BetDirection::Over, 30, 12)));

        assert_eq!(serde_json::to_value(under.direction).unwrap(), json!("under"));
        assert_eq!(serde_json::to_value(over.direction).unwrap(), json!("over"));
    }

    #[test]
    fn serialize__uses_camel_case_and_omits_missing_reference() {
        let result = map_record(&record(BetFixture::new(BetDirection::Over, 50, 72)));

        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(
            json,
            json!({
                "direction": "over",
                "predictionValue": 50,
                "rolledValue": 72,
                "payoutMultiplier": 100,
                "isWinner": false,
            })
        );
    }

    #[test]
    fn display__renders_multiplier_as_decimal() {
        let result = map_record(&record(
            BetFixture::new(BetDirection::Over, 50, 72)
                .with_multiplier(198)
                .winning(true),
        ))
        .with_transaction_reference("https://testnet.kleverscan.org/transaction/abc");

        assert_eq!(result.multiplier_display(), "1.98x");
        assert_eq!(
            result.to_string(),
            "WIN: rolled 72 betting over 50 at 1.98x (https://testnet.kleverscan.org/transaction/abc)"
        );
    }
}
