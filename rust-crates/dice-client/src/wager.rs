use crate::{
    bet_result::{
        FormattedBetResult,
        map_record,
    },
    indexer_client::{
        ConfirmationTimeoutError,
        ConfirmedTransaction,
        PollPolicy,
        ResolvedTransaction,
        TransactionBodyError,
        TransactionSource,
        confirm_all,
    },
    result_cache::{
        KeyValueStore,
        ResultCache,
    },
    wallet::{
        ContractCall,
        SignerError,
        Wallet,
    },
};
use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use dice_abi::{
    AbiValue,
    BetDirection,
    DecodeError,
    EncodeError,
    Primitive,
    TypeSchema,
    codec,
    decode_bets,
    schema::BET_STRUCT,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{
    debug,
    info,
    warn,
};

pub const BET_FUNCTION: &str = "bet";
pub const RETURN_DATA_IDENTIFIER: &str = "ReturnData";
pub const STAKE_ASSET: &str = "KLV";
/// KLV has six decimals.
pub const BASE_UNITS_PER_COIN: f64 = 1_000_000.0;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("no account connected; connect a wallet first")]
    MissingAccount,
    #[error("stake must be a positive amount, got {0}")]
    InvalidStake(f64),
}

#[derive(Debug, Error)]
pub enum WagerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to encode bet call: {0}")]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error(transparent)]
    ConfirmationTimeout(#[from] ConfirmationTimeoutError),
    #[error("transaction {transaction_id} was resolved but is unreadable: {source}")]
    UnreadableTransaction {
        transaction_id: String,
        #[source]
        source: TransactionBodyError,
    },
    #[error("transaction {transaction_id} has no ReturnData event")]
    MissingReturnData { transaction_id: String },
    #[error("failed to decode bet result: {0}")]
    Decode(#[from] DecodeError),
}

impl WagerError {
    /// True once the transaction has been broadcast. The stake may have been
    /// taken even though no result is available.
    pub fn outcome_may_be_committed(&self) -> bool {
        matches!(
            self,
            WagerError::ConfirmationTimeout(_)
                | WagerError::UnreadableTransaction { .. }
                | WagerError::MissingReturnData { .. }
                | WagerError::Decode(_)
        )
    }
}

#[derive(Clone, Debug)]
pub struct WagerConfig {
    pub contract_address: String,
    pub explorer_url: String,
    pub poll: PollPolicy,
}

impl WagerConfig {
    pub fn transaction_link(&self, transaction_id: &str) -> String {
        format!(
            "{}/transaction/{}",
            self.explorer_url.trim_end_matches('/'),
            transaction_id
        )
    }
}

/// Converts a stake in whole coins to base units, rounding to the nearest unit.
pub fn stake_to_base_units(stake: f64) -> Result<u64, ValidationError> {
    if !stake.is_finite() || stake <= 0.0 {
        return Err(ValidationError::InvalidStake(stake));
    }
    let units = (stake * BASE_UNITS_PER_COIN).round();
    if units < 1.0 || units >= u64::MAX as f64 {
        return Err(ValidationError::InvalidStake(stake));
    }
    Ok(units as u64)
}

/// Base64 call data for `bet@<direction>@<prediction>`.
pub fn encode_bet_call(
    direction: BetDirection,
    prediction: u32,
) -> Result<String, EncodeError> {
    let args = [
        codec::encode_value(
            &AbiValue::from(i32::from(direction.discriminant())),
            Primitive::I32,
            false,
        )?,
        codec::encode_value(&AbiValue::from(prediction), Primitive::U32, false)?,
    ];
    Ok(STANDARD.encode(codec::encode_call(BET_FUNCTION, &args)))
}

/// The bet payload of a confirmed transaction. The last `ReturnData` event
/// wins; one without data counts as missing.
pub fn return_data(transaction: &ConfirmedTransaction) -> Option<&str> {
    transaction
        .events()
        .iter()
        .rfind(|event| event.identifier == RETURN_DATA_IDENTIFIER)
        .and_then(|event| event.data.first())
        .map(String::as_str)
        .filter(|data| !data.trim().is_empty())
}

/// Places wagers and remembers their outcome.
pub struct WagerClient<W, I, S> {
    wallet: W,
    indexer: I,
    cache: ResultCache<S>,
    schema: Arc<TypeSchema>,
    config: WagerConfig,
}

impl<W, I, S> WagerClient<W, I, S>
where
    W: Wallet,
    I: TransactionSource,
    S: KeyValueStore,
{
    pub fn new(
        wallet: W,
        indexer: I,
        cache: ResultCache<S>,
        schema: Arc<TypeSchema>,
        config: WagerConfig,
    ) -> Self {
        Self {
            wallet,
            indexer,
            cache,
            schema,
            config,
        }
    }

    pub fn config(&self) -> &WagerConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache<S> {
        &self.cache
    }

    pub fn last_result(&self, account: &str) -> Option<FormattedBetResult> {
        self.cache.load(account.trim())
    }

    pub async fn submit_wager(
        &self,
        account: &str,
        direction: BetDirection,
        prediction: u32,
        stake: f64,
    ) -> Result<FormattedBetResult, WagerError> {
        let account = account.trim();
        if account.is_empty() {
            return Err(ValidationError::MissingAccount.into());
        }
        let amount = stake_to_base_units(stake)?;
        let call_data = encode_bet_call(direction, prediction)?;
        debug!(%call_data, "encoded bet call");
        info!(%account, %direction, prediction, amount, "submitting wager");

        let call = ContractCall::invoke(&self.config.contract_address, STAKE_ASSET, amount);
        let unsigned = self.wallet.build_transaction(&[call], &[call_data]).await?;
        let signed = self.wallet.sign_transaction(unsigned).await?;
        let receipt = self.wallet.broadcast_transactions(&[signed]).await?;
        let ids = receipt.transaction_ids();
        let Some(broadcast_id) = ids.first() else {
            return Err(SignerError::Malformed(
                "broadcast returned no transaction hashes".to_string(),
            )
            .into());
        };
        info!(tx = %broadcast_id, "wager broadcast");

        let resolved = confirm_all(&self.indexer, ids, self.config.poll).await?;
        let transaction = resolved
            .first()
            .map(ResolvedTransaction::transaction)
            .transpose()
            .map_err(|source| WagerError::UnreadableTransaction {
                transaction_id: broadcast_id.clone(),
                source,
            })?;
        let transaction_id = transaction
            .as_ref()
            .map(|tx| tx.hash.as_str())
            .filter(|hash| !hash.is_empty())
            .unwrap_or(broadcast_id.as_str());
        let payload = transaction.as_ref().and_then(return_data).ok_or_else(|| {
            WagerError::MissingReturnData {
                transaction_id: transaction_id.to_string(),
            }
        })?;

        let bytes = codec::decode_hex(payload)?;
        let bets = decode_bets(&bytes, &self.schema)?;
        let bet = bets
            .first()
            .ok_or_else(|| DecodeError::Empty(BET_STRUCT.to_string()))?;
        let result = map_record(bet)
            .with_transaction_reference(self.config.transaction_link(transaction_id));
        info!(
            tx = %transaction_id,
            rolled = result.rolled_value,
            winner = result.is_winner,
            "wager settled"
        );

        if let Err(e) = self.cache.save(account, &result) {
            warn!(%account, error = %e, "failed to cache bet result");
        }
        Ok(result)
    }
}
