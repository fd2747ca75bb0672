use color_eyre::eyre::{
    self,
    WrapErr,
};
use futures::future::try_join_all;
use reqwest::StatusCode;
use serde::{
    Deserialize,
    Deserializer,
};
use serde_json::{
    Value,
    json,
};
use std::{
    fmt,
    future::Future,
    time::Duration,
};
use thiserror::Error;
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// How long to keep asking the indexer about a transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct LoggedEvent {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct TransactionLogs {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub events: Vec<LoggedEvent>,
}

/// The parts of an indexed transaction the client reads.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct ConfirmedTransaction {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub logs: Option<TransactionLogs>,
}

impl ConfirmedTransaction {
    pub fn events(&self) -> &[LoggedEvent] {
        self.logs
            .as_ref()
            .map(|logs| logs.events.as_slice())
            .unwrap_or_default()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The `data` of an indexer answer that reported no error.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTransaction {
    pub data: Value,
}

#[derive(Debug, Error)]
pub enum TransactionBodyError {
    #[error("indexer data has no `transaction` object")]
    MissingTransaction,
    #[error("indexer transaction is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ResolvedTransaction {
    /// Parses `data.transaction`.
    pub fn transaction(&self) -> Result<ConfirmedTransaction, TransactionBodyError> {
        let tx = self
            .data
            .get("transaction")
            .filter(|tx| tx.is_object())
            .ok_or(TransactionBodyError::MissingTransaction)?;
        Ok(ConfirmedTransaction::deserialize(tx)?)
    }
}

/// One indexer answer, already classified.
#[derive(Clone, Debug, PartialEq)]
pub enum TransactionLookup {
    Resolved(ResolvedTransaction),
    /// Not indexed yet. Carries the raw body for diagnostics.
    Pending(Value),
}

impl TransactionLookup {
    /// Classifies a `/transaction/{hash}` response body.
    ///
    /// A body whose `error` is absent, null or empty is resolved, whatever
    /// its `data` holds. Everything else is still pending.
    pub fn from_body(mut body: Value) -> Self {
        if reports_error(&body) {
            return TransactionLookup::Pending(body);
        }
        let data = body
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null);
        TransactionLookup::Resolved(ResolvedTransaction { data })
    }
}

fn reports_error(body: &Value) -> bool {
    match body.get("error") {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(Value::Bool(flag)) => *flag,
        Some(_) => true,
    }
}

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("indexer request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("indexer returned a non-JSON body (status {status}): {body}")]
    InvalidBody { status: u16, body: String },
}

/// Somewhere transactions can be looked up by id.
pub trait TransactionSource {
    fn fetch_transaction(
        &self,
        transaction_id: &str,
    ) -> impl Future<Output = Result<TransactionLookup, IndexerError>>;
}

#[derive(Clone)]
pub struct IndexerClient {
    base_url: String,
    http: reqwest::Client,
}

impl fmt::Debug for IndexerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexerClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl IndexerClient {
    pub fn new(base_url: impl Into<String>) -> eyre::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for indexer")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl TransactionSource for IndexerClient {
    async fn fetch_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionLookup, IndexerError> {
        let url = format!(
            "{}/transaction/{}?withResults=true",
            self.base_url, transaction_id
        );
        let res = self.http.get(url).send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => Ok(TransactionLookup::from_body(body)),
            // The indexer answers 404 with plain text while a hash is unknown.
            Err(_) if status == StatusCode::NOT_FOUND => {
                Ok(TransactionLookup::Pending(json!({
                    "error": String::from_utf8_lossy(&bytes),
                    "status": status.as_u16(),
                })))
            }
            Err(_) => Err(IndexerError::InvalidBody {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error(
    "transaction {transaction_id} was not confirmed after {attempts} attempts (last response: {last_error})"
)]
pub struct ConfirmationTimeoutError {
    pub transaction_id: String,
    pub attempts: u32,
    pub last_error: Value,
}

/// Waits for every id to be resolved, polling them concurrently.
///
/// Results come back in input order. The first id to run out of attempts
/// fails the whole call and the remaining polls are dropped.
pub async fn confirm_all<S: TransactionSource>(
    source: &S,
    transaction_ids: &[String],
    policy: PollPolicy,
) -> Result<Vec<ResolvedTransaction>, ConfirmationTimeoutError> {
    try_join_all(
        transaction_ids
            .iter()
            .map(|id| confirm_one(source, id, policy)),
    )
    .await
}

pub async fn confirm_one<S: TransactionSource>(
    source: &S,
    transaction_id: &str,
    policy: PollPolicy,
) -> Result<ResolvedTransaction, ConfirmationTimeoutError> {
    let mut last_error = Value::Null;
    for attempt in 1..=policy.max_attempts {
        match source.fetch_transaction(transaction_id).await {
            Ok(TransactionLookup::Resolved(resolved)) => {
                info!(tx = %transaction_id, attempt, "transaction resolved");
                return Ok(resolved);
            }
            Ok(TransactionLookup::Pending(body)) => {
                debug!(tx = %transaction_id, attempt, "transaction not indexed yet");
                last_error = body;
            }
            Err(e) => {
                warn!(tx = %transaction_id, attempt, error = %e, "indexer lookup failed");
                last_error = json!({ "error": e.to_string() });
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    warn!(
        tx = %transaction_id,
        attempts = policy.max_attempts,
        "giving up on transaction confirmation"
    );
    Err(ConfirmationTimeoutError {
        transaction_id: transaction_id.to_string(),
        attempts: policy.max_attempts,
        last_error,
    })
}
