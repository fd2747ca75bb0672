use color_eyre::eyre::{
    self,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use serde_json::{
    Value,
    json,
};
use std::{
    collections::BTreeMap,
    fmt,
    future::Future,
};
use thiserror::Error;
use tracing::debug;

/// Klever `TransactionType.SmartContract`.
pub const SMART_CONTRACT_TX_TYPE: u32 = 63;
/// `scType` for invoking an already deployed contract.
pub const SC_INVOKE: u32 = 0;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartContractPayload {
    pub address: String,
    pub sc_type: u32,
    pub call_value: BTreeMap<String, u64>,
}

/// One contract of a transaction to be built.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContractCall {
    #[serde(rename = "type")]
    pub tx_type: u32,
    pub payload: SmartContractPayload,
}

impl ContractCall {
    /// Invokes `address`, attaching `amount` base units of `asset`.
    pub fn invoke(address: impl Into<String>, asset: &str, amount: u64) -> Self {
        Self {
            tx_type: SMART_CONTRACT_TX_TYPE,
            payload: SmartContractPayload {
                address: address.into(),
                sc_type: SC_INVOKE,
                call_value: BTreeMap::from([(asset.to_string(), amount)]),
            },
        }
    }
}

/// Opaque to the client. Only the wallet knows its shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnsignedTransaction(pub Value);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedTransaction(pub Value);

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BroadcastData {
    #[serde(rename = "txsHashes", default)]
    pub txs_hashes: Vec<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    #[serde(default)]
    pub data: BroadcastData,
}

impl BroadcastReceipt {
    pub fn transaction_ids(&self) -> &[String] {
        &self.data.txs_hashes
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    #[error("signer rejected the request (status {status}): {reason}")]
    Rejected { status: u16, reason: String },
    #[error("signer returned an unexpected response: {0}")]
    Malformed(String),
}

/// The account holder's signing capability.
///
/// Build, sign and broadcast are three separate steps because the account
/// holder may refuse at the signing step.
pub trait Wallet {
    fn build_transaction(
        &self,
        contracts: &[ContractCall],
        call_data: &[String],
    ) -> impl Future<Output = Result<UnsignedTransaction, SignerError>>;

    fn sign_transaction(
        &self,
        transaction: UnsignedTransaction,
    ) -> impl Future<Output = Result<SignedTransaction, SignerError>>;

    fn broadcast_transactions(
        &self,
        transactions: &[SignedTransaction],
    ) -> impl Future<Output = Result<BroadcastReceipt, SignerError>>;
}

/// Talks to a wallet bridge over HTTP.
#[derive(Clone)]
pub struct HttpWallet {
    base_url: String,
    http: reqwest::Client,
}

impl fmt::Debug for HttpWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpWallet")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpWallet {
    pub fn new(base_url: impl Into<String>) -> eyre::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for wallet bridge")?;
        Ok(Self { base_url, http })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, SignerError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "calling wallet bridge");
        let res = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(SignerError::Rejected {
                status: status.as_u16(),
                reason: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| SignerError::Malformed(format!("{path}: {e}")))
    }
}

impl Wallet for HttpWallet {
    async fn build_transaction(
        &self,
        contracts: &[ContractCall],
        call_data: &[String],
    ) -> Result<UnsignedTransaction, SignerError> {
        let body = json!({ "contracts": contracts, "data": call_data });
        self.post("/transaction/build", &body).await
    }

    async fn sign_transaction(
        &self,
        transaction: UnsignedTransaction,
    ) -> Result<SignedTransaction, SignerError> {
        self.post("/transaction/sign", &transaction).await
    }

    async fn broadcast_transactions(
        &self,
        transactions: &[SignedTransaction],
    ) -> Result<BroadcastReceipt, SignerError> {
        self.post("/transaction/broadcast", transactions).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn invoke__serializes_like_a_klever_contract_request() {
        // given
        let call = ContractCall::invoke("klv1contract", "KLV", 10_000_000);

        // when
        let json = serde_json::to_value(&call).unwrap();

        // then
        assert_eq!(
            json,
            json!({
                "type": 63,
                "payload": {
                    "address": "klv1contract",
                    "scType": 0,
                    "callValue": { "KLV": 10_000_000 }
                }
            })
        );
    }

    #[test]
    fn broadcast_receipt__reads_transaction_hashes() {
        let receipt: BroadcastReceipt =
            serde_json::from_value(json!({ "data": { "txsHashes": ["abc", "def"] } }))
                .unwrap();

        assert_eq!(receipt.transaction_ids(), ["abc", "def"]);
    }

    #[test]
    fn broadcast_receipt__tolerates_missing_hashes() {
        let receipt: BroadcastReceipt =
            serde_json::from_value(json!({ "data": {} })).unwrap();

        assert!(receipt.transaction_ids().is_empty());
    }
}
