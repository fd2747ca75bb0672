#![allow(non_snake_case)]

use dice_abi::TypeSchema;
use dice_client::{
    InMemoryStore,
    PollPolicy,
    ResultCache,
    SignerError,
    TransactionSource,
    WagerClient,
    WagerConfig,
    Wallet,
    indexer_client::{
        IndexerError,
        TransactionLookup,
    },
    wallet::{
        BroadcastData,
        BroadcastReceipt,
        ContractCall,
        SignedTransaction,
        UnsignedTransaction,
    },
};
use serde_json::json;
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
};

mod submit_wager;

pub const CONTRACT: &str = "klv1qqqqqqqqqqqqqpgqdice";
pub const EXPLORER: &str = "https://testnet.kleverscan.org";
pub const ALICE: &str = "klv1alice";

#[derive(Default)]
pub struct WalletState {
    pub built: Vec<(Vec<ContractCall>, Vec<String>)>,
    pub signed: usize,
    pub broadcast: usize,
    pub sign_error: Option<SignerError>,
    pub hashes: Vec<String>,
}

#[derive(Clone, Default)]
pub struct StubWallet {
    state: Arc<Mutex<WalletState>>,
}

impl StubWallet {
    pub fn broadcasting(hashes: &[&str]) -> Self {
        let wallet = Self::default();
        wallet.state().hashes = hashes.iter().map(|h| h.to_string()).collect();
        wallet
    }

    pub fn rejecting_signature(self, error: SignerError) -> Self {
        self.state().sign_error = Some(error);
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, WalletState> {
        self.state.lock().unwrap()
    }

    pub fn total_calls(&self) -> usize {
        let state = self.state();
        state.built.len() + state.signed + state.broadcast
    }
}

impl Wallet for StubWallet {
    async fn build_transaction(
        &self,
        contracts: &[ContractCall],
        call_data: &[String],
    ) -> Result<UnsignedTransaction, SignerError> {
        self.state()
            .built
            .push((contracts.to_vec(), call_data.to_vec()));
        Ok(UnsignedTransaction(json!({
            "contracts": contracts,
            "data": call_data,
        })))
    }

    async fn sign_transaction(
        &self,
        transaction: UnsignedTransaction,
    ) -> Result<SignedTransaction, SignerError> {
        let mut state = self.state();
        state.signed += 1;
        if let Some(error) = state.sign_error.clone() {
            return Err(error);
        }
        Ok(SignedTransaction(json!({ "raw": transaction.0, "signature": ["00"] })))
    }

    async fn broadcast_transactions(
        &self,
        _transactions: &[SignedTransaction],
    ) -> Result<BroadcastReceipt, SignerError> {
        let mut state = self.state();
        state.broadcast += 1;
        Ok(BroadcastReceipt {
            data: BroadcastData {
                txs_hashes: state.hashes.clone(),
            },
        })
    }
}

/// Answers lookups from a per-id script, then reports "not found" forever.
#[derive(Clone, Default)]
pub struct StubIndexer {
    script: Arc<Mutex<HashMap<String, VecDeque<TransactionLookup>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubIndexer {
    pub fn answer(self, id: &str, lookups: Vec<TransactionLookup>) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(id.to_string(), lookups.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl TransactionSource for StubIndexer {
    async fn fetch_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionLookup, IndexerError> {
        self.calls.lock().unwrap().push(transaction_id.to_string());
        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(transaction_id)
            .and_then(VecDeque::pop_front);
        Ok(next.unwrap_or_else(not_found))
    }
}

pub fn not_found() -> TransactionLookup {
    TransactionLookup::from_body(json!({
        "data": null,
        "error": "transaction not found",
        "code": "internal_issue"
    }))
}

/// An indexer body for a settled transaction carrying the given events.
pub fn confirmed(hash: &str, events: serde_json::Value) -> TransactionLookup {
    TransactionLookup::from_body(json!({
        "data": {
            "transaction": {
                "hash": hash,
                "status": "success",
                "logs": { "address": CONTRACT, "events": events }
            }
        },
        "error": "",
        "code": "successful"
    }))
}

pub fn return_data_event(data: &str) -> serde_json::Value {
    json!({
        "address": CONTRACT,
        "identifier": "ReturnData",
        "topics": [],
        "data": [data]
    })
}

pub struct TestContext {
    pub wallet: StubWallet,
    pub indexer: StubIndexer,
    pub store: InMemoryStore,
}

impl TestContext {
    pub fn new(wallet: StubWallet, indexer: StubIndexer) -> Self {
        Self {
            wallet,
            indexer,
            store: InMemoryStore::new(),
        }
    }

    pub fn client(&self) -> WagerClient<StubWallet, StubIndexer, InMemoryStore> {
        WagerClient::new(
            self.wallet.clone(),
            self.indexer.clone(),
            ResultCache::new(self.store.clone()),
            Arc::new(TypeSchema::bundled().unwrap()),
            WagerConfig {
                contract_address: CONTRACT.to_string(),
                explorer_url: EXPLORER.to_string(),
                poll: PollPolicy::default(),
            },
        )
    }

    pub fn cached_entries(&self) -> HashMap<String, String> {
        self.store.entries().lock().unwrap().clone()
    }
}
