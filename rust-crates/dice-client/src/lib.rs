//! Client for placing dice wagers on a Klever contract and reading back
//! the settled result.

pub mod bet_result;
pub mod config;
pub mod indexer_client;
pub mod result_cache;
pub mod wager;
pub mod wallet;

pub use bet_result::{
    FormattedBetResult,
    map_record,
};
pub use indexer_client::{
    ConfirmationTimeoutError,
    IndexerClient,
    PollPolicy,
    ResolvedTransaction,
    TransactionSource,
    confirm_all,
};
pub use result_cache::{
    FileStore,
    InMemoryStore,
    KeyValueStore,
    ResultCache,
};
pub use wager::{
    ValidationError,
    WagerClient,
    WagerConfig,
    WagerError,
};
pub use wallet::{
    HttpWallet,
    SignerError,
    Wallet,
};
