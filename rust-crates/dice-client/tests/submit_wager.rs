use crate::*;
use dice_abi::{
    BetDirection,
    DecodeError,
    test_helpers::BetFixture,
};
use dice_client::{
    FormattedBetResult,
    KeyValueStore,
    SignerError,
    ValidationError,
    WagerError,
    indexer_client::{
        TransactionBodyError,
        TransactionLookup,
    },
    result_cache::cache_key,
    wallet::ContractCall,
};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn submit_wager__settles_over_bet_and_caches_result() {
    // given
    let payload = BetFixture::new(BetDirection::Over, 50, 72)
        .with_multiplier(198)
        .winning(false)
        .return_data();
    let ctx = TestContext::new(
        StubWallet::broadcasting(&["abc"]),
        StubIndexer::default()
            .answer("abc", vec![confirmed("abc", json!([return_data_event(&payload)]))]),
    );
    let client = ctx.client();

    // when
    let result = client
        .submit_wager(ALICE, BetDirection::Over, 50, 10.0)
        .await
        .unwrap();

    // then
    let expected = FormattedBetResult {
        direction: BetDirection::Over,
        prediction_value: 50,
        rolled_value: 72,
        payout_multiplier: 198,
        is_winner: false,
        transaction_reference: Some(
            "https://testnet.kleverscan.org/transaction/abc".to_string(),
        ),
    };
    assert_eq!(result, expected);
    assert_eq!(client.last_result(ALICE), Some(expected.clone()));
    let cached = ctx.cached_entries();
    assert_eq!(cached.len(), 1);
    assert_eq!(
        serde_json::from_str::<FormattedBetResult>(&cached[&cache_key(ALICE)]).unwrap(),
        expected
    );
    assert_eq!(ctx.indexer.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn submit_wager__keeps_polling_until_indexed() {
    // given
    let payload = BetFixture::new(BetDirection::Under, 30, 12)
        .with_multiplier(330)
        .winning(true)
        .return_data();
    let ctx = TestContext::new(
        StubWallet::broadcasting(&["abc"]),
        StubIndexer::default().answer(
            "abc",
            vec![not_found(), confirmed("abc", json!([return_data_event(&payload)]))],
        ),
    );
    let started = Instant::now();

    // when
    let result = ctx
        .client()
        .submit_wager(ALICE, BetDirection::Under, 30, 10.0)
        .await
        .unwrap();

    // then
    assert!(result.is_winner);
    assert_eq!(result.rolled_value, 12);
    assert_eq!(ctx.indexer.call_count(), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn submit_wager__builds_one_contract_call_with_encoded_payload() {
    // given
    let payload = BetFixture::new(BetDirection::Over, 50, 72).return_data();
    let ctx = TestContext::new(
        StubWallet::broadcasting(&["abc"]),
        StubIndexer::default()
            .answer("abc", vec![confirmed("abc", json!([return_data_event(&payload)]))]),
    );

    // when
    ctx.client()
        .submit_wager(ALICE, BetDirection::Over, 50, 10.0)
        .await
        .unwrap();

    // then
    let state = ctx.wallet.state();
    assert_eq!(state.built.len(), 1);
    let (contracts, call_data) = &state.built[0];
    assert_eq!(
        contracts,
        &vec![ContractCall::invoke(CONTRACT, "KLV", 10_000_000)]
    );
    // base64 of "bet@01@32"
    assert_eq!(call_data, &vec!["YmV0QDAxQDMy".to_string()]);
    assert_eq!(state.signed, 1);
    assert_eq!(state.broadcast, 1);
}

#[tokio::test(start_paused = true)]
async fn submit_wager__zero_stake_fails_before_any_call() {
    // given
    let ctx = TestContext::new(StubWallet::broadcasting(&["abc"]), StubIndexer::default());

    // when
    let err = ctx
        .client()
        .submit_wager(ALICE, BetDirection::Under, 30, 0.0)
        .await
        .unwrap_err();

    // then
    assert!(matches!(
        err,
        WagerError::Validation(ValidationError::InvalidStake(stake)) if stake == 0.0
    ));
    assert!(!err.outcome_may_be_committed());
    assert_eq!(ctx.wallet.total_calls(), 0);
    assert_eq!(ctx.indexer.call_count(), 0);
    assert!(ctx.cached_entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn submit_wager__blank_account_fails_before_any_call() {
    let ctx = TestContext::new(StubWallet::broadcasting(&["abc"]), StubIndexer::default());

    let err = ctx
        .client()
        .submit_wager("   ", BetDirection::Over, 50, 10.0)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WagerError::Validation(ValidationError::MissingAccount)
    ));
    assert_eq!(ctx.wallet.total_calls(), 0);
    assert_eq!(ctx.indexer.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn submit_wager__signer_rejection_stops_before_broadcast() {
    // given
    let rejection = SignerError::Rejected {
        status: 403,
        reason: "user declined".to_string(),
    };
    let ctx = TestContext::new(
        StubWallet::broadcasting(&["abc"]).rejecting_signature(rejection.clone()),
        StubIndexer::default(),
    );

    // when
    let err = ctx
        .client()
        .submit_wager(ALICE, BetDirection::Over, 50, 10.0)
        .await
        .unwrap_err();

    // then
    assert!(matches!(err, WagerError::Signer(ref e) if *e == rejection));
    assert!(!err.outcome_may_be_committed());
    assert_eq!(ctx.wallet.state().broadcast, 0);
    assert_eq!(ctx.indexer.call_count(), 0);
    assert!(ctx.cached_entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn submit_wager__empty_broadcast_receipt_is_a_signer_error() {
    let ctx = TestContext::new(StubWallet::broadcasting(&[]), StubIndexer::default());

    let err = ctx
        .client()
        .submit_wager(ALICE, BetDirection::Over, 50, 10.0)
        .await
        .unwrap_err();

    assert!(matches!(err, WagerError::Signer(SignerError::Malformed(_))));
    assert_eq!(ctx.indexer.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn submit_wager__times_out_and_keeps_previous_cache_entry() {
    // given
    let ctx = TestContext::new(StubWallet::broadcasting(&["abc"]), StubIndexer::default());
    let previous = json!({
        "direction": "under",
        "predictionValue": 30,
        "rolledValue": 12,
        "payoutMultiplier": 330,
        "isWinner": true
    })
    .to_string();
    ctx.store.set(&cache_key(ALICE), previous.clone()).unwrap();
    let started = Instant::now();

    // when
    let err = ctx
        .client()
        .submit_wager(ALICE, BetDirection::Over, 50, 10.0)
        .await
        .unwrap_err();

    // then
    let WagerError::ConfirmationTimeout(timeout) = &err else {
        panic!("expected timeout, got {err:?}");
    };
    assert_eq!(timeout.transaction_id, "abc");
    assert_eq!(timeout.attempts, 10);
    assert!(err.outcome_may_be_committed());
    assert_eq!(ctx.indexer.call_count(), 10);
    assert_eq!(started.elapsed(), Duration::from_secs(18));
    assert_eq!(ctx.store.get(&cache_key(ALICE)).unwrap(), Some(previous));
}

#[tokio::test(start_paused = true)]
async fn submit_wager__confirmed_without_return_data_is_reported() {
    // given
    let ctx = TestContext::new(
        StubWallet::broadcasting(&["abc"]),
        StubIndexer::default().answer(
            "abc",
            vec![confirmed(
                "abc",
                json!([{ "identifier": "SCInvoke", "data": ["626574"] }]),
            )],
        ),
    );

    // when
    let err = ctx
        .client()
        .submit_wager(ALICE, BetDirection::Over, 50, 10.0)
        .await
        .unwrap_err();

    // then
    assert!(matches!(
        err,
        WagerError::MissingReturnData { ref transaction_id } if transaction_id == "abc"
    ));
    assert!(err.outcome_may_be_committed());
    assert!(ctx.cached_entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn submit_wager__success_body_without_transaction_is_unreadable() {
    // given
    let ctx = TestContext::new(
        StubWallet::broadcasting(&["abc"]),
        StubIndexer::default().answer(
            "abc",
            vec![TransactionLookup::from_body(
                json!({ "data": {}, "code": "successful" }),
            )],
        ),
    );

    // when
    let err = ctx
        .client()
        .submit_wager(ALICE, BetDirection::Over, 50, 10.0)
        .await
        .unwrap_err();

    // then
    assert!(matches!(
        err,
        WagerError::UnreadableTransaction {
            ref transaction_id,
            source: TransactionBodyError::MissingTransaction,
        } if transaction_id == "abc"
    ));
    assert!(err.outcome_may_be_committed());
    assert_eq!(ctx.indexer.call_count(), 1);
    assert!(ctx.cached_entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn submit_wager__undeclared_bet_type_is_not_cached() {
    // given
    let payload = BetFixture::new(BetDirection::Over, 50, 72)
        .with_bet_type(7)
        .return_data();
    let ctx = TestContext::new(
        StubWallet::broadcasting(&["abc"]),
        StubIndexer::default()
            .answer("abc", vec![confirmed("abc", json!([return_data_event(&payload)]))]),
    );

    // when
    let err = ctx
        .client()
        .submit_wager(ALICE, BetDirection::Over, 50, 10.0)
        .await
        .unwrap_err();

    // then
    assert!(matches!(
        err,
        WagerError::Decode(DecodeError::UnknownDiscriminant { discriminant: 7, .. })
    ));
    assert!(err.outcome_may_be_committed());
    assert!(ctx.cached_entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn submit_wager__truncated_payload_is_a_decode_error() {
    let ctx = TestContext::new(
        StubWallet::broadcasting(&["abc"]),
        StubIndexer::default()
            .answer("abc", vec![confirmed("abc", json!([return_data_event("0000000132")]))]),
    );

    let err = ctx
        .client()
        .submit_wager(ALICE, BetDirection::Over, 50, 10.0)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WagerError::Decode(DecodeError::LengthMismatch { actual: 5, .. })
    ));
}
