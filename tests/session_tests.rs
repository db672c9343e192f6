//! Session Tests: connection lifecycle, deposits and withdrawals against a DevChain
//!
//! These tests verify:
//! 1. Provider absence is sticky
//! 2. Startup auto-connect and explicit connect
//! 3. Amount validation happens before any network call
//! 4. Deposit / withdraw balance scenarios
//! 5. One transaction in flight at a time
//! 6. Provider events (switch, revoke, disconnect)
//! 7. Failures surface in the snapshot without leaving Connected

#![cfg(feature = "native")]

use alloy_primitives::U256;
use beedapp::provider::methods;
use beedapp::{
    Account, DappConfig, DevChain, Eip1193, ProviderEvent, ProviderRpcError, SessionController, SessionError,
    SessionState, TxKind, TxStatus,
};
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::{json, Value};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

const ALICE: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const BOB: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
const CAROL: &str = "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc";

fn account(raw: &str) -> Account { raw.parse().expect("account") }

fn fast_config() -> DappConfig {
    DappConfig::default()
        .with_poll_interval(Duration::from_millis(1))
        .with_confirmation_timeout(Duration::from_secs(5))
}

fn chain_with(accounts: &[&str]) -> DevChain {
    let config = fast_config();
    DevChain::new(config.contract_address).with_accounts(accounts.iter().map(|a| account(a)))
}

fn session_on(chain: &DevChain) -> SessionController {
    SessionController::new(fast_config(), Some(Rc::new(chain.clone())))
}

async fn connected(accounts: &[&str]) -> (DevChain, SessionController) {
    let chain = chain_with(accounts).authorized();
    let session = session_on(&chain);
    assert_eq!(session.start().await, SessionState::Connected);
    (chain, session)
}

/// DevChain front that can hold back one `eth_call` answer and hide accounts after N queries.
struct ScriptedWallet {
    chain: DevChain,
    slow_next_read: Cell<bool>,
    account_queries_left: Cell<Option<usize>>,
}

impl ScriptedWallet {
    fn over(chain: &DevChain) -> Rc<Self> {
        Rc::new(Self {
            chain: chain.clone(),
            slow_next_read: Cell::new(false),
            account_queries_left: Cell::new(None),
        })
    }
}

#[async_trait::async_trait(?Send)]
impl Eip1193 for ScriptedWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        if method == methods::ACCOUNTS {
            match self.account_queries_left.get() {
                Some(0) => return Ok(json!([])),
                Some(left) => self.account_queries_left.set(Some(left - 1)),
                None => {}
            }
        }
        let slow = method == methods::CALL && self.slow_next_read.replace(false);
        let answer = self.chain.request(method, params).await;
        if slow {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        answer
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<ProviderEvent>> { self.chain.subscribe() }
}

fn session_over(wallet: &Rc<ScriptedWallet>) -> SessionController {
    let provider: Rc<dyn Eip1193> = wallet.clone();
    SessionController::new(fast_config(), Some(provider))
}

// =============================================================================
// Provider detection and connection
// =============================================================================

#[tokio::test]
async fn no_provider_is_sticky() {
    let session = SessionController::new(fast_config(), None);
    assert_eq!(session.start().await, SessionState::NoProvider);

    assert_eq!(session.on_connect_requested().await, Err(SessionError::ProviderUnavailable));
    assert_eq!(session.on_deposit_requested("10").await.unwrap_err(), SessionError::ProviderUnavailable);
    assert_eq!(session.on_withdraw_requested("10").await.unwrap_err(), SessionError::ProviderUnavailable);
    assert_eq!(session.refresh_balance().await, Err(SessionError::ProviderUnavailable));
    session
        .handle_provider_event(ProviderEvent::AccountsChanged(vec![ALICE.to_string()]))
        .await;

    assert_eq!(session.state(), SessionState::NoProvider);
    assert_eq!(session.start().await, SessionState::NoProvider);
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn connect_before_start_detects_missing_provider() {
    let session = SessionController::new(fast_config(), None);
    assert_eq!(session.on_connect_requested().await, Err(SessionError::ProviderUnavailable));
    assert_eq!(session.state(), SessionState::NoProvider);
}

#[tokio::test]
async fn authorized_account_connects_at_startup() {
    let (chain, session) = connected(&[ALICE, BOB]).await;

    assert_eq!(session.account(), Some(account(ALICE)));
    assert_eq!(session.balance(), Some(U256::ZERO));
    assert_eq!(chain.call_count(methods::REQUEST_ACCOUNTS), 0);

    // already connected: no prompt
    assert_eq!(session.on_connect_requested().await, Ok(SessionState::Connected));
    assert_eq!(chain.call_count(methods::REQUEST_ACCOUNTS), 0);
}

#[tokio::test]
async fn unauthorized_origin_waits_for_connect() {
    let chain = chain_with(&[BOB, ALICE]);
    let session = session_on(&chain);

    assert_eq!(session.start().await, SessionState::Disconnected);
    assert_eq!(session.account(), None);

    assert_eq!(session.on_connect_requested().await, Ok(SessionState::Connected));
    assert_eq!(session.account(), Some(account(BOB)));
    assert_eq!(session.balance(), Some(U256::ZERO));
}

#[tokio::test]
async fn empty_account_list_stays_disconnected() {
    let chain = chain_with(&[]);
    let session = session_on(&chain);

    assert_eq!(session.start().await, SessionState::Disconnected);
    assert_eq!(session.on_connect_requested().await, Ok(SessionState::Disconnected));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn user_rejection_surfaces_once() {
    let chain = chain_with(&[ALICE]);
    let session = session_on(&chain);
    session.start().await;

    chain.reject_requests(true);
    assert_eq!(session.on_connect_requested().await, Err(SessionError::UserRejected));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.last_error(), Some(SessionError::UserRejected));

    chain.reject_requests(false);
    assert_eq!(session.on_connect_requested().await, Ok(SessionState::Connected));
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn binding_failure_leaves_disconnected() {
    let (_chain, session) = connected(&[ALICE]).await;

    // the wallet announces an account it never authorized for this origin
    session
        .handle_provider_event(ProviderEvent::AccountsChanged(vec![CAROL.to_string()]))
        .await;

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.account(), None);
    assert!(matches!(session.last_error(), Some(SessionError::BindingFailed(_))));
}

#[tokio::test]
async fn startup_binding_failure_leaves_disconnected() {
    let chain = chain_with(&[ALICE]).authorized();
    let wallet = ScriptedWallet::over(&chain);
    // startup sees alice; the signer lookup during binding sees nobody
    wallet.account_queries_left.set(Some(1));
    let session = session_over(&wallet);

    assert_eq!(session.start().await, SessionState::Disconnected);
    assert_eq!(session.account(), None);
    assert_eq!(session.balance(), None);
    assert!(matches!(session.last_error(), Some(SessionError::BindingFailed(_))));
    assert_eq!(chain.call_count(methods::ACCOUNTS), 1);
    assert_eq!(chain.call_count(methods::CALL), 0);
}

// =============================================================================
// Amount validation
// =============================================================================

#[tokio::test]
async fn invalid_amount_never_reaches_the_network() {
    let (chain, session) = connected(&[ALICE]).await;
    session.on_deposit_requested("250").await.expect("deposit");
    let calls_before = chain.calls().len();

    for input in ["", "   ", "0", "-5", "1.5", "1e3", "0x10", "ten", "12 34"] {
        let err = session.on_deposit_requested(input).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidAmount(_)), "{:?} -> {:?}", input, err);
        let err = session.on_withdraw_requested(input).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidAmount(_)), "{:?} -> {:?}", input, err);
    }

    assert_eq!(chain.calls().len(), calls_before);
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.balance(), Some(U256::from(250u64)));
    assert!(matches!(session.last_error(), Some(SessionError::InvalidAmount(_))));
}

#[tokio::test]
async fn amount_whitespace_is_trimmed() {
    let (_chain, session) = connected(&[ALICE]).await;
    let confirmed = session.on_deposit_requested("  42 ").await.expect("deposit");
    assert_eq!(confirmed.balance, Ok(U256::from(42u64)));
}

#[tokio::test]
async fn transaction_without_binding_is_not_connected() {
    let chain = chain_with(&[ALICE]);
    let session = session_on(&chain);
    session.start().await;

    assert_eq!(session.on_deposit_requested("10").await.unwrap_err(), SessionError::NotConnected);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(chain.call_count(methods::SEND_TRANSACTION), 0);
}

// =============================================================================
// Deposit / withdraw scenarios
// =============================================================================

#[tokio::test]
async fn deposit_then_withdraw_tracks_balance() {
    let (chain, session) = connected(&[ALICE]).await;

    let confirmed = session.on_deposit_requested("1000").await.expect("deposit");
    assert_eq!(confirmed.kind, TxKind::Deposit);
    assert_eq!(confirmed.balance, Ok(U256::from(1000u64)));
    assert_eq!(session.balance(), Some(U256::from(1000u64)));

    session.on_withdraw_requested("400").await.expect("withdraw");
    assert_eq!(session.balance(), Some(U256::from(600u64)));

    let err = session.on_withdraw_requested("10000").await.unwrap_err();
    assert!(matches!(err, SessionError::TransactionFailed(_)));
    assert_eq!(session.balance(), Some(U256::from(600u64)));
    assert_eq!(chain.contract_balance(), U256::from(600u64));
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.last_error(), Some(err));
    assert!(session.snapshot().pending.is_none());
}

#[tokio::test]
async fn second_submission_in_flight_is_refused() {
    let (chain, session) = connected(&[ALICE]).await;
    chain.set_confirmation_polls(3);

    let (first, second) = futures::join!(
        session.on_deposit_requested("500"),
        session.on_deposit_requested("500"),
    );

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), SessionError::TransactionInProgress);
    assert_eq!(session.balance(), Some(U256::from(500u64)));
    assert_eq!(chain.contract_balance(), U256::from(500u64));
    assert_eq!(chain.call_count(methods::SEND_TRANSACTION), 1);
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test]
async fn snapshot_shows_pending_transaction() {
    let (chain, session) = connected(&[ALICE]).await;
    chain.set_confirmation_polls(3);

    // polled after the deposit first suspends
    let (result, during) = futures::join!(session.on_deposit_requested("7"), async { session.snapshot() });

    assert_eq!(during.state, SessionState::Submitting);
    assert!(during.balance_stale);
    let pending = during.pending.expect("pending");
    assert_eq!(pending.kind, TxKind::Deposit);
    assert_eq!(pending.status, TxStatus::Submitted);
    assert!(pending.hash.is_some());

    let after = session.snapshot();
    assert_eq!(Some(result.expect("deposit").hash), pending.hash);
    assert_eq!(after.state, SessionState::Connected);
    assert!(after.pending.is_none());
    assert!(!after.balance_stale);
}

#[tokio::test]
async fn rejected_submission_keeps_balance() {
    let (chain, session) = connected(&[ALICE]).await;
    session.on_deposit_requested("100").await.expect("deposit");

    chain.reject_transactions(true);
    let err = session.on_deposit_requested("100").await.unwrap_err();
    assert!(matches!(err, SessionError::TransactionFailed(_)));
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.balance(), Some(U256::from(100u64)));

    // next action clears the error
    chain.reject_transactions(false);
    session.on_deposit_requested("1").await.expect("deposit");
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn confirmation_timeout_releases_the_slot() {
    let chain = chain_with(&[ALICE]).authorized();
    let config = fast_config().with_confirmation_timeout(Duration::from_millis(30));
    let session = SessionController::new(config, Some(Rc::new(chain.clone())));
    session.start().await;

    chain.stall_confirmations(true);
    let err = session.on_deposit_requested("10").await.unwrap_err();
    match err {
        SessionError::TransactionFailed(reason) => assert!(reason.contains("no confirmation"), "{}", reason),
        other => panic!("expected TransactionFailed, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Connected);
    assert!(session.snapshot().pending.is_none());

    chain.stall_confirmations(false);
    session.on_deposit_requested("10").await.expect("slot released");
    assert_eq!(session.balance(), Some(U256::from(10u64)));
}

// =============================================================================
// Balance failures
// =============================================================================

#[tokio::test]
async fn balance_failure_keeps_last_known_value() {
    let (chain, session) = connected(&[ALICE]).await;
    session.on_deposit_requested("1000").await.expect("deposit");

    chain.fail_balance_reads(true);
    let err = session.refresh_balance().await.unwrap_err();
    assert!(matches!(err, SessionError::BalanceQueryFailed(_)));
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.balance(), Some(U256::from(1000u64)));

    // deposit still confirms; only the resync fails
    let confirmed = session.on_deposit_requested("5").await.expect("deposit");
    assert!(matches!(confirmed.balance, Err(SessionError::BalanceQueryFailed(_))));
    assert_eq!(session.balance(), Some(U256::from(1000u64)));
    assert!(matches!(session.last_error(), Some(SessionError::BalanceQueryFailed(_))));

    chain.fail_balance_reads(false);
    assert_eq!(session.refresh_balance().await, Ok(U256::from(1005u64)));
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn refresh_is_refused_while_transaction_pending() {
    let (chain, session) = connected(&[ALICE]).await;
    chain.set_confirmation_polls(3);

    let (deposit, refresh) = futures::join!(session.on_deposit_requested("1000"), session.refresh_balance());

    assert_eq!(refresh, Err(SessionError::TransactionInProgress));
    assert_eq!(deposit.expect("deposit").balance, Ok(U256::from(1000u64)));
    assert_eq!(session.balance(), Some(U256::from(1000u64)));
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.last_error(), Some(SessionError::TransactionInProgress));
}

#[tokio::test]
async fn slow_read_does_not_overwrite_confirmed_resync() {
    let chain = chain_with(&[ALICE]).authorized();
    let wallet = ScriptedWallet::over(&chain);
    let session = session_over(&wallet);
    session.start().await;

    // the refresh reads 0, then its answer arrives after the deposit has confirmed and resynced
    wallet.slow_next_read.set(true);
    let (refresh, deposit) = futures::join!(session.refresh_balance(), session.on_deposit_requested("1000"));

    assert_eq!(deposit.expect("deposit").balance, Ok(U256::from(1000u64)));
    assert_eq!(refresh, Ok(U256::ZERO));
    assert_eq!(session.balance(), Some(U256::from(1000u64)));
    assert_eq!(session.state(), SessionState::Connected);
    assert!(session.last_error().is_none());
}

// =============================================================================
// Provider events
// =============================================================================

#[tokio::test]
async fn account_switch_rebinds_and_resyncs() {
    let (chain, session) = connected(&[ALICE, BOB]).await;
    session.on_deposit_requested("300").await.expect("deposit");

    let events = session.clone();
    futures::join!(
        beedapp::runtime::timeout(Duration::from_millis(50), events.run_events()),
        async {
            chain.switch_accounts(vec![account(BOB), account(ALICE)]);
        },
    );

    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.account(), Some(account(BOB)));
    assert_eq!(session.balance(), Some(U256::from(300u64)));
}

#[tokio::test]
async fn same_account_event_is_ignored() {
    let (chain, session) = connected(&[ALICE]).await;
    let binds_before = chain.call_count(methods::ACCOUNTS);

    session
        .handle_provider_event(ProviderEvent::AccountsChanged(vec![ALICE.to_string()]))
        .await;

    assert_eq!(chain.call_count(methods::ACCOUNTS), binds_before);
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test]
async fn revoked_access_disconnects() {
    let (chain, session) = connected(&[ALICE]).await;

    chain.revoke();
    session.handle_provider_event(ProviderEvent::AccountsChanged(vec![])).await;

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.account(), None);
    assert_eq!(session.balance(), None);
}

#[tokio::test]
async fn unreadable_selected_account_disconnects() {
    let (_chain, session) = connected(&[ALICE, BOB]).await;

    // the selected account is the first entry; a later valid one must not stand in for it
    session
        .handle_provider_event(ProviderEvent::AccountsChanged(vec!["not-an-address".to_string(), BOB.to_string()]))
        .await;

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.account(), None);
}

#[tokio::test]
async fn provider_disconnect_clears_binding() {
    let (_chain, session) = connected(&[ALICE]).await;

    session.handle_provider_event(ProviderEvent::Disconnected).await;
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.account(), None);
    assert_eq!(session.on_withdraw_requested("1").await.unwrap_err(), SessionError::NotConnected);
}

#[tokio::test]
async fn completion_after_switch_does_not_touch_new_binding() {
    let (chain, session) = connected(&[ALICE, BOB]).await;
    chain.set_confirmation_polls(3);

    let (deposit, _) = futures::join!(
        session.on_deposit_requested("1000"),
        session.handle_provider_event(ProviderEvent::AccountsChanged(vec![BOB.to_string()])),
    );

    // the old binding saw the deposit; bob's binding read before it was mined
    assert_eq!(deposit.expect("deposit").balance, Ok(U256::from(1000u64)));
    assert_eq!(session.account(), Some(account(BOB)));
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.balance(), Some(U256::ZERO));

    assert_eq!(session.refresh_balance().await, Ok(U256::from(1000u64)));
}

// =============================================================================
// Observation
// =============================================================================

#[tokio::test]
async fn subscribers_see_every_transition() {
    let chain = chain_with(&[ALICE]);
    let session = session_on(&chain);
    let mut rx = session.subscribe();

    session.start().await;
    session.on_connect_requested().await.expect("connect");
    session.on_deposit_requested("9").await.expect("deposit");
    drop(session);

    let mut states = Vec::new();
    while let Some(snapshot) = rx.next().await {
        if states.last() != Some(&snapshot.state) {
            states.push(snapshot.state);
        }
    }
    assert_eq!(
        states,
        vec![
            SessionState::Init,
            SessionState::Disconnected,
            SessionState::Connecting,
            SessionState::Connected,
            SessionState::Submitting,
            SessionState::Connected,
        ]
    );
}

#[tokio::test]
async fn snapshot_json_shape() {
    let (_chain, session) = connected(&[ALICE]).await;
    session.on_deposit_requested("1000").await.expect("deposit");
    let _ = session.on_withdraw_requested("abc").await;

    let json = session.snapshot().to_json();
    assert_eq!(json["state"], "connected");
    assert_eq!(json["account"], "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    assert_eq!(json["balance"], "1000");
    assert_eq!(json["balance_stale"], false);
    assert!(json["pending"].is_null());
    assert_eq!(json["last_error"]["kind"], "invalid_amount");
}
