//! SessionController - single writer of the session record

use super::state::{Binding, SessionSnapshot, SessionState};
use crate::account::{Account, AccountSession};
use crate::amount::Amount;
use crate::config::DappConfig;
use crate::contract::ContractBinding;
use crate::error::SessionError;
use crate::executor::{Confirmed, TransactionExecutor, TxKind};
use crate::provider::{parse_event_accounts, Eip1193, ProviderEvent, ProviderGateway};
use alloy_primitives::U256;
use futures::channel::mpsc;
use futures::StreamExt;
use std::cell::RefCell;
use std::rc::Rc;

/// Orchestrates gateway, binding, balance and executor as one observable state machine.
///
/// Cheap to clone; clones share the same session. All methods take `&self` so UI callbacks and
/// the provider event loop can run interleaved on one thread.
#[derive(Clone)]
pub struct SessionController {
    inner: Rc<Inner>,
}

struct Inner {
    gateway: ProviderGateway,
    contracts: ContractBinding,
    executor: TransactionExecutor,
    session: RefCell<Session>,
    watchers: RefCell<Vec<mpsc::UnboundedSender<SessionSnapshot>>>,
}

#[derive(Default)]
struct Session {
    state: SessionState,
    binding: Option<Rc<Binding>>,
    last_error: Option<SessionError>,
    /// Bumped on every account adoption; a completed bind only lands if it is still current.
    epoch: u64,
}

impl SessionController {
    pub fn new(config: DappConfig, provider: Option<Rc<dyn Eip1193>>) -> Self {
        let gateway = ProviderGateway::new(provider);
        Self {
            inner: Rc::new(Inner {
                contracts: ContractBinding::new(gateway.clone(), config.contract_address),
                executor: TransactionExecutor::new(&config),
                gateway,
                session: RefCell::new(Session::default()),
                watchers: RefCell::new(Vec::new()),
            }),
        }
    }

    // =========================================================================
    // Read side
    // =========================================================================

    pub fn state(&self) -> SessionState { self.inner.session.borrow().state }

    pub fn account(&self) -> Option<Account> {
        self.inner.session.borrow().binding.as_ref().map(|b| b.account())
    }

    pub fn balance(&self) -> Option<U256> {
        self.inner.session.borrow().binding.as_ref().and_then(|b| b.balance.cached())
    }

    pub fn last_error(&self) -> Option<SessionError> { self.inner.session.borrow().last_error.clone() }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.inner.session.borrow();
        let pending = self.inner.executor.pending();
        SessionSnapshot {
            state: session.state,
            account: session.binding.as_ref().map(|b| b.account()),
            balance: session.binding.as_ref().and_then(|b| b.balance.cached()),
            balance_stale: pending.is_some() || session.state == SessionState::Submitting,
            pending,
            last_error: session.last_error.clone(),
        }
    }

    /// Stream of snapshots, starting with the current one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionSnapshot> {
        let (tx, rx) = mpsc::unbounded();
        let _ = tx.unbounded_send(self.snapshot());
        self.inner.watchers.borrow_mut().push(tx);
        rx
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Init: detect the provider, then adopt any already-authorized account.
    pub async fn start(&self) -> SessionState {
        if self.state() != SessionState::Init {
            return self.state();
        }
        if !self.inner.gateway.detect() {
            tracing::warn!("no wallet provider detected");
            self.set_state(SessionState::NoProvider);
            self.emit();
            return SessionState::NoProvider;
        }
        match self.inner.gateway.query_authorized_accounts().await {
            Ok(accounts) => {
                let _ = self.adopt(AccountSession::derive(&accounts)).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "authorized account query failed");
                self.fail_into(SessionState::Disconnected, e);
            }
        }
        self.state()
    }

    /// User asked to connect. Prompts the wallet from `Disconnected`; a no-op when already bound.
    pub async fn on_connect_requested(&self) -> Result<SessionState, SessionError> {
        if self.state() == SessionState::Init {
            self.start().await;
        }
        match self.state() {
            SessionState::NoProvider => return Err(SessionError::ProviderUnavailable),
            SessionState::Disconnected => {}
            other => return Ok(other),
        }

        self.clear_error();
        self.set_state(SessionState::Connecting);
        self.emit();

        match self.inner.gateway.request_accounts().await {
            Ok(accounts) => {
                let session = AccountSession::derive(&accounts);
                if !session.is_bound() {
                    tracing::info!("wallet returned no accounts");
                    self.set_state(SessionState::Disconnected);
                    self.emit();
                    return Ok(SessionState::Disconnected);
                }
                self.adopt(session).await?;
                Ok(self.state())
            }
            Err(e) => {
                tracing::warn!(error = %e, "account request failed");
                self.fail_into(SessionState::Disconnected, e.clone());
                Err(e)
            }
        }
    }

    pub async fn on_deposit_requested(&self, amount: &str) -> Result<Confirmed, SessionError> {
        self.transact(TxKind::Deposit, amount).await
    }

    pub async fn on_withdraw_requested(&self, amount: &str) -> Result<Confirmed, SessionError> {
        self.transact(TxKind::Withdraw, amount).await
    }

    /// Explicit re-query, e.g. to recover after a failed transaction.
    ///
    /// Refused while a transaction is pending: its post-confirmation resync owns the cache.
    pub async fn refresh_balance(&self) -> Result<U256, SessionError> {
        if self.state() == SessionState::NoProvider {
            return Err(SessionError::ProviderUnavailable);
        }
        if self.inner.executor.is_busy() {
            tracing::debug!("balance refresh refused: transaction pending");
            return Err(self.surface(SessionError::TransactionInProgress));
        }
        self.clear_error();
        let binding = self.require_binding()?;
        let result = binding.balance.refresh(&binding.handle).await;
        if let Err(e) = &result {
            if self.is_current(&binding) {
                self.record_error(e.clone());
            }
        }
        self.emit();
        result
    }

    /// Route a provider notification into the state machine.
    pub async fn handle_provider_event(&self, event: ProviderEvent) {
        if matches!(self.state(), SessionState::Init | SessionState::NoProvider) {
            return;
        }
        match event {
            ProviderEvent::AccountsChanged(raw) => {
                let session = AccountSession::derive(&parse_event_accounts(&raw));
                if session.is_bound() && session.account() == self.account() {
                    return;
                }
                tracing::info!(accounts = raw.len(), "provider accounts changed");
                let _ = self.adopt(session).await;
            }
            ProviderEvent::Disconnected => {
                tracing::info!("provider disconnected");
                {
                    let mut session = self.inner.session.borrow_mut();
                    session.epoch += 1;
                    session.binding = None;
                }
                self.set_state(SessionState::Disconnected);
                self.emit();
            }
        }
    }

    /// Drain the provider's event stream until it closes.
    pub async fn run_events(&self) {
        let Some(mut events) = self.inner.gateway.events() else {
            tracing::debug!("provider has no event stream");
            return;
        };
        while let Some(event) = events.next().await {
            self.handle_provider_event(event).await;
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn transact(&self, kind: TxKind, input: &str) -> Result<Confirmed, SessionError> {
        if self.state() == SessionState::NoProvider {
            return Err(SessionError::ProviderUnavailable);
        }
        self.clear_error();
        let amount = match Amount::parse(input) {
            Ok(amount) => amount,
            Err(e) => return Err(self.surface(e)),
        };
        let binding = self.require_binding()?;

        if !self.inner.executor.is_busy() {
            self.set_state(SessionState::Submitting);
            self.emit();
        }
        let result = self
            .inner
            .executor
            .submit(&binding.handle, &binding.balance, kind, amount)
            .await;

        match &result {
            Err(SessionError::TransactionInProgress) => {
                self.record_error(SessionError::TransactionInProgress);
            }
            Err(e) => {
                self.record_error(e.clone());
                self.settle();
            }
            Ok(confirmed) => {
                if let Err(e) = &confirmed.balance {
                    if self.is_current(&binding) {
                        self.record_error(e.clone());
                    }
                }
                self.settle();
            }
        }
        self.emit();
        result
    }

    /// Bind the derived account (or clear the binding) and resync the balance.
    async fn adopt(&self, session: AccountSession) -> Result<(), SessionError> {
        let epoch = {
            let mut s = self.inner.session.borrow_mut();
            s.epoch += 1;
            s.epoch
        };
        let Some(account) = session.account() else {
            self.inner.session.borrow_mut().binding = None;
            self.set_state(SessionState::Disconnected);
            self.emit();
            return Ok(());
        };

        let bound = self.inner.contracts.bind(account).await;
        if self.inner.session.borrow().epoch != epoch {
            tracing::debug!(account = %account, "discarding superseded binding");
            return Ok(());
        }
        let binding = match bound {
            Ok(handle) => Rc::new(Binding::new(handle)),
            Err(e) => {
                tracing::warn!(account = %account, error = %e, "contract binding failed");
                self.inner.session.borrow_mut().binding = None;
                self.fail_into(SessionState::Disconnected, e.clone());
                return Err(e);
            }
        };

        tracing::info!(account = %account, "account connected");
        self.inner.session.borrow_mut().binding = Some(binding.clone());
        self.settle();
        self.emit();

        if let Err(e) = binding.balance.refresh(&binding.handle).await {
            if self.is_current(&binding) {
                self.record_error(e);
            }
        }
        self.emit();
        Ok(())
    }

    fn require_binding(&self) -> Result<Rc<Binding>, SessionError> {
        let binding = self.inner.session.borrow().binding.clone();
        binding.ok_or_else(|| self.surface(SessionError::NotConnected))
    }

    fn is_current(&self, binding: &Rc<Binding>) -> bool {
        self.inner
            .session
            .borrow()
            .binding
            .as_ref()
            .is_some_and(|b| Rc::ptr_eq(b, binding))
    }

    /// Resting state derived from the session record.
    fn settle(&self) {
        let bound = self.inner.session.borrow().binding.is_some();
        let state = match (bound, self.inner.executor.is_busy()) {
            (false, _) => SessionState::Disconnected,
            (true, true) => SessionState::Submitting,
            (true, false) => SessionState::Connected,
        };
        self.set_state(state);
    }

    fn set_state(&self, next: SessionState) {
        let mut session = self.inner.session.borrow_mut();
        if session.state != next {
            tracing::info!(from = %session.state, to = %next, "session state");
            session.state = next;
        }
    }

    fn fail_into(&self, state: SessionState, error: SessionError) {
        self.record_error(error);
        self.set_state(state);
        self.emit();
    }

    /// Record a one-shot error without touching the state, and publish it.
    fn surface(&self, error: SessionError) -> SessionError {
        self.record_error(error.clone());
        self.emit();
        error
    }

    fn record_error(&self, error: SessionError) {
        self.inner.session.borrow_mut().last_error = Some(error);
    }

    fn clear_error(&self) {
        self.inner.session.borrow_mut().last_error = None;
    }

    fn emit(&self) {
        let snapshot = self.snapshot();
        self.inner
            .watchers
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(snapshot.clone()).is_ok());
    }
}
