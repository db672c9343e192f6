//! TransactionExecutor - deposit/withdraw submission, confirmation and resync
//!
//! ```text
//! submit(kind, amount)
//!     │ reserve slot (sync) ──── busy ──▶ TransactionInProgress
//!     ▼
//! eth_sendTransaction ─── error ──▶ TransactionFailed
//!     │ status = submitted
//!     ▼
//! poll receipt (bounded) ── revert / timeout ──▶ TransactionFailed (balance untouched)
//!     │ status = confirmed
//!     ▼
//! BalanceSync.refresh ──▶ slot released
//! ```

use crate::amount::Amount;
use crate::balance::BalanceSync;
use crate::config::DappConfig;
use crate::contract::ContractHandle;
use crate::error::SessionError;
use crate::runtime;
use alloy_primitives::{B256, U256};
use std::cell::RefCell;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Deposit,
    Withdraw,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Submitted,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Submitted => "submitted",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }
}

/// The single in-flight transaction. `hash` is `None` while the wallet is still deciding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub kind: TxKind,
    pub amount: Amount,
    pub status: TxStatus,
    pub hash: Option<B256>,
}

/// A confirmed transaction and the outcome of the resync that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmed {
    pub kind: TxKind,
    pub amount: Amount,
    pub hash: B256,
    pub balance: Result<U256, SessionError>,
}

pub struct TransactionExecutor {
    gas_limit: u64,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    pending: RefCell<Option<PendingTransaction>>,
}

impl TransactionExecutor {
    pub fn new(config: &DappConfig) -> Self {
        Self {
            gas_limit: config.gas_limit,
            confirmation_timeout: config.confirmation_timeout,
            poll_interval: config.poll_interval,
            pending: RefCell::new(None),
        }
    }

    pub fn pending(&self) -> Option<PendingTransaction> { self.pending.borrow().clone() }

    pub fn is_busy(&self) -> bool { self.pending.borrow().is_some() }

    /// Submit one transaction and see it through to confirmation and resync.
    ///
    /// The slot is taken before the first suspension point, so a second call made while this
    /// one is suspended fails with `TransactionInProgress`.
    pub async fn submit(
        &self,
        handle: &ContractHandle,
        balance: &BalanceSync,
        kind: TxKind,
        amount: Amount,
    ) -> Result<Confirmed, SessionError> {
        let slot = self.reserve(kind, amount)?;
        tracing::info!(%kind, %amount, account = %handle.signer(), "submitting transaction");

        let sent = match kind {
            TxKind::Deposit => handle.deposit(amount, self.gas_limit).await,
            TxKind::Withdraw => handle.withdraw(amount).await,
        };
        let hash = match sent {
            Ok(hash) => hash,
            Err(e) => return Err(slot.fail(format!("submission rejected: {}", e))),
        };
        slot.update(|p| {
            p.status = TxStatus::Submitted;
            p.hash = Some(hash);
        });
        tracing::info!(%kind, %hash, "transaction submitted, awaiting confirmation");

        let waited = runtime::timeout(
            self.confirmation_timeout,
            handle.wait_for_confirmation(hash, self.poll_interval),
        )
        .await;
        match waited {
            Some(Ok(())) => {
                slot.update(|p| p.status = TxStatus::Confirmed);
                tracing::info!(%kind, %hash, "transaction confirmed");
                let balance = balance.refresh(handle).await;
                Ok(Confirmed { kind, amount, hash, balance })
            }
            Some(Err(e)) => Err(slot.fail(e.to_string())),
            None => Err(slot.fail(format!(
                "no confirmation for {} within {}s",
                hash,
                self.confirmation_timeout.as_secs_f64()
            ))),
        }
    }

    fn reserve(&self, kind: TxKind, amount: Amount) -> Result<Reservation<'_>, SessionError> {
        let mut pending = self.pending.borrow_mut();
        if pending.is_some() {
            tracing::warn!(%kind, %amount, "rejected: transaction already in progress");
            return Err(SessionError::TransactionInProgress);
        }
        *pending = Some(PendingTransaction { kind, amount, status: TxStatus::Submitted, hash: None });
        Ok(Reservation { slot: &self.pending })
    }
}

/// Owns the pending slot for one submission; dropping it destroys the PendingTransaction.
struct Reservation<'a> {
    slot: &'a RefCell<Option<PendingTransaction>>,
}

impl Reservation<'_> {
    fn update(&self, f: impl FnOnce(&mut PendingTransaction)) {
        if let Some(pending) = self.slot.borrow_mut().as_mut() {
            f(pending);
        }
    }

    fn fail(self, reason: String) -> SessionError {
        self.update(|p| p.status = TxStatus::Failed);
        tracing::warn!(reason = %reason, "transaction failed");
        SessionError::TransactionFailed(reason)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.slot.borrow_mut().take();
    }
}
