//! Session states and the observable snapshot

use crate::account::Account;
use crate::balance::BalanceSync;
use crate::contract::ContractHandle;
use crate::error::SessionError;
use crate::executor::PendingTransaction;
use alloy_primitives::U256;
use serde_json::{json, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Init,
    NoProvider,
    Disconnected,
    Connecting,
    Connected,
    Submitting,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Init => "init",
            SessionState::NoProvider => "no_provider",
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Submitting => "submitting",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A contract handle together with the balance cache that only exists alongside it.
#[derive(Debug)]
pub struct Binding {
    pub handle: ContractHandle,
    pub balance: BalanceSync,
}

impl Binding {
    pub fn new(handle: ContractHandle) -> Self { Self { handle, balance: BalanceSync::new() } }

    pub fn account(&self) -> Account { self.handle.signer() }
}

/// Everything the UI needs to render, taken at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub account: Option<Account>,
    pub balance: Option<U256>,
    /// True while a transaction is pending: the cached balance predates it.
    pub balance_stale: bool,
    pub pending: Option<PendingTransaction>,
    pub last_error: Option<SessionError>,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Value {
        json!({
            "state": self.state.as_str(),
            "account": self.account.map(|a| a.checksummed()),
            "balance": self.balance.map(|b| b.to_string()),
            "balance_stale": self.balance_stale,
            "pending": self.pending.as_ref().map(|p| json!({
                "kind": p.kind.as_str(),
                "amount": p.amount.to_string(),
                "status": p.status.as_str(),
                "hash": p.hash.map(|h| h.to_string()),
            })),
            "last_error": self.last_error.as_ref().map(|e| json!({
                "kind": e.kind(),
                "message": e.to_string(),
            })),
        })
    }
}
