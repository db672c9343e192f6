//! BalanceSync - last observed contract balance

use crate::contract::ContractHandle;
use crate::error::SessionError;
use alloy_primitives::U256;
use std::cell::Cell;

/// Cache of the last successful `getBalance()` read for one binding.
///
/// A failed refresh leaves the cached value untouched: stale, never corrupted. When reads
/// overlap, only the most recently started one may write the cache.
#[derive(Debug, Default)]
pub struct BalanceSync {
    last: Cell<Option<U256>>,
    issued: Cell<u64>,
}

impl BalanceSync {
    pub fn new() -> Self { Self::default() }

    pub fn cached(&self) -> Option<U256> { self.last.get() }

    pub async fn refresh(&self, handle: &ContractHandle) -> Result<U256, SessionError> {
        let ticket = self.issued.get() + 1;
        self.issued.set(ticket);

        match handle.get_balance().await {
            Ok(balance) => {
                if self.issued.get() == ticket {
                    self.last.set(Some(balance));
                    tracing::debug!(account = %handle.signer(), %balance, "balance refreshed");
                } else {
                    tracing::debug!(account = %handle.signer(), %balance, "discarding superseded balance read");
                }
                Ok(balance)
            }
            Err(e) => {
                tracing::warn!(account = %handle.signer(), error = %e, "balance query failed");
                Err(SessionError::BalanceQueryFailed(e.to_string()))
            }
        }
    }
}
