//! DevChain - in-memory wallet and contract behind the EIP-1193 surface
//!
//! Simulates enough of a wallet plus a deployed contract for the session core to run end to end
//! without a browser: account authorization, user rejection, `eth_call` against `getBalance()`,
//! and transactions that are mined after a configurable number of receipt polls.
//!
//! Contract effects are applied when the receipt first becomes visible. A withdrawal larger than
//! the contract balance is mined with status `0x0`.

use crate::account::Account;
use crate::contract::interface::{self, Call};
use crate::contract::{from_hex, to_hex};
use crate::provider::{methods, Eip1193, ProviderEvent, ProviderRpcError};
use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use futures::channel::mpsc;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::str::FromStr;

/// Receipt polls that return `null` before a transaction is mined, unless overridden.
pub const DEFAULT_CONFIRMATION_POLLS: u32 = 1;

#[derive(Clone)]
pub struct DevChain {
    state: Rc<RefCell<ChainState>>,
    watchers: Rc<RefCell<Vec<mpsc::UnboundedSender<ProviderEvent>>>>,
}

struct ChainState {
    contract: Address,
    accounts: Vec<Account>,
    authorized: bool,
    reject_requests: bool,
    reject_transactions: bool,
    fail_balance_reads: bool,
    stall_confirmations: bool,
    confirmation_polls: u32,
    contract_balance: U256,
    receipts: HashMap<B256, PendingReceipt>,
    next_tx: u64,
    calls: Vec<String>,
    sent: Vec<Value>,
}

struct PendingReceipt {
    call: Call,
    value: U256,
    polls_remaining: u32,
    /// `Some(success)` once mined.
    outcome: Option<bool>,
}

impl DevChain {
    pub fn new(contract: Address) -> Self {
        Self {
            state: Rc::new(RefCell::new(ChainState {
                contract,
                accounts: Vec::new(),
                authorized: false,
                reject_requests: false,
                reject_transactions: false,
                fail_balance_reads: false,
                stall_confirmations: false,
                confirmation_polls: DEFAULT_CONFIRMATION_POLLS,
                contract_balance: U256::ZERO,
                receipts: HashMap::new(),
                next_tx: 0,
                calls: Vec::new(),
                sent: Vec::new(),
            })),
            watchers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Wallet accounts, in the order the wallet reports them.
    pub fn with_accounts(self, accounts: impl IntoIterator<Item = Account>) -> Self {
        self.state.borrow_mut().accounts = accounts.into_iter().collect();
        self
    }

    /// Pretend the origin was authorized in an earlier visit.
    pub fn authorized(self) -> Self {
        self.state.borrow_mut().authorized = true;
        self
    }

    pub fn set_confirmation_polls(&self, polls: u32) {
        self.state.borrow_mut().confirmation_polls = polls;
    }

    /// Never mine anything submitted from now on.
    pub fn stall_confirmations(&self, stall: bool) {
        self.state.borrow_mut().stall_confirmations = stall;
    }

    /// Simulate the user dismissing every wallet prompt.
    pub fn reject_requests(&self, reject: bool) {
        self.state.borrow_mut().reject_requests = reject;
    }

    pub fn reject_transactions(&self, reject: bool) {
        self.state.borrow_mut().reject_transactions = reject;
    }

    pub fn fail_balance_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_balance_reads = fail;
    }

    pub fn contract_balance(&self) -> U256 { self.state.borrow().contract_balance }

    pub fn set_contract_balance(&self, balance: U256) {
        self.state.borrow_mut().contract_balance = balance;
    }

    /// Method names of every request received so far.
    pub fn calls(&self) -> Vec<String> { self.state.borrow().calls.clone() }

    /// Transaction objects accepted by `eth_sendTransaction`, as submitted.
    pub fn sent_transactions(&self) -> Vec<Value> { self.state.borrow().sent.clone() }

    pub fn call_count(&self, method: &str) -> usize {
        self.state.borrow().calls.iter().filter(|m| m.as_str() == method).count()
    }

    /// Replace the wallet's accounts and announce it, as when the user switches accounts.
    pub fn switch_accounts(&self, accounts: Vec<Account>) {
        let announced = {
            let mut state = self.state.borrow_mut();
            state.accounts = accounts;
            state.authorized = true;
            state.accounts.iter().map(Account::to_wire).collect()
        };
        self.notify(ProviderEvent::AccountsChanged(announced));
    }

    /// Withdraw the origin's authorization.
    pub fn revoke(&self) {
        self.state.borrow_mut().authorized = false;
        self.notify(ProviderEvent::AccountsChanged(Vec::new()));
    }

    pub fn disconnect(&self) {
        self.state.borrow_mut().authorized = false;
        self.notify(ProviderEvent::Disconnected);
    }

    fn notify(&self, event: ProviderEvent) {
        self.watchers
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }
}

impl ChainState {
    fn visible_accounts(&self) -> Value {
        if self.authorized {
            json!(self.accounts.iter().map(Account::to_wire).collect::<Vec<_>>())
        } else {
            json!([])
        }
    }

    fn request_accounts(&mut self) -> Result<Value, ProviderRpcError> {
        if self.reject_requests {
            return Err(ProviderRpcError::user_rejected());
        }
        self.authorized = true;
        Ok(self.visible_accounts())
    }

    fn call(&self, params: &Value) -> Result<Value, ProviderRpcError> {
        if self.fail_balance_reads {
            return Err(ProviderRpcError::new(ProviderRpcError::INTERNAL, "execution reverted"));
        }
        let tx = first_param(params)?;
        self.check_target(tx)?;
        match decode_data(tx)? {
            Call::GetBalance => Ok(json!(to_hex(&self.contract_balance.to_be_bytes::<32>()))),
            other => Err(invalid(format!("{:?} is not a view function", other))),
        }
    }

    fn send_transaction(&mut self, params: &Value) -> Result<Value, ProviderRpcError> {
        let tx = first_param(params)?;
        let from = tx
            .get("from")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Account>().ok())
            .ok_or_else(|| invalid("missing from"))?;
        if !self.authorized || !self.accounts.contains(&from) {
            return Err(ProviderRpcError::new(
                ProviderRpcError::UNAUTHORIZED,
                format!("{} is not authorized", from),
            ));
        }
        if self.reject_transactions {
            return Err(ProviderRpcError::user_rejected());
        }
        self.check_target(tx)?;
        let call = decode_data(tx)?;
        let value = match tx.get("value").and_then(Value::as_str) {
            Some(raw) => parse_quantity(raw)?,
            None => U256::ZERO,
        };
        if matches!(call, Call::GetBalance) || (value > U256::ZERO && !matches!(call, Call::Deposit)) {
            return Err(invalid("call does not accept this transaction"));
        }

        self.sent.push(tx.clone());
        self.next_tx += 1;
        let hash = keccak256(self.next_tx.to_be_bytes());
        let polls_remaining = if self.stall_confirmations { u32::MAX } else { self.confirmation_polls };
        self.receipts
            .insert(hash, PendingReceipt { call, value, polls_remaining, outcome: None });
        Ok(json!(hash.to_string()))
    }

    fn receipt(&mut self, params: &Value) -> Result<Value, ProviderRpcError> {
        let raw = params
            .get(0)
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("missing transaction hash"))?;
        let hash = B256::from_str(raw).map_err(|e| invalid(e.to_string()))?;
        let stalled = self.stall_confirmations;
        let Some(receipt) = self.receipts.get_mut(&hash) else {
            return Ok(Value::Null);
        };
        if receipt.outcome.is_none() {
            if stalled || receipt.polls_remaining == u32::MAX {
                return Ok(Value::Null);
            }
            if receipt.polls_remaining > 0 {
                receipt.polls_remaining -= 1;
                return Ok(Value::Null);
            }
            let (call, value) = (receipt.call, receipt.value);
            let success = self.apply(call, value);
            if let Some(receipt) = self.receipts.get_mut(&hash) {
                receipt.outcome = Some(success);
            }
        }
        let success = self.receipts.get(&hash).and_then(|r| r.outcome).unwrap_or(false);
        Ok(json!({
            "transactionHash": hash.to_string(),
            "status": if success { "0x1" } else { "0x0" },
        }))
    }

    /// Contract effect of a mined call. Returns whether it succeeded.
    fn apply(&mut self, call: Call, value: U256) -> bool {
        match call {
            Call::Deposit => {
                self.contract_balance = self.contract_balance.saturating_add(value);
                true
            }
            Call::Withdraw(amount) => match self.contract_balance.checked_sub(amount) {
                Some(rest) => {
                    self.contract_balance = rest;
                    true
                }
                None => false,
            },
            Call::GetBalance => false,
        }
    }

    fn check_target(&self, tx: &Value) -> Result<(), ProviderRpcError> {
        let to = tx
            .get("to")
            .and_then(Value::as_str)
            .and_then(|s| Address::from_str(s).ok())
            .ok_or_else(|| invalid("missing to"))?;
        if to != self.contract {
            return Err(invalid(format!("no contract at {}", to)));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Eip1193 for DevChain {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(method.to_string());
        tracing::trace!(method, %params, "devchain request");
        match method {
            methods::ACCOUNTS => Ok(state.visible_accounts()),
            methods::REQUEST_ACCOUNTS => state.request_accounts(),
            methods::CALL => state.call(&params),
            methods::SEND_TRANSACTION => state.send_transaction(&params),
            methods::TRANSACTION_RECEIPT => state.receipt(&params),
            other => Err(ProviderRpcError::new(
                ProviderRpcError::UNSUPPORTED_METHOD,
                format!("method {} not supported", other),
            )),
        }
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<ProviderEvent>> {
        let (tx, rx) = mpsc::unbounded();
        self.watchers.borrow_mut().push(tx);
        Some(rx)
    }
}

fn first_param(params: &Value) -> Result<&Value, ProviderRpcError> {
    params
        .get(0)
        .filter(|v| v.is_object())
        .ok_or_else(|| invalid("expected a transaction object"))
}

fn decode_data(tx: &Value) -> Result<Call, ProviderRpcError> {
    let raw = tx.get("data").and_then(Value::as_str).unwrap_or("0x");
    let data = from_hex(raw).map_err(|e| invalid(e.to_string()))?;
    interface::decode_call(&data).ok_or_else(|| invalid(format!("unknown calldata {}", raw)))
}

fn parse_quantity(raw: &str) -> Result<U256, ProviderRpcError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    U256::from_str_radix(digits, 16).map_err(|e| invalid(format!("quantity {}: {}", raw, e)))
}

fn invalid(message: impl Into<String>) -> ProviderRpcError {
    ProviderRpcError::new(ProviderRpcError::INTERNAL, message)
}
