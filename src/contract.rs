//! ContractBinding - signer-scoped handle to the fixed wallet contract
//!
//! The contract exposes three functions:
//!
//! | Function | Kind | Encoding |
//! |----------|------|----------|
//! | `deposit()` | payable | selector only, amount as attached value |
//! | `withdraw(uint256)` | state-changing | selector + 32-byte amount |
//! | `getBalance()` | view | selector only, returns `uint256` |

use crate::account::Account;
use crate::amount::Amount;
use crate::error::SessionError;
use crate::provider::{methods, Eip1193, ProviderGateway, ProviderRpcError};
use crate::runtime;
use alloy_primitives::{Address, B256, U256};
use serde_json::{json, Value};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// ABI surface of the contract, hand-encoded.
pub mod interface {
    use super::ContractError;
    use alloy_primitives::{keccak256, U256};

    pub const DEPOSIT: &str = "deposit()";
    pub const WITHDRAW: &str = "withdraw(uint256)";
    pub const GET_BALANCE: &str = "getBalance()";

    pub const ALL: &[&str] = &[DEPOSIT, WITHDRAW, GET_BALANCE];

    /// Decoded calldata, as seen by the contract.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Call {
        Deposit,
        Withdraw(U256),
        GetBalance,
    }

    pub fn selector(signature: &str) -> [u8; 4] {
        let hash = keccak256(signature.as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    pub fn encode_deposit() -> Vec<u8> { selector(DEPOSIT).to_vec() }

    pub fn encode_withdraw(amount: U256) -> Vec<u8> {
        let mut data = selector(WITHDRAW).to_vec();
        data.extend_from_slice(&amount.to_be_bytes::<32>());
        data
    }

    pub fn encode_get_balance() -> Vec<u8> { selector(GET_BALANCE).to_vec() }

    /// Decode a single `uint256` return value.
    pub fn decode_uint(data: &[u8]) -> Result<U256, ContractError> {
        if data.len() < 32 {
            return Err(ContractError::Decode(format!("expected 32 bytes, got {}", data.len())));
        }
        Ok(U256::from_be_slice(&data[..32]))
    }

    pub fn decode_call(data: &[u8]) -> Option<Call> {
        if data.len() < 4 {
            return None;
        }
        let (sel, args) = data.split_at(4);
        if sel == selector(DEPOSIT) && args.is_empty() {
            Some(Call::Deposit)
        } else if sel == selector(GET_BALANCE) && args.is_empty() {
            Some(Call::GetBalance)
        } else if sel == selector(WITHDRAW) && args.len() == 32 {
            Some(Call::Withdraw(U256::from_be_slice(args)))
        } else {
            None
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error(transparent)]
    Rpc(#[from] ProviderRpcError),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("transaction {0} reverted")]
    Reverted(B256),
}

/// Outcome recorded in a mined transaction's receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Binds accounts to the fixed contract through the provider.
#[derive(Clone)]
pub struct ContractBinding {
    gateway: ProviderGateway,
    contract: Address,
}

impl ContractBinding {
    pub fn new(gateway: ProviderGateway, contract: Address) -> Self { Self { gateway, contract } }

    /// Build a handle whose signer is `account`. The provider must still list the account as
    /// authorized; otherwise no signer can be produced.
    pub async fn bind(&self, account: Account) -> Result<ContractHandle, SessionError> {
        let provider = self.gateway.provider()?;
        let authorized = self
            .gateway
            .query_authorized_accounts()
            .await
            .map_err(|e| SessionError::BindingFailed(format!("signer lookup failed: {}", e)))?;
        if !authorized.contains(&account) {
            return Err(SessionError::BindingFailed(format!("provider has no signer for {}", account)));
        }
        tracing::debug!(account = %account, contract = %self.contract, "bound contract handle");
        Ok(ContractHandle { address: self.contract, signer: account, provider })
    }
}

/// Immutable handle: contract address, interface, signer. Rebinding creates a new handle.
#[derive(Clone)]
pub struct ContractHandle {
    address: Address,
    signer: Account,
    provider: Rc<dyn Eip1193>,
}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("address", &self.address)
            .field("signer", &self.signer)
            .finish()
    }
}

impl ContractHandle {
    pub fn address(&self) -> Address { self.address }
    pub fn signer(&self) -> Account { self.signer }

    /// Read-only call to `getBalance()`.
    pub async fn get_balance(&self) -> Result<U256, ContractError> {
        let params = json!([
            {
                "from": self.signer.to_wire(),
                "to": self.to(),
                "data": to_hex(&interface::encode_get_balance()),
            },
            "latest"
        ]);
        let value = self.provider.request(methods::CALL, params).await?;
        let raw = value
            .as_str()
            .ok_or_else(|| ContractError::Decode(format!("eth_call returned {}", value)))?;
        interface::decode_uint(&from_hex(raw)?)
    }

    /// Submit `deposit()` with `amount` attached as value and a fixed gas-limit hint.
    pub async fn deposit(&self, amount: Amount, gas_limit: u64) -> Result<B256, ContractError> {
        self.send(json!({
            "from": self.signer.to_wire(),
            "to": self.to(),
            "data": to_hex(&interface::encode_deposit()),
            "value": quantity(amount.units()),
            "gas": format!("0x{:x}", gas_limit),
        }))
        .await
    }

    /// Submit `withdraw(amount)`. Sufficient funds are the contract's business.
    pub async fn withdraw(&self, amount: Amount) -> Result<B256, ContractError> {
        self.send(json!({
            "from": self.signer.to_wire(),
            "to": self.to(),
            "data": to_hex(&interface::encode_withdraw(amount.units())),
        }))
        .await
    }

    pub async fn receipt(&self, hash: B256) -> Result<Option<ReceiptStatus>, ContractError> {
        let value = self
            .provider
            .request(methods::TRANSACTION_RECEIPT, json!([hash.to_string()]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        match value.get("status").and_then(Value::as_str) {
            Some("0x1") => Ok(Some(ReceiptStatus::Success)),
            Some("0x0") => Ok(Some(ReceiptStatus::Reverted)),
            other => Err(ContractError::Decode(format!("receipt status {:?}", other))),
        }
    }

    /// Poll for the receipt until the transaction is mined. Unbounded; callers add the timeout.
    pub async fn wait_for_confirmation(&self, hash: B256, poll_interval: Duration) -> Result<(), ContractError> {
        loop {
            match self.receipt(hash).await? {
                Some(ReceiptStatus::Success) => return Ok(()),
                Some(ReceiptStatus::Reverted) => return Err(ContractError::Reverted(hash)),
                None => runtime::sleep(poll_interval).await,
            }
        }
    }

    async fn send(&self, tx: Value) -> Result<B256, ContractError> {
        let value = self.provider.request(methods::SEND_TRANSACTION, json!([tx])).await?;
        let raw = value
            .as_str()
            .ok_or_else(|| ContractError::Decode(format!("eth_sendTransaction returned {}", value)))?;
        B256::from_str(raw).map_err(|e| ContractError::Decode(format!("tx hash {}: {}", raw, e)))
    }

    fn to(&self) -> String { format!("{:#x}", self.address) }
}

pub(crate) fn to_hex(data: &[u8]) -> String { format!("0x{}", hex::encode(data)) }

pub(crate) fn from_hex(raw: &str) -> Result<Vec<u8>, ContractError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|e| ContractError::Decode(format!("hex: {}", e)))
}

pub(crate) fn quantity(value: U256) -> String { format!("0x{:x}", value) }
