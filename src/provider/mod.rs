//! Provider - the injected wallet capability and the gateway over it
//!
//! ```text
//! ProviderGateway (detect / query / request / events)
//!     │
//!     ▼
//! Eip1193 trait ── request(method, params) -> JSON
//!     │
//!     ├── wasm::InjectedProvider   (window.ethereum)
//!     └── devchain::DevChain       (in-memory, tests + CLI)
//! ```

mod gateway;

pub use gateway::ProviderGateway;
pub(crate) use gateway::parse_event_accounts;

use async_trait::async_trait;
use futures::channel::mpsc;
use serde_json::Value;
use thiserror::Error;

/// JSON-RPC method names used by the session core.
pub mod methods {
    pub const ACCOUNTS: &str = "eth_accounts";
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const CALL: &str = "eth_call";
    pub const SEND_TRANSACTION: &str = "eth_sendTransaction";
    pub const TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
}

/// Error returned by a provider request, shaped after EIP-1193's `ProviderRpcError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
}

impl ProviderRpcError {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const INTERNAL: i64 = -32603;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn user_rejected() -> Self { Self::new(Self::USER_REJECTED, "User rejected the request.") }

    pub fn is_user_rejection(&self) -> bool { self.code == Self::USER_REJECTED }
}

/// Notifications pushed by the provider outside of any request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Raw address strings, in the provider's order. Empty means access was revoked.
    AccountsChanged(Vec<String>),
    Disconnected,
}

/// The EIP-1193 request surface of an injected wallet.
///
/// Single-threaded by contract: implementations may hold `Rc`/`RefCell` state and the futures
/// they return are not `Send`.
#[async_trait(?Send)]
pub trait Eip1193 {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;

    /// Subscribe to provider events. Providers without event support return `None`.
    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<ProviderEvent>> { None }
}
