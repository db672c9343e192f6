//! Beedapp: wallet session core. One contract, one account, one transaction at a time.
//!
//! # Architecture
//!
//! ```text
//! SessionController (single writer, observable snapshots)
//!   │
//!   ├── ProviderGateway ── detect / eth_accounts / eth_requestAccounts / events
//!   │     └── Eip1193 (InjectedProvider in the browser, DevChain in memory)
//!   │
//!   ├── ContractBinding ── account → ContractHandle (address + interface + signer)
//!   │
//!   ├── BalanceSync ── getBalance() → cached U256
//!   │
//!   └── TransactionExecutor ── deposit / withdraw, confirmation, resync
//! ```
//!
//! # Callbacks
//!
//! | Callback | Method | Effect |
//! |----------|--------|--------|
//! | connect | `on_connect_requested()` | Prompt the wallet, bind the first account |
//! | deposit | `on_deposit_requested(amount)` | Send `deposit()` with `amount` attached |
//! | withdraw | `on_withdraw_requested(amount)` | Send `withdraw(amount)` |
//! | observe | `subscribe()` / `snapshot()` | State, account, balance, pending tx, last error |
//!
//! # Features
//!
//! - `native` - tokio timer, CLI, tracing subscriber
//! - `wasm` - browser build against `window.ethereum`
//!
//! # Usage
//!
//! ```ignore
//! use beedapp::{DappConfig, DevChain, SessionController};
//!
//! let chain = DevChain::new(config.contract_address).with_accounts([alice]).authorized();
//! let session = SessionController::new(DappConfig::default(), Some(Rc::new(chain)));
//!
//! session.start().await;                       // Connected
//! session.on_deposit_requested("1000").await?; // balance 1000
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod account;
pub mod amount;
pub mod balance;
pub mod config;
pub mod contract;
pub mod devchain;
pub mod error;
pub mod executor;
pub mod provider;
pub mod runtime;
pub mod session;

// =============================================================================
// Native-only modules
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;

// =============================================================================
// WASM-only modules (browser, wasm-bindgen)
// =============================================================================
#[cfg(feature = "wasm")]
pub mod wasm;

// =============================================================================
// Re-exports
// =============================================================================
pub use account::{Account, AccountSession};
pub use amount::Amount;
pub use balance::BalanceSync;
pub use config::DappConfig;
pub use contract::{ContractBinding, ContractError, ContractHandle};
pub use devchain::DevChain;
pub use error::{ConfigError, SessionError, SessionResult};
pub use executor::{Confirmed, PendingTransaction, TransactionExecutor, TxKind, TxStatus};
pub use provider::{Eip1193, ProviderEvent, ProviderGateway, ProviderRpcError};
pub use session::{SessionController, SessionSnapshot, SessionState};

#[cfg(feature = "wasm")]
pub use wasm::{BeeDapp, InjectedProvider};
