//! Error taxonomy for the session core.
//!
//! Transport failures (`ProviderRpcError`) and contract failures (`ContractError`) live next to
//! the code that produces them and are folded into `SessionError` at the component boundary.

use thiserror::Error;

/// Errors surfaced by the session core to the UI layer.
///
/// None of these are fatal: every variant leaves the controller in a valid, re-enterable state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no wallet provider detected")]
    ProviderUnavailable,

    #[error("user rejected the request")]
    UserRejected,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("contract binding failed: {0}")]
    BindingFailed(String),

    #[error("a transaction is already in progress")]
    TransactionInProgress,

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("balance query failed: {0}")]
    BalanceQueryFailed(String),

    #[error("no account connected")]
    NotConnected,

    #[error("provider error: {0}")]
    Provider(String),
}

impl SessionError {
    /// Short machine-readable tag, stable across message changes.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::ProviderUnavailable => "provider_unavailable",
            SessionError::UserRejected => "user_rejected",
            SessionError::InvalidAmount(_) => "invalid_amount",
            SessionError::BindingFailed(_) => "binding_failed",
            SessionError::TransactionInProgress => "transaction_in_progress",
            SessionError::TransactionFailed(_) => "transaction_failed",
            SessionError::BalanceQueryFailed(_) => "balance_query_failed",
            SessionError::NotConnected => "not_connected",
            SessionError::Provider(_) => "provider",
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Configuration validation errors, raised before any session exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid contract address '{value}': {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("invalid value for {key}: '{value}'")]
    InvalidNumber { key: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(String),
}
