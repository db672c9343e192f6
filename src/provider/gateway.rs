//! ProviderGateway - detection, account query and account request

use super::{methods, Eip1193, ProviderEvent, ProviderRpcError};
use crate::account::Account;
use crate::error::SessionError;
use futures::channel::mpsc;
use serde_json::{json, Value};
use std::rc::Rc;

/// Gateway over an optional provider capability, fixed at construction.
#[derive(Clone)]
pub struct ProviderGateway {
    provider: Option<Rc<dyn Eip1193>>,
}

impl ProviderGateway {
    pub fn new(provider: Option<Rc<dyn Eip1193>>) -> Self { Self { provider } }

    pub fn absent() -> Self { Self { provider: None } }

    /// Whether a wallet capability was injected. Never fails, no side effects.
    pub fn detect(&self) -> bool { self.provider.is_some() }

    pub fn provider(&self) -> Result<Rc<dyn Eip1193>, SessionError> {
        self.provider.clone().ok_or(SessionError::ProviderUnavailable)
    }

    /// Accounts already authorized for this origin, without prompting.
    pub async fn query_authorized_accounts(&self) -> Result<Vec<Account>, SessionError> {
        let provider = self.provider()?;
        tracing::debug!("querying authorized accounts");
        let value = provider
            .request(methods::ACCOUNTS, json!([]))
            .await
            .map_err(|e| SessionError::Provider(e.to_string()))?;
        parse_accounts(&value)
    }

    /// Prompt the user for account access.
    pub async fn request_accounts(&self) -> Result<Vec<Account>, SessionError> {
        let provider = self.provider()?;
        tracing::debug!("requesting accounts");
        let value = provider
            .request(methods::REQUEST_ACCOUNTS, json!([]))
            .await
            .map_err(map_request_error)?;
        parse_accounts(&value)
    }

    /// Provider event stream, if the capability supports it.
    pub fn events(&self) -> Option<mpsc::UnboundedReceiver<ProviderEvent>> {
        self.provider.as_ref().and_then(|p| p.subscribe())
    }
}

fn map_request_error(e: ProviderRpcError) -> SessionError {
    if e.is_user_rejection() {
        SessionError::UserRejected
    } else {
        SessionError::Provider(e.to_string())
    }
}

/// Parse a JSON array of address strings, preserving order.
pub(crate) fn parse_accounts(value: &Value) -> Result<Vec<Account>, SessionError> {
    let list = value
        .as_array()
        .ok_or_else(|| SessionError::Provider(format!("accounts response is not a list: {}", value)))?;
    list.iter()
        .map(|entry| {
            entry
                .as_str()
                .ok_or_else(|| SessionError::Provider(format!("account entry is not a string: {}", entry)))?
                .parse::<Account>()
                .map_err(|e| SessionError::Provider(format!("bad account address: {}", e)))
        })
        .collect()
}

/// Like [`parse_accounts`] for event payloads. Malformed entries are dropped, except that an
/// unreadable first entry yields an empty list: the wallet's selected account is unusable and no
/// later entry may stand in for it.
pub(crate) fn parse_event_accounts(raw: &[String]) -> Vec<Account> {
    let Some(first) = raw.first() else {
        return Vec::new();
    };
    if let Err(e) = first.parse::<Account>() {
        tracing::warn!(entry = %first, error = %e, "unreadable selected account in event");
        return Vec::new();
    }
    raw.iter().filter_map(|s| s.parse::<Account>().ok()).collect()
}
