//! Accounts and the account session derivation.

use alloy_primitives::Address;
use std::fmt;
use std::str::FromStr;

/// A wallet address as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Account(Address);

impl Account {
    pub fn new(address: Address) -> Self { Self(address) }

    pub fn address(&self) -> Address { self.0 }

    /// EIP-55 mixed-case form, used everywhere the account is shown or logged.
    pub fn checksummed(&self) -> String { self.0.to_checksum(None) }

    /// Lowercase form, matching what providers put on the wire.
    pub fn to_wire(&self) -> String { format!("{:#x}", self.0) }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.checksummed())
    }
}

impl FromStr for Account {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s).map(Account)
    }
}

/// Strict address parser: `0x` prefix followed by exactly 40 hex digits.
pub fn parse_address(raw: &str) -> Result<Address, String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| "missing 0x prefix".to_string())?;
    if digits.len() != 40 {
        return Err(format!("expected 40 hex digits, found {}", digits.len()));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("non-hex character".to_string());
    }
    Address::from_str(digits).map_err(|e| e.to_string())
}

/// Bound-account derivation: the first authorized account wins, an empty list binds nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSession {
    account: Option<Account>,
}

impl AccountSession {
    pub fn derive(accounts: &[Account]) -> Self {
        Self { account: accounts.first().copied() }
    }

    pub fn account(&self) -> Option<Account> { self.account }

    pub fn is_bound(&self) -> bool { self.account.is_some() }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const BOB: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

    #[test]
    fn test_checksummed_display() {
        let account: Account = ALICE.parse().unwrap();
        assert_eq!(account.to_string(), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(account.to_wire(), ALICE);
    }

    #[test]
    fn test_parse_address_rejects_bad_literals() {
        assert!(parse_address("f39fd6e51aad88f6f4ce6ab8827279cfffb92266").is_err());
        assert!(parse_address("0x5FbDB2315678afecb367f032d93F642f64180aa3a").is_err());
        assert!(parse_address("0xzz9fd6e51aad88f6f4ce6ab8827279cfffb92266").is_err());
        assert!(parse_address(" 0x5FbDB2315678afecb367f032d93F642f64180aa3 ").is_ok());
    }

    #[test]
    fn test_first_account_is_bound() {
        let accounts: Vec<Account> = [ALICE, BOB].iter().map(|a| a.parse().unwrap()).collect();
        let session = AccountSession::derive(&accounts);
        assert_eq!(session.account(), Some(accounts[0]));

        let empty = AccountSession::derive(&[]);
        assert!(!empty.is_bound());
    }
}
