//! Session - the connection and transaction lifecycle state machine
//!
//! ```text
//! Init ──▶ NoProvider
//!   │
//!   ├────▶ Disconnected ──connect──▶ Connecting ──▶ Disconnected | Connected
//!   │                                                              │
//!   └────▶ Connected ◀──────── complete ──────── Submitting ◀──────┘ deposit / withdraw
//! ```
//!
//! Provider events re-enter the machine: `AccountsChanged` rebinds (or disconnects on an empty
//! list), `Disconnected` drops the binding.

mod controller;
mod state;

pub use controller::SessionController;
pub use state::{Binding, SessionSnapshot, SessionState};
