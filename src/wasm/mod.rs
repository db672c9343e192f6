//! WASM module: the session core in the browser
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           BeeDapp (JS API)              │
//! │  start, connect, deposit, withdraw      │
//! │  refreshBalance, snapshot, onChange     │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │          SessionController              │
//! │  state machine, single writer           │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │          InjectedProvider               │
//! │  window.ethereum (EIP-1193)             │
//! └─────────────────────────────────────────┘
//! ```

mod dapp;
mod provider;

pub use dapp::BeeDapp;
pub use provider::InjectedProvider;

use wasm_bindgen::prelude::*;

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

pub(crate) use log;
