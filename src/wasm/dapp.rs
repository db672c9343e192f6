//! BeeDapp: the session controller exposed to JavaScript

use super::log;
use super::provider::InjectedProvider;
use crate::config::DappConfig;
use crate::error::SessionError;
use crate::provider::Eip1193;
use crate::session::{SessionController, SessionSnapshot};
use serde::Serialize;
use serde_json::{json, Value};
use std::cell::Cell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

fn to_js(value: &Value) -> JsValue {
    let serializer = serde_wasm_bindgen::Serializer::new().serialize_maps_as_objects(true);
    value.serialize(&serializer).unwrap_or(JsValue::NULL)
}

fn snapshot_to_js(snapshot: &SessionSnapshot) -> JsValue { to_js(&snapshot.to_json()) }

fn error_to_js(e: &SessionError) -> JsValue {
    to_js(&json!({"kind": e.kind(), "message": e.to_string()}))
}

#[wasm_bindgen]
pub struct BeeDapp {
    controller: SessionController,
    events_started: Cell<bool>,
}

#[wasm_bindgen]
impl BeeDapp {
    /// Create a session against `window.ethereum`. Omit the address to use the built-in contract.
    #[wasm_bindgen(constructor)]
    pub fn new(contract_address: Option<String>) -> Result<BeeDapp, JsValue> {
        let config = match contract_address {
            Some(address) => DappConfig::new(&address),
            None => Ok(DappConfig::default()),
        }
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let provider = InjectedProvider::detect().map(|p| Rc::new(p) as Rc<dyn Eip1193>);
        log!("[BeeDapp] provider detected: {}", provider.is_some());
        Ok(Self {
            controller: SessionController::new(config, provider),
            events_started: Cell::new(false),
        })
    }

    /// Detect the provider, reconnect an authorized account and start listening for events.
    /// Resolves to the resulting state name.
    #[wasm_bindgen]
    pub async fn start(&self) -> String {
        let state = self.controller.start().await;
        if !self.events_started.replace(true) {
            let controller = self.controller.clone();
            wasm_bindgen_futures::spawn_local(async move { controller.run_events().await });
        }
        state.as_str().to_string()
    }

    #[wasm_bindgen]
    pub async fn connect(&self) -> Result<JsValue, JsValue> {
        self.controller
            .on_connect_requested()
            .await
            .map(|_| snapshot_to_js(&self.controller.snapshot()))
            .map_err(|e| error_to_js(&e))
    }

    /// Deposit `amount` (decimal string, smallest unit).
    #[wasm_bindgen]
    pub async fn deposit(&self, amount: String) -> Result<JsValue, JsValue> {
        self.controller
            .on_deposit_requested(&amount)
            .await
            .map(|_| snapshot_to_js(&self.controller.snapshot()))
            .map_err(|e| error_to_js(&e))
    }

    #[wasm_bindgen]
    pub async fn withdraw(&self, amount: String) -> Result<JsValue, JsValue> {
        self.controller
            .on_withdraw_requested(&amount)
            .await
            .map(|_| snapshot_to_js(&self.controller.snapshot()))
            .map_err(|e| error_to_js(&e))
    }

    #[wasm_bindgen(js_name = "refreshBalance")]
    pub async fn refresh_balance(&self) -> Result<JsValue, JsValue> {
        self.controller
            .refresh_balance()
            .await
            .map(|balance| JsValue::from_str(&balance.to_string()))
            .map_err(|e| error_to_js(&e))
    }

    #[wasm_bindgen]
    pub fn snapshot(&self) -> JsValue { snapshot_to_js(&self.controller.snapshot()) }

    /// Call `callback(snapshot)` now and on every change.
    #[wasm_bindgen(js_name = "onChange")]
    pub fn on_change(&self, callback: js_sys::Function) {
        let rx = self.controller.subscribe();
        let this = JsValue::NULL;
        wasm_bindgen_futures::spawn_local(async move {
            use futures::StreamExt;
            let mut rx = rx;
            while let Some(snapshot) = rx.next().await {
                let _ = callback.call1(&this, &snapshot_to_js(&snapshot));
            }
        });
    }
}
