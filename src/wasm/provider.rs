//! InjectedProvider - `window.ethereum` behind the Eip1193 trait

use super::log;
use crate::provider::{Eip1193, ProviderEvent, ProviderRpcError};
use async_trait::async_trait;
use futures::channel::mpsc;
use js_sys::{Array, Function, Object, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

const INJECTION_KEY: &str = "ethereum";

pub struct InjectedProvider {
    ethereum: JsValue,
}

impl InjectedProvider {
    /// Look up the injected provider object. `None` when the page has no wallet.
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        let ethereum = Reflect::get(&window, &JsValue::from_str(INJECTION_KEY)).ok()?;
        if ethereum.is_undefined() || ethereum.is_null() {
            return None;
        }
        Some(Self { ethereum })
    }

    fn function(&self, name: &str) -> Result<Function, ProviderRpcError> {
        Reflect::get(&self.ethereum, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .ok_or_else(|| {
                ProviderRpcError::new(
                    ProviderRpcError::UNSUPPORTED_METHOD,
                    format!("provider has no {}()", name),
                )
            })
    }

    /// Register a listener with `ethereum.on(event, ...)`. The closure lives for the page.
    fn listen(&self, event: &str, handler: Closure<dyn FnMut(JsValue)>) {
        match self.function("on") {
            Ok(on) => {
                if let Err(e) = on.call2(&self.ethereum, &JsValue::from_str(event), handler.as_ref()) {
                    log!("[InjectedProvider] on({}) failed: {:?}", event, e);
                }
            }
            Err(e) => log!("[InjectedProvider] {}", e),
        }
        handler.forget();
    }
}

#[async_trait(?Send)]
impl Eip1193 for InjectedProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        let request = self.function("request")?;
        let serializer = serde_wasm_bindgen::Serializer::new().serialize_maps_as_objects(true);
        let params = params.serialize(&serializer).map_err(|e| internal(e.to_string()))?;

        let args = Object::new();
        Reflect::set(&args, &"method".into(), &JsValue::from_str(method)).map_err(rpc_error)?;
        Reflect::set(&args, &"params".into(), &params).map_err(rpc_error)?;

        let promise = request
            .call1(&self.ethereum, &args)
            .map_err(rpc_error)?
            .dyn_into::<Promise>()
            .map_err(|_| internal("request() did not return a promise"))?;
        let result = JsFuture::from(promise).await.map_err(rpc_error)?;
        serde_wasm_bindgen::from_value(result).map_err(|e| internal(e.to_string()))
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<ProviderEvent>> {
        let (tx, rx) = mpsc::unbounded();

        let accounts_tx = tx.clone();
        self.listen(
            "accountsChanged",
            Closure::new(move |accounts: JsValue| {
                let list = Array::from(&accounts).iter().filter_map(|v| v.as_string()).collect();
                let _ = accounts_tx.unbounded_send(ProviderEvent::AccountsChanged(list));
            }),
        );
        self.listen(
            "disconnect",
            Closure::new(move |_: JsValue| {
                let _ = tx.unbounded_send(ProviderEvent::Disconnected);
            }),
        );
        Some(rx)
    }
}

/// Read `{code, message}` off a rejected request.
fn rpc_error(err: JsValue) -> ProviderRpcError {
    let code = Reflect::get(&err, &"code".into())
        .ok()
        .and_then(|c| c.as_f64())
        .map(|c| c as i64)
        .unwrap_or(ProviderRpcError::INTERNAL);
    let message = Reflect::get(&err, &"message".into())
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", err));
    ProviderRpcError::new(code, message)
}

fn internal(message: impl Into<String>) -> ProviderRpcError {
    ProviderRpcError::new(ProviderRpcError::INTERNAL, message)
}
