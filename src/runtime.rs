//! Runtime - platform timer and timeout combinator
//!
//! Native builds sleep on tokio's timer. Browser builds park on a `setTimeout` promise so the
//! event loop keeps running while a confirmation wait is suspended.

use futures::future::{self, Either};
use std::future::Future;
use std::time::Duration;

#[cfg(not(any(feature = "native", feature = "wasm")))]
compile_error!("enable either the `native` or the `wasm` feature");

/// Suspend the current flow for `duration`.
#[cfg(feature = "native")]
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Suspend the current flow for `duration`.
///
/// Schedules on the global scope's `setTimeout`, so it settles in windows and workers alike. If
/// no timer exists the promise is rejected and the flow resumes at once.
#[cfg(all(feature = "wasm", not(feature = "native")))]
pub async fn sleep(duration: Duration) {
    use js_sys::{Function, Promise, Reflect};
    use wasm_bindgen::{JsCast, JsValue};

    let millis = duration.as_millis().min(i32::MAX as u128) as i32;
    let promise = Promise::new(&mut |resolve, reject| {
        let global = js_sys::global();
        let scheduled = Reflect::get(&global, &JsValue::from_str("setTimeout"))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .map(|set_timeout| set_timeout.call2(&global, &resolve, &JsValue::from(millis)).is_ok())
            .unwrap_or(false);
        if !scheduled {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("setTimeout unavailable"));
        }
    });
    if wasm_bindgen_futures::JsFuture::from(promise).await.is_err() {
        tracing::warn!("no timer in this scope; sleep returned early");
    }
}

/// Run `fut` to completion unless `limit` elapses first; `None` on timeout.
pub async fn timeout<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    let fut = std::pin::pin!(fut);
    let delay = std::pin::pin!(sleep(limit));
    match future::select(fut, delay).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(_) => None,
    }
}
