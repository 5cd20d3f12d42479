//! Browser `fetch` implementation of the `HttpClient` bridge.
//!
//! Requests always carry credentials so the console's session cookie reaches
//! the backend. A timeout arms a `setTimeout` that aborts the request; the
//! timer is cleared once the body has been read.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    http::{HttpClient, HttpRequest, HttpResponse},
};
use bytes::Bytes;
use gloo_timers::callback::Timeout;
use js_sys::{try_iter, Array, Uint8Array};
use std::{collections::HashMap, time::Duration};
use tracing::debug;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AbortController, Headers, Request, RequestCredentials, RequestInit, RequestMode, Response,
    Window,
};

use crate::error::WasmError;

pub struct WasmHttpClient {
    window: Window,
    default_timeout: Option<Duration>,
}

impl WasmHttpClient {
    pub fn new() -> BridgeResult<Self> {
        let window = web_sys::window()
            .ok_or_else(|| WasmError::NotAvailable("window".to_string()))?;
        Ok(Self {
            window,
            default_timeout: None,
        })
    }

    /// Timeout applied to requests that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }
}

fn to_fetch_request(
    request: &HttpRequest,
    controller: Option<&AbortController>,
) -> BridgeResult<Request> {
    let init = RequestInit::new();
    init.set_method(request.method.as_str());
    init.set_mode(RequestMode::Cors);
    init.set_credentials(RequestCredentials::Include);

    if let Some(controller) = controller {
        init.set_signal(Some(&controller.signal()));
    }

    let headers = Headers::new().map_err(|err| js_error("create headers", err))?;
    for (name, value) in &request.headers {
        headers
            .set(name, value)
            .map_err(|err| js_error("set header", err))?;
    }
    init.set_headers(&headers);

    if let Some(body) = &request.body {
        init.set_body(&Uint8Array::from(body.as_ref()).into());
    }

    Request::new_with_str_and_init(&request.url, &init)
        .map_err(|err| js_error("build request", err))
}

async fn into_response(response: Response) -> BridgeResult<HttpResponse> {
    let mut headers = HashMap::new();
    if let Some(entries) =
        try_iter(&response.headers().into()).map_err(|err| js_error("iterate headers", err))?
    {
        for entry in entries {
            let pair = Array::from(&entry.map_err(|err| js_error("read header", err))?);
            if let (Some(name), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
                headers.insert(name, value);
            }
        }
    }

    let buffer = response
        .array_buffer()
        .map_err(|err| js_error("read body", err))?;
    let buffer = JsFuture::from(buffer)
        .await
        .map_err(|err| js_error("read body", err))?;

    Ok(HttpResponse {
        status: response.status(),
        headers,
        body: Bytes::from(Uint8Array::new(&buffer).to_vec()),
    })
}

#[async_trait(?Send)]
impl HttpClient for WasmHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let timeout = request.timeout.or(self.default_timeout);
        let controller = match timeout {
            Some(_) => Some(
                AbortController::new().map_err(|err| js_error("create abort controller", err))?,
            ),
            None => None,
        };

        debug!(method = request.method.as_str(), url = %request.url, "fetch");

        let fetch_request = to_fetch_request(&request, controller.as_ref())?;

        // Dropping the guard clears the timer.
        let _abort_guard = timeout.zip(controller.clone()).map(|(timeout, controller)| {
            let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
            Timeout::new(millis, move || controller.abort())
        });

        let result = JsFuture::from(self.window.fetch_with_request(&fetch_request)).await;
        let aborted = controller.as_ref().is_some_and(|c| c.signal().aborted());

        let value = match result {
            Ok(value) => value,
            Err(_) if aborted => {
                return Err(BridgeError::Timeout(format!(
                    "HTTP request timed out after {} ms",
                    timeout.unwrap_or_default().as_millis()
                )));
            }
            Err(err) => return Err(js_error("fetch", err)),
        };

        let response = value
            .dyn_into::<Response>()
            .map_err(|_| BridgeError::OperationFailed("fetch returned non-Response".into()))?;
        into_response(response).await
    }
}

fn js_error(context: &str, err: JsValue) -> BridgeError {
    WasmError::from_js(&format!("WasmHttpClient {context}"), err).into()
}
