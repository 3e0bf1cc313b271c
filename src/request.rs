//! Asynchronous GET plumbing for the prover endpoints.
//!
//! Every request carries the session identifier and a `randomv` timestamp
//! as a cache buster. Responses are plain text; a non-2xx status is a
//! transport error and gets the same silent treatment as a network
//! failure.

use js_sys::encode_uri_component;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use crate::{session::Session, web_unchecked::window_unchecked};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    CheckConstraint,
    CheckMacro,
    CheckExpression,
    CheckPending,
    History,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::CheckConstraint => "chkconstr.txt",
            Endpoint::CheckMacro => "chkmacro.txt",
            Endpoint::CheckExpression => "chkexpr.txt",
            Endpoint::CheckPending => "chkpending.txt",
            Endpoint::History => "history.txt",
        }
    }
}

#[derive(Debug)]
pub(crate) enum FetchError {
    Transport(JsValue),
    Status(u16),
}

impl From<JsValue> for FetchError {
    fn from(value: JsValue) -> Self {
        FetchError::Transport(value)
    }
}

/// Joins the configured base with an endpoint path. An empty base keeps
/// the path relative, so a deployment under a subpath still reaches its
/// own endpoints.
fn endpoint_url(base_url: &str, path: &str) -> String {
    if base_url.is_empty() {
        path.to_owned()
    } else {
        format!("{base_url}/{path}")
    }
}

fn request_url(session: &Session, endpoint: Endpoint, params: &[(&str, &str)]) -> String {
    let mut url = format!(
        "{}?SSID={}",
        endpoint_url(&session.base_url, endpoint.path()),
        String::from(encode_uri_component(&session.ssid)),
    );
    for (name, value) in params {
        url.push('&');
        url.push_str(name);
        url.push('=');
        url.push_str(&String::from(encode_uri_component(value)));
    }
    url.push_str(&format!("&randomv={}", js_sys::Date::now() as u64));
    url
}

/// Issues one GET against `endpoint` and returns the response body.
pub(crate) async fn get_text(
    session: &Session,
    endpoint: Endpoint,
    params: &[(&str, &str)],
) -> Result<String, FetchError> {
    let url = request_url(session, endpoint, params);
    let response = JsFuture::from(window_unchecked().fetch_with_str(&url)).await?;
    let response: Response = response.unchecked_into();
    if !response.ok() {
        return Err(FetchError::Status(response.status()));
    }
    let body = JsFuture::from(response.text()?).await?;
    Ok(body.as_string().unwrap_or_default())
}

#[cfg(test)]
mod test {
    use super::{endpoint_url, Endpoint};

    #[test]
    fn empty_base_url_keeps_paths_relative() {
        assert_eq!(
            endpoint_url("", Endpoint::CheckPending.path()),
            "chkpending.txt"
        );
        assert_eq!(
            endpoint_url("/witip", Endpoint::History.path()),
            "/witip/history.txt"
        );
    }
}
