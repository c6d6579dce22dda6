/*!
Interoperation between the client (the dashboard) and server.

(Not the server and the spreadsheets; that's covered by `store` and
`sheets`.)

Every endpoint speaks JSON. Errors come back as `{"error": <message>}`;
failures reported by the backing store also carry a remediation `hint`
and the `spreadsheetId` the request was working against.
*/
use axum::{
    http::{Method, StatusCode},
    http::header::{HeaderName, HeaderValue},
    Json,
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use crate::config::Glob;
use crate::error::Error;
use crate::sheets::Sheets;

pub mod groups;
pub mod payroll;
pub mod slots;
pub mod students;
pub mod users;

/// Handlers' inner functions return the response either way, so they can use `?`.
pub type Reply = Result<Response, Response>;

trait AddHeaders: IntoResponse + Sized {
    fn add_headers(self, mut new_headers: Vec<(HeaderName, HeaderValue)>) -> Response {
        let mut r = self.into_response();
        let r_headers = r.headers_mut();
        for (name, value) in new_headers.drain(..) {
            r_headers.insert(name, value);
        }

        r
    }
}

impl<T: IntoResponse + Sized> AddHeaders for T {}

/// Query string parameters understood by the endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    pub id: Option<String>,
    pub spreadsheet_id: Option<String>,
    /// Taken as a loose flag; see `Params::resolve()`.
    pub resolve: Option<String>,
}

impl Params {
    /// The `id` parameter, which must be present and non-blank.
    fn require_id(&self) -> Result<&str, Response> {
        match self.id.as_deref().map(|s| s.trim()) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(respond_bad_request("id is required.".to_owned())),
        }
    }

    /// `?resolve`, `?resolve=1`, `?resolve=true` and the like turn it on;
    /// anything else, or no parameter at all, leaves it off.
    fn resolve(&self) -> bool {
        match self.resolve.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) => matches!(s.as_str(), "" | "1" | "true" | "yes" | "on"),
            None => false,
        }
    }
}

pub fn respond_json<T: Serialize>(code: StatusCode, data: &T) -> Response {
    (code, Json(data)).into_response()
}

pub fn respond_bad_request(msg: String) -> Response {
    log::trace!("respond_bad_request( {:?} ) called.", &msg);

    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": msg })),
    ).into_response()
}

pub fn method_not_allowed(method: &Method) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": format!("Method {} not allowed.", method) })),
    ).into_response()
}

/**
Turn a domain `Error` into its response.

`hint` and `spreadsheet_id` are only reported for backing-store failures.
*/
pub fn respond_error(e: Error, hint: &str, spreadsheet_id: Option<&str>) -> Response {
    match e {
        Error::Config(msg) => {
            log::error!("Configuration error: {}", &msg);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": msg }))).into_response()
        },
        Error::NotFound(msg) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
        },
        Error::Validation(msg) => respond_bad_request(msg),
        Error::Upstream(msg) => {
            log::error!("Backing store error (spreadsheet {:?}): {}", &spreadsheet_id, &msg);
            let body = match spreadsheet_id {
                Some(id) => json!({ "error": msg, "hint": hint, "spreadsheetId": id }),
                None => json!({ "error": msg, "hint": hint }),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        },
    }
}

/// An error mapper for `.map_err()` that responds with `glob`'s remediation hint.
pub fn fail<'a, S: Sheets>(
    glob: &'a Glob<S>,
    spreadsheet_id: Option<&'a str>,
) -> impl Fn(Error) -> Response + 'a {
    move |e| respond_error(e, &glob.cfg.remediation_hint(), spreadsheet_id)
}

/// Deserialize a JSON request body.
pub fn json_body<T: DeserializeOwned>(body: &str) -> Result<T, Response> {
    if body.trim().is_empty() {
        return Err(respond_bad_request("Request requires a JSON body.".to_owned()));
    }
    serde_json::from_str(body).map_err(|e| {
        log::warn!("Error deserializing JSON {:?}: {}", body, &e);
        respond_bad_request(format!("Unable to parse request body: {}", &e))
    })
}

/// 400 unless `value` is non-blank.
pub fn require(value: &str, field: &str) -> Result<(), Response> {
    if value.trim().is_empty() {
        Err(respond_bad_request(format!("{} is required.", field)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request, Router};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Cfg;
    use crate::sheets::MemorySheets;
    use crate::store::tests::REGISTRY;
    use crate::tests::ensure_logging;

    pub fn test_cfg() -> Cfg {
        Cfg {
            registry_spreadsheet_ids: vec![REGISTRY.to_owned()],
            service_account: Some("robot@example.com".to_owned()),
            ..Cfg::default()
        }
    }

    /// A router over `sheets`, with `REGISTRY` as the only candidate.
    pub fn test_app(sheets: Arc<MemorySheets>) -> Router {
        ensure_logging();
        let glob = Glob::new(test_cfg(), Some(sheets));
        crate::router(Arc::new(glob))
    }

    pub fn registry_sheets() -> Arc<MemorySheets> {
        Arc::new(MemorySheets::new().with_spreadsheet(REGISTRY, "School REG"))
    }

    pub async fn call(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_owned()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let val = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, val)
    }

    #[tokio::test]
    async fn unknown_method_is_405() {
        let app = test_app(registry_sheets());
        let (status, body) = call(&app, "PATCH", "/api/users", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Method PATCH not allowed.");
    }

    #[tokio::test]
    async fn missing_credentials_is_fixed_500() {
        ensure_logging();
        let glob: Glob<MemorySheets> = Glob::new(test_cfg(), None);
        let app = crate::router(Arc::new(glob));

        for uri in ["/api/users", "/api/groups", "/api/students", "/api/payroll"] {
            let (status, body) = call(&app, "GET", uri, "").await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
            assert_eq!(body, json!({ "error": crate::config::CREDENTIALS_MISSING }));
        }
    }

    #[tokio::test]
    async fn upstream_error_carries_hint_and_spreadsheet() {
        let sheets = registry_sheets();
        let app = test_app(sheets.clone());
        // Resolution falls back to the sole candidate even when it can't be read.
        sheets.fail_spreadsheet(REGISTRY, "The caller does not have permission");

        let (status, body) = call(&app, "GET", "/api/groups", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("The caller does not have permission"));
        assert_eq!(body["hint"], "Share the spreadsheet with robot@example.com as an Editor.");
        assert_eq!(body["spreadsheetId"], REGISTRY);
    }

    #[test]
    fn blank_body_is_bad_request() {
        let r = json_body::<Value>("  ").unwrap_err();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        let r = json_body::<Value>("{ nope").unwrap_err();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
    }
}
