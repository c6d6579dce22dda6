/*!
Google Sheets REST (v4) implementation of the `Sheets` contract.

Every request carries an OAuth bearer token asked of a `TokenSource`. The
usual source is a service account key, from which `yup_oauth2` mints
tokens and renews them shortly before they expire. A fixed token from
configuration also works, until it expires.
*/
use std::future::Future;
use std::path::Path;

use reqwest::{Client, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use yup_oauth2::{authenticator::DefaultAuthenticator, ServiceAccountAuthenticator};

use super::{Rows, Sheets, SheetsError, SpreadsheetMeta, TabMeta};

/// Read and write access to spreadsheets, nothing else.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const METADATA_FIELDS: &str = "properties.title,sheets.properties(sheetId,title)";
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

#[derive(Deserialize)]
struct Properties {
    title: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SpreadsheetResponse {
    properties: Properties,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

fn cell_to_string(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        x => x.to_string(),
    }
}

fn value_range_rows(vr: ValueRange) -> Rows {
    vr.values.into_iter()
        .map(|row| row.into_iter().map(cell_to_string).collect())
        .collect()
}

/// Supplies the bearer token for each request.
pub trait TokenSource: Send + Sync + 'static {
    fn bearer(&self) -> impl Future<Output = Result<String, SheetsError>> + Send;
}

/// A fixed token.
impl TokenSource for String {
    async fn bearer(&self) -> Result<String, SheetsError> {
        Ok(self.clone())
    }
}

/// Tokens minted for a service account. The authenticator caches each
/// token and fetches a new one when it is close to expiry.
impl TokenSource for DefaultAuthenticator {
    async fn bearer(&self) -> Result<String, SheetsError> {
        let tok = self.token(&[SPREADSHEETS_SCOPE]).await
            .map_err(|e| SheetsError::new(format!("Unable to obtain access token: {}", &e)))?;
        match tok.token() {
            Some(t) => Ok(t.to_owned()),
            None => Err(SheetsError::new("Token endpoint returned no access token.")),
        }
    }
}

pub struct GoogleSheets<T = String> {
    client: Client,
    tokens: T,
    base: String,
}

impl GoogleSheets<String> {
    pub fn new(token: String) -> Self {
        log::trace!("GoogleSheets::new( [ {} byte token ] ) called.", token.len());
        Self::with_tokens(token)
    }
}

impl GoogleSheets<DefaultAuthenticator> {
    /**
    Authenticate as the service account whose JSON key is at `path`.

    Also returns the account's email address, which is who spreadsheets
    must be shared with.
    */
    pub async fn from_key_file(path: &Path) -> Result<(Self, String), SheetsError> {
        log::trace!("GoogleSheets::from_key_file( {:?} ) called.", path);

        let key = yup_oauth2::read_service_account_key(path).await
            .map_err(|e| SheetsError::new(format!(
                "Unable to read service account key {:?}: {}", path, &e
            )))?;
        let email = key.client_email.clone();
        let auth = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|e| SheetsError::new(format!(
                "Unable to set up service account {:?}: {}", &email, &e
            )))?;

        log::info!("Authenticating to Google as {:?}.", &email);
        Ok((Self::with_tokens(auth), email))
    }
}

impl<T: TokenSource> GoogleSheets<T> {
    pub fn with_tokens(tokens: T) -> Self {
        Self {
            client: Client::new(),
            tokens,
            base: API_BASE.to_owned(),
        }
    }

    /// Point the client at a different API root (a proxy or a test double).
    pub fn with_base(mut self, base: &str) -> Self {
        self.base = base.trim_end_matches('/').to_owned();
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.base)
            .map_err(|e| SheetsError::new(format!(
                "Bad Sheets API base {:?}: {}", &self.base, &e
            )))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::new(format!(
                "Sheets API base {:?} cannot take path segments.", &self.base
            )))?
            .extend(segments);
        Ok(url)
    }

    async fn send<R: DeserializeOwned>(&self, req: RequestBuilder) -> Result<R, SheetsError> {
        let token = self.tokens.bearer().await?;
        let resp = req.bearer_auth(&token)
            .send()
            .await
            .map_err(|e| SheetsError::new(format!("Request to Sheets API failed: {}", &e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let msg = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(b) => b.error.message,
                Err(_) => body,
            };
            return Err(SheetsError::new(format!("Sheets API returned {}: {}", status, msg)));
        }

        resp.json::<R>()
            .await
            .map_err(|e| SheetsError::new(format!("Unreadable Sheets API response: {}", &e)))
    }

    async fn batch_update(&self, spreadsheet_id: &str, request: Value) -> Result<Value, SheetsError> {
        let url = self.url(&[&format!("{}:batchUpdate", spreadsheet_id)])?;
        let body = json!({ "requests": [ request ] });
        self.send(self.client.post(url).json(&body)).await
    }
}

impl<T: TokenSource> Sheets for GoogleSheets<T> {
    async fn metadata(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta, SheetsError> {
        log::trace!("GoogleSheets::metadata( {:?} ) called.", spreadsheet_id);

        let url = self.url(&[spreadsheet_id])?;
        let resp: SpreadsheetResponse = self.send(
            self.client.get(url).query(&[("fields", METADATA_FIELDS)])
        ).await?;

        Ok(SpreadsheetMeta {
            title: resp.properties.title,
            tabs: resp.sheets.into_iter().map(|s| TabMeta {
                sheet_id: s.properties.sheet_id,
                title: s.properties.title,
            }).collect(),
        })
    }

    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Rows, SheetsError> {
        log::trace!("GoogleSheets::get_values( {:?}, {:?} ) called.", spreadsheet_id, range);

        let url = self.url(&[spreadsheet_id, "values", range])?;
        let vr: ValueRange = self.send(self.client.get(url)).await?;
        Ok(value_range_rows(vr))
    }

    async fn batch_get_values(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
    ) -> Result<Vec<Rows>, SheetsError> {
        log::trace!(
            "GoogleSheets::batch_get_values( {:?}, {:?} ) called.",
            spreadsheet_id, ranges
        );
        if ranges.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url(&[spreadsheet_id, "values:batchGet"])?;
        let query: Vec<(&str, &str)> = ranges.iter()
            .map(|r| ("ranges", r.as_str()))
            .collect();
        let resp: BatchGetResponse = self.send(self.client.get(url).query(&query)).await?;

        let mut out: Vec<Rows> = resp.value_ranges.into_iter()
            .map(value_range_rows)
            .collect();
        // Callers index the result by range position.
        out.resize(ranges.len(), Vec::new());
        Ok(out)
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Rows,
    ) -> Result<(), SheetsError> {
        log::trace!(
            "GoogleSheets::update_values( {:?}, {:?}, [ {} rows ] ) called.",
            spreadsheet_id, range, rows.len()
        );

        let url = self.url(&[spreadsheet_id, "values", range])?;
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": rows });
        let _: Value = self.send(
            self.client.put(url)
                .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
                .json(&body)
        ).await?;
        Ok(())
    }

    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Rows,
    ) -> Result<(), SheetsError> {
        log::trace!(
            "GoogleSheets::append_values( {:?}, {:?}, [ {} rows ] ) called.",
            spreadsheet_id, range, rows.len()
        );

        let url = self.url(&[spreadsheet_id, "values", &format!("{}:append", range)])?;
        let body = json!({ "majorDimension": "ROWS", "values": rows });
        let _: Value = self.send(
            self.client.post(url)
                .query(&[
                    ("valueInputOption", VALUE_INPUT_OPTION),
                    ("insertDataOption", "INSERT_ROWS"),
                ])
                .json(&body)
        ).await?;
        Ok(())
    }

    async fn add_tab(&self, spreadsheet_id: &str, title: &str) -> Result<i64, SheetsError> {
        log::trace!("GoogleSheets::add_tab( {:?}, {:?} ) called.", spreadsheet_id, title);

        let resp = self.batch_update(
            spreadsheet_id,
            json!({ "addSheet": { "properties": { "title": title } } }),
        ).await?;

        resp.pointer("/replies/0/addSheet/properties/sheetId")
            .and_then(Value::as_i64)
            .ok_or_else(|| SheetsError::new(format!(
                "addSheet reply for {:?} carried no sheetId.", title
            )))
    }

    async fn delete_rows(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        start: u32,
        end: u32,
    ) -> Result<(), SheetsError> {
        log::trace!(
            "GoogleSheets::delete_rows( {:?}, {}, {}, {} ) called.",
            spreadsheet_id, sheet_id, start, end
        );

        self.batch_update(
            spreadsheet_id,
            json!({ "deleteDimension": { "range": {
                "sheetId": sheet_id,
                "dimension": "ROWS",
                "startIndex": start,
                "endIndex": end,
            } } }),
        ).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{http::HeaderMap, routing::get, Json, Router};

    use super::*;

    #[test]
    fn urls_escape_range_segments() {
        let g = GoogleSheets::new("t".to_owned());
        let u = g.url(&["abc", "values", "'My Tab'!A2:H"]).unwrap();
        assert!(u.as_str().starts_with("https://sheets.googleapis.com/v4/spreadsheets/abc/values/"));
        assert!(u.as_str().contains("My%20Tab"));
        assert!(!u.as_str().contains(' '));
    }

    #[test]
    fn cells_become_strings() {
        let vr: ValueRange = serde_json::from_value(json!({
            "values": [["a", 1, null], []]
        })).unwrap();
        assert_eq!(
            value_range_rows(vr),
            vec![vec!["a".to_owned(), "1".to_owned(), String::new()], vec![]]
        );
    }

    /// Hands out a different token every time, as a refreshing source does.
    #[derive(Default)]
    struct Rotating(AtomicUsize);

    impl TokenSource for Rotating {
        async fn bearer(&self) -> Result<String, SheetsError> {
            Ok(format!("tok-{}", self.0.fetch_add(1, Ordering::SeqCst)))
        }
    }

    /// A stand-in for the API that titles every spreadsheet with the
    /// Authorization header it was sent.
    async fn echo_auth_api() -> SocketAddr {
        async fn echo(headers: HeaderMap) -> Json<Value> {
            let auth = headers.get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_owned();
            Json(json!({ "properties": { "title": auth }, "sheets": [] }))
        }

        let app = Router::new().route("/v4/spreadsheets/:id", get(echo));
        let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
            .serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);
        addr
    }

    #[tokio::test]
    async fn each_request_asks_for_a_token() {
        let addr = echo_auth_api().await;
        let g = GoogleSheets::with_tokens(Rotating::default())
            .with_base(&format!("http://{}/v4/spreadsheets", addr));

        assert_eq!(g.metadata("abc").await.unwrap().title, "Bearer tok-0");
        assert_eq!(g.metadata("abc").await.unwrap().title, "Bearer tok-1");

        let g = GoogleSheets::new("fixed".to_owned())
            .with_base(&format!("http://{}/v4/spreadsheets", addr));
        assert_eq!(g.metadata("abc").await.unwrap().title, "Bearer fixed");
    }

    #[tokio::test]
    async fn missing_key_file_is_reported() {
        let path = Path::new("no/such/service-account.json");
        match GoogleSheets::from_key_file(path).await {
            Err(e) => assert!(e.to_string().contains("service-account.json"), "{}", e),
            Ok(_) => panic!("expected an error for a missing key file"),
        }
    }
}
