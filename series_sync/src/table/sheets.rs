//! Google Sheets v4 REST backend for [`TabularStore`].
//!
//! Uses three endpoints of one spreadsheet tab:
//! - `values/{range}` (GET/PUT) for cell reads and `RAW` writes,
//! - `?fields=sheets.properties` for the tab's row capacity,
//! - `:batchUpdate` with `appendDimension` to grow rows.
//!
//! Every request waits on a per-minute quota limiter first, so bursts from the
//! sync loop stay inside the API's per-user quota.

use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, Method, RequestBuilder, Url, header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::{TableError, TabularStore};
use crate::{
    address::{CellAddress, RangeAddress, column_letters},
    config::SheetsConfig,
};

pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

const DEFAULT_REQUESTS_PER_MINUTE: NonZeroU32 = nonzero!(60u32);

/// Client bound to one tab of one spreadsheet.
pub struct SheetsStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    sheet_title: String,
    sheet_id: i64,
    limiter: DefaultDirectRateLimiter,
}

#[derive(Deserialize, Debug)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Deserialize, Debug)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize, Debug)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    grid_properties: Option<GridProperties>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u32,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize, Debug)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl SheetsStore {
    pub fn new(token: &SecretString, cfg: &SheetsConfig) -> Result<Self, TableError> {
        if cfg.spreadsheet_id.trim().is_empty() {
            return Err(TableError::Setup("sheets.spreadsheet_id is empty".into()));
        }
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| TableError::Setup(format!("invalid access token: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder().default_headers(headers).build()?;
        let per_minute =
            NonZeroU32::new(cfg.requests_per_minute).unwrap_or(DEFAULT_REQUESTS_PER_MINUTE);

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: cfg.spreadsheet_id.trim().to_string(),
            sheet_title: cfg.sheet_title.clone(),
            sheet_id: cfg.sheet_id,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    /// `'Tab name'!C8:C10`, quoting the tab the way A1 notation expects.
    fn qualified(&self, a1: &str) -> String {
        let tab = format!("'{}'", self.sheet_title.replace('\'', "''"));
        if a1.is_empty() { tab } else { format!("{tab}!{a1}") }
    }

    fn url(&self, tail: &[&str]) -> Result<Url, TableError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TableError::Setup(format!("bad base url {}: {e}", self.base_url)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                TableError::Setup(format!("base url {} cannot hold a path", self.base_url))
            })?;
            segments.pop_if_empty().push("spreadsheets");
            for part in tail {
                segments.push(part);
            }
        }
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, TableError> {
        self.url(&[&self.spreadsheet_id, "values", range])
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, TableError> {
        self.limiter.until_ready().await;
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown API error".to_string());
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|env| format!("{}: {}", env.error.status, env.error.message))
            .unwrap_or(text);
        Err(TableError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_values(&self, range: &str, major: &str) -> Result<Vec<Vec<String>>, TableError> {
        let url = self.values_url(range)?;
        let request = self
            .client
            .request(Method::GET, url)
            .query(&[("majorDimension", major)]);
        let body: ValueRange = self
            .send(request)
            .await?
            .json()
            .await?;
        debug!(range, rows = body.values.len(), "read values");
        Ok(body
            .values
            .into_iter()
            .map(|line| line.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn properties(&self) -> Result<SheetProperties, TableError> {
        let url = self.url(&[&self.spreadsheet_id])?;
        let request = self
            .client
            .get(url)
            .query(&[("fields", "sheets.properties")]);
        let meta: SpreadsheetMeta = self.send(request).await?.json().await?;
        meta.sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.sheet_id == self.sheet_id || p.title == self.sheet_title)
            .ok_or_else(|| {
                TableError::Decode(format!(
                    "tab {:?} (id {}) not found in spreadsheet",
                    self.sheet_title, self.sheet_id
                ))
            })
    }
}

// Formatted values come back as strings; numbers and booleans only appear
// with non-default render options.
fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TabularStore for SheetsStore {
    async fn read_cell(&self, cell: CellAddress) -> Result<Option<String>, TableError> {
        let values = self
            .get_values(&self.qualified(&cell.to_string()), "ROWS")
            .await?;
        Ok(values
            .into_iter()
            .next()
            .and_then(|line| line.into_iter().next())
            .filter(|v| !v.is_empty()))
    }

    async fn read_column(&self, col: u32, from_row: u32) -> Result<Vec<String>, TableError> {
        let letters = column_letters(col);
        let a1 = format!("{letters}{}:{letters}", from_row.max(1));
        let mut columns = self.get_values(&self.qualified(&a1), "COLUMNS").await?;
        Ok(if columns.is_empty() {
            Vec::new()
        } else {
            columns.swap_remove(0)
        })
    }

    async fn read_range(&self, range: RangeAddress) -> Result<Vec<Vec<String>>, TableError> {
        self.get_values(&self.qualified(&range.to_string()), "ROWS")
            .await
    }

    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, TableError> {
        self.get_values(&self.qualified(""), "ROWS").await
    }

    async fn write_range(
        &self,
        range: RangeAddress,
        values: Vec<Vec<String>>,
    ) -> Result<(), TableError> {
        let qualified = self.qualified(&range.to_string());
        let url = self.values_url(&qualified)?;
        let request = self
            .client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&ValueRangeBody {
                range: &qualified,
                major_dimension: "ROWS",
                values: &values,
            });
        self.send(request).await?;
        debug!(range = %qualified, rows = values.len(), "wrote values");
        Ok(())
    }

    async fn row_capacity(&self) -> Result<u32, TableError> {
        let props = self.properties().await?;
        props
            .grid_properties
            .map(|g| g.row_count)
            .ok_or_else(|| TableError::Decode(format!("tab {:?} has no grid", props.title)))
    }

    async fn grow_rows(&self, additional: u32) -> Result<(), TableError> {
        if additional == 0 {
            return Ok(());
        }
        let url = self.url(&[&format!("{}:batchUpdate", self.spreadsheet_id)])?;
        let body = json!({
            "requests": [{
                "appendDimension": {
                    "sheetId": self.sheet_id,
                    "dimension": "ROWS",
                    "length": additional,
                }
            }]
        });
        self.send(self.client.post(url).json(&body)).await?;
        debug!(additional, "grew sheet rows");
        Ok(())
    }
}
