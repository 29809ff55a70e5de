//! Google Sheets values API as a `TableProvider`

use crate::logging;
use crate::registry::{ProviderError, TableProvider};
use crate::table::Table;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

/// Tables are read unformatted so numbers arrive as JSON numbers instead of
/// locale-grouped strings; dates stay readable.
const TABLE_RENDER: [(&str, &str); 2] = [
    ("valueRenderOption", "UNFORMATTED_VALUE"),
    ("dateTimeRenderOption", "FORMATTED_STRING"),
];

/// Single cells are display text and keep the sheet's formatting.
const CELL_RENDER: [(&str, &str); 1] = [("valueRenderOption", "FORMATTED_VALUE")];

/// How requests authenticate against the Sheets API.
#[derive(Debug, Clone)]
pub enum SheetsAuth {
    /// `?key=` query parameter; only works on link-shared spreadsheets.
    ApiKey(String),
    /// OAuth access token sent as a bearer header.
    AccessToken(String),
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

pub struct SheetsClient {
    client: Client,
    spreadsheet_id: String,
    auth: SheetsAuth,
    base_url: String,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: &str, auth: SheetsAuth) -> Result<Self, ProviderError> {
        Self::with_base_url(spreadsheet_id, auth, SHEETS_API_BASE)
    }

    pub fn with_base_url(spreadsheet_id: &str, auth: SheetsAuth, base_url: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.to_string(),
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn values_url(&self, range: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::NotConfigured(format!("URL inválida '{}': {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| ProviderError::NotConfigured(format!("URL inválida '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range]);

        Ok(url)
    }

    /// Raw rows of a range, every cell rendered as text.
    async fn get_values(&self, range: &str, render: &[(&str, &str)]) -> Result<Vec<Vec<String>>, ProviderError> {
        let url = self.values_url(range)?;

        let request = self.client.get(url).query(render);
        let request = match &self.auth {
            SheetsAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
            SheetsAuth::AccessToken(token) => request.bearer_auth(token),
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let range_values: ValueRange = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(range_values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(value_to_text).collect())
            .collect())
    }
}

fn value_to_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TableProvider for SheetsClient {
    async fn fetch(&self, range: &str) -> Result<Table, ProviderError> {
        let values = self.get_values(range, &TABLE_RENDER).await?;

        let Some((header, rows)) = values.split_first() else {
            logging::log_data(None, &format!("Range {} has no values", range));
            return Ok(Table::default());
        };

        Table::from_rows(header, rows).map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    async fn fetch_cell(&self, range: &str) -> Result<Option<String>, ProviderError> {
        let values = self.get_values(range, &CELL_RENDER).await?;
        Ok(values
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .filter(|cell| !cell.trim().is_empty()))
    }
}
