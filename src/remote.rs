//! Client for the spreadsheet-backed remote API.
//!
//! `GET <endpoint>?action=read|listSheets|getLocationOptions` for reads and
//! `POST <endpoint>` with `{ sheetName, rows }` for writes, using [`reqwest`].

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::columns::remote_to_local;
use crate::error::{AppError, Result};
use crate::record::AssetRecord;

/// Row in the remote sheet's own header vocabulary.
pub type RemoteRow = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritePayload {
    pub sheet_name: String,
    pub rows: Vec<RemoteRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOptions {
    #[serde(default)]
    pub centers: Vec<String>,
    #[serde(default)]
    pub zones: Vec<String>,
}

#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn read_rows(&self, sheet: Option<&str>) -> Result<Vec<AssetRecord>>;
    async fn list_sheets(&self) -> Result<Vec<String>>;
    async fn location_options(&self) -> Result<LocationOptions>;
    /// Send rows; success means the endpoint accepted the request, not that
    /// the rows landed. Use a read-back to confirm.
    async fn write_rows(&self, payload: &WritePayload) -> Result<()>;
}

/// Accept only script endpoints, not links to the spreadsheet document itself.
pub fn validate_service_url(url: &str) -> Result<String> {
    let url = url.trim();
    if !url.starts_with("http") {
        return Err(AppError::InvalidServiceUrl(format!("{} is not an http(s) URL", url)));
    }
    if url.contains("docs.google.com/spreadsheets") {
        return Err(AppError::InvalidServiceUrl(
            "this is a spreadsheet link; use the web app deployment URL".to_string(),
        ));
    }
    Ok(url.to_string())
}

/// Convert a JSON cell to text the way a spreadsheet would display it.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Map a remote JSON object onto a local record.
pub fn record_from_remote(row: &RemoteRow) -> AssetRecord {
    AssetRecord::from_pairs(
        row.iter()
            .map(|(k, v)| (remote_to_local(k).to_string(), cell_text(v))),
    )
}

pub struct HttpRemote {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRemote {
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(HttpRemote {
            client: reqwest::Client::new(),
            endpoint: validate_service_url(endpoint)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, query: &[(&str, &str)]) -> Result<T> {
        debug!("GET {} {:?}", self.endpoint, query);
        let response = self.client.get(&self.endpoint).query(query).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn read_rows(&self, sheet: Option<&str>) -> Result<Vec<AssetRecord>> {
        let mut query = vec![("action", "read")];
        if let Some(sheet) = sheet {
            query.push(("sheetName", sheet));
        }
        let rows: Vec<RemoteRow> = self.get_json(&query).await?;
        info!("fetched {} rows from remote sheet", rows.len());
        Ok(rows.iter().map(record_from_remote).collect())
    }

    async fn list_sheets(&self) -> Result<Vec<String>> {
        self.get_json(&[("action", "listSheets")]).await
    }

    async fn location_options(&self) -> Result<LocationOptions> {
        self.get_json(&[("action", "getLocationOptions")]).await
    }

    async fn write_rows(&self, payload: &WritePayload) -> Result<()> {
        debug!("POST {} ({} rows)", self.endpoint, payload.rows.len());
        let response = self.client.post(&self.endpoint).json(payload).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_url_validation() {
        assert!(validate_service_url("https://script.google.com/macros/s/x/exec").is_ok());
        assert!(validate_service_url("ftp://example").is_err());
        assert!(validate_service_url("https://docs.google.com/spreadsheets/d/abc/edit").is_err());
    }

    #[test]
    fn numbers_render_without_fraction() {
        assert_eq!(cell_text(&json!(2019)), "2019");
        assert_eq!(cell_text(&json!(2019.0)), "2019");
        assert_eq!(cell_text(&json!(1.5)), "1.5");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn payload_uses_camel_case() {
        let payload = WritePayload {
            sheet_name: "마스터파일".into(),
            rows: Vec::new(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["sheetName"], "마스터파일");
    }
}
