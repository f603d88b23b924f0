//! Shared fixtures: an in-memory remote sheet and request helpers.

#![allow(dead_code)]

use assethub::error::{AppError, Result};
use assethub::record::AssetRecord;
use assethub::remote::{LocationOptions, RemoteApi, WritePayload, record_from_remote};
use assethub::store::RowStore;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use serde_json::Value;
use std::sync::Mutex;
use tower::ServiceExt;

/// Remote sheet held in memory. Writes are recorded and, when `echo` is
/// set, appended to the rows returned by later reads.
#[derive(Default)]
pub struct FakeRemote {
    pub rows: Mutex<Vec<AssetRecord>>,
    pub writes: Mutex<Vec<WritePayload>>,
    pub echo: bool,
    pub fail_status: Option<u16>,
}

impl FakeRemote {
    pub fn with_rows(rows: Vec<AssetRecord>) -> Self {
        FakeRemote {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<WritePayload> {
        self.writes.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        match self.fail_status {
            Some(status) => Err(AppError::Remote {
                status,
                body: "unavailable".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn read_rows(&self, _sheet: Option<&str>) -> Result<Vec<AssetRecord>> {
        self.check()?;
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn list_sheets(&self) -> Result<Vec<String>> {
        self.check()?;
        Ok(vec!["마스터파일".to_string(), "2025 실사".to_string()])
    }

    async fn location_options(&self) -> Result<LocationOptions> {
        self.check()?;
        Ok(LocationOptions {
            centers: vec!["평택".to_string()],
            zones: vec!["A동".to_string(), "B동".to_string()],
        })
    }

    async fn write_rows(&self, payload: &WritePayload) -> Result<()> {
        self.check()?;
        self.writes.lock().unwrap().push(payload.clone());
        if self.echo {
            let mut rows = self.rows.lock().unwrap();
            rows.extend(payload.rows.iter().map(record_from_remote));
        }
        Ok(())
    }
}

pub fn asset(mgmt: &str, asset_no: &str, status: &str) -> AssetRecord {
    AssetRecord::from_pairs([
        ("관리번호", mgmt),
        ("자산번호", asset_no),
        ("자재번호", "M-100"),
        ("자재내역", "지게차"),
        ("제조사명", "두산"),
        ("제조사모델명", "D30S"),
        ("제조년도", "2019"),
        ("장비상태", status),
    ])
}

pub fn sample_rows() -> Vec<AssetRecord> {
    vec![
        asset("A1", "9001", "A3"),
        asset("B2", "9002", "B1"),
        asset("C3", "9003", ""),
    ]
}

pub fn sample_store() -> RowStore {
    RowStore::from_rows(Vec::new(), sample_rows())
}

pub async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
