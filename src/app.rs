use axum::{
    Json, Router,
    extract::{Multipart, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Local;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::audit::{AuditState, DecodeOutcome};
use crate::camera::{BrowserScanner, CameraStatus};
use crate::checklist::{self, ChecklistBatch};
use crate::config::Config;
use crate::downloader;
use crate::error::{AppError, CameraError, Result};
use crate::loader;
use crate::print;
use crate::record::{AssetRecord, Location};
use crate::remote::{HttpRemote, LocationOptions, RemoteApi};
use crate::saving::{self, Snapshot};
use crate::session::{DataSource, Session, SessionSummary};
use crate::store::RowStore;
use crate::sync::{AuditBatch, SyncGateway, SyncReceipt};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub struct AppState {
    session: Mutex<Session<BrowserScanner>>,
    remote: RwLock<Option<Arc<dyn RemoteApi>>>,
    config: Config,
}

impl AppState {
    /// State with the remote client built from `config.service_url`.
    pub fn new(config: Config) -> Result<Self> {
        let remote: Option<Arc<dyn RemoteApi>> = match &config.service_url {
            Some(url) => Some(Arc::new(HttpRemote::new(url)?)),
            None => None,
        };
        Ok(Self::with_remote(config, remote))
    }

    pub fn with_remote(config: Config, remote: Option<Arc<dyn RemoteApi>>) -> Self {
        AppState {
            session: Mutex::new(Session::new(BrowserScanner::default(), config.cooldown)),
            remote: RwLock::new(remote),
            config,
        }
    }

    pub fn restore(&self, snapshot: Snapshot) -> Result<()> {
        self.session()?.restore(snapshot)
    }

    fn session(&self) -> Result<MutexGuard<'_, Session<BrowserScanner>>> {
        self.session.lock().map_err(|_| AppError::Poisoned)
    }

    /// Settle an audit sync. The slot is released even if a handler
    /// panicked while the upload was in flight.
    fn finish_sync(&self, batch: &AuditBatch, outcome: &Result<SyncReceipt>) -> usize {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let cleared = session.finish_audit_sync(batch, outcome);
        self.persist(&session);
        cleared
    }

    fn remote(&self) -> Result<Arc<dyn RemoteApi>> {
        self.remote
            .read()
            .map_err(|_| AppError::Poisoned)?
            .clone()
            .ok_or(AppError::NoRemote)
    }

    fn set_remote(&self, remote: Arc<dyn RemoteApi>) -> Result<()> {
        *self.remote.write().map_err(|_| AppError::Poisoned)? = Some(remote);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.remote.read().map(|r| r.is_some()).unwrap_or(false)
    }

    fn gateway(&self) -> Result<SyncGateway> {
        Ok(SyncGateway::new(self.remote()?, self.config.verify_sync))
    }

    // A failed snapshot write never fails the request that triggered it.
    fn persist(&self, session: &Session<BrowserScanner>) {
        if let Some(path) = &self.config.snapshot {
            if let Err(e) = saving::save_snapshot(&session.snapshot(), path) {
                warn!("could not write snapshot {}: {}", path.display(), e);
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            e if e.is_input_error() => StatusCode::BAD_REQUEST,
            AppError::Camera(_) => StatusCode::BAD_REQUEST,
            AppError::SyncInProgress => StatusCode::CONFLICT,
            AppError::Network(_) | AppError::Remote { .. } | AppError::ReadbackMismatch { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("{}", self);
        }
        let body = ErrorResponse {
            status: "error",
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    summary: SessionSummary,
    connected: bool,
    sheet: String,
}

#[derive(Serialize)]
struct LoadResponse {
    status: &'static str,
    rows: usize,
    duplicates: Vec<String>,
}

#[derive(Deserialize)]
struct ConnectRequest {
    url: Option<String>,
    sheet: Option<String>,
}

#[derive(Deserialize)]
struct ChecklistQuery {
    query: String,
    #[serde(default)]
    engineer: String,
}

#[derive(Deserialize)]
struct ScanRequest {
    text: String,
}

#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum CameraEvent {
    Start,
    Ready,
    Error { message: String },
    Stop,
}

#[derive(Deserialize)]
struct SyncRequest {
    center: String,
    zone: String,
}

#[derive(Serialize)]
struct SyncResponse {
    #[serde(flatten)]
    receipt: SyncReceipt,
    cleared: usize,
}

#[derive(Serialize)]
struct ConfirmResponse {
    index: usize,
    record: Option<AssetRecord>,
}

#[derive(Serialize)]
struct ReviewView {
    scanned: String,
    index: Option<usize>,
    record: Option<AssetRecord>,
}

#[derive(Serialize)]
struct PendingRow {
    index: usize,
    record: AssetRecord,
}

#[derive(Serialize)]
struct AuditView {
    state: &'static str,
    review: Option<ReviewView>,
    camera: CameraStatus,
    scanner: BrowserScanner,
    syncing: bool,
    pending: Vec<PendingRow>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_home))
        .route("/audit", get(serve_audit))
        .route("/checklist/print", get(print_checklists))
        .route("/api/status", get(get_status))
        .route("/api/upload", post(upload_master))
        .route("/api/cloud/connect", post(connect_cloud))
        .route("/api/cloud/sheets", get(list_sheets))
        .route("/api/cloud/locations", get(location_options))
        .route("/api/checklist/search", post(search_checklists))
        .route("/api/checklist/export", post(export_checklists))
        .route("/api/checklist/push", post(push_checklists))
        .route("/api/audit/state", get(audit_state))
        .route("/api/audit/camera", post(camera_event))
        .route("/api/audit/camera/reset", post(reset_camera))
        .route("/api/audit/scan", post(scan))
        .route("/api/audit/confirm", post(confirm))
        .route("/api/audit/cancel", post(cancel))
        .route("/api/audit/sync", post(sync_audits))
        .route("/api/export/master", get(export_master))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let state = AppState::new(config.clone())?;
    if let Some(path) = &config.snapshot {
        if path.exists() {
            match saving::load_snapshot(path) {
                Ok(snapshot) => {
                    info!("restoring session from {}", path.display());
                    state.restore(snapshot)?;
                }
                Err(e) => warn!("ignoring unreadable snapshot {}: {}", path.display(), e),
            }
        }
    }

    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_home() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn serve_audit() -> Html<&'static str> {
    Html(include_str!("./static/audit.html"))
}

async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    let summary = state.session()?.summary();
    Ok(Json(StatusResponse {
        summary,
        connected: state.is_connected(),
        sheet: state.config.sheet.clone(),
    }))
}

async fn upload_master(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<LoadResponse>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Import(e.to_string()))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Import(e.to_string()))?;
            upload = Some((file_name, bytes.to_vec()));
        }
    }

    let (file_name, bytes) = upload.ok_or_else(|| AppError::UnsupportedFile("no file received".to_string()))?;
    let store = loader::load_master_bytes(&file_name, bytes)?;

    let mut session = state.session()?;
    let rows = session.load(store, DataSource::File(file_name))?;
    state.persist(&session);
    Ok(Json(LoadResponse {
        status: "ok",
        rows,
        duplicates: session.store().duplicate_identifiers(),
    }))
}

async fn connect_cloud(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<LoadResponse>> {
    if let Some(url) = request.url.as_deref().filter(|u| !u.trim().is_empty()) {
        state.set_remote(Arc::new(HttpRemote::new(url)?))?;
    }
    let remote = state.remote()?;
    if state.session()?.audit.is_syncing() {
        return Err(AppError::SyncInProgress);
    }
    let sheet = request
        .sheet
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| state.config.sheet.clone());

    match remote.read_rows(Some(&sheet)).await {
        Ok(rows) => {
            let mut session = state.session()?;
            let rows = session.load(RowStore::from_rows(Vec::new(), rows), DataSource::Cloud(sheet))?;
            state.persist(&session);
            Ok(Json(LoadResponse {
                status: "ok",
                rows,
                duplicates: session.store().duplicate_identifiers(),
            }))
        }
        Err(e) => {
            // Screens must not keep showing rows from a source that just failed.
            if let Err(clear_err) = state.session()?.clear() {
                warn!("kept rows after failed import: {}", clear_err);
            }
            Err(e)
        }
    }
}

async fn list_sheets(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.remote()?.list_sheets().await?))
}

async fn location_options(State(state): State<Arc<AppState>>) -> Json<LocationOptions> {
    let options = match state.remote() {
        Ok(remote) => remote.location_options().await.unwrap_or_else(|e| {
            warn!("location options unavailable: {}", e);
            LocationOptions::default()
        }),
        Err(_) => LocationOptions::default(),
    };
    Json(options)
}

fn found_checklists(state: &AppState, query: &str) -> Result<ChecklistBatch> {
    let batch = state.session()?.checklists(query)?;
    if batch.found.is_empty() {
        return Err(AppError::NoMatches(batch.missing));
    }
    Ok(batch)
}

async fn search_checklists(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChecklistQuery>,
) -> Result<Json<ChecklistBatch>> {
    Ok(Json(state.session()?.checklists(&request.query)?))
}

async fn export_checklists(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChecklistQuery>,
) -> Result<Response> {
    let batch = found_checklists(&state, &request.query)?;
    let today = Local::now().date_naive();
    let bytes = downloader::checklist_workbook(&batch.found, &request.engineer, today)?;
    let file_name = checklist::export_file_name(&batch.found, today, "xlsx");
    Ok(attachment(&file_name, bytes))
}

async fn print_checklists(
    State(state): State<Arc<AppState>>,
    Query(request): Query<ChecklistQuery>,
) -> Result<Html<String>> {
    let batch = found_checklists(&state, &request.query)?;
    let today = Local::now().date_naive();
    let file_name = checklist::export_file_name(&batch.found, today, "pdf");
    Ok(Html(print::render_print_page(
        &batch.found,
        &request.engineer,
        today,
        &file_name,
    )?))
}

async fn push_checklists(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChecklistQuery>,
) -> Result<Json<SyncReceipt>> {
    let gateway = state.gateway()?;
    let batch = found_checklists(&state, &request.query)?;
    Ok(Json(gateway.push_checklists(&state.config.sheet, &batch.found).await?))
}

async fn audit_state(State(state): State<Arc<AppState>>) -> Result<Json<AuditView>> {
    let mut session = state.session()?;
    session.audit.tick(Instant::now());

    let state_name = match session.audit.state() {
        AuditState::Idle => "idle",
        AuditState::Reviewing(_) => "reviewing",
        AuditState::CoolingDown { .. } => "cooling_down",
    };
    let review = session.audit.review().map(|review| ReviewView {
        scanned: review.scanned.clone(),
        index: review.matched,
        record: review
            .matched
            .and_then(|index| session.store().get(index))
            .cloned(),
    });
    let pending = session
        .pending()
        .into_iter()
        .map(|(index, record)| PendingRow {
            index,
            record: record.clone(),
        })
        .collect();

    Ok(Json(AuditView {
        state: state_name,
        review,
        camera: session.audit.camera_status().clone(),
        scanner: session.audit.scanner().clone(),
        syncing: session.audit.is_syncing(),
        pending,
    }))
}

async fn camera_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<CameraEvent>,
) -> Result<Json<CameraStatus>> {
    let mut session = state.session()?;
    match event {
        CameraEvent::Start => session.audit.start_camera()?,
        CameraEvent::Ready => session.audit.camera_ready(),
        CameraEvent::Error { message } => {
            session.audit.camera_failed(CameraError::from_browser_error(&message))
        }
        CameraEvent::Stop => session.audit.stop_camera(),
    }
    Ok(Json(session.audit.camera_status().clone()))
}

async fn reset_camera(State(state): State<Arc<AppState>>) -> Result<Json<CameraStatus>> {
    let mut session = state.session()?;
    session.audit.start_camera()?;
    Ok(Json(session.audit.camera_status().clone()))
}

async fn scan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<DecodeOutcome>> {
    let mut session = state.session()?;
    Ok(Json(session.decode(&request.text, Instant::now())))
}

async fn confirm(State(state): State<Arc<AppState>>) -> Result<Json<ConfirmResponse>> {
    let mut session = state.session()?;
    let index = session.confirm(Instant::now())?;
    state.persist(&session);
    Ok(Json(ConfirmResponse {
        index,
        record: session.store().get(index).cloned(),
    }))
}

async fn cancel(State(state): State<Arc<AppState>>) -> Result<StatusCode> {
    state.session()?.cancel(Instant::now());
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_audits(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>> {
    let location = Location::new(&request.center, &request.zone)?;
    let gateway = state.gateway()?;
    let batch = state.session()?.begin_audit_sync(location)?;

    // The session lock is released while the upload is in flight.
    let outcome = gateway.send_audit(&state.config.sheet, &batch).await;

    let cleared = state.finish_sync(&batch, &outcome);
    Ok(Json(SyncResponse {
        receipt: outcome?,
        cleared,
    }))
}

async fn export_master(State(state): State<Arc<AppState>>) -> Result<Response> {
    let bytes = {
        let session = state.session()?;
        session.store().ensure_loaded()?;
        downloader::master_workbook(session.store())?
    };
    let file_name = format!("자산실사_결과_{}.xlsx", Local::now().format("%Y%m%d"));
    Ok(attachment(&file_name, bytes))
}

fn attachment(file_name: &str, bytes: Vec<u8>) -> Response {
    let disposition = format!(
        "attachment; filename=\"download.xlsx\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    );
    (
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuditMark;
    use crate::sync::Delivery;
    use chrono::NaiveDate;

    #[test]
    fn sync_slot_is_released_after_poisoning() {
        let state = Arc::new(AppState::with_remote(Config::default(), None));
        let batch = {
            let mut session = state.session().unwrap();
            session
                .load(
                    RowStore::from_rows(Vec::new(), vec![AssetRecord::from_pairs([("관리번호", "A1")])]),
                    DataSource::File("master.xlsx".into()),
                )
                .unwrap();
            let now = Instant::now();
            session.decode("A1", now);
            session
                .confirm_with(AuditMark::on(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()), now)
                .unwrap();
            session.begin_audit_sync(Location::new("평택", "A동").unwrap()).unwrap()
        };

        let holder = state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.session.lock().unwrap();
            panic!("handler failed while holding the session");
        })
        .join();
        assert!(matches!(state.session(), Err(AppError::Poisoned)));

        let ok: Result<SyncReceipt> = Ok(SyncReceipt { count: 1, delivery: Delivery::Dispatched });
        assert_eq!(state.finish_sync(&batch, &ok), 1);

        let session = state.session.lock().unwrap_or_else(PoisonError::into_inner);
        assert!(!session.audit.is_syncing());
        assert!(session.pending().is_empty());
    }
}
