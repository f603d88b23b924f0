use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::audit::{AuditSession, DecodeOutcome};
use crate::camera::Scanner;
use crate::checklist::{self, ChecklistBatch};
use crate::error::{AppError, Result};
use crate::record::{AssetRecord, AuditMark, Location};
use crate::saving::Snapshot;
use crate::store::{RowStore, StoreMutation};
use crate::sync::{AuditBatch, SyncReceipt};

/// Where the current rows came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum DataSource {
    None,
    File(String),
    Cloud(String),
}

/// Owner of the row store. Screens borrow it; only import and the audit
/// flow write to it, both through [`RowStore::apply`].
pub struct Session<S: Scanner> {
    store: RowStore,
    source: DataSource,
    last_sync: Option<DateTime<Local>>,
    pub audit: AuditSession<S>,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub rows: usize,
    pub source: DataSource,
    pub last_sync: Option<String>,
    pub pending: usize,
    pub duplicates: Vec<String>,
}

impl<S: Scanner> Session<S> {
    pub fn new(scanner: S, cooldown: Duration) -> Self {
        Session {
            store: RowStore::new(),
            source: DataSource::None,
            last_sync: None,
            audit: AuditSession::new(scanner, cooldown),
        }
    }

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn last_sync(&self) -> Option<DateTime<Local>> {
        self.last_sync
    }

    /// Replace the rows wholesale.
    ///
    /// Refused while an audit sync is in flight: the batch being sent
    /// holds row indices into the current store.
    pub fn load(&mut self, store: RowStore, source: DataSource) -> Result<usize> {
        self.ensure_not_syncing()?;
        let (headers, rows) = store.into_parts();
        self.audit.reset();
        let n = self.store.apply(StoreMutation::Replace { headers, rows });
        info!("session loaded {} rows from {:?}", n, source);
        if matches!(source, DataSource::Cloud(_)) {
            self.last_sync = Some(Local::now());
        }
        self.source = source;
        Ok(n)
    }

    /// Drop everything, so dependent screens show the disconnected state.
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_not_syncing()?;
        self.audit.reset();
        self.store.apply(StoreMutation::Clear);
        self.source = DataSource::None;
        Ok(())
    }

    fn ensure_not_syncing(&self) -> Result<()> {
        if self.audit.is_syncing() {
            Err(AppError::SyncInProgress)
        } else {
            Ok(())
        }
    }

    pub fn checklists(&self, input: &str) -> Result<ChecklistBatch> {
        checklist::search(&self.store, input)
    }

    pub fn decode(&mut self, text: &str, now: Instant) -> DecodeOutcome {
        self.audit.on_decode(text, &self.store, now)
    }

    pub fn confirm(&mut self, now: Instant) -> Result<usize> {
        self.confirm_with(AuditMark::today(), now)
    }

    pub fn confirm_with(&mut self, mark: AuditMark, now: Instant) -> Result<usize> {
        self.audit.confirm(&mut self.store, mark, now)
    }

    pub fn cancel(&mut self, now: Instant) {
        self.audit.cancel(now);
    }

    pub fn pending(&self) -> Vec<(usize, &AssetRecord)> {
        self.store.pending_audit()
    }

    /// Claim the sync slot and snapshot the rows to send.
    pub fn begin_audit_sync(&mut self, location: Location) -> Result<AuditBatch> {
        self.audit.begin_sync()?;
        match AuditBatch::prepare(&self.store, location) {
            Ok(batch) => Ok(batch),
            Err(e) => {
                self.audit.end_sync();
                Err(e)
            }
        }
    }

    /// Release the sync slot; on success clear exactly the rows that were sent.
    pub fn finish_audit_sync(&mut self, batch: &AuditBatch, outcome: &Result<SyncReceipt>) -> usize {
        self.audit.end_sync();
        match outcome {
            Ok(_) => {
                self.last_sync = Some(Local::now());
                self.store.apply(batch.clear_mutation())
            }
            Err(_) => 0,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            rows: self.store.len(),
            source: self.source.clone(),
            last_sync: self.last_sync.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            pending: self.store.pending_audit().len(),
            duplicates: self.store.duplicate_identifiers(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let source = match &self.source {
            DataSource::None => None,
            DataSource::File(name) | DataSource::Cloud(name) => Some(name.clone()),
        };
        Snapshot {
            store: self.store.clone(),
            source,
            last_sync: self.last_sync.map(|t| t.to_rfc3339()),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        let last_sync = snapshot.last_sync_time();
        let Snapshot { store, source, .. } = snapshot;
        let source = source.map(DataSource::File).unwrap_or(DataSource::None);
        self.load(store, source)?;
        self.last_sync = last_sync;
        Ok(())
    }
}
