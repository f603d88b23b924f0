use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::checklist::ChecklistEntry;
use crate::columns::{AUDIT_UPLOAD_FIELDS, Field};
use crate::error::{AppError, Result};
use crate::record::Location;
use crate::remote::{RemoteApi, RemoteRow, WritePayload};
use crate::store::{RowStore, StoreMutation};

/// What is known about a write after it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Accepted by the endpoint; the sheet contents were not checked.
    Dispatched,
    /// A follow-up read found every sent row.
    ConfirmedByReadback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReceipt {
    pub count: usize,
    pub delivery: Delivery,
}

/// Pending rows captured for one upload.
#[derive(Debug, Clone)]
pub struct AuditBatch {
    pub indices: Vec<usize>,
    pub rows: Vec<RemoteRow>,
    pub location: Location,
}

impl AuditBatch {
    /// Snapshot the pending audit view, newest first, in remote field names.
    pub fn prepare(store: &RowStore, location: Location) -> Result<Self> {
        let pending = store.pending_audit();
        if pending.is_empty() {
            return Err(AppError::NothingToSync);
        }

        let mut indices = Vec::with_capacity(pending.len());
        let mut rows = Vec::with_capacity(pending.len());
        for (index, record) in pending {
            let mut row = RemoteRow::new();
            for field in AUDIT_UPLOAD_FIELDS {
                let value = match field {
                    Field::Center => location.center.clone(),
                    Field::Zone => location.zone.clone(),
                    other => record.field(*other).to_string(),
                };
                row.insert(field.remote().to_string(), Value::String(value));
            }
            indices.push(index);
            rows.push(row);
        }
        Ok(AuditBatch { indices, rows, location })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mutation clearing exactly the rows that were sent.
    pub fn clear_mutation(&self) -> StoreMutation {
        StoreMutation::ClearAudited {
            indices: self.indices.clone(),
            location: Some(self.location.clone()),
        }
    }
}

/// Checklist entries in remote field names, for the upsert write.
pub fn checklist_rows(entries: &[ChecklistEntry]) -> Vec<RemoteRow> {
    entries
        .iter()
        .map(|entry| {
            let pairs = [
                (Field::MgmtNo, &entry.mgmt_number),
                (Field::ProdNo, &entry.product_code),
                (Field::ProdName, &entry.product_name),
                (Field::Manufacturer, &entry.manufacturer),
                (Field::ModelName, &entry.model),
                (Field::ProdYear, &entry.year),
                (Field::AssetNo, &entry.asset_number),
                (Field::VehicleNo, &entry.vehicle_number),
                (Field::SerialNo, &entry.serial_number),
            ];
            pairs
                .into_iter()
                .map(|(field, value)| (field.remote().to_string(), Value::String(value.clone())))
                .collect()
        })
        .collect()
}

pub struct SyncGateway {
    remote: Arc<dyn RemoteApi>,
    verify: bool,
}

impl SyncGateway {
    pub fn new(remote: Arc<dyn RemoteApi>, verify: bool) -> Self {
        SyncGateway { remote, verify }
    }

    /// Send a prepared audit batch. The caller clears local flags afterwards
    /// with [`AuditBatch::clear_mutation`].
    pub async fn send_audit(&self, sheet: &str, batch: &AuditBatch) -> Result<SyncReceipt> {
        if batch.is_empty() {
            return Err(AppError::NothingToSync);
        }
        let payload = WritePayload {
            sheet_name: sheet.to_string(),
            rows: batch.rows.clone(),
        };
        self.remote.write_rows(&payload).await?;
        info!(
            "sent {} audit row(s) to {} [{} / {}]",
            batch.len(),
            sheet,
            batch.location.center,
            batch.location.zone
        );

        let delivery = if self.verify {
            self.read_back(sheet, &payload.rows).await?
        } else {
            Delivery::Dispatched
        };
        Ok(SyncReceipt {
            count: batch.len(),
            delivery,
        })
    }

    pub async fn push_checklists(&self, sheet: &str, entries: &[ChecklistEntry]) -> Result<SyncReceipt> {
        if entries.is_empty() {
            return Err(AppError::NoIdentifiers);
        }
        let payload = WritePayload {
            sheet_name: sheet.to_string(),
            rows: checklist_rows(entries),
        };
        self.remote.write_rows(&payload).await?;

        let delivery = if self.verify {
            self.read_back(sheet, &payload.rows).await?
        } else {
            Delivery::Dispatched
        };
        Ok(SyncReceipt {
            count: entries.len(),
            delivery,
        })
    }

    // Every sent row must be present with the same audit date (if any).
    async fn read_back(&self, sheet: &str, sent: &[RemoteRow]) -> Result<Delivery> {
        let remote_rows = self.remote.read_rows(Some(sheet)).await?;
        let text = |row: &RemoteRow, field: Field| {
            row.get(field.remote())
                .map(crate::remote::cell_text)
                .unwrap_or_default()
        };

        let missing: Vec<String> = sent
            .iter()
            .filter(|row| {
                let row: &RemoteRow = row;
                let id = text(row, Field::MgmtNo);
                let date = text(row, Field::AuditDate);
                !remote_rows.iter().any(|r| {
                    r.matches(Field::MgmtNo, id.trim())
                        && (date.is_empty() || r.field(Field::AuditDate) == date)
                })
            })
            .map(|row| text(row, Field::MgmtNo))
            .collect();

        if missing.is_empty() {
            Ok(Delivery::ConfirmedByReadback)
        } else {
            warn!("read-back is missing {} row(s)", missing.len());
            Err(AppError::ReadbackMismatch { missing })
        }
    }
}
