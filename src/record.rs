use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::columns::Field;

/// Literal written into the audit status column for a locally confirmed audit.
pub const AUDITED_MARKER: &str = "O";

/// One asset row: header name to cell text.
///
/// Headers are not fixed at compile time; whatever the master sheet carries
/// is kept verbatim. [`Field`] accessors cover the columns the application
/// understands.
#[derive(Clone, Default, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct AssetRecord {
    fields: BTreeMap<String, String>,
}

/// Audit status column, parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    /// Confirmed by a scan, not yet sent to the remote sheet.
    Pending,
    Clear,
}

impl AuditStatus {
    pub fn parse(raw: &str) -> Self {
        if raw == AUDITED_MARKER {
            AuditStatus::Pending
        } else {
            AuditStatus::Clear
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Pending => AUDITED_MARKER,
            AuditStatus::Clear => "",
        }
    }
}

/// Mutation applied to a record when the operator confirms a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditMark {
    pub date: String,
}

impl AuditMark {
    /// Mark dated `YYYY.MM.DD`.
    pub fn on(date: chrono::NaiveDate) -> Self {
        AuditMark {
            date: date.format("%Y.%m.%d").to_string(),
        }
    }

    pub fn today() -> Self {
        Self::on(chrono::Local::now().date_naive())
    }
}

impl AssetRecord {
    pub fn new() -> Self {
        AssetRecord::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        AssetRecord {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields.get(header).map(String::as_str)
    }

    /// Value of a known column, empty when the column is absent.
    pub fn field(&self, field: Field) -> &str {
        self.get(field.local()).unwrap_or("")
    }

    pub fn set(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(header.into(), value.into());
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        self.set(field.local(), value);
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when the trimmed value of `field` equals `query` (already trimmed).
    pub fn matches(&self, field: Field, query: &str) -> bool {
        self.field(field).trim() == query
    }

    pub fn audit_status(&self) -> AuditStatus {
        AuditStatus::parse(self.field(Field::AuditStatus))
    }

    pub fn is_pending_audit(&self) -> bool {
        self.audit_status() == AuditStatus::Pending
    }

    pub fn apply_mark(&mut self, mark: &AuditMark) {
        self.set_field(Field::AuditDate, mark.date.clone());
        self.set_field(Field::AuditStatus, AuditStatus::Pending.as_str());
    }

    /// Reset after a successful sync, stamping where the audit happened.
    pub fn clear_mark(&mut self, location: Option<&Location>) {
        self.set_field(Field::AuditStatus, AuditStatus::Clear.as_str());
        if let Some(location) = location {
            self.set_field(Field::Center, location.center.clone());
            self.set_field(Field::Zone, location.zone.clone());
        }
    }
}

/// Center/zone pair supplied when audit results are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub center: String,
    pub zone: String,
}

impl Location {
    pub fn new(center: &str, zone: &str) -> crate::error::Result<Self> {
        let center = center.trim();
        let zone = zone.trim();
        if center.is_empty() || zone.is_empty() {
            return Err(crate::error::AppError::MissingLocation);
        }
        Ok(Location {
            center: center.to_string(),
            zone: zone.to_string(),
        })
    }
}
