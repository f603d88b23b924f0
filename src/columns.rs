//! Column names of the master sheet and their remote counterparts.
//!
//! The master file and the cloud sheet share a header vocabulary, but the
//! remote script matches headers by name, so every read and write goes
//! through [`FIELD_MAP`] instead of spelling header names at call sites.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    MgmtNo,
    ProdNo,
    ProdName,
    Manufacturer,
    ModelName,
    ProdYear,
    AssetNo,
    VehicleNo,
    SerialNo,
    EquipStatus,
    AuditDate,
    AuditStatus,
    Center,
    Zone,
}

/// One row of the field table: local header, remote header.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: Field,
    pub local: &'static str,
    pub remote: &'static str,
}

pub const FIELD_MAP: &[FieldSpec] = &[
    FieldSpec { field: Field::MgmtNo, local: "관리번호", remote: "관리번호" },
    FieldSpec { field: Field::ProdNo, local: "자재번호", remote: "자재번호" },
    FieldSpec { field: Field::ProdName, local: "자재내역", remote: "자재내역" },
    FieldSpec { field: Field::Manufacturer, local: "제조사명", remote: "제조사명" },
    FieldSpec { field: Field::ModelName, local: "제조사모델명", remote: "제조사모델명" },
    FieldSpec { field: Field::ProdYear, local: "제조년도", remote: "제조년도" },
    FieldSpec { field: Field::AssetNo, local: "자산번호", remote: "자산번호" },
    FieldSpec { field: Field::VehicleNo, local: "차량번호", remote: "차량번호" },
    FieldSpec { field: Field::SerialNo, local: "시리얼번호", remote: "시리얼번호" },
    FieldSpec { field: Field::EquipStatus, local: "장비상태", remote: "장비상태" },
    FieldSpec { field: Field::AuditDate, local: "자산실사일", remote: "자산실사일" },
    FieldSpec { field: Field::AuditStatus, local: "자산실사 여부", remote: "자산실사 여부" },
    FieldSpec { field: Field::Center, local: "센터위치", remote: "센터위치" },
    FieldSpec { field: Field::Zone, local: "구역위치", remote: "구역위치" },
];

/// Fields sent for every audited row.
pub const AUDIT_UPLOAD_FIELDS: &[Field] = &[
    Field::MgmtNo,
    Field::AssetNo,
    Field::AuditDate,
    Field::AuditStatus,
    Field::Center,
    Field::Zone,
];

/// Identifier fields tried by the audit scanner, in priority order.
pub const SCAN_LOOKUP_FIELDS: &[Field] = &[Field::MgmtNo, Field::AssetNo];

/// Checklist search only matches the management number.
pub const CHECKLIST_LOOKUP_FIELDS: &[Field] = &[Field::MgmtNo];

impl Field {
    fn spec(self) -> &'static FieldSpec {
        FIELD_MAP
            .iter()
            .find(|spec| spec.field == self)
            .unwrap_or(&FIELD_MAP[0])
    }

    pub fn local(self) -> &'static str {
        self.spec().local
    }

    pub fn remote(self) -> &'static str {
        self.spec().remote
    }
}

/// Translate a remote header into the local one; unknown headers pass through.
pub fn remote_to_local(header: &str) -> &str {
    FIELD_MAP
        .iter()
        .find(|spec| spec.remote == header)
        .map(|spec| spec.local)
        .unwrap_or(header)
}
