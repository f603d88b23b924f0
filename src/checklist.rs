use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::columns::{CHECKLIST_LOOKUP_FIELDS, Field};
use crate::error::{AppError, Result};
use crate::record::AssetRecord;
use crate::store::RowStore;

lazy_static! {
    static ref SEPARATOR_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

/// Checkbox stamped on the printed checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Logistics,
    Construction,
}

impl Category {
    /// `A` in the equipment status means logistics and is checked before `B`.
    pub fn from_status(status: &str) -> Option<Self> {
        if status.contains('A') {
            Some(Category::Logistics)
        } else if status.contains('B') {
            Some(Category::Construction)
        } else {
            None
        }
    }

    /// Label printed next to the checkbox.
    pub fn label(self) -> &'static str {
        match self {
            Category::Logistics => "물류",
            Category::Construction => "건설",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub mgmt_number: String,
    pub product_code: String,
    pub product_name: String,
    pub manufacturer: String,
    pub model: String,
    pub year: String,
    /// Filled in by hand on the printed form.
    pub usage_time: String,
    pub asset_number: String,
    pub vehicle_number: String,
    pub serial_number: String,
    pub category: Option<Category>,
}

/// Result of a batch search: matches in input order plus the misses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistBatch {
    pub found: Vec<ChecklistEntry>,
    pub missing: Vec<String>,
}

/// Drop the quote spreadsheets prepend to text-forced numbers (`'00123`).
pub fn strip_leading_quote(value: &str) -> &str {
    value.strip_prefix('\'').unwrap_or(value)
}

/// Split free-form input on any whitespace, dropping empty pieces.
pub fn parse_identifiers(input: &str) -> Vec<String> {
    SEPARATOR_REGEX
        .split(input)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ChecklistEntry {
    /// Project a master row into the checklist shape.
    pub fn from_record(mgmt_number: &str, row: &AssetRecord) -> Self {
        let text = |field: Field| strip_leading_quote(row.field(field)).to_string();
        ChecklistEntry {
            mgmt_number: strip_leading_quote(mgmt_number).to_string(),
            product_code: text(Field::ProdNo),
            product_name: text(Field::ProdName),
            manufacturer: text(Field::Manufacturer),
            model: text(Field::ModelName),
            year: text(Field::ProdYear),
            usage_time: String::new(),
            asset_number: text(Field::AssetNo),
            vehicle_number: text(Field::VehicleNo),
            serial_number: text(Field::SerialNo),
            category: Category::from_status(row.field(Field::EquipStatus)),
        }
    }
}

/// Look up every identifier and build a checklist entry for each match.
///
/// Duplicates in the input yield duplicate entries.
pub fn build_checklists(store: &RowStore, identifiers: &[String]) -> Result<ChecklistBatch> {
    store.ensure_loaded()?;

    let targets: Vec<&str> = identifiers
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect();
    if targets.is_empty() {
        return Err(AppError::NoIdentifiers);
    }

    let mut batch = ChecklistBatch::default();
    for id in targets {
        match store.find_by_identifier(id, CHECKLIST_LOOKUP_FIELDS) {
            Some((_, row)) => batch.found.push(ChecklistEntry::from_record(id, row)),
            None => batch.missing.push(id.to_string()),
        }
    }
    Ok(batch)
}

/// Convenience for raw textarea input.
pub fn search(store: &RowStore, input: &str) -> Result<ChecklistBatch> {
    build_checklists(store, &parse_identifiers(input))
}

/// Download name for a checklist export: one entry names its asset.
pub fn export_file_name(entries: &[ChecklistEntry], date: chrono::NaiveDate, extension: &str) -> String {
    let stamp = date.format("%Y%m%d");
    match entries {
        [single] => format!("정비_체크리스트_{}_{}.{}", single.mgmt_number, stamp, extension),
        _ => format!("정비_체크리스트_{}.{}", stamp, extension),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RowStore {
        RowStore::from_rows(
            Vec::new(),
            vec![
                AssetRecord::from_pairs([
                    ("관리번호", "A1"),
                    ("장비상태", "A12"),
                    ("자재번호", "'00123"),
                    ("제조년도", "2019"),
                ]),
                AssetRecord::from_pairs([("관리번호", "B7"), ("장비상태", "B7")]),
                AssetRecord::from_pairs([("관리번호", "C1"), ("장비상태", "C1")]),
            ],
        )
    }

    #[test]
    fn category_prefers_logistics() {
        assert_eq!(Category::from_status("A12"), Some(Category::Logistics));
        assert_eq!(Category::from_status("B7"), Some(Category::Construction));
        assert_eq!(Category::from_status("AB"), Some(Category::Logistics));
        assert_eq!(Category::from_status("C1"), None);
        assert_eq!(Category::from_status(""), None);
    }

    #[test]
    fn single_match_builds_logistics_entry() {
        let batch = search(&store(), "A1").unwrap();
        assert_eq!(batch.found.len(), 1);
        let entry = &batch.found[0];
        assert_eq!(entry.category, Some(Category::Logistics));
        assert_eq!(entry.usage_time, "");
        assert_eq!(entry.product_code, "00123");
        assert_eq!(entry.year, "2019");
    }

    #[test]
    fn found_and_missing_cover_input() {
        let batch = search(&store(), " A1\nZ9  B7\tA1 \n").unwrap();
        assert_eq!(batch.found.len() + batch.missing.len(), 4);
        let ids: Vec<&str> = batch.found.iter().map(|e| e.mgmt_number.as_str()).collect();
        assert_eq!(ids, vec!["A1", "B7", "A1"]);
        assert_eq!(batch.missing, vec!["Z9".to_string()]);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(search(&store(), "  \n "), Err(AppError::NoIdentifiers)));
        assert!(matches!(search(&RowStore::new(), "A1"), Err(AppError::EmptyStore)));
    }

    #[test]
    fn quote_is_stripped_once() {
        assert_eq!(strip_leading_quote("'00123"), "00123");
        assert_eq!(strip_leading_quote("''1"), "'1");
        assert_eq!(strip_leading_quote("12'3"), "12'3");
    }

    #[test]
    fn file_name_depends_on_count() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let batch = search(&store(), "A1 B7").unwrap();
        assert_eq!(export_file_name(&batch.found[..1], date, "xlsx"), "정비_체크리스트_A1_20250601.xlsx");
        assert_eq!(export_file_name(&batch.found, date, "xlsx"), "정비_체크리스트_20250601.xlsx");
    }
}
