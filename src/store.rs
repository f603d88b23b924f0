use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::columns::Field;
use crate::error::{AppError, Result};
use crate::record::{AssetRecord, AuditMark, Location};

/// In-memory ordered collection of asset rows, the single source of truth
/// for a session.
///
/// Reads are free; every write goes through [`RowStore::apply`].
#[derive(Clone, Default, Serialize, Deserialize, Debug, PartialEq)]
pub struct RowStore {
    /// Header order of the source sheet, used when exporting.
    pub headers: Vec<String>,
    rows: Vec<AssetRecord>,
}

/// The only ways the row store changes.
#[derive(Debug, Clone)]
pub enum StoreMutation {
    /// Replace everything (file import or cloud fetch).
    Replace {
        headers: Vec<String>,
        rows: Vec<AssetRecord>,
    },
    Clear,
    /// Audit confirmed for the row at `index`.
    Mark { index: usize, mark: AuditMark },
    /// Rows at `indices` were synced; reset their audit flag.
    ClearAudited {
        indices: Vec<usize>,
        location: Option<Location>,
    },
}

impl RowStore {
    pub fn new() -> Self {
        RowStore::default()
    }

    pub fn from_rows(headers: Vec<String>, rows: Vec<AssetRecord>) -> Self {
        let mut store = RowStore::new();
        store.apply(StoreMutation::Replace { headers, rows });
        store
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<AssetRecord>) {
        (self.headers, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[AssetRecord] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&AssetRecord> {
        self.rows.get(index)
    }

    /// Searches are rejected up front on an empty store.
    pub fn ensure_loaded(&self) -> Result<()> {
        if self.is_empty() {
            Err(AppError::EmptyStore)
        } else {
            Ok(())
        }
    }

    /// First row whose trimmed identifier equals the trimmed query.
    ///
    /// `fields` are tried in order for each row, so a row matching on a
    /// later field still wins over a later row matching on an earlier one.
    pub fn find_by_identifier(&self, query: &str, fields: &[Field]) -> Option<(usize, &AssetRecord)> {
        let query = query.trim();
        self.rows
            .iter()
            .enumerate()
            .find(|(_, row)| fields.iter().any(|field| row.matches(*field, query)))
    }

    /// Rows with a pending audit, newest first.
    pub fn pending_audit(&self) -> Vec<(usize, &AssetRecord)> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.is_pending_audit())
            .rev()
            .collect()
    }

    /// Management numbers occurring more than once, in first-seen order.
    pub fn duplicate_identifiers(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut order = Vec::new();
        for row in &self.rows {
            let id = row.field(Field::MgmtNo).trim();
            if id.is_empty() {
                continue;
            }
            let count = counts.entry(id).or_insert(0);
            *count += 1;
            if *count == 2 {
                order.push(id.to_string());
            }
        }
        order
    }

    /// Apply a mutation, returning how many rows it touched.
    pub fn apply(&mut self, mutation: StoreMutation) -> usize {
        match mutation {
            StoreMutation::Replace { headers, rows } => {
                self.headers = headers;
                self.rows = rows;
                self.ensure_headers();
                let duplicates = self.duplicate_identifiers();
                if !duplicates.is_empty() {
                    warn!(
                        "{} duplicate management number(s); lookups use the first row: {}",
                        duplicates.len(),
                        duplicates.join(", ")
                    );
                }
                self.rows.len()
            }
            StoreMutation::Clear => {
                let n = self.rows.len();
                self.headers.clear();
                self.rows.clear();
                n
            }
            StoreMutation::Mark { index, mark } => match self.rows.get_mut(index) {
                Some(row) => {
                    row.apply_mark(&mark);
                    self.ensure_header(Field::AuditDate);
                    self.ensure_header(Field::AuditStatus);
                    debug!("marked row {} audited on {}", index, mark.date);
                    1
                }
                None => 0,
            },
            StoreMutation::ClearAudited { indices, location } => {
                let mut touched = 0;
                for index in indices {
                    if let Some(row) = self.rows.get_mut(index) {
                        if row.is_pending_audit() {
                            row.clear_mark(location.as_ref());
                            touched += 1;
                        }
                    }
                }
                if location.is_some() {
                    self.ensure_header(Field::Center);
                    self.ensure_header(Field::Zone);
                }
                touched
            }
        }
    }

    // Cloud rows may arrive without a header list; derive one from the rows.
    fn ensure_headers(&mut self) {
        if self.headers.is_empty() {
            let mut seen = Vec::new();
            for row in &self.rows {
                for header in row.headers() {
                    if !seen.iter().any(|h: &String| h == header) {
                        seen.push(header.to_string());
                    }
                }
            }
            self.headers = seen;
        }
    }

    fn ensure_header(&mut self, field: Field) {
        if !self.headers.iter().any(|h| h == field.local()) {
            self.headers.push(field.local().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::SCAN_LOOKUP_FIELDS;
    use chrono::NaiveDate;

    fn sample() -> RowStore {
        RowStore::from_rows(
            vec!["관리번호".into(), "자산번호".into()],
            vec![
                AssetRecord::from_pairs([("관리번호", " A1 "), ("자산번호", "900")]),
                AssetRecord::from_pairs([("관리번호", "B2"), ("자산번호", "901")]),
                AssetRecord::from_pairs([("관리번호", "B2"), ("자산번호", "902")]),
            ],
        )
    }

    #[test]
    fn lookup_trims_both_sides() {
        let store = sample();
        let (index, _) = store.find_by_identifier("A1\n", &[Field::MgmtNo]).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn lookup_falls_back_to_asset_number() {
        let store = sample();
        let (index, row) = store.find_by_identifier("901", SCAN_LOOKUP_FIELDS).unwrap();
        assert_eq!(index, 1);
        assert_eq!(row.field(Field::MgmtNo), "B2");
        assert!(store.find_by_identifier("901", &[Field::MgmtNo]).is_none());
    }

    #[test]
    fn duplicates_take_first_match_and_are_reported() {
        let store = sample();
        let (index, _) = store.find_by_identifier("B2", &[Field::MgmtNo]).unwrap();
        assert_eq!(index, 1);
        assert_eq!(store.duplicate_identifiers(), vec!["B2".to_string()]);
    }

    #[test]
    fn mark_touches_only_target_row() {
        let mut store = sample();
        let mark = AuditMark::on(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(store.apply(StoreMutation::Mark { index: 1, mark }), 1);

        assert!(store.get(1).unwrap().is_pending_audit());
        assert!(!store.get(2).unwrap().is_pending_audit());
        assert!(store.headers.iter().any(|h| h == "자산실사 여부"));
    }

    #[test]
    fn pending_view_is_reverse_ordered() {
        let mut store = sample();
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        store.apply(StoreMutation::Mark { index: 0, mark: AuditMark::on(date) });
        store.apply(StoreMutation::Mark { index: 2, mark: AuditMark::on(date) });

        let pending: Vec<usize> = store.pending_audit().into_iter().map(|(i, _)| i).collect();
        assert_eq!(pending, vec![2, 0]);
    }

    #[test]
    fn clear_audited_skips_rows_no_longer_pending() {
        let mut store = sample();
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        store.apply(StoreMutation::Mark { index: 0, mark: AuditMark::on(date) });

        let touched = store.apply(StoreMutation::ClearAudited {
            indices: vec![0, 1],
            location: None,
        });
        assert_eq!(touched, 1);
        assert!(store.pending_audit().is_empty());
    }

    #[test]
    fn empty_store_rejects_search() {
        assert!(matches!(RowStore::new().ensure_loaded(), Err(AppError::EmptyStore)));
    }

    #[test]
    fn headers_derived_when_missing() {
        let store = RowStore::from_rows(
            Vec::new(),
            vec![AssetRecord::from_pairs([("관리번호", "A1"), ("장비상태", "A12")])],
        );
        assert_eq!(store.headers.len(), 2);
    }
}
