use calamine::{Data, Range, Reader, Sheets, open_workbook_auto, open_workbook_auto_from_rs};
use log::info;
use std::io::Cursor;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::record::AssetRecord;
use crate::store::RowStore;

/// Text of one cell as the master sheet shows it.
///
/// Whole floats lose the fraction so years and numeric identifiers read
/// the same as in the sheet.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Build a store from a worksheet range: header row becomes field names.
///
/// Columns with a blank header and rows with no values are skipped; blank
/// cells are left out of the record.
pub fn store_from_range(range: &Range<Data>) -> RowStore {
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| cell_text(c).trim().to_string()).collect(),
        None => return RowStore::new(),
    };

    let records: Vec<AssetRecord> = rows
        .map(|row| {
            AssetRecord::from_pairs(
                headers
                    .iter()
                    .zip(row.iter())
                    .filter(|(header, cell)| !header.is_empty() && !matches!(cell, Data::Empty))
                    .map(|(header, cell)| (header.clone(), cell_text(cell))),
            )
        })
        .filter(|record| record.iter().next().is_some())
        .collect();

    let headers = headers.into_iter().filter(|h| !h.is_empty()).collect();
    RowStore::from_rows(headers, records)
}

fn check_extension(name: &str) -> Result<()> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("xlsx") | Some("xls") => Ok(()),
        Some(ext) => Err(AppError::UnsupportedFile(format!("unsupported file extension: {}", ext))),
        None => Err(AppError::UnsupportedFile("file has no extension".to_string())),
    }
}

fn first_sheet<RS>(workbook: &mut Sheets<RS>) -> Result<Range<Data>>
where
    RS: std::io::Read + std::io::Seek,
{
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::Import("no sheets found in workbook".to_string()))?;

    workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::Import(e.to_string()))
}

/// Load the first sheet of an `.xlsx`/`.xls` master file.
///
/// # Examples
/// ```no_run
/// use assethub::loader::load_master;
///
/// match load_master("master.xlsx") {
///     Ok(store) => println!("loaded {} rows", store.len()),
///     Err(e) => eprintln!("error loading master file: {}", e),
/// }
/// ```
pub fn load_master(filepath: impl AsRef<Path>) -> Result<RowStore> {
    let path = filepath.as_ref();
    check_extension(&path.to_string_lossy())?;

    let mut workbook = open_workbook_auto(path).map_err(|e| AppError::Import(e.to_string()))?;
    let range = first_sheet(&mut workbook)?;
    let store = store_from_range(&range);
    info!("loaded {} rows from {}", store.len(), path.display());
    Ok(store)
}

/// Load an uploaded master file held in memory.
pub fn load_master_bytes(file_name: &str, bytes: Vec<u8>) -> Result<RowStore> {
    check_extension(file_name)?;

    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| AppError::Import(e.to_string()))?;
    let range = first_sheet(&mut workbook)?;
    let store = store_from_range(&range);
    info!("loaded {} rows from upload {}", store.len(), file_name);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_floats_drop_fraction() {
        assert_eq!(cell_text(&Data::Float(2019.0)), "2019");
        assert_eq!(cell_text(&Data::Float(1.25)), "1.25");
        assert_eq!(cell_text(&Data::String("'00123".into())), "'00123");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn header_row_names_fields() {
        let mut range = Range::new((0, 0), (2, 2));
        range.set_value((0, 0), Data::String("관리번호".into()));
        range.set_value((0, 1), Data::String("장비상태".into()));
        range.set_value((1, 0), Data::String("A1".into()));
        range.set_value((1, 1), Data::String("A12".into()));
        range.set_value((2, 2), Data::Empty);

        let store = store_from_range(&range);
        assert_eq!(store.headers, vec!["관리번호".to_string(), "장비상태".to_string()]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).unwrap().get("장비상태"), Some("A12"));
    }

    #[test]
    fn rejects_other_formats() {
        assert!(matches!(load_master_bytes("master.csv", Vec::new()), Err(AppError::UnsupportedFile(_))));
        assert!(matches!(load_master_bytes("master", Vec::new()), Err(AppError::UnsupportedFile(_))));
    }
}
