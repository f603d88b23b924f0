//! Master file import through checklist export and print.

mod common;

use assethub::checklist::{self, Category};
use assethub::downloader;
use assethub::error::AppError;
use assethub::loader;
use assethub::print;
use assethub::record::AuditMark;
use assethub::store::{RowStore, StoreMutation};
use chrono::NaiveDate;
use rust_xlsxwriter::Workbook;
use std::path::Path;

fn write_master(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let headers = ["관리번호", "자재내역", "제조사명", "제조년도", "장비상태", ""];
    for (c, h) in headers.iter().enumerate() {
        sheet.write_string(0, c as u16, *h).unwrap();
    }
    sheet.write_string(1, 0, "'00123").unwrap();
    sheet.write_string(1, 1, "지게차").unwrap();
    sheet.write_string(1, 2, "두산").unwrap();
    sheet.write_number(1, 3, 2019).unwrap();
    sheet.write_string(1, 4, "B2").unwrap();
    sheet.write_string(1, 5, "ignored").unwrap();

    sheet.write_string(2, 0, "A-77").unwrap();
    sheet.write_string(2, 1, "고소작업대").unwrap();
    sheet.write_number(2, 3, 2021).unwrap();
    sheet.write_string(2, 4, "A1").unwrap();
    workbook.save(path).unwrap();
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

#[test]
fn imported_master_builds_checklists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("master.xlsx");
    write_master(&path);

    let store = loader::load_master(&path).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.headers.len(), 5);

    let batch = checklist::search(&store, "A-77\n  MISSING  '00123").unwrap();
    assert_eq!(batch.missing, vec!["MISSING".to_string()]);
    assert_eq!(batch.found.len(), 2);

    let lift = &batch.found[0];
    assert_eq!(lift.mgmt_number, "A-77");
    assert_eq!(lift.year, "2021");
    assert_eq!(lift.category, Some(Category::Logistics));

    let forklift = &batch.found[1];
    assert_eq!(forklift.mgmt_number, "00123");
    assert_eq!(forklift.manufacturer, "두산");
    assert_eq!(forklift.category, Some(Category::Construction));
}

#[test]
fn checklist_exports_name_the_single_asset() {
    let store = common::sample_store();
    let batch = checklist::search(&store, "B2").unwrap();

    let bytes = downloader::checklist_workbook(&batch.found, "홍길동", today()).unwrap();
    assert_eq!(&bytes[..2], b"PK");
    assert_eq!(
        checklist::export_file_name(&batch.found, today(), "xlsx"),
        "정비_체크리스트_B2_20250630.xlsx"
    );

    let all = checklist::search(&store, "A1 B2 C3").unwrap();
    assert_eq!(
        checklist::export_file_name(&all.found, today(), "xlsx"),
        "정비_체크리스트_20250630.xlsx"
    );
}

#[test]
fn print_page_embeds_qr_images() {
    let store = common::sample_store();
    let batch = checklist::search(&store, "A1 B2 C3 A1").unwrap();
    let html = print::render_print_page(&batch.found, "홍길동", today(), "checklist.pdf").unwrap();

    assert_eq!(html.matches("data:image/png;base64,").count(), 4);
    assert_eq!(html.matches("class=\"page\"").count(), 2);
    assert!(html.contains("홍길동"));
}

#[test]
fn audit_results_survive_export_and_reimport() {
    let mut store = common::sample_store();
    let mark = AuditMark::on(today());
    store.apply(StoreMutation::Mark { index: 1, mark });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.xlsx");
    std::fs::write(&path, downloader::master_workbook(&store).unwrap()).unwrap();

    let reloaded = loader::load_master(&path).unwrap();
    let pending: Vec<usize> = reloaded.pending_audit().into_iter().map(|(i, _)| i).collect();
    assert_eq!(pending, vec![1]);
    assert_eq!(reloaded.get(1).unwrap().get("자산실사일"), Some("2025.06.30"));
}

#[test]
fn search_needs_data_and_identifiers() {
    assert!(matches!(
        checklist::search(&RowStore::new(), "A1"),
        Err(AppError::EmptyStore)
    ));
    assert!(matches!(
        checklist::search(&common::sample_store(), " \n\t "),
        Err(AppError::NoIdentifiers)
    ));
}

#[test]
fn unsupported_upload_is_rejected() {
    let err = loader::load_master_bytes("notes.csv", b"a,b".to_vec()).unwrap_err();
    assert!(matches!(err, AppError::UnsupportedFile(_)));
}
