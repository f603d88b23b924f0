//! Print surface: the checklist previews as one paginated HTML document.
//!
//! The browser's print dialog turns the page into the downloadable PDF,
//! independent of the spreadsheet export.

use chrono::{Datelike, NaiveDate};
use handlebars::Handlebars;
use serde::Serialize;

use crate::checklist::{Category, ChecklistEntry};
use crate::downloader::ITEMS_PER_SHEET;
use crate::error::Result;
use crate::qr::qr_data_uri;

const TEMPLATE: &str = include_str!("./templates/checklist.hbs");

#[derive(Serialize)]
struct PrintItem<'a> {
    entry: &'a ChecklistEntry,
    qr: String,
    logistics: bool,
    construction: bool,
}

#[derive(Serialize)]
struct PrintPage<'a> {
    file_name: &'a str,
    engineer: &'a str,
    year: i32,
    pages: Vec<Vec<PrintItem<'a>>>,
}

pub fn render_print_page(
    entries: &[ChecklistEntry],
    engineer: &str,
    today: NaiveDate,
    file_name: &str,
) -> Result<String> {
    let mut pages = Vec::new();
    for chunk in entries.chunks(ITEMS_PER_SHEET) {
        let mut items = Vec::with_capacity(chunk.len());
        for entry in chunk {
            items.push(PrintItem {
                entry,
                qr: qr_data_uri(&entry.mgmt_number)?,
                logistics: entry.category == Some(Category::Logistics),
                construction: entry.category == Some(Category::Construction),
            });
        }
        pages.push(items);
    }

    let data = PrintPage {
        file_name,
        engineer,
        year: today.year(),
        pages,
    };
    let handlebars = Handlebars::new();
    Ok(handlebars.render_template(TEMPLATE, &data)?)
}
