use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Image, Workbook, Worksheet};

use crate::checklist::{Category, ChecklistEntry};
use crate::error::Result;
use crate::qr::qr_png;
use crate::store::RowStore;

/// Checklists laid out on one printed page.
pub const ITEMS_PER_SHEET: usize = 3;
/// Rows occupied by one checklist block.
pub const ROWS_PER_BLOCK: u32 = 10;

const FONT: &str = "Malgun Gothic";
const TITLE: &str = "상품/임가/경,중 체크리스트";
const LEGEND: &str = "양호: V  보통: △  불량: x  교체: O  해당없음: N";
const COLUMN_WIDTHS: [f64; 8] = [10.0, 20.0, 10.0, 20.0, 10.0, 20.0, 10.0, 20.0];
const QR_EDGE_PX: f64 = 110.0;

struct Styles {
    title: Format,
    mgmt_label: Format,
    mgmt_value: Format,
    date_line: Format,
    label: Format,
    value: Format,
    value_left: Format,
    category_label: Format,
    category_mark: Format,
    legend: Format,
}

impl Styles {
    fn new() -> Self {
        let value = Format::new()
            .set_bold()
            .set_font_size(14)
            .set_font_name(FONT)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin);

        Styles {
            title: Format::new()
                .set_bold()
                .set_font_size(28)
                .set_font_name(FONT)
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::VerticalCenter),
            mgmt_label: Format::new()
                .set_font_size(16)
                .set_font_name(FONT)
                .set_align(FormatAlign::Right),
            mgmt_value: Format::new()
                .set_bold()
                .set_font_size(20)
                .set_font_name(FONT)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::Bottom),
            date_line: Format::new()
                .set_font_size(12)
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::VerticalCenter),
            label: value.clone().set_background_color(Color::RGB(0xF2F2F2)),
            value_left: value
                .clone()
                .set_align(FormatAlign::Left)
                .set_indent(1),
            value,
            category_label: Format::new()
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::Bottom),
            category_mark: Format::new()
                .set_bold()
                .set_font_size(18)
                .set_font_name(FONT)
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::Bottom),
            legend: Format::new()
                .set_bold()
                .set_font_size(14)
                .set_font_name(FONT)
                .set_align(FormatAlign::Right)
                .set_align(FormatAlign::Bottom),
        }
    }
}

/// Build the printable checklist workbook, three blocks per `Page N` sheet.
///
/// # Arguments
/// * `entries` - Checklist entries in output order
/// * `engineer` - Name printed on the maintenance line (may be empty)
/// * `today` - Date whose year is printed on the maintenance/QC line
///
/// # Returns
/// * `.xlsx` file content as bytes
pub fn checklist_workbook(entries: &[ChecklistEntry], engineer: &str, today: NaiveDate) -> Result<Vec<u8>> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();

    for (page, chunk) in entries.chunks(ITEMS_PER_SHEET).enumerate() {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(format!("Page {}", page + 1))?;
        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }

        for (slot, entry) in chunk.iter().enumerate() {
            let start = slot as u32 * ROWS_PER_BLOCK;
            write_block(&mut worksheet, &styles, entry, engineer, today, start)?;
        }

        worksheet
            .set_paper_size(9)
            .set_portrait()
            .set_print_fit_to_pages(1, 1)
            .set_margins(0.3, 0.3, 0.4, 0.4, 0.0, 0.0);
        workbook.push_worksheet(worksheet);
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_block(
    ws: &mut Worksheet,
    styles: &Styles,
    entry: &ChecklistEntry,
    engineer: &str,
    today: NaiveDate,
    start: u32,
) -> Result<()> {
    let year = today.year();

    // Title and management number
    ws.set_row_height(start, 80)?;
    ws.merge_range(start, 0, start, 4, TITLE, &styles.title)?;
    ws.merge_range(start, 5, start, 6, "관리번호: ", &styles.mgmt_label)?;
    ws.write_string_with_format(start, 7, &entry.mgmt_number, &styles.mgmt_value)?;

    ws.set_row_height(start + 1, 10)?;
    ws.merge_range(start + 1, 0, start + 1, 7, "", &Format::new())?;

    // Signature line
    ws.set_row_height(start + 2, 160)?;
    let signature = format!(
        "정비일자: {}                    정비자: {}                    QC일자: {}                    QC:",
        year, engineer, year
    );
    ws.merge_range(start + 2, 0, start + 2, 6, &signature, &styles.date_line)?;

    ws.set_row_height(start + 3, 40)?;
    ws.set_row_hidden(start + 4)?;

    // Field grid
    let row = start + 5;
    ws.set_row_height(row, 90)?;
    ws.write_string_with_format(row, 0, "상품코드", &styles.label)?;
    ws.write_string_with_format(row, 1, &entry.product_code, &styles.value)?;
    ws.write_string_with_format(row, 2, "상품명", &styles.label)?;
    ws.merge_range(row, 3, row, 7, &entry.product_name, &styles.value_left)?;

    let row = start + 6;
    ws.set_row_height(row, 90)?;
    let cells = [
        ("제조사", entry.manufacturer.as_str()),
        ("모델", entry.model.as_str()),
        ("년식", entry.year.as_str()),
        ("사용시간", entry.usage_time.as_str()),
    ];
    for (i, (label, value)) in cells.iter().enumerate() {
        let col = (i * 2) as u16;
        ws.write_string_with_format(row, col, *label, &styles.label)?;
        ws.write_string_with_format(row, col + 1, *value, &styles.value)?;
    }

    let row = start + 7;
    ws.set_row_height(row, 90)?;
    ws.write_string_with_format(row, 0, "자산번호", &styles.label)?;
    ws.write_string_with_format(row, 1, &entry.asset_number, &styles.value)?;
    ws.write_string_with_format(row, 2, "차량번호", &styles.label)?;
    ws.write_string_with_format(row, 3, &entry.vehicle_number, &styles.value)?;
    ws.write_string_with_format(row, 4, "차대번호", &styles.label)?;
    ws.merge_range(row, 5, row, 7, &entry.serial_number, &styles.value_left)?;

    // Category and legend
    let row = start + 8;
    ws.set_row_height(row, 90)?;
    let mark = |category: Category| if entry.category == Some(category) { "O" } else { "" };
    ws.write_string_with_format(row, 0, "물류:", &styles.category_label)?;
    ws.write_string_with_format(row, 1, mark(Category::Logistics), &styles.category_mark)?;
    ws.write_string_with_format(row, 2, "건설:", &styles.category_label)?;
    ws.write_string_with_format(row, 3, mark(Category::Construction), &styles.category_mark)?;
    ws.merge_range(row, 4, row, 7, LEGEND, &styles.legend)?;

    ws.set_row_height(start + 9, 40)?;

    let png = qr_png(&entry.mgmt_number)?;
    let image = Image::new_from_buffer(&png)?;
    let scale = QR_EDGE_PX / image.width();
    let image = image.set_scale_width(scale).set_scale_height(scale);
    ws.insert_image_with_offset(start + 2, 7, &image, 10, 10)?;

    Ok(())
}

/// Export every row, header order preserved, to a single `Audit Result` sheet.
pub fn master_workbook(store: &RowStore) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Audit Result")?;

    let header_format = Format::new().set_bold();
    for (c, header) in store.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, header, &header_format)?;
    }

    for (r, record) in store.rows().iter().enumerate() {
        for (c, header) in store.headers.iter().enumerate() {
            if let Some(value) = record.get(header) {
                worksheet.write_string((r + 1) as u32, c as u16, value)?;
            }
        }
    }

    workbook.push_worksheet(worksheet);
    Ok(workbook.save_to_buffer()?)
}
