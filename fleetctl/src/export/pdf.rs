//! PDF writer.
//!
//! Landscape A4 pages with the built-in Helvetica font, so no font files are embedded. Each column
//! gets an equal share of the page width and cells longer than their column are cut with `...`.

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};

use super::{Tabular, writer_error};
use crate::errors::Result;

const PAGE_WIDTH: f32 = 842.0;
const PAGE_HEIGHT: f32 = 595.0;
const MARGIN: f32 = 36.0;
const TITLE_SIZE: f32 = 14.0;
const FONT_SIZE: f32 = 8.0;
const LEADING: f32 = 11.0;
/// Average Helvetica glyph width as a fraction of the font size
const GLYPH_WIDTH: f32 = 0.5;

struct Layout {
    columns: usize,
    column_width: f32,
    max_chars: usize,
}

impl Layout {
    fn new(columns: usize) -> Self {
        let columns = columns.max(1);
        let column_width = (PAGE_WIDTH - 2.0 * MARGIN) / columns as f32;
        let max_chars = ((column_width - 4.0) / (FONT_SIZE * GLYPH_WIDTH)).floor().max(3.0) as usize;
        Self {
            columns,
            column_width,
            max_chars,
        }
    }

    /// Table rows that fit below the title and header line
    fn rows_per_page() -> usize {
        let body = PAGE_HEIGHT - 2.0 * MARGIN - TITLE_SIZE - 2.0 * LEADING;
        (body / LEADING).floor().max(1.0) as usize
    }
}

pub(super) fn write<T: Tabular>(rows: &[T], heading: &str, day: NaiveDate) -> Result<Vec<u8>> {
    let layout = Layout::new(T::headers().len());
    let lines: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.row().iter().map(|cell| cell.display()).collect())
        .collect();
    let headers: Vec<String> = T::headers().iter().map(|h| h.to_string()).collect();
    let title = format!("{heading} - {} ({})", T::title(), day.format("%Y-%m-%d"));

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
            "F2" => bold_id,
        },
    });

    // An empty export still gets one page with the header line
    let chunks: Vec<&[Vec<String>]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(Layout::rows_per_page()).collect()
    };
    let page_count = chunks.len();

    let mut kids: Vec<Object> = Vec::with_capacity(page_count);
    for (index, chunk) in chunks.into_iter().enumerate() {
        let operations = page_operations(&layout, &title, &headers, chunk, index + 1, page_count);
        let encoded = Content { operations }
            .encode()
            .map_err(|e| writer_error("encode pdf page", e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| writer_error("save pdf", e))?;
    Ok(bytes)
}

fn page_operations(
    layout: &Layout,
    title: &str,
    headers: &[String],
    rows: &[Vec<String>],
    page: usize,
    page_count: usize,
) -> Vec<Operation> {
    let mut ops = vec![Operation::new("BT", vec![])];
    let mut y = PAGE_HEIGHT - MARGIN - TITLE_SIZE;

    text_at(&mut ops, "F2", TITLE_SIZE, MARGIN, y, title);
    let footer = format!("Page {page} of {page_count}");
    text_at(&mut ops, "F1", FONT_SIZE, PAGE_WIDTH - MARGIN - 60.0, MARGIN / 2.0, &footer);

    y -= 2.0 * LEADING;
    write_line(&mut ops, layout, "F2", y, headers);
    for row in rows {
        y -= LEADING;
        write_line(&mut ops, layout, "F1", y, row);
    }

    ops.push(Operation::new("ET", vec![]));
    ops
}

fn write_line(ops: &mut Vec<Operation>, layout: &Layout, font: &str, y: f32, cells: &[String]) {
    for (col, cell) in cells.iter().take(layout.columns).enumerate() {
        if cell.is_empty() {
            continue;
        }
        let x = MARGIN + col as f32 * layout.column_width;
        text_at(ops, font, FONT_SIZE, x, y, &truncate(cell, layout.max_chars));
    }
}

fn text_at(ops: &mut Vec<Operation>, font: &str, size: f32, x: f32, y: f32, text: &str) {
    ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
    ops.push(Operation::new(
        "Tm",
        vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), y.into()],
    ));
    ops.push(Operation::new("Tj", vec![Object::String(win_ansi(text), StringFormat::Literal)]));
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Latin-1 subset of WinAnsi; anything else becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ (0x20..=0x7e | 0xa0..=0xff) => code as u8,
            _ => b'?',
        })
        .collect()
}
