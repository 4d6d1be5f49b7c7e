//! XLSX writer.

use rust_xlsxwriter::{Format, Workbook, XlsxError};

use super::{Cell, Tabular, writer_error};
use crate::errors::Result;

const MIN_WIDTH: usize = 8;
const MAX_WIDTH: usize = 60;

pub(super) fn write<T: Tabular>(rows: &[T]) -> Result<Vec<u8>> {
    build(rows).map_err(|e| writer_error("write xlsx", e))
}

fn build<T: Tabular>(rows: &[T]) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(T::title())?;

    let header_format = Format::new().set_bold();
    let mut widths: Vec<usize> = T::headers().iter().map(|h| h.chars().count()).collect();

    for (col, header) in T::headers().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (index, record) in rows.iter().enumerate() {
        let row = (index + 1) as u32;
        for (col, cell) in record.row().into_iter().enumerate() {
            let column = col as u16;
            match &cell {
                Cell::Text(text) => {
                    sheet.write_string(row, column, text)?;
                }
                Cell::Number(number) => {
                    sheet.write_number(row, column, *number)?;
                }
                Cell::Date(_) => {
                    sheet.write_string(row, column, cell.display())?;
                }
                Cell::Empty => {}
            }
            if let Some(width) = widths.get_mut(col) {
                *width = (*width).max(cell.display().chars().count());
            }
        }
    }

    for (col, width) in widths.into_iter().enumerate() {
        sheet.set_column_width(col as u16, (width.clamp(MIN_WIDTH, MAX_WIDTH) + 2) as f64)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    workbook.save_to_buffer()
}
