//! CSV writer.

use super::{Tabular, writer_error};
use crate::errors::Result;

pub(super) fn write<T: Tabular>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(T::headers())
        .map_err(|e| writer_error("write csv header", e))?;
    for row in rows {
        writer
            .write_record(row.row().iter().map(|cell| cell.display()))
            .map_err(|e| writer_error("write csv row", e))?;
    }
    writer.into_inner().map_err(|e| writer_error("flush csv", e))
}
