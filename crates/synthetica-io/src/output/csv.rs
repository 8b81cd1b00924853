use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use synthetica_core::Table;

use super::CountingWriter;

/// Write a table as CSV: header row in column order, then one record per row.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<u64, csv::Error> {
    let writer = BufWriter::new(File::create(path).map_err(csv::Error::from)?);
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    writer.write_record(table.columns())?;

    for row in table.rows() {
        writer.write_record(row.iter().map(|value| value.render()))?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}
