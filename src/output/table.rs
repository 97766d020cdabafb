use anyhow::{Context, Result};
use camino::Utf8Path as Path;

use crate::types::SequenceRecord;

/// Writes `Accession,Length,Description` rows in the given order, without an index column.
pub fn write_csv(records: &[SequenceRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Couldn't create CSV file '{path}'"))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .flush()
        .with_context(|| format!("Couldn't write CSV file '{path}'"))?;
    Ok(())
}
