//! Input record source
//!
//! Reads two-column `(entity id, LUX URI)` rows. Header rows and rows whose
//! first column does not match the entity-id pattern are skipped silently;
//! the run never aborts on a malformed row.

use std::path::Path;

use crate::error::Result;
use crate::types::{is_entity_id, Record};

/// Load all valid records from the input CSV.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for row in reader.records() {
        let row = row?;
        let entity_id = row.get(0).unwrap_or("");
        let source_uri = row.get(1).unwrap_or("");
        if !is_entity_id(entity_id) || source_uri.is_empty() {
            skipped += 1;
            continue;
        }
        records.push(Record {
            entity_id: entity_id.to_string(),
            source_uri: source_uri.to_string(),
        });
    }

    if skipped > 0 {
        tracing::debug!(skipped, "skipped rows without a recognized entity id");
    }

    Ok(records)
}
