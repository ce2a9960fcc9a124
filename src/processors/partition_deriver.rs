use crate::error::{ProcessingError, Result};
use crate::models::{MergedRecord, PartitionKey, TableRow};
use crate::utils::constants::LOCATION_SEPARATOR;
use chrono::Datelike;

/// Split `<island>/<location_name>`. Exactly one separator, both parts
/// non-empty, and neither part may be `.`, `..` or contain a backslash.
pub fn split_location(location: &str) -> Result<(&str, &str)> {
    let mut parts = location.split(LOCATION_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(island), Some(name), None) if is_segment(island) && is_segment(name) => {
            Ok((island, name))
        }
        _ => Err(ProcessingError::MalformedLocation(location.to_string())),
    }
}

fn is_segment(part: &str) -> bool {
    let trimmed = part.trim();
    !trimmed.is_empty() && trimmed != "." && trimmed != ".." && !part.contains('\\')
}

/// Calendar year and month of the record's date plus the split location.
pub fn derive_partition_key(record: &MergedRecord) -> Result<PartitionKey> {
    let (island, location_name) = split_location(&record.location)?;
    Ok(PartitionKey::new(
        island,
        location_name,
        record.date.year(),
        record.date.month(),
    ))
}

/// Annotate every record with its partition. Fails on the first malformed
/// location; every record of one run shares a location so nothing is lost.
pub fn annotate(records: Vec<MergedRecord>) -> Result<Vec<TableRow>> {
    records
        .into_iter()
        .map(|record| {
            let partition = derive_partition_key(&record)?;
            Ok(TableRow { record, partition })
        })
        .collect()
}
