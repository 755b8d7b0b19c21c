//! Streaming FASTA traversal for the build.
//!
//! Wraps needletail, which handles gzip transparently. Sequence names are
//! the first whitespace-delimited token of the header line.

use crate::sketch::IndexError;
use needletail::parse_fastx_file;
use std::path::Path;

/// Call `f(name, seq)` for every sequence in the file whose name matches
/// `targets` (an empty target list matches everything).
pub fn for_each_sequence<P, F>(path: P, targets: &[String], mut f: F) -> Result<(), IndexError>
where
    P: AsRef<Path>,
    F: FnMut(&str, &[u8]),
{
    let path = path.as_ref();
    let mut reader = parse_fastx_file(path).map_err(|e| {
        IndexError::SequenceInput(format!("failed to open {}: {}", path.display(), e))
    })?;

    while let Some(record) = reader.next() {
        let record = record.map_err(|e| {
            IndexError::SequenceInput(format!("failed to parse {}: {}", path.display(), e))
        })?;
        let id = record.id();
        let name_end = id
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(id.len());
        let name = std::str::from_utf8(&id[..name_end]).map_err(|e| {
            IndexError::SequenceInput(format!(
                "non-UTF-8 sequence name in {}: {}",
                path.display(),
                e
            ))
        })?;
        if !targets.is_empty() && !targets.iter().any(|t| t == name) {
            continue;
        }
        f(name, &record.seq());
    }

    Ok(())
}
