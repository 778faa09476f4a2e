// =============================================================================
// Output Writer — date-keyed JSON document
// =============================================================================
//
// Keys are written in ascending date order (the table is a BTreeMap) with a
// fixed four-space indent.  The file is replaced wholesale through a `.tmp`
// sibling and a rename; the target directory must already exist.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::info;

use crate::types::DateTable;

const INDENT: &[u8] = b"    ";

/// Render `table` as the JSON text written to disk.
pub fn render(table: &DateTable) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    table
        .serialize(&mut ser)
        .context("failed to serialise date table to JSON")?;
    String::from_utf8(buf).context("serialised JSON is not valid UTF-8")
}

/// Write `table` to `path`, replacing any previous file.
pub fn write_table(table: &DateTable, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = render(table)?;

    let tmp_path = path.with_extension("json.tmp");

    std::fs::write(&tmp_path, &content)
        .with_context(|| format!("failed to write tmp output to {}", tmp_path.display()))?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e)
            .with_context(|| format!("failed to rename tmp output to {}", path.display()));
    }

    info!(path = %path.display(), rows = table.len(), "digest written");
    Ok(())
}
