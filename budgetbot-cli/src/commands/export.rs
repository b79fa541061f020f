//! Export command - write an owner's records to a CSV file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::get_context;
use crate::output;

pub fn run(
    data_dir: &Path,
    owner: &str,
    category: Option<&str>,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let ctx = get_context(data_dir)?;

    let Some(export) = ctx.export_service.export_owner(owner, category)? else {
        match category {
            Some(category) => output::warning(&format!(
                "No records for owner {} in category {}",
                owner, category
            )),
            None => output::warning(&format!("No records for owner {}", owner)),
        }
        return Ok(());
    };

    let path = output_path.unwrap_or_else(|| PathBuf::from(&export.attachment.file_name));
    std::fs::write(&path, &export.attachment.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    output::success(&format!(
        "Exported {} records to {}",
        export.record_count,
        path.display()
    ));
    Ok(())
}
