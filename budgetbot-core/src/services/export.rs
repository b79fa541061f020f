//! Export service - CSV dump of an owner's records

use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::domain::{Record, RecordFilter};
use crate::ports::{Attachment, LedgerStore};

pub const EXPORT_HEADER: [&str; 4] = ["kind", "amount", "category", "date"];

/// A rendered export and how many records went into it
#[derive(Debug, Clone)]
pub struct Export {
    pub attachment: Attachment,
    pub record_count: usize,
}

pub struct ExportService {
    store: Arc<dyn LedgerStore>,
}

impl ExportService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Export the records of `owner_id`, optionally only one exact category.
    /// None if nothing matches.
    pub fn export_owner(&self, owner_id: &str, category: Option<&str>) -> Result<Option<Export>> {
        let mut filter = RecordFilter::all().owner(owner_id);
        if let Some(category) = category {
            filter = filter.category(category);
        }

        let records = self.store.query(&filter)?;
        if records.is_empty() {
            return Ok(None);
        }

        let bytes = render_csv(&records)?;
        Ok(Some(Export {
            attachment: Attachment {
                file_name: export_file_name(owner_id),
                mime_type: "text/csv".to_string(),
                bytes,
            },
            record_count: records.len(),
        }))
    }
}

pub fn export_file_name(owner_id: &str) -> String {
    format!("export_{}.csv", owner_id)
}

/// Render records as CSV, header first, in insertion order
pub fn render_csv(records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;

    for record in records {
        let amount = record.amount.to_string();
        let date = record.date.format("%Y-%m-%d").to_string();
        writer.write_record([
            record.kind.as_str(),
            amount.as_str(),
            record.category.as_str(),
            date.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to finish CSV export: {}", e.error()))
}
