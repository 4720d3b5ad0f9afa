use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rust_xlsxwriter::Workbook;
use tracing::debug;

/// Excel rejects sheet names longer than this.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// A CSV file to be copied into its own worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSource {
    pub sheet_name: String,
    pub csv_path: PathBuf,
}

pub fn truncate_sheet_name(name: &str) -> String {
    name.chars().take(MAX_SHEET_NAME_LEN).collect()
}

/// Writes one worksheet per source CSV into a new workbook at `path`. The
/// first CSV record becomes the header row; numeric fields are stored as
/// numbers, everything else as text.
pub fn write_workbook(sources: &[SheetSource], path: &Path) -> anyhow::Result<()> {
    let mut workbook = Workbook::new();

    for source in sources {
        let sheet_name = truncate_sheet_name(&source.sheet_name);
        debug!("adding sheet {} from {}", sheet_name, source.csv_path.display());
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet_name)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&source.csv_path)
            .with_context(|| format!("failed to open {}", source.csv_path.display()))?;
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let row = u32::try_from(row)?;
            for (col, field) in record.iter().enumerate() {
                let col = u16::try_from(col)?;
                // the header row is always text
                match field.parse::<f64>() {
                    Ok(number) if row > 0 && number.is_finite() => {
                        worksheet.write_number(row, col, number)?;
                    }
                    _ => {
                        worksheet.write_string(row, col, field)?;
                    }
                }
            }
        }
    }

    workbook.save(path).with_context(|| format!("failed to save {}", path.display()))?;
    Ok(())
}
