use std::path::PathBuf;
use tracing::debug;

use super::{worksheet_name, TableSource};
use crate::error::PressError;
use crate::table::LevelTable;

/// Worksheets exported as `<dir>/level_1.csv`, `<dir>/level_2.csv`, ...
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    dir: PathBuf,
    worksheet: String,
}

impl CsvDirectorySource {
    pub fn new(dir: PathBuf, worksheet: String) -> Self {
        Self { dir, worksheet }
    }

    pub fn path_for(&self, level: u32) -> PathBuf {
        self.dir
            .join(format!("{}.csv", worksheet_name(&self.worksheet, level)))
    }
}

impl TableSource for CsvDirectorySource {
    fn name(&self) -> String {
        format!("csv:{}", self.dir.display())
    }

    fn fetch(&self, level: u32) -> Result<LevelTable, PressError> {
        let path = self.path_for(level);
        let csv_error = |source| PressError::Csv {
            path: path.clone(),
            source,
        };

        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(csv_error)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        debug!("read {} rows from {}", rows.len(), path.display());
        Ok(LevelTable::new(level, rows))
    }
}
