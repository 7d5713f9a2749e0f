pub mod csv;
pub mod sheets;

use crate::config::{ProductLine, SourceSettings};
use crate::error::PressError;
use crate::table::LevelTable;

use self::csv::CsvDirectorySource;
use self::sheets::{GoogleSheetsSource, SpreadsheetRef};

/// Somewhere a whole level's worksheet can be read from.
pub trait TableSource {
    fn name(&self) -> String;
    fn fetch(&self, level: u32) -> Result<LevelTable, PressError>;
}

pub fn get_source(
    settings: &SourceSettings,
    product: &ProductLine,
) -> Result<Box<dyn TableSource>, PressError> {
    match settings {
        SourceSettings::Sheets {
            credentials,
            spreadsheet_id,
        } => {
            let spreadsheet = match spreadsheet_id {
                Some(id) => SpreadsheetRef::Id(id.clone()),
                None => SpreadsheetRef::Title(product.spreadsheet.clone()),
            };
            Ok(Box::new(GoogleSheetsSource::new(
                credentials,
                spreadsheet,
                product.worksheet.clone(),
            )?))
        }
        SourceSettings::Csv { dir } => Ok(Box::new(CsvDirectorySource::new(
            dir.clone(),
            product.worksheet.clone(),
        ))),
    }
}

/// `level_{level}` with the level number filled in.
pub fn worksheet_name(pattern: &str, level: u32) -> String {
    pattern.replace("{level}", &level.to_string())
}
