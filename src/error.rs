use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PressError {
    #[error("unit and lesson numbers start at 1 (got unit {unit}, lesson {lesson})")]
    InvalidCoordinate { unit: u32, lesson: u32 },

    #[error(
        "level {level} unit {unit} lesson {lesson} needs rows up to {last_row} \
         and columns up to {last_column}, \
         but the level table is only {height} rows by {width} columns"
    )]
    LessonOutOfRange {
        level: u32,
        unit: u32,
        lesson: u32,
        last_row: usize,
        last_column: usize,
        height: usize,
        width: usize,
    },

    #[error("cell ({row}, {column}) is outside the {height}x{width} table for level {level}")]
    CellOutOfRange {
        level: u32,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    },

    #[error("cannot load credentials from {}: {reason}", path.display())]
    Credentials { path: PathBuf, reason: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("failed to fetch {what}")]
    Fetch {
        what: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("spreadsheet '{0}' was not found or is not shared with the service account")]
    SpreadsheetNotFound(String),

    #[error("failed to read {}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to render template '{template}'")]
    Template {
        template: String,
        #[source]
        source: tera::Error,
    },

    #[error("PDF conversion for {} failed: {reason}", path.display())]
    Pdf { path: PathBuf, reason: String },

    #[error("cannot write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown lesson field '{0}'")]
    UnknownField(String),
}
