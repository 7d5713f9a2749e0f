use crate::error::PressError;

/// A full snapshot of one level's worksheet, rows by columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelTable {
    level: u32,
    rows: Vec<Vec<String>>,
}

impl LevelTable {
    /// Ragged rows are padded with empty cells up to the widest row, since
    /// the sheets backend drops trailing blanks.
    pub fn new(level: u32, mut rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Self { level, rows }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn cell(&self, row: usize, column: usize) -> Result<&str, PressError> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .ok_or(PressError::CellOutOfRange {
                level: self.level,
                row,
                column,
                height: self.height(),
                width: self.width(),
            })
    }
}
