use serde::{Deserialize, Serialize};

use crate::error::PressError;
use crate::lesson::LessonCoordinate;
use crate::table::LevelTable;

/// Each lesson occupies this many consecutive rows (four dialogue lines,
/// four vocabulary words).
pub const LESSON_ROWS: usize = 4;

/// Where a lesson's data lives inside a level table. Rows and columns are
/// zero-based; row 0 is the sheet's header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetLayout {
    pub first_row: usize,
    pub first_column: usize,
    pub unit_stride: usize,
    pub lesson_stride: usize,
    pub columns: ColumnOffsets,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            first_row: 1,
            first_column: 1,
            unit_stride: 13,
            lesson_stride: 4,
            columns: ColumnOffsets::default(),
        }
    }
}

/// Column of each field group, relative to `SheetLayout::first_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnOffsets {
    pub unit_title: usize,
    pub lesson_title: usize,
    pub dialogue_en: usize,
    pub dialogue_jp: usize,
    pub target_en: usize,
    pub vocab_en: usize,
    pub vocab_jp: usize,
    pub extension_en: usize,
    pub extension_jp: usize,
}

impl Default for ColumnOffsets {
    fn default() -> Self {
        Self {
            unit_title: 0,
            lesson_title: 1,
            dialogue_en: 4,
            dialogue_jp: 5,
            target_en: 7,
            vocab_en: 8,
            vocab_jp: 9,
            extension_en: 10,
            extension_jp: 11,
        }
    }
}

impl ColumnOffsets {
    fn widest(&self) -> usize {
        [
            self.unit_title,
            self.lesson_title,
            self.dialogue_en,
            self.dialogue_jp,
            self.target_en,
            self.vocab_en,
            self.vocab_jp,
            self.extension_en,
            self.extension_jp,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonAddress {
    /// First row of the lesson's block.
    pub row: usize,
    /// First row of the unit; the unit title is only written there.
    pub unit_row: usize,
    pub column: usize,
}

impl SheetLayout {
    pub fn locate(&self, unit: u32, lesson: u32) -> Result<LessonAddress, PressError> {
        if unit == 0 || lesson == 0 {
            return Err(PressError::InvalidCoordinate { unit, lesson });
        }
        let unit_row = self.first_row + (unit as usize - 1) * self.unit_stride;
        Ok(LessonAddress {
            row: unit_row + (lesson as usize - 1) * self.lesson_stride,
            unit_row,
            column: self.first_column,
        })
    }

    pub fn check_bounds(
        &self,
        table: &LevelTable,
        coordinate: LessonCoordinate,
        address: &LessonAddress,
    ) -> Result<(), PressError> {
        let last_row = address.row + LESSON_ROWS - 1;
        let last_column = address.column + self.columns.widest();
        if last_row >= table.height() || last_column >= table.width() {
            return Err(PressError::LessonOutOfRange {
                level: coordinate.level,
                unit: coordinate.unit,
                lesson: coordinate.lesson,
                last_row,
                last_column,
                height: table.height(),
                width: table.width(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_unit_and_lesson_strides() {
        let layout = SheetLayout::default();
        for unit in 1..=16u32 {
            for lesson in 1..=4u32 {
                let address = layout.locate(unit, lesson).unwrap();
                let u = unit as usize;
                let l = lesson as usize;
                assert_eq!(address.row, 1 + (u - 1) * 13 + (l - 1) * 4);
                assert_eq!(address.unit_row, 1 + (u - 1) * 13);
                assert_eq!(address.column, 1);
            }
        }
    }

    #[test]
    fn lessons_of_a_unit_share_the_unit_row() {
        let layout = SheetLayout::default();
        let first = layout.locate(3, 1).unwrap();
        let third = layout.locate(3, 3).unwrap();
        assert_eq!(first.unit_row, third.unit_row);
        assert_eq!(first.row, first.unit_row);
        assert_eq!(third.row, 35);
    }

    #[test]
    fn zero_unit_or_lesson_is_rejected() {
        let layout = SheetLayout::default();
        assert!(matches!(
            layout.locate(0, 1),
            Err(PressError::InvalidCoordinate { unit: 0, lesson: 1 })
        ));
        assert!(layout.locate(1, 0).is_err());
    }

    #[test]
    fn custom_first_column_moves_every_field() {
        let layout = SheetLayout {
            first_column: 3,
            ..SheetLayout::default()
        };
        assert_eq!(layout.locate(2, 2).unwrap().column, 3);
    }

    #[test]
    fn bounds_check_covers_whole_lesson_block() {
        let layout = SheetLayout::default();
        let coordinate = LessonCoordinate::new(1, 1, 1);
        let address = layout.locate(1, 1).unwrap();

        let fits = LevelTable::new(1, vec![vec![String::new(); 13]; 5]);
        assert!(layout.check_bounds(&fits, coordinate, &address).is_ok());

        let too_short = LevelTable::new(1, vec![vec![String::new(); 13]; 4]);
        assert!(matches!(
            layout.check_bounds(&too_short, coordinate, &address),
            Err(PressError::LessonOutOfRange { last_row: 4, .. })
        ));

        let too_narrow = LevelTable::new(1, vec![vec![String::new(); 12]; 5]);
        assert!(matches!(
            layout.check_bounds(&too_narrow, coordinate, &address),
            Err(PressError::LessonOutOfRange { last_column: 12, .. })
        ));
    }

    #[test]
    fn layout_reads_partial_toml() {
        let layout: SheetLayout =
            toml::from_str("first_column = 3\n[columns]\nvocab_en = 9\n").unwrap();
        assert_eq!(layout.first_column, 3);
        assert_eq!(layout.unit_stride, 13);
        assert_eq!(layout.columns.vocab_en, 9);
        assert_eq!(layout.columns.vocab_jp, 9);
    }
}
