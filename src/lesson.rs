use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::PressError;
use crate::highlight::underline_vocab;
use crate::layout::SheetLayout;
use crate::table::LevelTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LessonCoordinate {
    pub level: u32,
    pub unit: u32,
    pub lesson: u32,
}

impl LessonCoordinate {
    pub fn new(level: u32, unit: u32, lesson: u32) -> Self {
        Self {
            level,
            unit,
            lesson,
        }
    }
}

impl fmt::Display for LessonCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Level: {}, Unit: {}, Lesson: {}",
            self.level, self.unit, self.lesson
        )
    }
}

macro_rules! lesson_fields {
    ($($field:ident),+ $(,)?) => {
        /// Everything a template needs for one lesson. Serializes to a flat
        /// map keyed by the template placeholder names.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
        pub struct LessonFields {
            pub level: u32,
            pub unit: u32,
            pub lesson: u32,
            $(pub $field: String,)+
        }

        impl LessonFields {
            pub const TEXT_FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];

            pub fn text(&self, name: &str) -> Option<&str> {
                match name {
                    $(stringify!($field) => Some(self.$field.as_str()),)+
                    _ => None,
                }
            }

            pub fn text_mut(&mut self, name: &str) -> Option<&mut String> {
                match name {
                    $(stringify!($field) => Some(&mut self.$field),)+
                    _ => None,
                }
            }
        }
    };
}

lesson_fields!(
    unit_title,
    lesson_title,
    dialogue_a1_en,
    dialogue_b1_en,
    dialogue_a2_en,
    dialogue_b2_en,
    dialogue_a1_jp,
    dialogue_b1_jp,
    dialogue_a2_jp,
    dialogue_b2_jp,
    target_a_en,
    target_b_en,
    vocab1_en,
    vocab2_en,
    vocab3_en,
    vocab4_en,
    vocab1_jp,
    vocab2_jp,
    vocab3_jp,
    vocab4_jp,
    extension1_en,
    extension2_en,
    extension3_en,
    extension1_jp,
    extension2_jp,
    extension3_jp,
);

impl LessonFields {
    pub fn coordinate(&self) -> LessonCoordinate {
        LessonCoordinate::new(self.level, self.unit, self.lesson)
    }

    pub fn vocab_en(&self) -> [&str; 4] {
        [
            self.vocab1_en.as_str(),
            self.vocab2_en.as_str(),
            self.vocab3_en.as_str(),
            self.vocab4_en.as_str(),
        ]
    }
}

/// Replacement text for one lesson, applied verbatim after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LessonOverride {
    pub level: u32,
    pub unit: u32,
    pub lesson: u32,
    pub fields: BTreeMap<String, String>,
}

impl LessonOverride {
    pub fn coordinate(&self) -> LessonCoordinate {
        LessonCoordinate::new(self.level, self.unit, self.lesson)
    }

    pub fn validate(&self) -> Result<(), PressError> {
        match self
            .fields
            .keys()
            .find(|name| !LessonFields::TEXT_FIELDS.contains(&name.as_str()))
        {
            Some(unknown) => Err(PressError::UnknownField(unknown.clone())),
            None => Ok(()),
        }
    }
}

pub fn extract(
    table: &LevelTable,
    layout: &SheetLayout,
    coordinate: LessonCoordinate,
) -> Result<LessonFields, PressError> {
    let address = layout.locate(coordinate.unit, coordinate.lesson)?;
    layout.check_bounds(table, coordinate, &address)?;

    let columns = &layout.columns;
    let at = |row: usize, column: usize| -> Result<String, PressError> {
        table
            .cell(address.row + row, address.column + column)
            .map(str::to_string)
    };

    let mut fields = LessonFields {
        level: coordinate.level,
        unit: coordinate.unit,
        lesson: coordinate.lesson,
        unit_title: table
            .cell(address.unit_row, address.column + columns.unit_title)?
            .to_string(),
        lesson_title: at(0, columns.lesson_title)?,
        dialogue_a1_en: at(0, columns.dialogue_en)?,
        dialogue_b1_en: at(1, columns.dialogue_en)?,
        dialogue_a2_en: at(2, columns.dialogue_en)?,
        dialogue_b2_en: at(3, columns.dialogue_en)?,
        dialogue_a1_jp: at(0, columns.dialogue_jp)?,
        dialogue_b1_jp: at(1, columns.dialogue_jp)?,
        dialogue_a2_jp: at(2, columns.dialogue_jp)?,
        dialogue_b2_jp: at(3, columns.dialogue_jp)?,
        target_a_en: at(0, columns.target_en)?,
        target_b_en: at(1, columns.target_en)?,
        vocab1_en: at(0, columns.vocab_en)?,
        vocab2_en: at(1, columns.vocab_en)?,
        vocab3_en: at(2, columns.vocab_en)?,
        vocab4_en: at(3, columns.vocab_en)?,
        vocab1_jp: at(0, columns.vocab_jp)?,
        vocab2_jp: at(1, columns.vocab_jp)?,
        vocab3_jp: at(2, columns.vocab_jp)?,
        vocab4_jp: at(3, columns.vocab_jp)?,
        extension1_en: at(0, columns.extension_en)?,
        extension2_en: at(1, columns.extension_en)?,
        extension3_en: at(2, columns.extension_en)?,
        extension1_jp: at(0, columns.extension_jp)?,
        extension2_jp: at(1, columns.extension_jp)?,
        extension3_jp: at(2, columns.extension_jp)?,
    };

    let target_a = underline_vocab(&fields.target_a_en, &fields.vocab_en());
    let target_b = underline_vocab(&fields.target_b_en, &fields.vocab_en());
    fields.target_a_en = target_a;
    fields.target_b_en = target_b;

    Ok(fields)
}

/// Returns how many fields were replaced.
pub fn apply_overrides(
    fields: &mut LessonFields,
    overrides: &[LessonOverride],
) -> Result<usize, PressError> {
    let coordinate = fields.coordinate();
    let mut replaced = 0;
    for entry in overrides.iter().filter(|o| o.coordinate() == coordinate) {
        for (name, value) in &entry.fields {
            let slot = fields
                .text_mut(name)
                .ok_or_else(|| PressError::UnknownField(name.clone()))?;
            *slot = value.clone();
            replaced += 1;
        }
    }
    Ok(replaced)
}
