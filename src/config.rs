use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PressError;
use crate::export::PdfEngine;
use crate::layout::SheetLayout;
use crate::lesson::LessonOverride;
use crate::render::BASE_TEMPLATE;

pub const DEFAULT_LEVELS: [u32; 3] = [1, 2, 3];
pub const DEFAULT_UNITS: [u32; 6] = [1, 2, 3, 4, 5, 6];
pub const DEFAULT_LESSONS: [u32; 3] = [1, 2, 3];
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_CREDENTIALS: &str = "creds.json";
pub const DEFAULT_PRODUCT: &str = "elite";

pub const PRODUCT_LINES: [&str; 2] = ["elite", "business-next"];

/// Differences between course products: where their sheets live and how
/// their files are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductLine {
    pub name: String,
    /// File name prefix, e.g. `EB` in `EB2U3L1.pdf`.
    pub prefix: String,
    /// Pad unit and lesson numbers to two digits in file names.
    #[serde(default)]
    pub zero_pad: bool,
    /// Spreadsheet title, looked up when no id is given.
    pub spreadsheet: String,
    /// Worksheet name; `{level}` is replaced with the level number.
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    /// Template to render, relative to the template directory; `{level}`
    /// is replaced with the level number.
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub layout: SheetLayout,
}

fn default_worksheet() -> String {
    "level_{level}".to_string()
}

fn default_template() -> String {
    BASE_TEMPLATE.to_string()
}

impl ProductLine {
    pub fn elite() -> Self {
        Self {
            name: "elite".to_string(),
            prefix: "EB".to_string(),
            zero_pad: false,
            spreadsheet: "Copy of ビジネス英語研修_online_対訳付き".to_string(),
            worksheet: default_worksheet(),
            template: default_template(),
            layout: SheetLayout::default(),
        }
    }

    pub fn business_next() -> Self {
        Self {
            name: "business-next".to_string(),
            prefix: "bn".to_string(),
            zero_pad: true,
            spreadsheet: "businessnext-test".to_string(),
            worksheet: default_worksheet(),
            template: default_template(),
            // Unconfirmed: no business-next sheet has been checked against
            // this starting column yet. Override `[product_line.layout]` if
            // the cells land one block off.
            layout: SheetLayout {
                first_column: 3,
                ..SheetLayout::default()
            },
        }
    }

    /// Template name for a level.
    pub fn template_for(&self, level: u32) -> String {
        self.template.replace("{level}", &level.to_string())
    }
}

pub fn get_product_line(name: &str) -> Option<ProductLine> {
    match name {
        "elite" => Some(ProductLine::elite()),
        "business-next" => Some(ProductLine::business_next()),
        _ => None,
    }
}

/// Where level tables come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSettings {
    Sheets {
        credentials: PathBuf,
        spreadsheet_id: Option<String>,
    },
    Csv {
        dir: PathBuf,
    },
}

/// Settings read from a `--config` TOML file. Everything is optional; the
/// command line wins over the file and the file over the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub levels: Option<Vec<u32>>,
    pub units: Option<Vec<u32>>,
    pub lessons: Option<Vec<u32>>,
    pub output_dir: Option<PathBuf>,
    pub credentials: Option<PathBuf>,
    pub product: Option<String>,
    pub product_line: Option<ProductLine>,
    pub spreadsheet_id: Option<String>,
    pub csv_dir: Option<PathBuf>,
    pub template_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub pdf_command: Option<Vec<String>>,
    pub builtin_pdf: Option<bool>,
    pub emit_html: Option<bool>,
    pub overrides: Vec<LessonOverride>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, PressError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PressError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| PressError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self, PressError> {
        toml::from_str(content).map_err(|e| PressError::Config(e.to_string()))
    }
}

/// Fully resolved settings for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub levels: Vec<u32>,
    pub units: Vec<u32>,
    pub lessons: Vec<u32>,
    pub output_dir: PathBuf,
    pub product: ProductLine,
    pub source: SourceSettings,
    pub template_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub pdf_engine: PdfEngine,
    pub emit_html: bool,
    pub overrides: Vec<LessonOverride>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS.to_vec(),
            units: DEFAULT_UNITS.to_vec(),
            lessons: DEFAULT_LESSONS.to_vec(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            product: ProductLine::elite(),
            source: SourceSettings::Sheets {
                credentials: PathBuf::from(DEFAULT_CREDENTIALS),
                spreadsheet_id: None,
            },
            template_dir: None,
            static_dir: None,
            pdf_engine: PdfEngine::default(),
            emit_html: false,
            overrides: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), PressError> {
        for (what, numbers) in [
            ("levels", &self.levels),
            ("units", &self.units),
            ("lessons", &self.lessons),
        ] {
            if numbers.is_empty() {
                return Err(PressError::Config(format!("no {} selected", what)));
            }
            if numbers.contains(&0) {
                return Err(PressError::Config(format!("{} are numbered from 1", what)));
            }
        }
        if self.product.prefix.is_empty() {
            return Err(PressError::Config(format!(
                "product line '{}' has an empty file prefix",
                self.product.name
            )));
        }
        if self.product.layout.unit_stride == 0 || self.product.layout.lesson_stride == 0 {
            return Err(PressError::Config("layout strides must be at least 1".to_string()));
        }
        for entry in &self.overrides {
            entry.validate()?;
        }
        Ok(())
    }
}
