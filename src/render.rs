use include_dir::{include_dir, Dir};
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::debug;

use crate::error::PressError;
use crate::lesson::LessonFields;

static TEMPLATES_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets/templates");

pub const BASE_TEMPLATE: &str = "base.html";

/// Fills the lesson template with one lesson's fields.
pub struct Renderer {
    tera: Tera,
    static_path: Option<PathBuf>,
}

impl Renderer {
    /// The template set compiled into the binary.
    pub fn embedded() -> Result<Self, PressError> {
        let mut templates = Vec::new();
        for file in TEMPLATES_DIR.files() {
            let name = file.path().to_string_lossy().into_owned();
            let contents = file.contents_utf8().ok_or_else(|| {
                PressError::Config(format!("built-in template {} is not UTF-8", name))
            })?;
            templates.push((name, contents));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|source| PressError::Template {
                template: BASE_TEMPLATE.to_string(),
                source,
            })?;
        Ok(Self::with_tera(tera))
    }

    /// Every text file under `dir`, named by its path relative to `dir`
    /// with `/` separators. Binary files such as images are skipped.
    pub fn from_dir(dir: &Path) -> Result<Self, PressError> {
        let mut templates = Vec::new();
        collect_templates(dir, dir, &mut templates)?;
        if templates.is_empty() {
            return Err(PressError::Config(format!(
                "template directory {} has no templates",
                dir.display()
            )));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|source| PressError::Template {
                template: dir.display().to_string(),
                source,
            })?;
        Ok(Self::with_tera(tera))
    }

    fn with_tera(mut tera: Tera) -> Self {
        // Highlight markup and any markup typed into sheet cells go through as-is.
        tera.autoescape_on(vec![]);
        debug!(
            "loaded templates: {}",
            tera.get_template_names().collect::<Vec<_>>().join(", ")
        );
        Self {
            tera,
            static_path: None,
        }
    }

    /// Exposed to templates as `static_path` for images and stylesheets.
    pub fn with_static_path(mut self, static_path: Option<PathBuf>) -> Self {
        self.static_path = static_path;
        self
    }

    /// Renders `template`, e.g. `base.html` or `level2/base.html`.
    pub fn render(&self, template: &str, fields: &LessonFields) -> Result<String, PressError> {
        let template_error = |source| PressError::Template {
            template: template.to_string(),
            source,
        };
        let mut context = Context::from_serialize(fields).map_err(template_error)?;
        if let Some(static_path) = &self.static_path {
            context.insert("static_path", static_path);
        }
        self.tera.render(template, &context).map_err(template_error)
    }
}

fn collect_templates(
    root: &Path,
    dir: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<(), PressError> {
    let read_error = |path: &Path, e: std::io::Error| {
        PressError::Config(format!("cannot read {}: {}", path.display(), e))
    };
    let mut entries = fs::read_dir(dir)
        .map_err(|e| read_error(dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| read_error(dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect_templates(root, &path, templates)?;
            continue;
        }
        let bytes = fs::read(&path).map_err(|e| read_error(&path, e))?;
        let Ok(contents) = String::from_utf8(bytes) else {
            debug!("skipping non-text file {}", path.display());
            continue;
        };
        let name = path
            .strip_prefix(root)
            .unwrap_or(path.as_path())
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        templates.push((name, contents));
    }
    Ok(())
}
