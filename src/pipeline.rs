use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::PressError;
use crate::export::{lesson_output_path, level_dir, DocumentWriter};
use crate::lesson::{apply_overrides, extract, LessonCoordinate};
use crate::render::Renderer;
use crate::sources::TableSource;
use crate::table::LevelTable;

/// Renders every selected lesson, one level table fetch per level. Stops at
/// the first failure; files already written stay on disk.
pub fn run_batch(
    config: &RunConfig,
    source: &dyn TableSource,
    renderer: &Renderer,
    writer: &dyn DocumentWriter,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for &level in &config.levels {
        println!("Level {}", level);
        let table = source
            .fetch(level)
            .with_context(|| format!("failed to fetch level {} from {}", level, source.name()))?;
        debug!(
            "level {} table is {} rows by {} columns",
            table.level(),
            table.height(),
            table.width()
        );

        for &unit in &config.units {
            for &lesson in &config.lessons {
                let coordinate = LessonCoordinate::new(level, unit, lesson);
                println!("{}", coordinate);
                let path = press_lesson(config, &table, renderer, writer, coordinate)
                    .with_context(|| format!("failed to produce {}", coordinate))?;
                written.push(path);
            }
        }
    }

    Ok(written)
}

fn press_lesson(
    config: &RunConfig,
    table: &LevelTable,
    renderer: &Renderer,
    writer: &dyn DocumentWriter,
    coordinate: LessonCoordinate,
) -> Result<PathBuf> {
    let mut fields = extract(table, &config.product.layout, coordinate)?;
    let replaced = apply_overrides(&mut fields, &config.overrides)?;
    if replaced > 0 {
        debug!("{} fields overridden for {}", replaced, coordinate);
    }
    let template = config.product.template_for(coordinate.level);
    let html = renderer.render(&template, &fields)?;

    let dir = level_dir(&config.output_dir, coordinate.level);
    fs::create_dir_all(&dir).map_err(|source| PressError::Write {
        path: dir.clone(),
        source,
    })?;
    println!("Output path: {}", dir.display());

    let path = lesson_output_path(&config.output_dir, &config.product, coordinate);
    if config.emit_html {
        let html_path = path.with_extension("html");
        fs::write(&html_path, &html).map_err(|source| PressError::Write {
            path: html_path.clone(),
            source,
        })?;
    }
    writer.write(&html, &path)?;
    info!("wrote {}", path.display());
    Ok(path)
}
