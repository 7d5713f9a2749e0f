use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod export;
mod highlight;
mod layout;
mod lesson;
mod pipeline;
mod render;
mod sources;
mod table;

use config::{
    get_product_line, FileConfig, RunConfig, SourceSettings, DEFAULT_CREDENTIALS,
    DEFAULT_PRODUCT, PRODUCT_LINES,
};
use export::PdfEngine;
use render::Renderer;

/// Create presentation PDFs for each lesson from the course spreadsheet.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Level to create presentations for. Can be repeated [default: 1 2 3]
    #[arg(short = 'L', long = "level")]
    levels: Vec<u32>,
    /// Unit to create presentations for. Can be repeated [default: 1-6]
    #[arg(short = 'u', long = "unit")]
    units: Vec<u32>,
    /// Lesson to create presentations for. Can be repeated [default: 1 2 3]
    #[arg(short = 'l', long = "lesson")]
    lessons: Vec<u32>,
    /// Where the PDF files are saved [default: output]
    #[arg(short, long = "output-path")]
    output_path: Option<PathBuf>,
    /// Product line, which decides spreadsheet and file names [default: elite]
    #[arg(short, long)]
    product: Option<String>,
    /// Service account key file [default: creds.json]
    #[arg(long)]
    credentials: Option<PathBuf>,
    /// Use this spreadsheet id instead of looking the sheet up by title
    #[arg(long)]
    spreadsheet_id: Option<String>,
    /// Read level_N.csv files from this directory instead of Google Sheets
    #[arg(long)]
    csv_dir: Option<PathBuf>,
    /// Template directory; the product line names the template to render
    #[arg(long)]
    template_dir: Option<PathBuf>,
    /// Directory exposed to templates as `static_path`
    #[arg(long)]
    static_dir: Option<PathBuf>,
    /// External HTML to PDF converter, e.g. "weasyprint --quiet" [default: weasyprint]
    #[arg(long)]
    pdf_command: Option<String>,
    /// Lay out PDFs with the built-in engine instead. It has no Japanese fonts
    #[arg(long, conflicts_with = "pdf_command")]
    builtin_pdf: bool,
    /// Also save the rendered HTML next to each PDF
    #[arg(long)]
    emit_html: bool,
    /// TOML file with any of the settings above plus per-lesson overrides
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Show debug logging
    #[arg(short, long)]
    verbose: bool,
    /// List the built-in product lines and exit
    #[arg(long)]
    list: bool,
}

impl Args {
    fn into_config(self, file: FileConfig) -> Result<RunConfig> {
        let defaults = RunConfig::default();

        let product = match (self.product.or(file.product), file.product_line) {
            (Some(name), _) => match get_product_line(&name) {
                Some(product) => product,
                None => bail!(
                    "unknown product line '{}' (available: {})",
                    name,
                    PRODUCT_LINES.join(", ")
                ),
            },
            (None, Some(custom)) => custom,
            (None, None) => get_product_line(DEFAULT_PRODUCT).unwrap_or(defaults.product),
        };

        let source = match self.csv_dir.or(file.csv_dir) {
            Some(dir) => SourceSettings::Csv { dir },
            None => SourceSettings::Sheets {
                credentials: self
                    .credentials
                    .or(file.credentials)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS)),
                spreadsheet_id: self.spreadsheet_id.or(file.spreadsheet_id),
            },
        };

        let command = match self.pdf_command {
            Some(command) => Some(command.split_whitespace().map(String::from).collect()),
            None if self.builtin_pdf => None,
            None => file.pdf_command,
        };
        let builtin = self.builtin_pdf || file.builtin_pdf.unwrap_or(false);
        let pdf_engine = match command.as_deref().and_then(PdfEngine::from_command_line) {
            Some(engine) => engine,
            None if builtin => PdfEngine::Builtin,
            None => defaults.pdf_engine,
        };

        let config = RunConfig {
            levels: pick(self.levels, file.levels, defaults.levels),
            units: pick(self.units, file.units, defaults.units),
            lessons: pick(self.lessons, file.lessons, defaults.lessons),
            output_dir: self
                .output_path
                .or(file.output_dir)
                .unwrap_or(defaults.output_dir),
            product,
            source,
            template_dir: self.template_dir.or(file.template_dir),
            static_dir: self.static_dir.or(file.static_dir),
            pdf_engine,
            emit_html: self.emit_html || file.emit_html.unwrap_or(false),
            overrides: file.overrides,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Command line first, then the config file, then the default.
fn pick(cli: Vec<u32>, file: Option<Vec<u32>>, default: Vec<u32>) -> Vec<u32> {
    if !cli.is_empty() {
        cli
    } else {
        file.unwrap_or(default)
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let mut args = Args::parse();

    if args.list {
        println!("Available product lines: {}", PRODUCT_LINES.join(", "));
        return Ok(());
    }

    init_tracing(args.verbose);
    info!("lessonpdf v{}", env!("CARGO_PKG_VERSION"));

    let file = match args.config.take() {
        Some(path) => FileConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FileConfig::default(),
    };
    let config = args.into_config(file)?;
    debug!("{:?}", config);

    let renderer = match &config.template_dir {
        Some(dir) => Renderer::from_dir(dir)?,
        None => Renderer::embedded()?,
    }
    .with_static_path(config.static_dir.clone());

    let source = sources::get_source(&config.source, &config.product)
        .context("Failed to set up the table source")?;

    let written = pipeline::run_batch(&config, source.as_ref(), &renderer, &config.pdf_engine)?;
    println!("Created {} presentation files.", written.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("lessonpdf").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn no_arguments_gives_defaults() {
        let config = parse(&[]).into_config(FileConfig::default()).unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn repeated_flags_collect() {
        let config = parse(&["-L", "2", "-u", "4", "-u", "6", "-l", "1", "-o", "/out"])
            .into_config(FileConfig::default())
            .unwrap();
        assert_eq!(config.levels, vec![2]);
        assert_eq!(config.units, vec![4, 6]);
        assert_eq!(config.lessons, vec![1]);
        assert_eq!(config.output_dir, PathBuf::from("/out"));
    }

    #[test]
    fn command_line_beats_config_file() {
        let file = FileConfig::parse(
            "levels = [3]\nunits = [2]\nproduct = \"business-next\"\ncsv_dir = \"sheets\"\n",
        )
        .unwrap();
        let config = parse(&["-L", "1", "--product", "elite"]).into_config(file).unwrap();

        assert_eq!(config.levels, vec![1]);
        assert_eq!(config.units, vec![2]);
        assert_eq!(config.product.prefix, "EB");
        assert_eq!(
            config.source,
            SourceSettings::Csv {
                dir: PathBuf::from("sheets")
            }
        );
    }

    #[test]
    fn unknown_product_is_rejected() {
        let result = parse(&["-p", "all-stars"]).into_config(FileConfig::default());
        assert!(result.unwrap_err().to_string().contains("all-stars"));
    }

    #[test]
    fn zero_lesson_is_rejected() {
        assert!(parse(&["-l", "0"]).into_config(FileConfig::default()).is_err());
    }

    #[test]
    fn pdf_command_is_split_into_words() {
        let config = parse(&["--pdf-command", "weasyprint --quiet", "--emit-html"])
            .into_config(FileConfig::default())
            .unwrap();
        assert_eq!(
            config.pdf_engine,
            PdfEngine::Command {
                program: "weasyprint".to_string(),
                args: vec!["--quiet".to_string()]
            }
        );
        assert!(config.emit_html);
    }

    #[test]
    fn builtin_engine_is_opt_in() {
        let config = parse(&[]).into_config(FileConfig::default()).unwrap();
        assert_eq!(config.pdf_engine, PdfEngine::default());

        let config = parse(&["--builtin-pdf"])
            .into_config(FileConfig::default())
            .unwrap();
        assert_eq!(config.pdf_engine, PdfEngine::Builtin);

        let file = FileConfig::parse("builtin_pdf = true\n").unwrap();
        let config = parse(&[]).into_config(file).unwrap();
        assert_eq!(config.pdf_engine, PdfEngine::Builtin);
    }

    #[test]
    fn builtin_flag_conflicts_with_pdf_command() {
        let argv = ["lessonpdf", "--builtin-pdf", "--pdf-command", "weasyprint"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn sheets_source_takes_credentials_and_id() {
        let config = parse(&["--credentials", "/keys/sa.json", "--spreadsheet-id", "abc"])
            .into_config(FileConfig::default())
            .unwrap();
        assert_eq!(
            config.source,
            SourceSettings::Sheets {
                credentials: PathBuf::from("/keys/sa.json"),
                spreadsheet_id: Some("abc".to_string())
            }
        );
    }
}
