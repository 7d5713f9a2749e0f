use printpdf::{GeneratePdfOptions, PdfDocument, PdfSaveOptions};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, warn};

use crate::config::ProductLine;
use crate::error::PressError;
use crate::lesson::LessonCoordinate;

/// `EB2U3L1.pdf`, or `bn2U03L01.pdf` for zero-padded product lines.
pub fn lesson_file_name(product: &ProductLine, coordinate: LessonCoordinate) -> String {
    if product.zero_pad {
        format!(
            "{}{}U{:02}L{:02}.pdf",
            product.prefix, coordinate.level, coordinate.unit, coordinate.lesson
        )
    } else {
        format!(
            "{}{}U{}L{}.pdf",
            product.prefix, coordinate.level, coordinate.unit, coordinate.lesson
        )
    }
}

pub fn level_dir(root: &Path, level: u32) -> PathBuf {
    root.join(format!("Level {}", level))
}

pub fn lesson_output_path(
    root: &Path,
    product: &ProductLine,
    coordinate: LessonCoordinate,
) -> PathBuf {
    level_dir(root, coordinate.level).join(lesson_file_name(product, coordinate))
}

/// Turns rendered HTML into a document on disk.
pub trait DocumentWriter {
    fn write(&self, html: &str, path: &Path) -> Result<(), PressError>;
}

pub const DEFAULT_PDF_COMMAND: &str = "weasyprint";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfEngine {
    /// printpdf's own HTML layout. It only has the standard Latin fonts, so
    /// Japanese text will not render.
    Builtin,
    /// An external converter run as `<program> <args..> - <output>` with
    /// the HTML on stdin, e.g. `weasyprint`.
    Command { program: String, args: Vec<String> },
}

impl Default for PdfEngine {
    fn default() -> Self {
        PdfEngine::Command {
            program: DEFAULT_PDF_COMMAND.to_string(),
            args: Vec::new(),
        }
    }
}

impl PdfEngine {
    /// `["weasyprint", "--quiet"]` becomes a command engine. An empty list
    /// gives `None`.
    pub fn from_command_line(words: &[String]) -> Option<Self> {
        words.split_first().map(|(program, args)| PdfEngine::Command {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn write_builtin(html: &str, path: &Path) -> Result<(), PressError> {
        let mut warnings = Vec::new();
        let doc = PdfDocument::from_html(
            html,
            &BTreeMap::new(),
            &BTreeMap::new(),
            &GeneratePdfOptions::default(),
            &mut warnings,
        )
        .map_err(|reason| PressError::Pdf {
            path: path.to_path_buf(),
            reason,
        })?;
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
        for warning in &warnings {
            debug!("pdf layout warning for {}: {:?}", path.display(), warning);
        }
        fs::write(path, bytes).map_err(|source| PressError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_with_command(
        program: &str,
        args: &[String],
        html: &str,
        path: &Path,
    ) -> Result<(), PressError> {
        let pdf_error = |reason: String| PressError::Pdf {
            path: path.to_path_buf(),
            reason,
        };

        let mut child = Command::new(program)
            .args(args)
            .arg("-")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| pdf_error(format!("cannot start {}: {}", program, e)))?;

        // stdin is fed from its own thread while stderr is drained here, so
        // a chatty converter cannot block on a full pipe.
        let stdin = child.stdin.take();
        let (sent, output) = thread::scope(|scope| {
            let feeder = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(html.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let sent = feeder
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
            (sent, output)
        });

        let output =
            output.map_err(|e| pdf_error(format!("{} did not finish: {}", program, e)))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(pdf_error(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }
        sent.map_err(|e| pdf_error(format!("cannot send HTML to {}: {}", program, e)))?;
        if !stderr.trim().is_empty() {
            warn!("{}: {}", program, stderr.trim());
        }
        Ok(())
    }
}

impl DocumentWriter for PdfEngine {
    fn write(&self, html: &str, path: &Path) -> Result<(), PressError> {
        match self {
            PdfEngine::Builtin => Self::write_builtin(html, path),
            PdfEngine::Command { program, args } => {
                Self::write_with_command(program, args, html, path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elite_paths_are_unpadded() {
        let product = ProductLine::elite();
        let path = lesson_output_path(Path::new("/out"), &product, LessonCoordinate::new(2, 3, 1));
        assert_eq!(path, PathBuf::from("/out/Level 2/EB2U3L1.pdf"));
    }

    #[test]
    fn business_next_pads_unit_and_lesson_only() {
        let product = ProductLine::business_next();
        assert_eq!(
            lesson_file_name(&product, LessonCoordinate::new(1, 3, 1)),
            "bn1U03L01.pdf"
        );
        assert_eq!(
            lesson_file_name(&product, LessonCoordinate::new(12, 14, 3)),
            "bn12U14L03.pdf"
        );
    }

    #[test]
    fn two_digit_numbers_are_kept_whole() {
        let product = ProductLine::elite();
        assert_eq!(
            lesson_file_name(&product, LessonCoordinate::new(1, 16, 4)),
            "EB1U16L4.pdf"
        );
    }

    #[test]
    fn pdf_command_words_pick_engine() {
        assert_eq!(PdfEngine::from_command_line(&[]), None);
        assert_eq!(
            PdfEngine::from_command_line(&["weasyprint".to_string(), "--quiet".to_string()]),
            Some(PdfEngine::Command {
                program: "weasyprint".to_string(),
                args: vec!["--quiet".to_string()]
            })
        );
    }

    #[test]
    fn weasyprint_is_the_default_engine() {
        assert_eq!(
            PdfEngine::default(),
            PdfEngine::Command {
                program: "weasyprint".to_string(),
                args: Vec::new()
            }
        );
    }

    #[test]
    fn builtin_engine_writes_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EB1U1L1.pdf");
        let html = "<html><body><h1>Asking for help</h1>\
                    <p>Can you help me with this <u>data</u>?</p></body></html>";

        PdfEngine::Builtin.write(html, &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.len() > 5);
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn missing_converter_is_a_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PdfEngine::Command {
            program: "lessonpdf-no-such-converter".to_string(),
            args: Vec::new(),
        };
        let result = engine.write("<p>hi</p>", &dir.path().join("x.pdf"));
        assert!(matches!(result, Err(PressError::Pdf { .. })));
    }

    #[cfg(unix)]
    fn shell(script: &str) -> PdfEngine {
        // `sh -c script - <output>` puts the output path in $1.
        PdfEngine::Command {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[cfg(unix)]
    #[test]
    fn command_receives_html_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        shell("cat > \"$1\"").write("<p>データ</p>", &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>データ</p>");
    }

    #[cfg(unix)]
    #[test]
    fn noisy_converter_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let html = "x".repeat(512 * 1024);
        let engine = shell("head -c 262144 /dev/zero | tr '\\0' w >&2; cat > \"$1\"");

        engine.write(&html, &path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), html.len() as u64);
    }

    #[cfg(unix)]
    #[test]
    fn failing_converter_reports_its_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let engine = shell("echo 'no fonts' >&2; exit 3");
        match engine.write(&"x".repeat(512 * 1024), &dir.path().join("out.pdf")) {
            Err(PressError::Pdf { reason, .. }) => assert!(reason.contains("no fonts")),
            other => panic!("expected Pdf error, got {:?}", other),
        }
    }
}
