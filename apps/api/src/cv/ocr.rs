//! OCR for scanned PDFs and image uploads via the `pdftoppm` and `tesseract`
//! command-line tools.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::OcrConfig;
use crate::cv::format::DocumentFormat;
use crate::cv::CvError;

/// Pages rasterised from a scanned PDF.
const MAX_OCR_PAGES: u32 = 10;
const RASTER_DPI: u32 = 300;
const COMMAND_TIMEOUT: Duration = Duration::from_secs(90);

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn pdf_to_text(&self, pdf: &[u8]) -> Result<String, CvError>;
    async fn image_to_text(&self, image: &[u8], format: DocumentFormat) -> Result<String, CvError>;
}

pub struct TesseractOcr {
    config: OcrConfig,
}

impl TesseractOcr {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    fn ensure_enabled(&self) -> Result<(), CvError> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(CvError::OcrUnavailable("OCR is disabled".to_string()))
        }
    }

    async fn run(&self, program: &str, args: &[&std::ffi::OsStr]) -> Result<Vec<u8>, CvError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CvError::OcrUnavailable(format!("cannot start {program}: {e}")))?;

        let output = tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| CvError::Extraction(format!("{program} timed out")))?
            .map_err(|e| CvError::Extraction(format!("{program} failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CvError::Extraction(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn ocr_file(&self, path: &Path) -> Result<String, CvError> {
        let stdout = self
            .run(
                &self.config.tesseract_path,
                &[
                    path.as_os_str(),
                    "stdout".as_ref(),
                    "-l".as_ref(),
                    self.config.language.as_ref(),
                ],
            )
            .await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

fn scratch_dir() -> Result<tempfile::TempDir, CvError> {
    tempfile::tempdir().map_err(|e| CvError::Extraction(format!("cannot create temp dir: {e}")))
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CvError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| CvError::Extraction(format!("cannot write {}: {e}", path.display())))
}

/// Rasterised page images in page order (`page-1.png`, `page-2.png`, ... `page-10.png`).
async fn page_images(dir: &Path) -> Result<Vec<PathBuf>, CvError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| CvError::Extraction(format!("cannot list pages: {e}")))?;
    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Some(number) = page_number(&path) else { continue };
        pages.push((number, path));
    }
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

fn page_number(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    stem.strip_prefix("page-")?.parse().ok()
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn pdf_to_text(&self, pdf: &[u8]) -> Result<String, CvError> {
        self.ensure_enabled()?;
        let dir = scratch_dir()?;
        let input = dir.path().join("input.pdf");
        write_file(&input, pdf).await?;

        let prefix = dir.path().join("page");
        let dpi = RASTER_DPI.to_string();
        let last = MAX_OCR_PAGES.to_string();
        self.run(
            &self.config.pdftoppm_path,
            &[
                "-r".as_ref(),
                dpi.as_ref(),
                "-f".as_ref(),
                "1".as_ref(),
                "-l".as_ref(),
                last.as_ref(),
                "-png".as_ref(),
                input.as_os_str(),
                prefix.as_os_str(),
            ],
        )
        .await?;

        let pages = page_images(dir.path()).await?;
        debug!("Rasterised {} PDF pages for OCR", pages.len());

        let mut text = String::new();
        let mut recognised = 0usize;
        let mut first_error = None;
        for page in &pages {
            match self.ocr_file(page).await {
                Ok(page_text) => {
                    recognised += 1;
                    text.push_str(&page_text);
                    text.push_str("\n\n");
                }
                Err(e) => {
                    warn!("OCR failed for {}: {e}", page.display());
                    first_error.get_or_insert(e);
                }
            }
        }
        // A partial scan is still useful; only a total failure is an error.
        match first_error {
            Some(e) if recognised == 0 => Err(e),
            _ => Ok(text),
        }
    }

    async fn image_to_text(&self, image: &[u8], format: DocumentFormat) -> Result<String, CvError> {
        self.ensure_enabled()?;
        let dir = scratch_dir()?;
        let input = dir.path().join(format!("input.{}", format.extension()));
        write_file(&input, image).await?;
        self.ocr_file(&input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number_parsing() {
        assert_eq!(page_number(Path::new("/tmp/x/page-1.png")), Some(1));
        assert_eq!(page_number(Path::new("/tmp/x/page-10.png")), Some(10));
        assert_eq!(page_number(Path::new("/tmp/x/page-01.png")), Some(1));
        assert_eq!(page_number(Path::new("/tmp/x/input.pdf")), None);
        assert_eq!(page_number(Path::new("/tmp/x/page-a.png")), None);
    }

    #[tokio::test]
    async fn test_pages_are_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-2.png", "page-1.png", "input.pdf"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        let pages = page_images(dir.path()).await.unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-2.png", "page-10.png"]);
    }

    #[tokio::test]
    async fn test_disabled_engine_refuses() {
        let engine = TesseractOcr::new(OcrConfig {
            enabled: false,
            ..OcrConfig::default()
        });
        assert!(matches!(
            engine.image_to_text(b"x", DocumentFormat::Png).await,
            Err(CvError::OcrUnavailable(_))
        ));
    }

    /// Writes an executable shell script standing in for an external tool.
    fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    /// `pdftoppm` stand-in: writes `<prefix>-1.png` and `<prefix>-2.png`.
    fn fake_pdftoppm(dir: &Path) -> String {
        fake_tool(
            dir,
            "pdftoppm",
            r#"for last; do :; done
printf x > "$last-1.png"
printf x > "$last-2.png""#,
        )
    }

    fn engine_with(pdftoppm_path: String, tesseract_path: String) -> TesseractOcr {
        TesseractOcr::new(OcrConfig {
            enabled: true,
            tesseract_path,
            pdftoppm_path,
            language: "eng".to_string(),
        })
    }

    #[tokio::test]
    async fn test_pdf_ocr_with_missing_tesseract_is_an_error() {
        let tools = tempfile::tempdir().unwrap();
        let engine = engine_with(
            fake_pdftoppm(tools.path()),
            "/nonexistent/tesseract-binary".to_string(),
        );
        assert!(matches!(
            engine.pdf_to_text(b"%PDF-1.4").await,
            Err(CvError::OcrUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_scanned_pdf_reports_missing_tesseract_not_empty_text() {
        let tools = tempfile::tempdir().unwrap();
        let engine = engine_with(
            fake_pdftoppm(tools.path()),
            "/nonexistent/tesseract-binary".to_string(),
        );
        let err = crate::cv::extract::extract_text(
            DocumentFormat::Pdf,
            bytes::Bytes::from_static(b"%PDF-1.4 scanned"),
            &engine,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CvError::OcrUnavailable(_)));
    }

    #[tokio::test]
    async fn test_pdf_ocr_fails_when_every_page_fails() {
        let tools = tempfile::tempdir().unwrap();
        let tesseract = fake_tool(tools.path(), "tesseract", "echo 'bad image' >&2\nexit 1");
        let engine = engine_with(fake_pdftoppm(tools.path()), tesseract);
        match engine.pdf_to_text(b"%PDF-1.4").await {
            Err(CvError::Extraction(msg)) => assert!(msg.contains("bad image")),
            other => panic!("expected extraction error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pdf_ocr_keeps_pages_that_succeeded() {
        let tools = tempfile::tempdir().unwrap();
        let tesseract = fake_tool(
            tools.path(),
            "tesseract",
            r#"case "$1" in *page-1.png) exit 1;; esac
echo "Jane Doe, backend engineer""#,
        );
        let engine = engine_with(fake_pdftoppm(tools.path()), tesseract);
        let text = engine.pdf_to_text(b"%PDF-1.4").await.unwrap();
        assert!(text.contains("Jane Doe"));
    }

    #[tokio::test]
    async fn test_pdftoppm_failure_is_an_extraction_error() {
        let tools = tempfile::tempdir().unwrap();
        let pdftoppm = fake_tool(tools.path(), "pdftoppm", "echo 'Syntax Error' >&2\nexit 99");
        let tesseract = fake_tool(tools.path(), "tesseract", "echo unreachable");
        let engine = engine_with(pdftoppm, tesseract);
        match engine.pdf_to_text(b"not really a pdf").await {
            Err(CvError::Extraction(msg)) => assert!(msg.contains("Syntax Error")),
            other => panic!("expected extraction error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_reports_unavailable() {
        let engine = TesseractOcr::new(OcrConfig {
            tesseract_path: "/nonexistent/tesseract-binary".to_string(),
            ..OcrConfig::default()
        });
        assert!(matches!(
            engine.image_to_text(b"x", DocumentFormat::Png).await,
            Err(CvError::OcrUnavailable(_))
        ));
    }
}
