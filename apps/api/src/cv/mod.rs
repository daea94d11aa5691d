//! CV analysis pipeline: format sniffing, text extraction (with OCR for
//! scanned documents), LLM field extraction with a heuristic fallback, and
//! sanitization of the extracted fields.

pub mod extract;
pub mod fields;
pub mod format;
pub mod heuristic;
pub mod llm_extractor;
pub mod markup;
pub mod ocr;
pub mod prompts;
pub mod repair;
pub mod text;

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::text_enum;
use crate::monitoring::{inc, METRICS};

use self::extract::extract_text;
use self::fields::ParsedCv;
use self::format::DocumentFormat;
use self::llm_extractor::FieldExtractor;
use self::ocr::OcrEngine;

/// Extracted text shorter than this (in meaningful characters) is rejected.
pub const MIN_TEXT_CHARS: usize = 30;

#[derive(Debug, Error)]
pub enum CvError {
    #[error("the uploaded file is empty")]
    Empty,

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("no readable text found in the document")]
    NoReadableText,
}

impl From<CvError> for AppError {
    fn from(e: CvError) -> Self {
        match e {
            CvError::Empty => AppError::Validation(e.to_string()),
            CvError::UnsupportedFormat(_) => AppError::UnsupportedMediaType(e.to_string()),
            CvError::Extraction(_) | CvError::OcrUnavailable(_) | CvError::NoReadableText => {
                AppError::UnprocessableEntity(e.to_string())
            }
        }
    }
}

text_enum! {
    pub enum ExtractionMethod {
        Direct => "direct",
        Ocr => "ocr",
    }
}

text_enum! {
    pub enum ExtractionSource {
        Llm => "llm",
        Heuristic => "heuristic",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CvAnalysis {
    pub format: DocumentFormat,
    pub extraction_method: ExtractionMethod,
    pub extraction_source: ExtractionSource,
    /// Characters of cleaned text.
    pub text_length: usize,
    pub parsed: ParsedCv,
    pub warnings: Vec<String>,
}

pub struct CvAnalyzer {
    ocr: Arc<dyn OcrEngine>,
    extractor: Arc<dyn FieldExtractor>,
}

impl CvAnalyzer {
    pub fn new(ocr: Arc<dyn OcrEngine>, extractor: Arc<dyn FieldExtractor>) -> Self {
        Self { ocr, extractor }
    }

    pub async fn analyze(&self, format: DocumentFormat, bytes: Bytes) -> Result<CvAnalysis, CvError> {
        let extracted = match extract_text(format, bytes, self.ocr.as_ref()).await {
            Ok(extracted) => extracted,
            Err(e) => {
                inc(&METRICS.cv_parse_total, &[format.as_str(), "none", "failed"]);
                return Err(e);
            }
        };
        let method = extracted.method;

        if text::meaningful_chars(&extracted.text) < MIN_TEXT_CHARS {
            inc(&METRICS.cv_parse_total, &[format.as_str(), method.as_str(), "no_text"]);
            return Err(CvError::NoReadableText);
        }

        let mut warnings = extracted.warnings;
        let fallback = heuristic::extract(&extracted.text);
        let (parsed, source) = match self.extractor.extract(&extracted.text).await {
            Ok(mut parsed) => {
                parsed.fill_gaps_from(fallback);
                (parsed, ExtractionSource::Llm)
            }
            Err(e) => {
                warn!("CV field extraction failed, using heuristics: {e}");
                warnings.push(
                    "Automatic field extraction was unavailable; only basic details were detected"
                        .to_string(),
                );
                (fallback, ExtractionSource::Heuristic)
            }
        };

        inc(&METRICS.cv_parse_total, &[format.as_str(), method.as_str(), source.as_str()]);
        info!(
            "Analysed {format} CV via {method} extraction, fields from {source}, {} warnings",
            warnings.len()
        );

        Ok(CvAnalysis {
            format,
            extraction_method: method,
            extraction_source: source,
            text_length: extracted.text.chars().count(),
            parsed,
            warnings,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;

    use super::extract::tests::StubOcr;
    use super::llm_extractor::FieldExtractionError;
    use super::*;

    /// Field extractor double: canned fields, or `Unparseable` when `None`.
    pub(crate) struct StubExtractor(pub Option<ParsedCv>);

    #[async_trait]
    impl FieldExtractor for StubExtractor {
        async fn extract(&self, _text: &str) -> Result<ParsedCv, FieldExtractionError> {
            self.0.clone().ok_or(FieldExtractionError::Unparseable)
        }
    }

    pub(crate) fn analyzer(parsed: Option<ParsedCv>) -> CvAnalyzer {
        CvAnalyzer::new(Arc::new(StubOcr(None)), Arc::new(StubExtractor(parsed)))
    }

    const CV_TEXT: &str = "Jane Doe\njane@example.com\n+1 415 555 0100\n\
        Skills: Rust, Go\nBackend engineer building payment systems since 2015.";

    #[tokio::test]
    async fn test_llm_fields_completed_by_heuristics() {
        let llm = ParsedCv {
            full_name: Some("Jane Doe".into()),
            headline: Some("Backend engineer".into()),
            ..ParsedCv::default()
        };
        let analysis = analyzer(Some(llm))
            .analyze(DocumentFormat::Text, Bytes::from_static(CV_TEXT.as_bytes()))
            .await
            .unwrap();
        assert_eq!(analysis.extraction_source, ExtractionSource::Llm);
        assert_eq!(analysis.extraction_method, ExtractionMethod::Direct);
        assert_eq!(analysis.parsed.headline.as_deref(), Some("Backend engineer"));
        assert_eq!(analysis.parsed.email.as_deref(), Some("jane@example.com"));
        assert_eq!(analysis.text_length, CV_TEXT.chars().count());
        assert!(analysis.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_heuristic_fallback_is_recorded() {
        let analysis = analyzer(None)
            .analyze(DocumentFormat::Text, Bytes::from_static(CV_TEXT.as_bytes()))
            .await
            .unwrap();
        assert_eq!(analysis.extraction_source, ExtractionSource::Heuristic);
        assert_eq!(analysis.parsed.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(analysis.parsed.skills, vec!["Rust", "Go"]);
        assert_eq!(analysis.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_short_text_is_rejected() {
        let err = analyzer(None)
            .analyze(DocumentFormat::Text, Bytes::from_static(b"  hi  \n\n ok "))
            .await
            .unwrap_err();
        assert!(matches!(err, CvError::NoReadableText));
    }

    #[test]
    fn test_error_statuses() {
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        let cases = [
            (CvError::Empty, StatusCode::BAD_REQUEST),
            (CvError::UnsupportedFormat("doc".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (CvError::NoReadableText, StatusCode::UNPROCESSABLE_ENTITY),
            (CvError::OcrUnavailable("off".into()), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
