use std::str::FromStr;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub jwt_secret: String,
    pub port: u16,
    pub rust_log: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub cache_ttl_seconds: u64,
    pub cache_key_prefix: String,
    pub max_upload_bytes: usize,
    pub invitation_ttl_days: i64,
    pub ocr: OcrConfig,
    /// Empty means permissive CORS.
    pub cors_allowed_origins: Vec<String>,
}

/// External OCR tooling used by the CV pipeline for scanned documents and images.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub enabled: bool,
    pub tesseract_path: String,
    pub pdftoppm_path: String,
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tesseract_path: "tesseract".to_string(),
            pdftoppm_path: "pdftoppm".to_string(),
            language: "eng".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            jwt_secret: require_env("JWT_SECRET")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            access_token_minutes: env_or("ACCESS_TOKEN_MINUTES", 15)?,
            refresh_token_days: env_or("REFRESH_TOKEN_DAYS", 7)?,
            cache_ttl_seconds: env_or("CACHE_TTL_SECONDS", 300)?,
            cache_key_prefix: std::env::var("CACHE_KEY_PREFIX")
                .unwrap_or_else(|_| "hirehub:".to_string()),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            invitation_ttl_days: env_or("INVITATION_TTL_DAYS", 7)?,
            ocr: OcrConfig {
                enabled: env_or("OCR_ENABLED", true)?,
                tesseract_path: std::env::var("TESSERACT_PATH")
                    .unwrap_or_else(|_| "tesseract".to_string()),
                pdftoppm_path: std::env::var("PDFTOPPM_PATH")
                    .unwrap_or_else(|_| "pdftoppm".to_string()),
                language: std::env::var("OCR_LANGUAGE").unwrap_or_else(|_| "eng".to_string()),
            },
            cors_allowed_origins: parse_list(
                &std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default(),
            ),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Reads an optional variable, falling back to `default` when unset.
/// A value that is set but does not parse is an error.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list(" https://a.example , ,https://b.example"),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_env_or_default_when_unset() {
        let v: u16 = env_or("HIREHUB_TEST_SURELY_UNSET_PORT", 8080).unwrap();
        assert_eq!(v, 8080);
    }

    #[test]
    fn test_env_or_rejects_garbage() {
        std::env::set_var("HIREHUB_TEST_BAD_NUMBER", "not-a-number");
        let result: Result<u64> = env_or("HIREHUB_TEST_BAD_NUMBER", 1);
        assert!(result.is_err());
        std::env::remove_var("HIREHUB_TEST_BAD_NUMBER");
    }
}
