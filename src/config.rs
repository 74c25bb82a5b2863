use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Where uploads land and how much an archive may expand to.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub root: PathBuf,
    pub allowed_extensions: Vec<String>,
    pub max_body_bytes: usize,
    pub max_extracted_bytes: u64,
    pub max_entries: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
            allowed_extensions: vec!["zip".into()],
            max_body_bytes: 50 * 1024 * 1024,
            max_extracted_bytes: 200 * 1024 * 1024,
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub uploads: UploadConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "project-scorer".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "project-scorer-users".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parse_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let defaults = UploadConfig::default();
        let uploads = UploadConfig {
            root: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            allowed_extensions: std::env::var("UPLOAD_ALLOWED_EXTENSIONS")
                .map(|v| parse_extensions(&v))
                .unwrap_or(defaults.allowed_extensions),
            max_body_bytes: parse_or("UPLOAD_MAX_BODY_BYTES", defaults.max_body_bytes),
            max_extracted_bytes: parse_or(
                "UPLOAD_MAX_EXTRACTED_BYTES",
                defaults.max_extracted_bytes,
            ),
            max_entries: parse_or("UPLOAD_MAX_ENTRIES", defaults.max_entries),
        };

        Ok(Self {
            database_url,
            jwt,
            uploads,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Splits `"zip, .ZIP,tar"` into `["zip", "tar"]`.
fn parse_extensions(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in raw.split(',') {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}
