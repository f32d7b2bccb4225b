use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Upper bound for MAX_REQUEST_SIZE_MB (and so MAX_FILE_SIZE_MB): 4 GiB.
pub const MAX_REQUEST_SIZE_MB: usize = 4096;

/// What happens when `renamed/<name>.pdf` already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Replace the existing file.
    Overwrite,
    /// Pick the first free `<name> (n).pdf`.
    Suffix,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(CollisionPolicy::Overwrite),
            "suffix" => Ok(CollisionPolicy::Suffix),
            other => Err(format!("unknown collision policy '{}'", other)),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionPolicy::Overwrite => write!(f, "overwrite"),
            CollisionPolicy::Suffix => write!(f, "suffix"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_file_size_mb: usize,
    pub max_request_size_mb: usize,
    pub max_concurrent_requests: usize,
    pub ocr_timeout_seconds: u64,
    pub ocr_concurrency: usize,
    pub ocr_language: String,
    pub tesseract_bin: String,
    pub tesseract_psm: Option<u8>,
    pub pdftoppm_bin: String,
    pub upload_dir: PathBuf,
    pub renamed_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub public_dir: PathBuf,
    pub raster_dpi: u32,
    pub raster_width: u32,
    pub raster_height: u32,
    pub download_zoom: f32,
    pub name_label: String,
    pub rename_collision: CollisionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            max_file_size_mb: 25,
            max_request_size_mb: 200,
            max_concurrent_requests: 16,
            ocr_timeout_seconds: 120,
            ocr_concurrency: 1,
            ocr_language: "eng".to_string(),
            tesseract_bin: "tesseract".to_string(),
            tesseract_psm: None,
            pdftoppm_bin: "pdftoppm".to_string(),
            upload_dir: PathBuf::from("uploads"),
            renamed_dir: PathBuf::from("renamed"),
            temp_dir: PathBuf::from("temp"),
            public_dir: PathBuf::from("public"),
            raster_dpi: 300,
            raster_width: 1000,
            raster_height: 1400,
            download_zoom: 2.0,
            name_label: "Name:".to_string(),
            rename_collision: CollisionPolicy::Overwrite,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        let defaults = Config::default();

        let config = Config {
            server_host: Self::string_env_var("SERVER_HOST", &defaults.server_host),
            server_port: Self::parse_env_var("SERVER_PORT", defaults.server_port)
                .context("Failed to parse SERVER_PORT")?,
            max_file_size_mb: Self::parse_env_var("MAX_FILE_SIZE_MB", defaults.max_file_size_mb)
                .context("Failed to parse MAX_FILE_SIZE_MB")?,
            max_request_size_mb: Self::parse_env_var(
                "MAX_REQUEST_SIZE_MB",
                defaults.max_request_size_mb,
            )
            .context("Failed to parse MAX_REQUEST_SIZE_MB")?,
            max_concurrent_requests: Self::parse_env_var(
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            )
            .context("Failed to parse MAX_CONCURRENT_REQUESTS")?,
            ocr_timeout_seconds: Self::parse_env_var(
                "OCR_TIMEOUT_SECONDS",
                defaults.ocr_timeout_seconds,
            )
            .context("Failed to parse OCR_TIMEOUT_SECONDS")?,
            ocr_concurrency: Self::parse_env_var("OCR_CONCURRENCY", defaults.ocr_concurrency)
                .context("Failed to parse OCR_CONCURRENCY")?,
            ocr_language: Self::string_env_var("OCR_LANGUAGE", &defaults.ocr_language),
            tesseract_bin: Self::string_env_var("TESSERACT_BIN", &defaults.tesseract_bin),
            tesseract_psm: match env::var("TESSERACT_PSM") {
                Ok(val) => match val.parse::<u8>() {
                    Ok(psm) => Some(psm),
                    Err(e) => {
                        warn!("Failed to parse TESSERACT_PSM: {} (using engine default)", e);
                        None
                    }
                },
                Err(_) => None,
            },
            pdftoppm_bin: Self::string_env_var("PDFTOPPM_BIN", &defaults.pdftoppm_bin),
            upload_dir: Self::path_env_var("UPLOAD_DIR", &defaults.upload_dir),
            renamed_dir: Self::path_env_var("RENAMED_DIR", &defaults.renamed_dir),
            temp_dir: Self::path_env_var("TEMP_DIR", &defaults.temp_dir),
            public_dir: Self::path_env_var("PUBLIC_DIR", &defaults.public_dir),
            raster_dpi: Self::parse_env_var("RASTER_DPI", defaults.raster_dpi)
                .context("Failed to parse RASTER_DPI")?,
            raster_width: Self::parse_env_var("RASTER_WIDTH", defaults.raster_width)
                .context("Failed to parse RASTER_WIDTH")?,
            raster_height: Self::parse_env_var("RASTER_HEIGHT", defaults.raster_height)
                .context("Failed to parse RASTER_HEIGHT")?,
            download_zoom: Self::parse_env_var("DOWNLOAD_ZOOM", defaults.download_zoom)
                .context("Failed to parse DOWNLOAD_ZOOM")?,
            name_label: Self::string_env_var("NAME_LABEL", &defaults.name_label),
            rename_collision: Self::parse_env_var("RENAME_COLLISION", defaults.rename_collision)
                .context("Failed to parse RENAME_COLLISION")?,
        };

        config.validate()?;

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: FromStr + Copy + fmt::Debug,
        T::Err: fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {} (using default: {:?})", var_name, e, default);
                    Ok(default)
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    fn string_env_var(var_name: &str, default: &str) -> String {
        match env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => val,
            _ => {
                info!("{} not set, using default: {}", var_name, default);
                default.to_string()
            }
        }
    }

    fn path_env_var(var_name: &str, default: &std::path::Path) -> PathBuf {
        PathBuf::from(Self::string_env_var(var_name, &default.to_string_lossy()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("SERVER_PORT must be greater than 0"));
        }
        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_request_size_mb > MAX_REQUEST_SIZE_MB {
            return Err(anyhow::anyhow!(
                "MAX_REQUEST_SIZE_MB must be at most {}",
                MAX_REQUEST_SIZE_MB
            ));
        }
        if self.max_request_size_mb < self.max_file_size_mb {
            return Err(anyhow::anyhow!(
                "MAX_REQUEST_SIZE_MB must be at least MAX_FILE_SIZE_MB"
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_REQUESTS must be greater than 0"));
        }
        if self.ocr_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("OCR_TIMEOUT_SECONDS must be greater than 0"));
        }
        if self.ocr_concurrency == 0 {
            return Err(anyhow::anyhow!("OCR_CONCURRENCY must be greater than 0"));
        }
        if self.raster_dpi == 0 || self.raster_width == 0 || self.raster_height == 0 {
            return Err(anyhow::anyhow!(
                "RASTER_DPI, RASTER_WIDTH and RASTER_HEIGHT must be greater than 0"
            ));
        }
        if !(self.download_zoom.is_finite() && self.download_zoom > 0.0) {
            return Err(anyhow::anyhow!("DOWNLOAD_ZOOM must be a positive number"));
        }
        if self.name_label.trim().is_empty() {
            return Err(anyhow::anyhow!("NAME_LABEL must not be empty"));
        }
        Ok(())
    }

    pub fn max_request_size_bytes(&self) -> usize {
        self.max_request_size_mb.saturating_mul(1024 * 1024)
    }

    /// Create the working directories if they are missing.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.upload_dir, &self.renamed_dir, &self.temp_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_policy_parses_case_insensitively() {
        assert_eq!("Suffix".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Suffix));
        assert_eq!(" overwrite ".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Overwrite));
        assert!("rename".parse::<CollisionPolicy>().is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.raster_dpi, 300);
        assert_eq!(config.name_label, "Name:");
    }

    #[test]
    fn rejects_absurd_request_size() {
        let config = Config {
            max_file_size_mb: usize::MAX,
            max_request_size_mb: usize::MAX,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.max_request_size_bytes(), usize::MAX);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let config = Config {
            ocr_concurrency: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
