use crate::error::{Result, SlicerError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Folder under the home directory used when no save location is set.
pub const DEFAULT_SAVE_SUBDIR: &str = "Videos";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub encoder: EncoderConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub scan: ScanConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// External encoder executable, looked up on PATH when not absolute.
    pub program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig {
                program: "ffmpeg".into(),
            },
            server: ServerConfig {
                bind: "127.0.0.1:34115".into(),
            },
            cache: CacheConfig { capacity: 64 },
            scan: ScanConfig { limit: 3 },
            log: LogConfig {
                level: "info".into(),
            },
        }
    }
}

/// Defaults, then the TOML file (optional unless `path` is given), then `SLICER_*` env vars
/// (`SLICER_ENCODER__PROGRAM=/opt/ffmpeg`).
pub fn load(path: Option<&str>) -> Result<AppConfig, config::ConfigError> {
    let defaults = AppConfig::default();
    let mut settings = config::Config::builder()
        .set_default("encoder.program", defaults.encoder.program)?
        .set_default("server.bind", defaults.server.bind)?
        .set_default("cache.capacity", defaults.cache.capacity as i64)?
        .set_default("scan.limit", defaults.scan.limit as i64)?
        .set_default("log.level", defaults.log.level)?;
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("SLICER")
            .prefix_separator("_")
            .separator("__"),
    );
    let cfg = settings.build()?;
    cfg.try_deserialize()
}

/// The configured save location, or `~/Videos` when it is blank.
pub fn resolve_save_dir(save_location: &str) -> Result<PathBuf> {
    let trimmed = save_location.trim();
    if !trimmed.is_empty() {
        return Ok(PathBuf::from(trimmed));
    }
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_SAVE_SUBDIR))
        .ok_or_else(|| SlicerError::invalid("no save location set and no home directory found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.scan.limit, 3);
        assert_eq!(cfg.cache.capacity, 64);
        assert_eq!(cfg.server.bind, "127.0.0.1:34115");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slicer.toml");
        std::fs::write(
            &path,
            "[encoder]\nprogram = \"/opt/ffmpeg/bin/ffmpeg\"\n[cache]\ncapacity = 8\n",
        )
        .unwrap();
        let cfg = load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.encoder.program, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(cfg.cache.capacity, 8);
        assert_eq!(cfg.scan.limit, 3);
    }

    #[test]
    fn explicit_save_location_wins() {
        assert_eq!(
            resolve_save_dir("  /tmp/clips ").unwrap(),
            PathBuf::from("/tmp/clips")
        );
    }

    #[test]
    fn blank_save_location_falls_back_to_home_videos() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolve_save_dir("").unwrap(), home.join("Videos"));
        }
    }
}
