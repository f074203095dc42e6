use crate::error::Error;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use croner::Cron;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_START_PATH: &str = "/source_files";
pub const DEFAULT_PAUSE_AFTER: u64 = 1000;
pub const DEFAULT_PAUSE_TIME_SECONDS: u64 = 5;
pub const DEFAULT_CRON_SCHEDULE: &str = "0 * * * *";
pub const DEFAULT_DATABASE_PATH: &str = "gallery_index.db";

/// Raster, raw and vector image formats indexed when nothing else is configured.
pub const DEFAULT_FILE_TYPES: &[&str] = &[
    "ase", "art", "bmp", "blp", "cd5", "cit", "cpt", "cr2", "cut", "dds", "dib", "djvu", "egt",
    "exif", "gif", "gpl", "grf", "icns", "ico", "iff", "jng", "jpeg", "jpg", "jfif", "jp2", "jps",
    "lbm", "max", "miff", "mng", "msp", "nef", "nitf", "ota", "pbm", "pc1", "pc2", "pc3", "pcf",
    "pcx", "pdn", "pgm", "pi1", "pi2", "pi3", "pict", "pct", "pnm", "pns", "ppm", "psb", "psd",
    "pdd", "psp", "px", "pxm", "pxr", "qfx", "raw", "rle", "sct", "sgi", "rgb", "int", "bw",
    "tga", "tiff", "tif", "vtf", "xbm", "xcf", "xpm", "3dv", "amf", "ai", "awg", "cgm", "cdr",
    "cmx", "dxf", "e2d", "eps", "fs", "gbr", "odg", "svg", "stl", "vrml", "x3d", "sxd", "v2d",
    "vnd", "wmf", "emf", "xar", "png", "webp", "jxr", "hdp", "wdp", "cur", "ecw", "liff", "nrrd",
    "pam", "pgf", "rgba", "inta", "sid", "ras", "sun", "heic", "heif",
];

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    pub start_path: String,
    pub file_types: Vec<String>,
    pub pause_after: u64,
    pub pause_time_seconds: u64,
    pub cron_schedule: String,
    pub database_path: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            start_path: DEFAULT_START_PATH.to_string(),
            file_types: DEFAULT_FILE_TYPES.iter().map(|s| s.to_string()).collect(),
            pause_after: DEFAULT_PAUSE_AFTER,
            pause_time_seconds: DEFAULT_PAUSE_TIME_SECONDS,
            cron_schedule: DEFAULT_CRON_SCHEDULE.to_string(),
            database_path: DEFAULT_DATABASE_PATH.to_string(),
        }
    }
}

impl IndexerConfig {
    pub fn pause_duration(&self) -> Duration {
        Duration::from_secs(self.pause_time_seconds)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.start_path.trim().is_empty() {
            return Err(Error::InvalidConfig("start_path must not be empty".into()));
        }
        if self.file_types.iter().all(|ext| ext.trim().trim_start_matches('.').is_empty()) {
            return Err(Error::InvalidConfig(
                "file_types must name at least one extension".into(),
            ));
        }
        if self.pause_after == 0 {
            return Err(Error::InvalidConfig("pause_after must be at least 1".into()));
        }
        parse_schedule(&self.cron_schedule)?;
        Ok(())
    }
}

pub fn parse_schedule(expression: &str) -> Result<Cron, Error> {
    Cron::from_str(expression).map_err(|e| Error::InvalidSchedule {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Layered load: built-in defaults, then an optional `Config.toml`,
/// then `INDEXER_*` environment variables.
pub fn load_configuration() -> Result<IndexerConfig, Error> {
    let config = build_configuration("Config")?;
    config.validate()?;
    Ok(config)
}

fn build_configuration(file_name: &str) -> Result<IndexerConfig, ConfigError> {
    let defaults = IndexerConfig::default();
    let builder = Config::builder()
        .set_default("start_path", defaults.start_path)?
        .set_default("file_types", defaults.file_types)?
        .set_default("pause_after", defaults.pause_after)?
        .set_default("pause_time_seconds", defaults.pause_time_seconds)?
        .set_default("cron_schedule", defaults.cron_schedule)?
        .set_default("database_path", defaults.database_path)?
        .add_source(ConfigFile::with_name(file_name).required(false))
        .add_source(
            Environment::with_prefix("INDEXER")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("file_types"),
        )
        .build()?;
    builder.try_deserialize::<IndexerConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IndexerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pause_duration(), Duration::from_secs(5));
        assert!(config.file_types.iter().any(|ext| ext == "jpg"));
    }

    #[test]
    fn test_rejects_zero_pause_after() {
        let config = IndexerConfig {
            pause_after: 0,
            ..IndexerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_empty_file_types() {
        let config = IndexerConfig {
            file_types: vec![".".to_string(), "  ".to_string()],
            ..IndexerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_schedule() {
        let config = IndexerConfig {
            cron_schedule: "every now and then".to_string(),
            ..IndexerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn test_build_without_config_file_uses_defaults() {
        let config = build_configuration("definitely-not-a-config-file").unwrap();
        assert_eq!(config.pause_after, DEFAULT_PAUSE_AFTER);
        assert_eq!(config.cron_schedule, DEFAULT_CRON_SCHEDULE);
    }
}
