use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides, e.g. `VIDCONV_CONVERTER__PRESET=slow`
const ENV_PREFIX: &str = "VIDCONV_";

fn base() -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
}

fn env() -> Env {
    Env::prefixed(ENV_PREFIX).split("__")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = base()
        .merge(Toml::file(path))
        .merge(env())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from an optional file, falling back to defaults plus environment
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => base()
            .merge(env())
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string())),
    }
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::OutputFormat;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[converter]
preset = "slow"
timeout_secs = 600

[defaults]
format = "webm"
quality = 30
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.converter.preset, "slow");
        assert_eq!(config.converter.video_codec, "libx264");
        assert_eq!(config.converter.timeout_secs, Some(600));
        assert_eq!(config.defaults.format, OutputFormat::Webm);
        assert_eq!(config.defaults.quality, 30);
    }

    #[test]
    fn test_load_config_from_str_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_from_str_bad_format() {
        let toml = r#"
[defaults]
format = "mov"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[converter]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
overwrite = true
extra_ffmpeg_args = ["-threads", "4"]
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(
            config.converter.ffmpeg_path,
            Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"))
        );
        assert!(config.converter.overwrite);
        assert_eq!(config.converter.extra_ffmpeg_args, vec!["-threads", "4"]);
        assert_eq!(config.defaults.quality, 23);
    }

    #[test]
    fn test_load_config_or_default_with_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[defaults]\nquality = 18").unwrap();

        let config = load_config_or_default(Some(temp_file.path())).unwrap();
        assert_eq!(config.defaults.quality, 18);
    }
}
