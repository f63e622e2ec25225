use super::{types::Config, ConfigError};
use crate::converter::MAX_QUALITY;

/// Validate configuration
/// Currently validates:
/// - ffmpeg can be named (explicit path or non-empty lookup name)
/// - Codec and preset are not empty
/// - Progress buffer and timeout are not 0
/// - Default quality is within the CRF range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let converter = &config.converter;

    if converter.ffmpeg_path.is_none() && converter.ffmpeg_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.ffmpeg_name cannot be empty when converter.ffmpeg_path is not set"
                .to_string(),
        ));
    }

    if converter.video_codec.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.video_codec cannot be empty".to_string(),
        ));
    }

    if converter.preset.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.preset cannot be empty".to_string(),
        ));
    }

    if converter.progress_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "converter.progress_buffer cannot be 0".to_string(),
        ));
    }

    if converter.timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "converter.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.defaults.quality > MAX_QUALITY {
        return Err(ConfigError::ValidationError(format!(
            "defaults.quality must be between 0 and {}",
            MAX_QUALITY
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultsConfig;
    use crate::converter::{ConverterConfig, OutputFormat};

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_progress_buffer_zero_fails() {
        let config = Config {
            converter: ConverterConfig::default().with_progress_buffer(0),
            defaults: DefaultsConfig::default(),
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let config = Config {
            converter: ConverterConfig::default().with_timeout(0),
            defaults: DefaultsConfig::default(),
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_quality_out_of_range_fails() {
        let config = Config {
            converter: ConverterConfig::default(),
            defaults: DefaultsConfig {
                format: OutputFormat::Mkv,
                quality: 52,
            },
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_preset_fails() {
        let mut config = Config::default();
        config.converter.preset = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_explicit_path_allows_empty_name() {
        let mut config = Config::default();
        config.converter.ffmpeg_path = Some("/usr/bin/ffmpeg".into());
        config.converter.ffmpeg_name = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
