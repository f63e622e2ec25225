pub mod config;
pub mod converter;
pub mod metrics;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, DefaultsConfig,
};
pub use converter::{
    change_extension, spawn_conversion, ConversionHandle, ConversionRequest, ConversionState,
    Converter, ConverterConfig, ConverterError, FfmpegConverter, OutputFormat, ProgressParser,
    ProgressSnapshot,
};
