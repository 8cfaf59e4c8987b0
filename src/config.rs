//! Configuration management for geotrail
//!
//! Handles loading configuration from a TOML file and environment variables,
//! and provides validation for all configuration settings.

use crate::GeotrailError;
use crate::enrichment::{DEFAULT_CLUSTER_THRESHOLD_METERS, DEFAULT_PACING_MS, EnrichmentSettings};
use crate::geocoding::nominatim::{
    DEFAULT_ACCEPT_LANGUAGE, DEFAULT_BASE_URL, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT_SECONDS,
};
use crate::geocoding::{NominatimConfig, ReverseGeocodeOptions};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeotrailConfig {
    /// Reverse geocoding settings
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    /// Enrichment pass settings
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reverse geocoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Identifies this deployment to Nominatim. Enrichment is off without it.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Contact address sent along with every request
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

/// Enrichment pass settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold_meters: f64,
    /// Pause between consecutive cluster lookups, in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_accept_language() -> String {
    DEFAULT_ACCEPT_LANGUAGE.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_initial_delay_ms() -> u64 {
    DEFAULT_INITIAL_DELAY_MS
}

fn default_cluster_threshold() -> f64 {
    DEFAULT_CLUSTER_THRESHOLD_METERS
}

fn default_pacing_ms() -> u64 {
    DEFAULT_PACING_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            contact_email: None,
            base_url: default_base_url(),
            accept_language: default_accept_language(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            cluster_threshold_meters: default_cluster_threshold(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl GeocodingConfig {
    /// Client identity, or `None` when enrichment is not configured
    #[must_use]
    pub fn nominatim_config(&self) -> Option<NominatimConfig> {
        let user_agent = self
            .user_agent
            .as_deref()
            .map(str::trim)
            .filter(|ua| !ua.is_empty())?;

        Some(NominatimConfig {
            user_agent: user_agent.to_string(),
            contact_email: self.contact_email.clone(),
            base_url: self.base_url.clone(),
            accept_language: self.accept_language.clone(),
            timeout: Duration::from_secs(self.timeout_seconds),
        })
    }

    #[must_use]
    pub fn reverse_geocode_options(&self) -> ReverseGeocodeOptions {
        ReverseGeocodeOptions {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
        }
    }
}

impl EnrichmentConfig {
    #[must_use]
    pub fn settings(&self) -> EnrichmentSettings {
        EnrichmentSettings {
            cluster_threshold_meters: self.cluster_threshold_meters,
            pacing: Duration::from_millis(self.pacing_ms),
        }
    }
}

impl GeotrailConfig {
    /// Load configuration from `config_path`, or from `config.toml` when
    /// present, then apply `GEOTRAIL_` environment overrides
    pub fn load_from_path(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.map_or_else(|| PathBuf::from("config.toml"), Path::to_path_buf);

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        } else if config_path.is_some() {
            return Err(GeotrailError::config(format!(
                "Config file not found: {}",
                config_file.display()
            ))
            .into());
        }

        // Environment overrides, e.g. GEOTRAIL_GEOCODING__USER_AGENT
        builder = builder.add_source(
            Environment::with_prefix("GEOTRAIL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: GeotrailConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_geocoding()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_geocoding(&self) -> Result<()> {
        if let Some(email) = &self.geocoding.contact_email {
            if email.trim().is_empty() {
                return Err(GeotrailError::config(
                    "Contact email cannot be empty if provided. Either remove it or provide an address.",
                )
                .into());
            }
        }

        let base_url = &self.geocoding.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(GeotrailError::config(
                "Geocoding base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.geocoding.timeout_seconds == 0 || self.geocoding.timeout_seconds > 300 {
            return Err(GeotrailError::config(
                "Geocoding timeout must be between 1 and 300 seconds",
            )
            .into());
        }

        if self.geocoding.max_retries > 10 {
            return Err(GeotrailError::config("Geocoding max retries cannot exceed 10").into());
        }

        let threshold = self.enrichment.cluster_threshold_meters;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(GeotrailError::config(format!(
                "Cluster threshold must be a non-negative distance in meters, got: {threshold}"
            ))
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(GeotrailError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(GeotrailError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}
