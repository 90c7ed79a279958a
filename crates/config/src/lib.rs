//! Configuration loading, validation, and management for ChatBuffer.
//!
//! Loads configuration from `~/.chatbuffer/config.toml` with environment
//! variable overrides, fills empty pattern tables from the selected industry
//! preset, and validates all settings at startup. The resulting
//! [`EngineConfig`] is an immutable value handed to every component.

pub mod presets;

use chatbuffer_core::UrgencyClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.chatbuffer/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Industry preset used to fill empty pattern tables
    #[serde(default = "default_industry")]
    pub industry: String,

    /// Classification patterns and urgency table
    #[serde(default)]
    pub semantic: SemanticConfig,

    /// Wait windows per urgency class
    #[serde(default)]
    pub timing: TimingConfig,

    /// Buffer limits and TTL
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Per-dependency circuit breaker settings
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Optional ML intent service
    #[serde(default)]
    pub ml: MlConfig,

    /// Backing store selection
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_industry() -> String {
    "medical".into()
}
fn default_true() -> bool {
    true
}

/// Ordered pattern tables plus the intent → urgency mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticConfig {
    #[serde(default)]
    pub patterns: PatternConfig,

    /// Intent name → urgency class. `unknown` covers unmatched text.
    #[serde(default)]
    pub urgency: BTreeMap<String, UrgencyClass>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Evaluated first; first match means COMPLETE
    #[serde(default)]
    pub complete: Vec<String>,

    /// Evaluated when nothing in `complete` matched; a match means FRAGMENT
    #[serde(default)]
    pub fragments: Vec<String>,

    /// Intents in priority order
    #[serde(default)]
    pub intents: Vec<IntentPatterns>,

    /// Entity extractors, one entry per kind
    #[serde(default)]
    pub entities: Vec<EntityPatterns>,
}

impl PatternConfig {
    pub fn is_empty(&self) -> bool {
        self.complete.is_empty()
            && self.fragments.is_empty()
            && self.intents.is_empty()
            && self.entities.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentPatterns {
    pub name: String,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPatterns {
    pub kind: String,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Named timing profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    Aggressive,
    #[default]
    Balanced,
    Conservative,
}

impl std::str::FromStr for ProfileName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggressive" => Ok(Self::Aggressive),
            "balanced" => Ok(Self::Balanced),
            "conservative" => Ok(Self::Conservative),
            other => Err(ConfigError::ValidationError(format!(
                "unknown timing profile '{other}'"
            ))),
        }
    }
}

/// Wait window (ms) per urgency class and the buffer length that forces a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingProfile {
    pub urgent: u64,
    pub simple: u64,
    pub complex: u64,
    pub max_buffer: usize,
}

impl TimingProfile {
    pub fn wait_ms(&self, urgency: UrgencyClass) -> u64 {
        match urgency {
            UrgencyClass::Urgent => self.urgent,
            UrgencyClass::Simple => self.simple,
            UrgencyClass::Complex => self.complex,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.max_buffer == 0 {
            return Err(ConfigError::ValidationError(format!(
                "timing.profiles.{name}.max_buffer must be >= 1"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingProfiles {
    #[serde(default = "aggressive_profile")]
    pub aggressive: TimingProfile,
    #[serde(default = "balanced_profile")]
    pub balanced: TimingProfile,
    #[serde(default = "conservative_profile")]
    pub conservative: TimingProfile,
}

fn aggressive_profile() -> TimingProfile {
    TimingProfile {
        urgent: 1_000,
        simple: 2_000,
        complex: 3_000,
        max_buffer: 3,
    }
}
fn balanced_profile() -> TimingProfile {
    TimingProfile {
        urgent: 1_500,
        simple: 3_000,
        complex: 5_000,
        max_buffer: 5,
    }
}
fn conservative_profile() -> TimingProfile {
    TimingProfile {
        urgent: 3_000,
        simple: 5_000,
        complex: 8_000,
        max_buffer: 8,
    }
}

impl Default for TimingProfiles {
    fn default() -> Self {
        Self {
            aggressive: aggressive_profile(),
            balanced: balanced_profile(),
            conservative: conservative_profile(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingConfig {
    /// The active profile
    #[serde(default)]
    pub profile: ProfileName,

    #[serde(default)]
    pub profiles: TimingProfiles,
}

impl TimingConfig {
    /// The profile selected by `timing.profile`.
    pub fn active(&self) -> &TimingProfile {
        match self.profile {
            ProfileName::Aggressive => &self.profiles.aggressive,
            ProfileName::Balanced => &self.profiles.balanced,
            ProfileName::Conservative => &self.profiles.conservative,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Seconds a buffer survives without a new message
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Hard cap on buffered entries
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Hard cap on buffered text, in KiB
    #[serde(default = "default_max_size_kb")]
    pub max_size_kb: usize,

    /// Reset the TTL on every append (otherwise it counts from creation)
    #[serde(default = "default_true")]
    pub sliding_ttl: bool,

    /// Joins entry texts in the aggregate
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_ttl_secs() -> u64 {
    300
}
fn default_max_size() -> usize {
    10
}
fn default_max_size_kb() -> usize {
    16
}
fn default_separator() -> String {
    " ".into()
}

impl BufferConfig {
    pub fn max_bytes(&self) -> usize {
        self.max_size_kb * 1024
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_size: default_max_size(),
            max_size_kb: default_max_size_kb(),
            sliding_ttl: true,
            separator: default_separator(),
        }
    }
}

/// Thresholds for one guarded dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// Per-call timeout; exceeding it counts as a failure
    #[serde(default = "default_call_timeout_ms")]
    pub timeout_ms: u64,

    /// How long the circuit stays open before a trial call is allowed
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

fn default_threshold() -> u32 {
    5
}
fn default_call_timeout_ms() -> u64 {
    1_000
}
fn default_reset_timeout_ms() -> u64 {
    30_000
}

impl BreakerConfig {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::ValidationError(format!(
                "circuit_breaker.{name}.threshold must be >= 1"
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "circuit_breaker.{name}.timeout_ms must be > 0"
            )));
        }
        Ok(())
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            timeout_ms: default_call_timeout_ms(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

fn default_ml_breaker() -> BreakerConfig {
    BreakerConfig {
        threshold: 3,
        timeout_ms: 2_000,
        reset_timeout_ms: 60_000,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Guards the backing store (`redis` accepted for older configs)
    #[serde(default, alias = "redis")]
    pub store: BreakerConfig,

    /// Guards the ML service
    #[serde(default = "default_ml_breaker")]
    pub ml: BreakerConfig,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            store: BreakerConfig::default(),
            ml: default_ml_breaker(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Prediction endpoint, e.g. `http://localhost:8000/classify`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_ml_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub confidence: ConfidenceConfig,
}

fn default_ml_timeout_ms() -> u64 {
    2_000
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            timeout_ms: default_ml_timeout_ms(),
            confidence: ConfidenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    /// At or above: the ML intent replaces the regex intent
    #[serde(default = "default_min_threshold")]
    pub min_threshold: f32,

    /// At or above (but under `min_threshold`): used only when regex found nothing
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: f32,
}

fn default_min_threshold() -> f32 {
    0.7
}
fn default_fallback_threshold() -> f32 {
    0.5
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            min_threshold: default_min_threshold(),
            fallback_threshold: default_fallback_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "memory" or "sqlite"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path (defaults to `~/.chatbuffer/buffers.db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_store_backend() -> String {
    "memory".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Sleep through WAIT windows and call `resume` automatically
    #[serde(default)]
    pub auto_resume: bool,

    /// Where auto-resumed READY payloads are POSTed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downstream_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8787
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auto_resume: false,
            downstream_url: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default path (~/.chatbuffer/config.toml).
    ///
    /// Environment overrides (applied before presets and validation):
    /// - `CHATBUFFER_INDUSTRY`
    /// - `CHATBUFFER_PROFILE`
    /// - `CHATBUFFER_ML_ENABLED`
    /// - `CHATBUFFER_ML_ENDPOINT`
    /// - `CHATBUFFER_BUFFER_TTL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::read_raw(&config_path)?;

        if let Ok(industry) = std::env::var("CHATBUFFER_INDUSTRY") {
            config.industry = industry;
        }

        if let Ok(profile) = std::env::var("CHATBUFFER_PROFILE") {
            config.timing.profile = profile.parse()?;
        }

        if let Ok(enabled) = std::env::var("CHATBUFFER_ML_ENABLED") {
            config.ml.enabled = matches!(enabled.as_str(), "1" | "true" | "yes");
        }

        if let Ok(endpoint) = std::env::var("CHATBUFFER_ML_ENDPOINT") {
            config.ml.endpoint = Some(endpoint);
        }

        if let Ok(ttl) = std::env::var("CHATBUFFER_BUFFER_TTL") {
            config.buffer.ttl_secs = ttl.parse().map_err(|_| {
                ConfigError::ValidationError(format!("CHATBUFFER_BUFFER_TTL is not a number: {ttl}"))
            })?;
        }

        config.finalize()
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::read_raw(path)?.finalize()
    }

    /// Parse a TOML string (presets applied, validated).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        config.finalize()
    }

    /// Default configuration for an industry preset.
    pub fn for_industry(industry: &str) -> Result<Self, ConfigError> {
        let config = Self {
            industry: industry.to_string(),
            semantic: SemanticConfig::default(),
            timing: TimingConfig::default(),
            buffer: BufferConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            ml: MlConfig::default(),
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
        };
        config.finalize()
    }

    fn read_raw(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self {
                semantic: SemanticConfig::default(),
                ..Self::default()
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Fill empty pattern tables from the industry preset, then validate.
    fn finalize(mut self) -> Result<Self, ConfigError> {
        self.apply_preset()?;
        self.validate()?;
        Ok(self)
    }

    fn apply_preset(&mut self) -> Result<(), ConfigError> {
        let preset = presets::semantic(&self.industry).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "unknown industry '{}' (expected one of: {})",
                self.industry,
                presets::INDUSTRIES.join(", ")
            ))
        })?;

        let patterns = &mut self.semantic.patterns;
        if patterns.complete.is_empty() {
            patterns.complete = preset.patterns.complete;
        }
        if patterns.fragments.is_empty() {
            patterns.fragments = preset.patterns.fragments;
        }
        if patterns.intents.is_empty() {
            patterns.intents = preset.patterns.intents;
        }
        if patterns.entities.is_empty() {
            patterns.entities = preset.patterns.entities;
        }
        for (intent, class) in preset.urgency {
            self.semantic.urgency.entry(intent).or_insert(class);
        }
        Ok(())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "buffer.ttl_secs must be > 0".into(),
            ));
        }

        if self.buffer.max_size == 0 || self.buffer.max_size_kb == 0 {
            return Err(ConfigError::ValidationError(
                "buffer.max_size and buffer.max_size_kb must be >= 1".into(),
            ));
        }

        self.timing.profiles.aggressive.validate("aggressive")?;
        self.timing.profiles.balanced.validate("balanced")?;
        self.timing.profiles.conservative.validate("conservative")?;

        self.circuit_breaker.store.validate("store")?;
        self.circuit_breaker.ml.validate("ml")?;

        let confidence = &self.ml.confidence;
        if !(0.0..=1.0).contains(&confidence.min_threshold)
            || !(0.0..=1.0).contains(&confidence.fallback_threshold)
        {
            return Err(ConfigError::ValidationError(
                "ml.confidence thresholds must be between 0.0 and 1.0".into(),
            ));
        }
        if confidence.fallback_threshold > confidence.min_threshold {
            return Err(ConfigError::ValidationError(
                "ml.confidence.fallback_threshold must not exceed min_threshold".into(),
            ));
        }

        if self.ml.enabled && self.ml.endpoint.is_none() {
            return Err(ConfigError::ValidationError(
                "ml.enabled requires ml.endpoint".into(),
            ));
        }

        if !matches!(self.store.backend.as_str(), "memory" | "sqlite") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be 'memory' or 'sqlite', got '{}'",
                self.store.backend
            )));
        }

        Ok(())
    }

    /// The urgency class configured for an intent name.
    pub fn urgency_for(&self, intent: &str) -> UrgencyClass {
        self.semantic
            .urgency
            .get(intent)
            .or_else(|| self.semantic.urgency.get(chatbuffer_core::Intent::UNKNOWN))
            .copied()
            .unwrap_or_default()
    }

    /// Effective entry cap: the tighter of `buffer.max_size` and the active profile's `max_buffer`.
    pub fn effective_max_entries(&self) -> usize {
        self.buffer.max_size.min(self.timing.active().max_buffer)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chatbuffer")
    }

    /// Default SQLite path for the `sqlite` store backend.
    pub fn default_store_path() -> PathBuf {
        Self::config_dir().join("buffers.db")
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for EngineConfig {
    /// The `medical` preset with default limits.
    fn default() -> Self {
        Self {
            industry: default_industry(),
            semantic: presets::semantic("medical").unwrap_or_default(),
            timing: TimingConfig::default(),
            buffer: BufferConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            ml: MlConfig::default(),
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.industry, "medical");
        assert_eq!(config.buffer.ttl_secs, 300);
        assert!(config.validate().is_ok());
        assert!(!config.semantic.patterns.complete.is_empty());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = EngineConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.industry, config.industry);
        assert_eq!(
            parsed.semantic.patterns.complete,
            config.semantic.patterns.complete
        );
        assert_eq!(parsed.timing.active(), config.timing.active());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = EngineConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.industry, "medical");
        assert!(!config.semantic.patterns.intents.is_empty());
    }

    #[test]
    fn empty_tables_are_filled_from_preset() {
        let config = EngineConfig::from_toml_str(
            r#"
industry = "ecommerce"

[semantic.patterns]
complete = ["^listo$"]
"#,
        )
        .unwrap();
        assert_eq!(config.semantic.patterns.complete, vec!["^listo$".to_string()]);
        assert_eq!(config.semantic.patterns.intents[0].name, "order");
        assert_eq!(config.urgency_for("order"), UrgencyClass::Urgent);
    }

    #[test]
    fn explicit_urgency_overrides_preset() {
        let config = EngineConfig::from_toml_str(
            r#"
[semantic.urgency]
greeting = "urgent"
"#,
        )
        .unwrap();
        assert_eq!(config.urgency_for("greeting"), UrgencyClass::Urgent);
        assert_eq!(config.urgency_for("farewell"), UrgencyClass::Simple);
        assert_eq!(config.urgency_for("no_such_intent"), UrgencyClass::Complex);
    }

    #[test]
    fn unknown_industry_rejected() {
        let err = EngineConfig::for_industry("aerospace").unwrap_err();
        assert!(err.to_string().contains("aerospace"));
    }

    #[test]
    fn redis_alias_maps_to_store_breaker() {
        let config = EngineConfig::from_toml_str(
            r#"
[circuit_breaker.redis]
threshold = 2
timeout_ms = 250
reset_timeout_ms = 5000
"#,
        )
        .unwrap();
        assert_eq!(config.circuit_breaker.store.threshold, 2);
        assert_eq!(config.circuit_breaker.ml.threshold, 3);
    }

    #[test]
    fn zero_threshold_rejected() {
        let mut config = EngineConfig::default();
        config.circuit_breaker.store.threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ml_enabled_requires_endpoint() {
        let mut config = EngineConfig::default();
        config.ml.enabled = true;
        assert!(config.validate().is_err());
        config.ml.endpoint = Some("http://localhost:8000/classify".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_confidence_thresholds_rejected() {
        let mut config = EngineConfig::default();
        config.ml.confidence.fallback_threshold = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_max_entries_takes_tighter_bound() {
        let mut config = EngineConfig::default();
        config.timing.profile = ProfileName::Aggressive;
        assert_eq!(config.effective_max_entries(), 3);
        config.buffer.max_size = 2;
        assert_eq!(config.effective_max_entries(), 2);
    }

    #[test]
    fn profile_names_parse() {
        assert_eq!("Conservative".parse::<ProfileName>().unwrap(), ProfileName::Conservative);
        assert!("turbo".parse::<ProfileName>().is_err());
    }

    #[test]
    fn load_from_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
industry = "generic"

[timing]
profile = "conservative"

[buffer]
max_size = 4
"#,
        )
        .unwrap();
        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.industry, "generic");
        assert_eq!(config.timing.active().complex, 8_000);
        assert_eq!(config.effective_max_entries(), 4);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "industry = [").unwrap();
        assert!(matches!(
            EngineConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = EngineConfig::default_toml();
        assert!(toml_str.contains("medical"));
        assert!(toml_str.contains("balanced"));
    }
}
