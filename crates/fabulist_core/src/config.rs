//! Layered configuration for Fabulist.
//!
//! Sources, later ones overriding earlier ones:
//! - Bundled defaults (include_str! from fabulist.toml)
//! - `~/.config/fabulist/fabulist.toml`
//! - `./fabulist.toml`
//! - `FABULIST__SECTION__KEY` environment variables
//! - `ARK_API_KEY` and `ARK_MOCK`

use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use derive_getters::Getters;
use fabulist_error::{ConfigError, FabulistError, FabulistResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../../../fabulist.toml");

/// Connection settings for the Ark model service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_", into)]
pub struct ArkConfig {
    /// Service root URL
    #[serde(default = "default_base_url")]
    base_url: String,
    /// Bearer token
    #[serde(default)]
    api_key: Option<String>,
    /// Chat completion model or endpoint id
    #[serde(default = "default_chat_model")]
    chat_model: String,
    /// Image generation model
    #[serde(default = "default_image_model")]
    image_model: String,
    /// Video generation model
    #[serde(default = "default_video_model")]
    video_model: String,
    /// Timeout for chat and task-status calls
    #[serde(default = "default_request_timeout")]
    request_timeout_secs: u64,
    /// Timeout for image generation calls
    #[serde(default = "default_image_timeout")]
    image_timeout_secs: u64,
    /// Timeout for video task creation
    #[serde(default = "default_video_timeout")]
    video_timeout_secs: u64,
    /// Retries for idempotent calls after a retryable failure; 0 disables
    #[serde(default = "default_max_retries")]
    max_retries: usize,
    /// Use the offline mock collaborators instead of the service
    #[serde(default)]
    mock: bool,
}

impl std::fmt::Debug for ArkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArkConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("chat_model", &self.chat_model)
            .field("image_model", &self.image_model)
            .field("video_model", &self.video_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("video_timeout_secs", &self.video_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("mock", &self.mock)
            .finish()
    }
}

impl ArkConfig {
    /// Timeout for chat and task-status calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timeout for image generation calls.
    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    /// Timeout for video task creation.
    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(self.video_timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://ark.cn-beijing.volces.com".to_string()
}

fn default_chat_model() -> String {
    "ep-20250220181854-c8s82".to_string()
}

fn default_image_model() -> String {
    "doubao-seedream-4.0".to_string()
}

fn default_video_model() -> String {
    "doubao-seedance-1-0-lite-i2v".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_image_timeout() -> u64 {
    180
}

fn default_video_timeout() -> u64 {
    300
}

fn default_max_retries() -> usize {
    3
}

impl Default for ArkConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            chat_model: default_chat_model(),
            image_model: default_image_model(),
            video_model: default_video_model(),
            request_timeout_secs: default_request_timeout(),
            image_timeout_secs: default_image_timeout(),
            video_timeout_secs: default_video_timeout(),
            max_retries: default_max_retries(),
            mock: false,
        }
    }
}

/// Review gate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_", into)]
pub struct ReviewConfig {
    /// Reply that approves the content (matched case-insensitively)
    #[serde(default = "default_sentinel")]
    approval_sentinel: String,
    /// Generator runs allowed per review loop; 0 means unbounded
    #[serde(default = "default_max_rounds")]
    max_rounds: u32,
}

fn default_sentinel() -> String {
    "ok".to_string()
}

fn default_max_rounds() -> u32 {
    10
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            approval_sentinel: default_sentinel(),
            max_rounds: default_max_rounds(),
        }
    }
}

/// Story shape constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct StoryConfig {
    /// Fewest chapters accepted from the model
    #[serde(default = "default_min_chapters")]
    min_chapters: usize,
    /// Most chapters accepted from the model
    #[serde(default = "default_max_chapters")]
    max_chapters: usize,
}

fn default_min_chapters() -> usize {
    3
}

fn default_max_chapters() -> usize {
    5
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            min_chapters: default_min_chapters(),
            max_chapters: default_max_chapters(),
        }
    }
}

/// Illustration request settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_", into)]
pub struct ImageConfig {
    /// Output size
    #[serde(default = "default_size")]
    size: String,
    /// Sequential generation mode
    #[serde(default = "default_sequential_mode")]
    sequential_mode: String,
    /// Images requested per chapter
    #[serde(default = "default_max_images")]
    max_images: u32,
}

fn default_size() -> String {
    "2304x1728".to_string()
}

fn default_sequential_mode() -> String {
    "auto".to_string()
}

fn default_max_images() -> u32 {
    3
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            sequential_mode: default_sequential_mode(),
            max_images: default_max_images(),
        }
    }
}

/// Video task polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct VideoConfig {
    /// Polls before giving up
    #[serde(default = "default_poll_attempts")]
    poll_attempts: u32,
    /// Delay between polls
    #[serde(default = "default_poll_interval")]
    poll_interval_secs: u64,
}

impl VideoConfig {
    /// Delay between polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_poll_attempts() -> u32 {
    60
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            poll_attempts: default_poll_attempts(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Top-level Fabulist configuration.
///
/// # Example
///
/// ```no_run
/// use fabulist_core::FabulistConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = FabulistConfig::load()?;
/// println!("approve with {:?}", config.review.approval_sentinel());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabulistConfig {
    /// Model service connection
    #[serde(default)]
    pub ark: ArkConfig,
    /// Review gates
    #[serde(default)]
    pub review: ReviewConfig,
    /// Story constraints
    #[serde(default)]
    pub story: StoryConfig,
    /// Illustration settings
    #[serde(default)]
    pub images: ImageConfig,
    /// Video polling
    #[serde(default)]
    pub video: VideoConfig,
}

impl FabulistConfig {
    /// Load configuration with precedence: env > current dir > home dir > bundled defaults.
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> FabulistResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        let mut builder = Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/fabulist/fabulist.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("fabulist").required(false));

        Self::finish(builder)
    }

    /// Load bundled defaults overlaid with a specific file (and the environment).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> FabulistResult<Self> {
        debug!("Loading configuration from file");

        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.as_ref()));

        Self::finish(builder)
    }

    /// Parse configuration from TOML text layered over the bundled defaults.
    ///
    /// The environment is not consulted.
    ///
    /// ```
    /// use fabulist_core::FabulistConfig;
    ///
    /// let config = FabulistConfig::from_toml_str("[review]\nmax_rounds = 2\n").unwrap();
    /// assert_eq!(*config.review.max_rounds(), 2);
    /// assert_eq!(config.images.size(), "2304x1728");
    /// ```
    pub fn from_toml_str(toml: &str) -> FabulistResult<Self> {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .map_err(|e| {
                FabulistError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                FabulistError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> FabulistResult<Self> {
        let builder = builder
            .add_source(
                Environment::with_prefix("FABULIST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("ark.api_key", std::env::var("ARK_API_KEY").ok())
            .and_then(|b| b.set_override_option("ark.mock", ark_mock_from_env()))
            .map_err(|e| {
                FabulistError::from(ConfigError::new(format!(
                    "Failed to apply environment overrides: {}",
                    e
                )))
            })?;

        let config: Self = builder
            .build()
            .map_err(|e| {
                FabulistError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                FabulistError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> FabulistResult<()> {
        if self.story.min_chapters == 0 || self.story.min_chapters > self.story.max_chapters {
            return Err(ConfigError::new(format!(
                "story.min_chapters ({}) must be between 1 and story.max_chapters ({})",
                self.story.min_chapters, self.story.max_chapters
            ))
            .into());
        }
        if self.review.approval_sentinel.trim().is_empty() {
            return Err(ConfigError::new("review.approval_sentinel must not be empty").into());
        }
        if self.video.poll_attempts == 0 {
            return Err(ConfigError::new("video.poll_attempts must be at least 1").into());
        }
        Ok(())
    }
}

/// `ARK_MOCK` counts as enabled when set to `1` or `true`.
fn ark_mock_from_env() -> Option<bool> {
    std::env::var("ARK_MOCK")
        .ok()
        .map(|value| matches!(value.trim().to_lowercase().as_str(), "1" | "true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_defaults_match_struct_defaults() {
        let bundled: FabulistConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(bundled, FabulistConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = FabulistConfig::from_toml_str(
            r#"
            [ark]
            mock = true

            [video]
            poll_attempts = 3
            "#,
        )
        .unwrap();
        assert!(*config.ark.mock());
        assert_eq!(*config.video.poll_attempts(), 3);
        assert_eq!(*config.video.poll_interval_secs(), 5);
        assert_eq!(config.review.approval_sentinel(), "ok");
    }

    #[test]
    fn test_validate_rejects_inverted_chapter_bounds() {
        let mut config = FabulistConfig::default();
        config.story = config.story.with_min_chapters(6);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let ark = ArkConfig::default().with_api_key(Some("secret-key".to_string()));
        let rendered = format!("{:?}", ark);
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("redacted"));
    }
}
