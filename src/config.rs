//! Pipeline configuration.
//!
//! [`StatementConfig`] is the per-statement record of pipeline switches and
//! parameter conventions. [`Settings`] wraps it together with cache sizing
//! and is what the config file (`~/.config/sqlkiln/config.toml` on Linux)
//! deserializes into:
//!
//! ```toml
//! [statement]
//! dialect = "mysql"
//! target_parameter_style = "qmark"
//! literal_parameterization = true
//!
//! [statement.validators]
//! dml_safety = "warn"
//!
//! [cache]
//! max_entries = 5000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::dialect::Dialect;
use crate::error::{KilnError, KilnResult};
use crate::params::{ParameterExtractor, ParameterStyle};
use crate::validator::{FindingKind, ValidatorMode, ValidatorSettings};

/// Switches and conventions for one statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementConfig {
    pub dialect: Dialect,
    pub enable_parsing: bool,
    pub enable_validation: bool,
    pub enable_transformations: bool,
    pub enable_caching: bool,
    /// Declared input style. Must be one of the supported styles.
    pub parameter_style: Option<ParameterStyle>,
    /// Output style; the dialect's default when unset.
    pub target_parameter_style: Option<ParameterStyle>,
    /// Styles recognized in input text; the dialect's set when empty.
    pub supported_parameter_styles: Vec<ParameterStyle>,
    /// Lift predicate and value literals into parameters.
    pub literal_parameterization: bool,
    pub validators: ValidatorSettings,
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self::for_dialect(Dialect::default())
    }
}

impl StatementConfig {
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            enable_parsing: true,
            enable_validation: true,
            enable_transformations: true,
            enable_caching: true,
            parameter_style: None,
            target_parameter_style: None,
            supported_parameter_styles: Vec::new(),
            literal_parameterization: false,
            validators: ValidatorSettings::default(),
        }
    }

    pub fn builder() -> StatementConfigBuilder {
        StatementConfigBuilder::default()
    }

    /// Styles the extractor recognizes.
    pub fn supported_styles(&self) -> Vec<ParameterStyle> {
        self.supported_styles_for(self.dialect)
    }

    /// Styles recognized in text written for `dialect`, which differs from
    /// the configured dialect for query files that declare their own.
    pub fn supported_styles_for(&self, dialect: Dialect) -> Vec<ParameterStyle> {
        if self.supported_parameter_styles.is_empty() {
            dialect.recognized_parameter_styles().to_vec()
        } else {
            self.supported_parameter_styles.clone()
        }
    }

    pub fn target_style(&self) -> ParameterStyle {
        self.target_parameter_style
            .unwrap_or_else(|| self.dialect.default_parameter_style())
    }

    pub fn extractor(&self, dialect: Dialect) -> ParameterExtractor {
        ParameterExtractor::new(dialect, self.supported_styles_for(dialect))
    }

    /// Check the record for contradictions.
    pub fn validate(&self) -> KilnResult<()> {
        if !self.enable_parsing {
            if self.enable_validation {
                return Err(KilnError::config("validation requires parsing to be enabled"));
            }
            if self.enable_transformations {
                return Err(KilnError::config("transformations require parsing to be enabled"));
            }
        }
        let supported = self.supported_styles();
        if let Some(style) = self.parameter_style.filter(|s| !supported.contains(s)) {
            return Err(KilnError::config(format!(
                "parameter style '{}' is not among the supported styles for {} ({})",
                style,
                self.dialect,
                supported
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(())
    }
}

/// Builder for [`StatementConfig`].
#[derive(Debug, Default)]
pub struct StatementConfigBuilder {
    config: StatementConfig,
}

impl StatementConfigBuilder {
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    pub fn parsing(mut self, enabled: bool) -> Self {
        self.config.enable_parsing = enabled;
        self
    }

    pub fn validation(mut self, enabled: bool) -> Self {
        self.config.enable_validation = enabled;
        self
    }

    pub fn transformations(mut self, enabled: bool) -> Self {
        self.config.enable_transformations = enabled;
        self
    }

    pub fn caching(mut self, enabled: bool) -> Self {
        self.config.enable_caching = enabled;
        self
    }

    /// Turn off parsing and the stages that need a tree.
    pub fn text_only(self) -> Self {
        self.parsing(false).validation(false).transformations(false)
    }

    pub fn parameter_style(mut self, style: ParameterStyle) -> Self {
        self.config.parameter_style = Some(style);
        self
    }

    pub fn target_style(mut self, style: ParameterStyle) -> Self {
        self.config.target_parameter_style = Some(style);
        self
    }

    pub fn supported_styles(mut self, styles: impl IntoIterator<Item = ParameterStyle>) -> Self {
        let mut styles: Vec<ParameterStyle> = styles.into_iter().collect();
        styles.dedup();
        self.config.supported_parameter_styles = styles;
        self
    }

    pub fn literal_parameterization(mut self, enabled: bool) -> Self {
        self.config.literal_parameterization = enabled;
        self
    }

    pub fn validator(mut self, kind: FindingKind, mode: ValidatorMode) -> Self {
        self.config.validators = self.config.validators.with_mode(kind, mode);
        self
    }

    pub fn build(self) -> KilnResult<StatementConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Everything read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub statement: StatementConfig,
    pub cache: CacheConfig,
}

impl Settings {
    /// `<config dir>/sqlkiln/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sqlkiln").join("config.toml"))
    }

    pub fn from_toml(content: &str) -> KilnResult<Self> {
        let settings: Settings = toml::from_str(content).map_err(|e| KilnError::config(e.to_string()))?;
        settings.statement.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> KilnResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Load the default file if it exists, defaults otherwise.
    pub fn load_default() -> KilnResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults_follow_dialect() {
        let config = StatementConfig::for_dialect(Dialect::SqlServer);
        assert_eq!(config.target_style(), ParameterStyle::NamedAt);
        assert_eq!(
            config.supported_styles(),
            vec![ParameterStyle::NamedAt, ParameterStyle::Qmark]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_contradictions() {
        let err = StatementConfig::builder().parsing(false).build().unwrap_err();
        assert!(matches!(err, KilnError::Config(_)));

        assert!(StatementConfig::builder().text_only().build().is_ok());

        let err = StatementConfig::builder()
            .dialect(Dialect::Oracle)
            .parameter_style(ParameterStyle::Qmark)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not among the supported styles"));

        let ok = StatementConfig::builder()
            .dialect(Dialect::Oracle)
            .supported_styles([ParameterStyle::Qmark])
            .parameter_style(ParameterStyle::Qmark)
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_settings_from_toml() {
        let settings = Settings::from_toml(
            r#"
            [statement]
            dialect = "mysql"
            target_parameter_style = "named_colon"
            literal_parameterization = true

            [statement.validators]
            dml_safety = "warn"

            [cache]
            max_entries = 50
            "#,
        )
        .unwrap();

        assert_eq!(settings.statement.dialect, Dialect::MySQL);
        assert_eq!(settings.statement.target_style(), ParameterStyle::NamedColon);
        assert!(settings.statement.literal_parameterization);
        assert!(settings.statement.enable_caching);
        assert_eq!(settings.statement.validators.dml_safety, ValidatorMode::Warn);
        assert_eq!(settings.statement.validators.security, ValidatorMode::Block);
        assert_eq!(settings.cache.max_entries, 50);
    }

    #[test]
    fn test_bad_toml_is_a_config_error() {
        let err = Settings::from_toml("[statement]\ndialect = \"nosuchdb\"").unwrap_err();
        assert!(matches!(err, KilnError::Config(_)));
    }
}
