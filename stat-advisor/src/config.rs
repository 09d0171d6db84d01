//! Configuration for the advisor and its field resolution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AdvisorError, Result};
use crate::model::SuggestionType;

/// Configuration shared by every component of the advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Maximum variable count for which a plan is generated without asking (default: 5)
    pub auto_generate_threshold: usize,
    /// Run descriptive suggestions without review (default: true)
    pub auto_execute_descriptive: bool,
    /// Run normality checks without review (default: true)
    pub auto_execute_normality: bool,
    /// Significance level of proposed tests (default: 0.05)
    pub default_alpha: f64,
    /// Confidence level of reported intervals (default: 0.95)
    pub default_confidence_level: f64,
    /// Keep foundational-paper methods in the context (default: true)
    pub enable_literature_grounding: bool,
    /// Maximum number of normality checks proposed (default: 3)
    pub max_normality_checks: usize,
    /// Bound on one external generation call; `None` waits indefinitely (default: 30s)
    #[serde(with = "optional_secs")]
    pub ai_timeout: Option<Duration>,
    /// Field resolution order and ambiguity handling
    pub resolution: ResolutionConfig,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            auto_generate_threshold: 5,
            auto_execute_descriptive: true,
            auto_execute_normality: true,
            default_alpha: 0.05,
            default_confidence_level: 0.95,
            enable_literature_grounding: true,
            max_normality_checks: 3,
            ai_timeout: Some(Duration::from_secs(30)),
            resolution: ResolutionConfig::default(),
        }
    }
}

impl AdvisorConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> AdvisorConfigBuilder {
        AdvisorConfigBuilder {
            config: AdvisorConfig::default(),
        }
    }

    /// A configuration where nothing runs without review.
    pub fn review_everything() -> Self {
        Self {
            auto_execute_descriptive: false,
            auto_execute_normality: false,
            ..Self::default()
        }
    }

    /// Returns true if suggestions of this type may run without review.
    ///
    /// Only descriptive statistics and normality checks can ever qualify.
    pub fn allows_auto_execution(&self, suggestion_type: SuggestionType) -> bool {
        match suggestion_type {
            SuggestionType::Descriptive => self.auto_execute_descriptive,
            SuggestionType::NormalityCheck => self.auto_execute_normality,
            _ => false,
        }
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.default_alpha > 0.0 && self.default_alpha < 1.0) {
            return Err(AdvisorError::Configuration(format!(
                "default_alpha must be in (0, 1), got {}",
                self.default_alpha
            )));
        }
        if !(self.default_confidence_level > 0.0 && self.default_confidence_level < 1.0) {
            return Err(AdvisorError::Configuration(format!(
                "default_confidence_level must be in (0, 1), got {}",
                self.default_confidence_level
            )));
        }
        if self.resolution.strategies.is_empty() {
            return Err(AdvisorError::Configuration(
                "at least one field resolution strategy is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`AdvisorConfig`].
#[derive(Debug, Clone)]
pub struct AdvisorConfigBuilder {
    config: AdvisorConfig,
}

impl AdvisorConfigBuilder {
    pub fn auto_generate_threshold(mut self, threshold: usize) -> Self {
        self.config.auto_generate_threshold = threshold;
        self
    }

    pub fn auto_execute_descriptive(mut self, enable: bool) -> Self {
        self.config.auto_execute_descriptive = enable;
        self
    }

    pub fn auto_execute_normality(mut self, enable: bool) -> Self {
        self.config.auto_execute_normality = enable;
        self
    }

    pub fn default_alpha(mut self, alpha: f64) -> Self {
        self.config.default_alpha = alpha;
        self
    }

    pub fn default_confidence_level(mut self, level: f64) -> Self {
        self.config.default_confidence_level = level;
        self
    }

    pub fn enable_literature_grounding(mut self, enable: bool) -> Self {
        self.config.enable_literature_grounding = enable;
        self
    }

    pub fn max_normality_checks(mut self, max: usize) -> Self {
        self.config.max_normality_checks = max;
        self
    }

    pub fn ai_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.ai_timeout = timeout;
        self
    }

    pub fn resolution(mut self, resolution: ResolutionConfig) -> Self {
        self.config.resolution = resolution;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<AdvisorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// One way of locating a variable's field in a record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Field key equals the variable id
    Id,
    /// Field key equals the declared variable name
    Name,
    /// Field key equals the snake_case form of the name
    SnakeCaseName,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::Id => "id",
            ResolutionStrategy::Name => "name",
            ResolutionStrategy::SnakeCaseName => "snake-case-name",
        }
    }
}

/// Order in which tables and strategies are tried when resolving a field.
///
/// Tables listed in `table_priority` are visited first, in that order; every
/// other table follows in lexicographic order. The first table with a match
/// wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    pub table_priority: Vec<String>,
    pub strategies: Vec<ResolutionStrategy>,
    /// Keep scanning after a match and report other tables holding a different value
    pub flag_ambiguous: bool,
    /// Cap on ambiguous matches kept in diagnostics; the total is always counted
    pub max_reported_ambiguities: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            table_priority: Vec::new(),
            strategies: vec![
                ResolutionStrategy::Id,
                ResolutionStrategy::Name,
                ResolutionStrategy::SnakeCaseName,
            ],
            flag_ambiguous: true,
            max_reported_ambiguities: 50,
        }
    }
}

impl ResolutionConfig {
    /// Strict resolution on variable ids only.
    pub fn ids_only() -> Self {
        Self {
            strategies: vec![ResolutionStrategy::Id],
            ..Self::default()
        }
    }

    pub fn with_table_priority<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_priority = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flag_ambiguous(mut self, enable: bool) -> Self {
        self.flag_ambiguous = enable;
        self
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64))
    }
}
