use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use eco_schema::Severity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{load_with_fallback, ConfigSource};

pub const BUILTIN_ANALYSIS_CONFIG: &str = include_str!("data/analysis_config.json");

/// Fewest aligned points a pair may have and still be correlated.
pub const MIN_SAMPLES: usize = 3;

pub const ANALYSIS_CONFIG_ENV: &str = "ECO_ANALYSIS_CONFIG_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// Every pair is aligned on its own shared timestamps.
    #[default]
    Pairwise,
    /// All selected series are aligned on one common intersection first.
    Common,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    min_samples: usize,
    zero_variance_epsilon: f64,
    alignment: AlignmentMode,
    parallel_pair_threshold: usize,
    severity: SeverityBands,
    templates: Vec<TitleTemplate>,
    generic_template: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_samples: MIN_SAMPLES,
            zero_variance_epsilon: 1e-12,
            alignment: AlignmentMode::Pairwise,
            parallel_pair_threshold: 64,
            severity: SeverityBands::default(),
            templates: Vec::new(),
            generic_template: "{first} and {second}: {direction} relationship".to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            Self::from_json_str(BUILTIN_ANALYSIS_CONFIG)
                .expect("builtin analysis config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, AnalysisConfigError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AnalysisConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| AnalysisConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Variance floor for a series after it is divided by its largest magnitude.
    pub fn zero_variance_epsilon(&self) -> f64 {
        self.zero_variance_epsilon
    }

    pub fn alignment(&self) -> AlignmentMode {
        self.alignment
    }

    pub fn parallel_pair_threshold(&self) -> usize {
        self.parallel_pair_threshold
    }

    pub fn severity(&self) -> &SeverityBands {
        &self.severity
    }

    pub fn templates(&self) -> &[TitleTemplate] {
        &self.templates
    }

    pub fn generic_template(&self) -> &str {
        &self.generic_template
    }

    pub fn with_alignment(mut self, alignment: AlignmentMode) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_parallel_pair_threshold(mut self, threshold: usize) -> Self {
        self.parallel_pair_threshold = threshold;
        self
    }

    /// Find the template registered for an unordered category pair.
    pub fn template_for(&self, a: &str, b: &str) -> Option<&TitleTemplate> {
        self.templates.iter().find(|template| template.matches(a, b))
    }

    fn validate(&self) -> Result<(), AnalysisConfigError> {
        if self.min_samples < MIN_SAMPLES {
            return Err(invalid(format!(
                "min_samples must be at least {MIN_SAMPLES}, got {}",
                self.min_samples
            )));
        }
        if !self.zero_variance_epsilon.is_finite() || self.zero_variance_epsilon < 0.0 {
            return Err(invalid("zero_variance_epsilon must be finite and non-negative"));
        }
        self.severity.validate()?;
        if self.generic_template.trim().is_empty() {
            return Err(invalid("generic_template must not be empty"));
        }

        let mut seen = HashSet::new();
        for template in &self.templates {
            if template.text.trim().is_empty() {
                return Err(invalid(format!(
                    "template for {}/{} has no text",
                    template.categories[0], template.categories[1]
                )));
            }
            if !seen.insert(template.key()) {
                return Err(invalid(format!(
                    "duplicate template for {}/{}",
                    template.categories[0], template.categories[1]
                )));
            }
        }
        Ok(())
    }
}

/// Fixed |r| / confidence thresholds. Evaluated Critical, High, Moderate; anything else is Low.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SeverityBands {
    critical: SeverityBand,
    high: SeverityBand,
    moderate: SeverityBand,
    low_summary: String,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            critical: SeverityBand {
                min_abs_r: 0.85,
                min_confidence: Some(0.8),
                summary: "Critical correlation detected".to_string(),
            },
            high: SeverityBand {
                min_abs_r: 0.65,
                min_confidence: None,
                summary: "Strong correlation detected".to_string(),
            },
            moderate: SeverityBand {
                min_abs_r: 0.4,
                min_confidence: None,
                summary: "Moderate correlation detected".to_string(),
            },
            low_summary: "Weak correlation detected".to_string(),
        }
    }
}

impl SeverityBands {
    pub fn classify(&self, abs_r: f64, confidence: f64) -> Severity {
        if self.critical.admits(abs_r, confidence) {
            Severity::Critical
        } else if self.high.admits(abs_r, confidence) {
            Severity::High
        } else if self.moderate.admits(abs_r, confidence) {
            Severity::Moderate
        } else {
            Severity::Low
        }
    }

    pub fn summary(&self, severity: Severity) -> &str {
        match severity {
            Severity::Critical => &self.critical.summary,
            Severity::High => &self.high.summary,
            Severity::Moderate => &self.moderate.summary,
            Severity::Low => &self.low_summary,
        }
    }

    fn validate(&self) -> Result<(), AnalysisConfigError> {
        for (name, band) in [
            ("critical", &self.critical),
            ("high", &self.high),
            ("moderate", &self.moderate),
        ] {
            if !(0.0..=1.0).contains(&band.min_abs_r) {
                return Err(invalid(format!("{name}.min_abs_r must be within [0, 1]")));
            }
            if let Some(confidence) = band.min_confidence {
                if !(0.0..=1.0).contains(&confidence) {
                    return Err(invalid(format!(
                        "{name}.min_confidence must be within [0, 1]"
                    )));
                }
            }
        }
        if self.critical.min_abs_r < self.high.min_abs_r
            || self.high.min_abs_r < self.moderate.min_abs_r
        {
            return Err(invalid(
                "severity thresholds must not increase from critical to moderate",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SeverityBand {
    pub min_abs_r: f64,
    pub min_confidence: Option<f64>,
    pub summary: String,
}

impl SeverityBand {
    fn admits(&self, abs_r: f64, confidence: f64) -> bool {
        abs_r >= self.min_abs_r
            && self
                .min_confidence
                .map_or(true, |minimum| confidence >= minimum)
    }
}

/// Title text for one unordered category pairing.
///
/// `{first}` renders the series whose category is `categories[0]`, `{second}` the other one and
/// `{direction}` the sign word of the coefficient.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TitleTemplate {
    pub categories: [String; 2],
    pub text: String,
}

impl TitleTemplate {
    pub fn matches(&self, a: &str, b: &str) -> bool {
        (self.categories[0] == a && self.categories[1] == b)
            || (self.categories[0] == b && self.categories[1] == a)
    }

    fn key(&self) -> (String, String) {
        let [a, b] = &self.categories;
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisConfigError {
    #[error("failed to parse analysis config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read analysis config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid analysis config: {reason}")]
    Invalid { reason: String },
}

fn invalid(reason: impl Into<String>) -> AnalysisConfigError {
    AnalysisConfigError::Invalid {
        reason: reason.into(),
    }
}

/// Load the analysis config from `ECO_ANALYSIS_CONFIG_PATH` or the crate's data directory.
pub fn load_analysis_config_from_env() -> (Arc<AnalysisConfig>, ConfigSource) {
    let default_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/analysis_config.json");
    load_with_fallback(
        "analysis",
        ANALYSIS_CONFIG_ENV,
        default_path,
        AnalysisConfig::from_file,
        AnalysisConfig::builtin,
    )
}
