//! Data tables driving the scenario model: driver domains, metric sensitivities, tipping rules and
//! classification bands.
//!
//! Loaded from `scenario_config.json`; `ECO_SCENARIO_CONFIG_PATH` overrides the file location.

use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use eco_schema::{Driver, MetricClass, Severity};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{load_with_fallback, ConfigSource};

pub const BUILTIN_SCENARIO_CONFIG: &str = include_str!("data/scenario_config.json");

pub const SCENARIO_CONFIG_ENV: &str = "ECO_SCENARIO_CONFIG_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScenarioConfig {
    drivers: DriverDomains,
    metrics: Vec<MetricSpec>,
    tipping_rules: Vec<TippingRule>,
    bands: ClassBands,
}

impl ScenarioConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            Self::from_json_str(BUILTIN_SCENARIO_CONFIG)
                .expect("builtin scenario config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, ScenarioConfigError> {
        let mut config: ScenarioConfig = serde_json::from_str(json)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScenarioConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ScenarioConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn drivers(&self) -> &DriverDomains {
        &self.drivers
    }

    pub fn metrics(&self) -> &[MetricSpec] {
        &self.metrics
    }

    pub fn metric(&self, id: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|metric| metric.id == id)
    }

    pub fn tipping_rules(&self) -> &[TippingRule] {
        &self.tipping_rules
    }

    /// Rules registered for a metric, in declaration order.
    pub fn rules_for<'a>(&'a self, metric: &'a str) -> impl Iterator<Item = &'a TippingRule> + 'a {
        self.tipping_rules
            .iter()
            .filter(move |rule| rule.metric == metric)
    }

    pub fn bands(&self) -> &ClassBands {
        &self.bands
    }

    /// Append a tipping rule; the table is re-validated before it is accepted.
    pub fn with_tipping_rule(mut self, rule: TippingRule) -> Result<Self, ScenarioConfigError> {
        self.tipping_rules.push(rule);
        self.normalize();
        self.validate()?;
        Ok(self)
    }

    /// Replace the metric table; the config is re-validated before it is accepted.
    pub fn with_metrics(mut self, metrics: Vec<MetricSpec>) -> Result<Self, ScenarioConfigError> {
        self.metrics = metrics;
        self.tipping_rules
            .retain(|rule| self.metrics.iter().any(|metric| metric.id == rule.metric));
        self.normalize();
        self.validate()?;
        Ok(self)
    }

    fn normalize(&mut self) {
        for rule in &mut self.tipping_rules {
            if rule.id.is_empty() {
                rule.id = format!("{}:{}>{}", rule.metric, rule.driver, rule.threshold);
            }
        }
    }

    fn validate(&self) -> Result<(), ScenarioConfigError> {
        for driver in Driver::ALL {
            let domain = self.drivers.domain(driver);
            if !(domain.min.is_finite() && domain.max.is_finite() && domain.default.is_finite()) {
                return Err(invalid(format!("{driver} domain must be finite")));
            }
            if domain.min >= domain.max {
                return Err(invalid(format!("{driver} domain min must be below max")));
            }
            if !(domain.min..=domain.max).contains(&domain.default) {
                return Err(invalid(format!("{driver} default lies outside its domain")));
            }
        }

        let mut ids = HashSet::new();
        for metric in &self.metrics {
            metric.validate()?;
            if !ids.insert(metric.id.as_str()) {
                return Err(invalid(format!("duplicate metric id {}", metric.id)));
            }
        }

        let mut rule_ids = HashSet::new();
        for rule in &self.tipping_rules {
            if !ids.contains(rule.metric.as_str()) {
                return Err(invalid(format!(
                    "tipping rule {} names unknown metric {}",
                    rule.id, rule.metric
                )));
            }
            if !rule.threshold.is_finite() {
                return Err(invalid(format!("tipping rule {} threshold is not finite", rule.id)));
            }
            if !rule.penalty.is_finite() || rule.penalty < 1.0 {
                return Err(invalid(format!(
                    "tipping rule {} penalty must be a finite factor >= 1",
                    rule.id
                )));
            }
            if !rule_ids.insert(rule.id.as_str()) {
                return Err(invalid(format!("duplicate tipping rule id {}", rule.id)));
            }
        }

        self.bands.percentage.validate("percentage")?;
        self.bands.index.validate("index")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DriverDomain {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl Default for DriverDomain {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            default: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DriverDomains {
    pub temperature: DriverDomain,
    pub rainfall: DriverDomain,
    pub emissions: DriverDomain,
}

impl Default for DriverDomains {
    fn default() -> Self {
        Self {
            temperature: DriverDomain {
                min: 0.0,
                max: 5.0,
                default: 2.0,
            },
            rainfall: DriverDomain {
                min: -50.0,
                max: 50.0,
                default: 0.0,
            },
            emissions: DriverDomain {
                min: 0.0,
                max: 50.0,
                default: 10.0,
            },
        }
    }
}

impl DriverDomains {
    pub fn domain(&self, driver: Driver) -> DriverDomain {
        match driver {
            Driver::Temperature => self.temperature,
            Driver::Rainfall => self.rainfall,
            Driver::Emissions => self.emissions,
        }
    }
}

/// Linear response of a metric to each driver, per unit of the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Sensitivity {
    pub temperature: f64,
    pub rainfall: f64,
    pub emissions: f64,
}

impl Sensitivity {
    pub fn new(temperature: f64, rainfall: f64, emissions: f64) -> Self {
        Self {
            temperature,
            rainfall,
            emissions,
        }
    }

    pub fn get(&self, driver: Driver) -> f64 {
        match driver {
            Driver::Temperature => self.temperature,
            Driver::Rainfall => self.rainfall,
            Driver::Emissions => self.emissions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MetricSpec {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub class: MetricClass,
    pub baseline: f64,
    pub min: f64,
    pub max: f64,
    pub sensitivity: Sensitivity,
    pub higher_is_better: bool,
}

impl Default for MetricSpec {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            unit: String::new(),
            class: MetricClass::Percentage,
            baseline: 0.0,
            min: 0.0,
            max: 100.0,
            sensitivity: Sensitivity::default(),
            higher_is_better: true,
        }
    }
}

impl MetricSpec {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        class: MetricClass,
        baseline: f64,
        (min, max): (f64, f64),
        sensitivity: Sensitivity,
    ) -> Self {
        let unit = match class {
            MetricClass::Percentage => "%",
            MetricClass::Index => "",
        };
        Self {
            id: id.into(),
            name: name.into(),
            unit: unit.to_string(),
            class,
            baseline,
            min,
            max,
            sensitivity,
            higher_is_better: true,
        }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Position of `value` within the domain, in [0, 1].
    pub fn fraction(&self, value: f64) -> f64 {
        ((value - self.min) / self.span()).clamp(0.0, 1.0)
    }

    fn validate(&self) -> Result<(), ScenarioConfigError> {
        if self.id.trim().is_empty() {
            return Err(invalid("metric id must not be empty"));
        }
        let numbers = [
            self.baseline,
            self.min,
            self.max,
            self.sensitivity.temperature,
            self.sensitivity.rainfall,
            self.sensitivity.emissions,
        ];
        if numbers.iter().any(|value| !value.is_finite()) {
            return Err(invalid(format!("metric {} has non-finite values", self.id)));
        }
        if self.min >= self.max {
            return Err(invalid(format!("metric {} domain min must be below max", self.id)));
        }
        if !(self.min..=self.max).contains(&self.baseline) {
            return Err(invalid(format!(
                "metric {} baseline {} lies outside [{}, {}]",
                self.id, self.baseline, self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Crossing {
    /// Only the part of the driver value above the threshold is amplified.
    #[default]
    Excess,
    /// The metric's whole linear delta is amplified once the threshold is crossed.
    Full,
}

/// "If `driver` exceeds `threshold`, amplify the metric's response by `penalty`."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TippingRule {
    pub id: String,
    pub metric: String,
    pub driver: Driver,
    pub threshold: f64,
    pub penalty: f64,
    pub crossing: Crossing,
}

impl Default for TippingRule {
    fn default() -> Self {
        Self {
            id: String::new(),
            metric: String::new(),
            driver: Driver::Temperature,
            threshold: 0.0,
            penalty: 1.0,
            crossing: Crossing::Excess,
        }
    }
}

impl TippingRule {
    pub fn new(metric: impl Into<String>, threshold: f64, penalty: f64) -> Self {
        Self {
            metric: metric.into(),
            threshold,
            penalty,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    pub fn with_crossing(mut self, crossing: Crossing) -> Self {
        self.crossing = crossing;
        self
    }

    pub fn fires(&self, value: f64) -> bool {
        value > self.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeltaMeasure {
    /// Raw delta in the metric's own units (percentage points).
    #[default]
    Points,
    /// Delta as a percentage of the metric's domain span.
    SpanPercent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Band {
    pub threshold: f64,
    pub label: String,
    pub severity: Severity,
}

impl Default for Band {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            label: String::new(),
            severity: Severity::Low,
        }
    }
}

impl Band {
    fn new(threshold: f64, label: &str, severity: Severity) -> Self {
        Self {
            threshold,
            label: label.to_string(),
            severity,
        }
    }
}

/// Bands for one metric class. Declines and improvements are matched on the delta magnitude,
/// first band (largest threshold) wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BandTable {
    pub measure: DeltaMeasure,
    pub decline: Vec<Band>,
    pub improvement: Vec<Band>,
    pub stable: Band,
}

impl Default for BandTable {
    fn default() -> Self {
        Self::percentage()
    }
}

impl BandTable {
    fn percentage() -> Self {
        Self {
            measure: DeltaMeasure::Points,
            decline: vec![
                Band::new(40.0, "Critical Threat", Severity::Critical),
                Band::new(25.0, "Significant Decrease", Severity::High),
                Band::new(10.0, "Moderate Decline", Severity::Moderate),
                Band::new(2.0, "Slight Decline", Severity::Low),
            ],
            improvement: vec![
                Band::new(25.0, "Major Improvement", Severity::Low),
                Band::new(10.0, "Improved Capacity", Severity::Low),
                Band::new(2.0, "Slight Improvement", Severity::Low),
            ],
            stable: Band::new(0.0, "Stable", Severity::Low),
        }
    }

    fn index() -> Self {
        Self {
            measure: DeltaMeasure::SpanPercent,
            decline: vec![
                Band::new(15.0, "Critical Threat", Severity::Critical),
                Band::new(8.0, "Significant Decrease", Severity::High),
                Band::new(3.0, "Moderate Decline", Severity::Moderate),
                Band::new(1.0, "Slight Decline", Severity::Low),
            ],
            improvement: vec![
                Band::new(8.0, "Major Improvement", Severity::Low),
                Band::new(3.0, "Improved Capacity", Severity::Low),
                Band::new(1.0, "Slight Improvement", Severity::Low),
            ],
            stable: Band::new(0.0, "Stable", Severity::Low),
        }
    }

    fn validate(&self, class: &str) -> Result<(), ScenarioConfigError> {
        for (direction, bands) in [("decline", &self.decline), ("improvement", &self.improvement)]
        {
            for band in bands {
                if !band.threshold.is_finite() || band.threshold <= 0.0 {
                    return Err(invalid(format!(
                        "{class} {direction} band {:?} needs a positive threshold",
                        band.label
                    )));
                }
            }
            if bands
                .windows(2)
                .any(|pair| pair[1].threshold >= pair[0].threshold)
            {
                return Err(invalid(format!(
                    "{class} {direction} bands must be listed with strictly decreasing thresholds"
                )));
            }
        }
        if self.stable.label.is_empty() {
            return Err(invalid(format!("{class} stable band needs a label")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ClassBands {
    pub percentage: BandTable,
    pub index: BandTable,
}

impl Default for ClassBands {
    fn default() -> Self {
        Self {
            percentage: BandTable::percentage(),
            index: BandTable::index(),
        }
    }
}

impl ClassBands {
    pub fn for_class(&self, class: MetricClass) -> &BandTable {
        match class {
            MetricClass::Percentage => &self.percentage,
            MetricClass::Index => &self.index,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScenarioConfigError {
    #[error("failed to parse scenario config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read scenario config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid scenario config: {reason}")]
    Invalid { reason: String },
}

fn invalid(reason: impl Into<String>) -> ScenarioConfigError {
    ScenarioConfigError::Invalid {
        reason: reason.into(),
    }
}

/// Load the scenario config from `ECO_SCENARIO_CONFIG_PATH` or the crate's data directory.
pub fn load_scenario_config_from_env() -> (Arc<ScenarioConfig>, ConfigSource) {
    let default_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/scenario_config.json");
    load_with_fallback(
        "scenario",
        SCENARIO_CONFIG_ENV,
        default_path,
        ScenarioConfig::from_file,
        ScenarioConfig::builtin,
    )
}
