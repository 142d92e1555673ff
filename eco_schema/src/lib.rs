//! Plain records exchanged between the correlation/scenario engine and its callers.
//!
//! Everything in this crate is serializable and free of engine logic so presentation layers can
//! render or export results without depending on `eco_core`.

use ahash::RandomState;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

/// Impact tier shared by insights and scenario bands. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Moderate,
        Severity::Low,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Moderate => "Moderate",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Low
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unordered pair of series identifiers, stored with the lexicographically smaller id first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesPair {
    first: String,
    second: String,
}

impl SeriesPair {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let a = a.into();
        let b = b.into();
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn contains(&self, id: &str) -> bool {
        self.first == id || self.second == id
    }
}

impl fmt::Display for SeriesPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.first, self.second)
    }
}

/// Sign of a correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increasing,
    Decreasing,
    Flat,
}

impl Direction {
    pub fn from_coefficient(r: f64) -> Self {
        if r > 0.0 {
            Direction::Increasing
        } else if r < 0.0 {
            Direction::Decreasing
        } else {
            Direction::Flat
        }
    }

    /// Word substituted into insight titles.
    pub fn word(self) -> &'static str {
        match self {
            Direction::Increasing => "increasing",
            Direction::Decreasing => "decreasing",
            Direction::Flat => "unrelated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub pair: SeriesPair,
    /// Pearson coefficient in [-1, 1].
    pub coefficient: f64,
    pub sample_size: u32,
    /// Confidence in [0, 1]; grows with both |r| and sample size.
    pub confidence: f64,
}

impl CorrelationResult {
    pub fn direction(&self) -> Direction {
        Direction::from_coefficient(self.coefficient)
    }

    pub fn strength(&self) -> f64 {
        self.coefficient.abs()
    }
}

/// Why a pair was left out of an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum ExclusionReason {
    InsufficientSamples { aligned: u32, required: u32 },
    ZeroVariance { series: String },
}

impl ExclusionReason {
    pub fn code(&self) -> &'static str {
        match self {
            ExclusionReason::InsufficientSamples { .. } => "insufficient-samples",
            ExclusionReason::ZeroVariance { .. } => "zero-variance",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::InsufficientSamples { aligned, required } => write!(
                f,
                "insufficient-samples ({aligned} aligned, {required} required)"
            ),
            ExclusionReason::ZeroVariance { series } => write!(f, "zero-variance ({series})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub pair: SeriesPair,
    pub reason: ExclusionReason,
}

/// Ranked, human-readable summary of one correlation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub pair: SeriesPair,
    pub title: String,
    pub summary: String,
    pub severity: Severity,
    pub direction: Direction,
    pub coefficient: f64,
    pub sample_size: u32,
    pub confidence: f64,
    pub confidence_pct: u8,
}

impl Insight {
    /// Ranking order: severity descending, confidence descending, pair ascending.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| other.confidence.total_cmp(&self.confidence))
            .then_with(|| self.pair.cmp(&other.pair))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub series_count: u32,
    pub correlation_count: u32,
    pub critical_count: u32,
    pub excluded_count: u32,
    pub mean_confidence_pct: f64,
}

impl AnalysisSummary {
    pub fn from_insights(series_count: usize, insights: &[Insight], excluded: usize) -> Self {
        let critical_count = insights
            .iter()
            .filter(|insight| insight.severity == Severity::Critical)
            .count();
        let mean_confidence_pct = if insights.is_empty() {
            0.0
        } else {
            let total: f64 = insights.iter().map(|insight| insight.confidence).sum();
            total / insights.len() as f64 * 100.0
        };
        Self {
            series_count: series_count as u32,
            correlation_count: insights.len() as u32,
            critical_count: critical_count as u32,
            excluded_count: excluded as u32,
            mean_confidence_pct,
        }
    }
}

/// Output of one correlation analysis request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    insights: Vec<Insight>,
    diagnostics: Vec<Diagnostic>,
    summary: AnalysisSummary,
    hash: u64,
}

impl AnalysisReport {
    pub fn new(
        insights: Vec<Insight>,
        diagnostics: Vec<Diagnostic>,
        summary: AnalysisSummary,
    ) -> Self {
        let hash = fingerprint(&(&insights, &diagnostics, &summary));
        Self {
            insights,
            diagnostics,
            summary,
            hash,
        }
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn summary(&self) -> &AnalysisSummary {
        &self.summary
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn insight_for(&self, pair: &SeriesPair) -> Option<&Insight> {
        self.insights.iter().find(|insight| &insight.pair == pair)
    }

    pub fn into_parts(self) -> (Vec<Insight>, Vec<Diagnostic>) {
        (self.insights, self.diagnostics)
    }
}

/// Driver parameters of the scenario model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    Temperature,
    Rainfall,
    Emissions,
}

impl Driver {
    pub const ALL: [Driver; 3] = [Driver::Temperature, Driver::Rainfall, Driver::Emissions];

    pub fn unit(self) -> &'static str {
        match self {
            Driver::Temperature => "°C",
            Driver::Rainfall => "%",
            Driver::Emissions => "Gt/yr",
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::Temperature
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Driver::Temperature => "temperature",
            Driver::Rainfall => "rainfall",
            Driver::Emissions => "emissions",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParameters {
    #[serde(alias = "temperatureDeltaC")]
    pub temperature_delta_c: f64,
    #[serde(alias = "rainfallDeltaPct")]
    pub rainfall_delta_pct: f64,
    #[serde(alias = "emissionsGtPerYr")]
    pub emissions_gt_per_yr: f64,
}

impl ScenarioParameters {
    pub fn new(temperature_delta_c: f64, rainfall_delta_pct: f64, emissions_gt_per_yr: f64) -> Self {
        Self {
            temperature_delta_c,
            rainfall_delta_pct,
            emissions_gt_per_yr,
        }
    }

    pub fn get(&self, driver: Driver) -> f64 {
        match driver {
            Driver::Temperature => self.temperature_delta_c,
            Driver::Rainfall => self.rainfall_delta_pct,
            Driver::Emissions => self.emissions_gt_per_yr,
        }
    }

    pub fn set(&mut self, driver: Driver, value: f64) {
        match driver {
            Driver::Temperature => self.temperature_delta_c = value,
            Driver::Rainfall => self.rainfall_delta_pct = value,
            Driver::Emissions => self.emissions_gt_per_yr = value,
        }
    }
}

impl Default for ScenarioParameters {
    fn default() -> Self {
        Self {
            temperature_delta_c: 2.0,
            rainfall_delta_pct: 0.0,
            emissions_gt_per_yr: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampKind {
    BelowMin,
    AboveMax,
    NonFinite,
}

/// A parameter that was moved into its declared domain before projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterWarning {
    pub driver: Driver,
    /// `None` when the requested value was NaN.
    pub requested: Option<f64>,
    pub applied: f64,
    pub kind: ClampKind,
}

impl fmt::Display for ParameterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.requested {
            Some(requested) => write!(
                f,
                "{} {requested} clamped to {} {}",
                self.driver,
                self.applied,
                self.driver.unit()
            ),
            None => write!(
                f,
                "{} NaN replaced with {} {}",
                self.driver,
                self.applied,
                self.driver.unit()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricClass {
    Percentage,
    Index,
}

impl Default for MetricClass {
    fn default() -> Self {
        MetricClass::Percentage
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricProjection {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub class: MetricClass,
    pub baseline: f64,
    pub predicted: f64,
    pub delta: f64,
    /// Delta relative to the baseline, in percent. `None` for a zero baseline.
    pub change_pct: Option<f64>,
    pub domain_min: f64,
    pub domain_max: f64,
    pub baseline_fraction: f64,
    pub predicted_fraction: f64,
    pub label: String,
    pub severity: Severity,
    /// Ids of tipping rules that fired for this metric.
    pub tipping_rules: Vec<String>,
}

impl MetricProjection {
    pub fn tipping_point(&self) -> bool {
        !self.tipping_rules.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionHeader {
    /// Parameters after domain clamping; these are what the model used.
    pub parameters: ScenarioParameters,
    pub warnings: Vec<ParameterWarning>,
    pub tipping_point_detected: bool,
    pub outlook: Severity,
    pub hash: u64,
}

/// Current vs. predicted metrics for one scenario run. Immutable once finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionReport {
    header: ProjectionHeader,
    metrics: Vec<MetricProjection>,
}

impl ProjectionReport {
    pub fn new(
        parameters: ScenarioParameters,
        warnings: Vec<ParameterWarning>,
        metrics: Vec<MetricProjection>,
    ) -> Self {
        let tipping_point_detected = metrics.iter().any(MetricProjection::tipping_point);
        let outlook = metrics
            .iter()
            .map(|metric| metric.severity)
            .max()
            .unwrap_or_default();
        Self {
            header: ProjectionHeader {
                parameters,
                warnings,
                tipping_point_detected,
                outlook,
                hash: 0,
            },
            metrics,
        }
        .finalize()
    }

    fn finalize(mut self) -> Self {
        self.header.hash = hash_report(&self);
        self
    }

    pub fn header(&self) -> &ProjectionHeader {
        &self.header
    }

    pub fn parameters(&self) -> &ScenarioParameters {
        &self.header.parameters
    }

    pub fn warnings(&self) -> &[ParameterWarning] {
        &self.header.warnings
    }

    pub fn tipping_point_detected(&self) -> bool {
        self.header.tipping_point_detected
    }

    pub fn outlook(&self) -> Severity {
        self.header.outlook
    }

    pub fn hash(&self) -> u64 {
        self.header.hash
    }

    pub fn metrics(&self) -> &[MetricProjection] {
        &self.metrics
    }

    pub fn metric(&self, id: &str) -> Option<&MetricProjection> {
        self.metrics.iter().find(|metric| metric.id == id)
    }
}

pub fn hash_report(report: &ProjectionReport) -> u64 {
    let mut clone = report.clone();
    clone.header.hash = 0;
    fingerprint(&clone)
}

/// Deterministic hash of a record's bincode encoding.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> u64 {
    let encoded = bincode::serialize(value).expect("record serialization for hashing");
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&encoded);
    hasher.finish()
}

pub fn encode_report(report: &ProjectionReport) -> bincode::Result<Vec<u8>> {
    bincode::serialize(report)
}

pub fn decode_report(bytes: &[u8]) -> bincode::Result<ProjectionReport> {
    bincode::deserialize(bytes)
}
