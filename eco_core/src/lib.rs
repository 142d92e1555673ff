//! Environmental correlation and scenario projection engine.
//!
//! Two independent request/response operations sit on top of data-driven rule tables:
//! [`analyze_correlations`] ranks the pairwise relationships among the series of a
//! [`SeriesStore`], and [`run_scenario`] projects impact metrics from driver parameters.
//! Both are deterministic; use [`EcoEngine`] to bind non-default rule tables.

pub mod analysis_config;
mod config;
pub mod correlation;
mod engine;
pub mod insights;
pub mod report;
pub mod scenario;
pub mod scenario_config;
pub mod store;

pub use analysis_config::{
    load_analysis_config_from_env, AlignmentMode, AnalysisConfig, AnalysisConfigError,
    ANALYSIS_CONFIG_ENV,
};
pub use config::ConfigSource;
pub use correlation::{confidence, pearson, CorrelationAnalyzer, PairwiseOutcome};
pub use engine::EcoEngine;
pub use insights::InsightRanker;
pub use report::describe;
pub use scenario::{Prediction, ScenarioModel};
pub use scenario_config::{
    load_scenario_config_from_env, Crossing, MetricSpec, ScenarioConfig, ScenarioConfigError,
    TippingRule, SCENARIO_CONFIG_ENV,
};
pub use store::{AlignedSubset, Series, SeriesStore, StoreError, Timestamp, ValidationIssue};

pub use eco_schema::{
    AnalysisReport, AnalysisSummary, CorrelationResult, Diagnostic, Direction, Driver,
    ExclusionReason, Insight, MetricProjection, ParameterWarning, ProjectionReport,
    ScenarioParameters, SeriesPair, Severity,
};

/// Correlate and rank the series in `subset` using the builtin rule tables.
pub fn analyze_correlations(
    store: &SeriesStore,
    subset: Option<&[&str]>,
) -> Result<AnalysisReport, StoreError> {
    EcoEngine::builtin().analyze_correlations(store, subset)
}

/// Project the builtin metric table under `parameters`.
pub fn run_scenario(parameters: ScenarioParameters) -> ProjectionReport {
    EcoEngine::builtin().run_scenario(parameters)
}
