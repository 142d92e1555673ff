use std::sync::Arc;

use eco_schema::{AnalysisReport, AnalysisSummary, ProjectionReport, ScenarioParameters};

use crate::analysis_config::{load_analysis_config_from_env, AnalysisConfig};
use crate::correlation::CorrelationAnalyzer;
use crate::insights::InsightRanker;
use crate::scenario::ScenarioModel;
use crate::scenario_config::{load_scenario_config_from_env, ScenarioConfig};
use crate::store::{SeriesStore, StoreError};

/// The two request/response operations of the engine, bound to one pair of rule tables.
///
/// Holds no per-request state; a single engine can serve any number of stores and parameter sets.
#[derive(Debug, Clone)]
pub struct EcoEngine {
    analyzer: CorrelationAnalyzer,
    ranker: InsightRanker,
    scenario: ScenarioModel,
}

impl EcoEngine {
    pub fn new(analysis: Arc<AnalysisConfig>, scenario: Arc<ScenarioConfig>) -> Self {
        Self {
            analyzer: CorrelationAnalyzer::new(Arc::clone(&analysis)),
            ranker: InsightRanker::new(analysis),
            scenario: ScenarioModel::new(scenario),
        }
    }

    pub fn builtin() -> Self {
        Self::new(AnalysisConfig::builtin(), ScenarioConfig::builtin())
    }

    /// Load both rule tables from their environment overrides, falling back to the builtins.
    pub fn from_env() -> Self {
        let (analysis, _) = load_analysis_config_from_env();
        let (scenario, _) = load_scenario_config_from_env();
        Self::new(analysis, scenario)
    }

    pub fn analysis_config(&self) -> &AnalysisConfig {
        self.analyzer.config()
    }

    pub fn scenario_config(&self) -> &ScenarioConfig {
        self.scenario.config()
    }

    pub fn scenario_model(&self) -> &ScenarioModel {
        &self.scenario
    }

    /// Rank the correlations among `subset` (all series when `None` or empty).
    ///
    /// Freezes `store`. Fails only for unknown identifiers or, in common alignment mode, when the
    /// selection does not overlap enough; individual bad pairs become diagnostics.
    pub fn analyze_correlations(
        &self,
        store: &SeriesStore,
        subset: Option<&[&str]>,
    ) -> Result<AnalysisReport, StoreError> {
        let outcome = self.analyzer.analyze(store, subset)?;
        let insights = self.ranker.rank(store, &outcome.results);
        let summary = AnalysisSummary::from_insights(
            outcome.series_count,
            &insights,
            outcome.diagnostics.len(),
        );
        Ok(AnalysisReport::new(insights, outcome.diagnostics, summary))
    }

    pub fn run_scenario(&self, parameters: ScenarioParameters) -> ProjectionReport {
        self.scenario.project(parameters)
    }
}

impl Default for EcoEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Series;
    use eco_schema::ExclusionReason;

    #[test]
    fn analysis_report_summarises_insights_and_exclusions() {
        let mut store = SeriesStore::new();
        store
            .add("air", Series::from_values("AQI", [40.0, 45.0, 52.0, 58.0, 61.0]))
            .unwrap();
        store
            .add("water", Series::from_values("%", [70.0, 68.0, 64.0, 61.0, 57.0]))
            .unwrap();
        store
            .add("flat", Series::from_values("ppm", [1.0, 1.0, 1.0, 1.0, 1.0]))
            .unwrap();

        let report = EcoEngine::builtin()
            .analyze_correlations(&store, None)
            .unwrap();
        assert_eq!(report.insights().len(), 1);
        assert_eq!(report.diagnostics().len(), 2);
        assert!(report
            .diagnostics()
            .iter()
            .all(|d| matches!(&d.reason, ExclusionReason::ZeroVariance { series } if series == "flat")));

        let summary = report.summary();
        assert_eq!(summary.series_count, 3);
        assert_eq!(summary.correlation_count, 1);
        assert_eq!(summary.excluded_count, 2);
        assert!(store.is_frozen());
    }

    #[test]
    fn unknown_subset_identifier_fails_the_call() {
        let store = SeriesStore::new();
        let err = EcoEngine::builtin()
            .analyze_correlations(&store, Some(&["missing"][..]))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn scenario_uses_the_bound_tables() {
        let engine = EcoEngine::builtin();
        let report = engine.run_scenario(ScenarioParameters::default());
        assert_eq!(report.metrics().len(), engine.scenario_config().metrics().len());
    }
}
