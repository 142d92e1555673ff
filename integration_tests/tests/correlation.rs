mod common;

use std::collections::HashSet;
use std::sync::Arc;

use eco_core::{
    AlignmentMode, AnalysisConfig, EcoEngine, ExclusionReason, ScenarioConfig, Series, SeriesPair,
    Severity, StoreError,
};

#[test]
fn fixture_insights_are_ranked_and_titled() -> anyhow::Result<()> {
    let store = common::fixture_store()?;
    let report = EcoEngine::builtin().analyze_correlations(&store, None)?;

    // 8 series, 28 pairs: 7 touch ocean_ph, 6 more touch the flat sensor
    assert_eq!(report.insights().len(), 15);
    assert_eq!(report.diagnostics().len(), 13);

    let first = &report.insights()[0];
    assert_eq!(first.pair, SeriesPair::new("air_quality", "co2"));
    assert_eq!(first.severity, Severity::High);
    assert_eq!(first.confidence_pct, 71);

    let last = report.insights().last().unwrap();
    assert_eq!(last.pair, SeriesPair::new("biodiversity", "soil_health"));
    assert_eq!(last.severity, Severity::Moderate);

    let title = |a: &str, b: &str| {
        report
            .insight_for(&SeriesPair::new(a, b))
            .map(|insight| insight.title.clone())
    };
    assert_eq!(
        title("temperature", "biodiversity").as_deref(),
        Some("Biodiversity increasing with rising Temperature")
    );
    assert_eq!(
        title("temperature", "co2").as_deref(),
        Some("Temperature increasing alongside CO2 concentration")
    );
    assert_eq!(
        title("water_quality", "air_quality").as_deref(),
        Some("Water Quality linked to Air Quality (increasing relationship)")
    );
    assert_eq!(
        title("biodiversity", "co2").as_deref(),
        Some("Biodiversity and CO2: increasing relationship")
    );
    Ok(())
}

#[test]
fn unusable_pairs_become_diagnostics() -> anyhow::Result<()> {
    let store = common::fixture_store()?;
    let report = EcoEngine::builtin().analyze_correlations(&store, None)?;

    for diagnostic in report.diagnostics() {
        if diagnostic.pair.contains("ocean_ph") {
            assert_eq!(
                diagnostic.reason,
                ExclusionReason::InsufficientSamples {
                    aligned: 0,
                    required: 3
                }
            );
        } else {
            assert!(diagnostic.pair.contains("sensor_flat"));
            assert_eq!(
                diagnostic.reason,
                ExclusionReason::ZeroVariance {
                    series: "sensor_flat".to_string()
                }
            );
        }
        assert!(report.insight_for(&diagnostic.pair).is_none());
    }

    let summary = report.summary();
    assert_eq!(summary.series_count, 8);
    assert_eq!(summary.correlation_count, 15);
    assert_eq!(summary.excluded_count, 13);
    assert_eq!(summary.critical_count, 0);
    Ok(())
}

#[test]
fn each_pair_is_reported_once() -> anyhow::Result<()> {
    let store = common::fixture_store()?;
    let report = EcoEngine::builtin().analyze_correlations(&store, None)?;

    let mut seen = HashSet::new();
    for pair in report
        .insights()
        .iter()
        .map(|insight| &insight.pair)
        .chain(report.diagnostics().iter().map(|diagnostic| &diagnostic.pair))
    {
        assert!(pair.first() < pair.second());
        assert!(seen.insert(pair.clone()), "{pair} reported twice");
    }
    assert_eq!(seen.len(), 28);
    Ok(())
}

#[test]
fn subsets_select_and_deduplicate() -> anyhow::Result<()> {
    let store = common::fixture_store()?;
    let engine = EcoEngine::builtin();

    let report = engine.analyze_correlations(
        &store,
        Some(&["temperature", "biodiversity", "temperature"][..]),
    )?;
    assert_eq!(report.insights().len(), 1);
    assert!(report.diagnostics().is_empty());
    assert_eq!(report.summary().series_count, 2);

    let err = engine
        .analyze_correlations(&store, Some(&["temperature", "sea_ice"][..]))
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::NotFound {
            id: "sea_ice".to_string()
        }
    );
    Ok(())
}

#[test]
fn common_alignment_requires_shared_overlap() -> anyhow::Result<()> {
    let store = common::fixture_store()?;
    let analysis = (*AnalysisConfig::builtin())
        .clone()
        .with_alignment(AlignmentMode::Common);
    let engine = EcoEngine::new(Arc::new(analysis), ScenarioConfig::builtin());

    let err = engine.analyze_correlations(&store, None).unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientOverlap {
            overlap: 0,
            required: 3,
            ..
        }
    ));

    let report = engine.analyze_correlations(
        &store,
        Some(&["temperature", "co2", "air_quality"][..]),
    )?;
    assert_eq!(report.insights().len(), 3);
    Ok(())
}

#[test]
fn long_tightly_coupled_series_reach_critical() -> anyhow::Result<()> {
    let short = common::linear_store(12)?;
    let report = EcoEngine::builtin().analyze_correlations(&short, None)?;
    assert_eq!(report.insights()[0].severity, Severity::High);

    let long = common::linear_store(30)?;
    let report = EcoEngine::builtin().analyze_correlations(&long, None)?;
    let insight = &report.insights()[0];
    assert_eq!(insight.severity, Severity::Critical);
    assert_eq!(insight.summary, "Critical correlation detected");
    assert!((insight.coefficient - 1.0).abs() < 1e-9);
    assert_eq!(report.summary().critical_count, 1);
    Ok(())
}

#[test]
fn store_freezes_after_analysis() -> anyhow::Result<()> {
    let mut store = common::fixture_store()?;
    EcoEngine::builtin().analyze_correlations(&store, None)?;

    let err = store
        .add("late", Series::from_values("%", [1.0, 2.0, 3.0]))
        .unwrap_err();
    assert!(matches!(err, StoreError::Frozen { .. }));
    Ok(())
}
