//! Packaging of scenario predictions into [`ProjectionReport`] records, and a plain-text rendering
//! of those records.

use std::fmt::Write as _;

use eco_schema::{MetricClass, MetricProjection, ProjectionReport};

use crate::scenario_config::{Band, BandTable, ClassBands, DeltaMeasure, MetricSpec};

/// Value compared against a band table: the signed delta in the table's measure, flipped for
/// metrics where lower is better so that positive always means improvement.
pub fn banded_delta(table: &BandTable, metric: &MetricSpec, delta: f64) -> f64 {
    let oriented = if metric.higher_is_better {
        delta
    } else {
        -delta
    };
    match table.measure {
        DeltaMeasure::Points => oriented,
        DeltaMeasure::SpanPercent => oriented / metric.span() * 100.0,
    }
}

pub fn classify<'a>(table: &'a BandTable, metric: &MetricSpec, delta: f64) -> &'a Band {
    let measured = banded_delta(table, metric, delta);
    let (bands, magnitude) = if measured < 0.0 {
        (&table.decline, -measured)
    } else {
        (&table.improvement, measured)
    };
    bands
        .iter()
        .find(|band| magnitude >= band.threshold)
        .unwrap_or(&table.stable)
}

/// Assemble the record for one metric. `predicted` must already be clamped into the domain.
pub fn project_metric(
    metric: &MetricSpec,
    bands: &ClassBands,
    predicted: f64,
    tipping_rules: Vec<String>,
) -> MetricProjection {
    let delta = predicted - metric.baseline;
    let band = classify(bands.for_class(metric.class), metric, delta);
    let change_pct = if metric.baseline == 0.0 {
        None
    } else {
        Some(delta / metric.baseline.abs() * 100.0)
    };

    MetricProjection {
        id: metric.id.clone(),
        name: metric.name.clone(),
        unit: metric.unit.clone(),
        class: metric.class,
        baseline: metric.baseline,
        predicted,
        delta,
        change_pct,
        domain_min: metric.min,
        domain_max: metric.max,
        baseline_fraction: metric.fraction(metric.baseline),
        predicted_fraction: metric.fraction(predicted),
        label: band.label.clone(),
        severity: band.severity,
        tipping_rules,
    }
}

/// Human-readable summary of a report, one metric per line.
pub fn describe(report: &ProjectionReport) -> String {
    let mut lines = Vec::with_capacity(report.metrics().len() + 2);

    let mut headline = format!("outlook: {}", report.outlook());
    if report.tipping_point_detected() {
        headline.push_str(", tipping point detected");
    }
    lines.push(headline);

    let params = report.parameters();
    lines.push(format!(
        "parameters: temperature {:+.1} °C, rainfall {:+.1} %, emissions {:.1} Gt/yr",
        params.temperature_delta_c, params.rainfall_delta_pct, params.emissions_gt_per_yr
    ));
    lines.extend(
        report
            .warnings()
            .iter()
            .map(|warning| format!("warning: {warning}")),
    );

    for metric in report.metrics() {
        let precision = match metric.class {
            MetricClass::Percentage => 1,
            MetricClass::Index => 2,
        };
        let mut line = format!(
            "{}: {:.p$}{unit} -> {:.p$}{unit} ({:+.p$}) {}",
            metric.id,
            metric.baseline,
            metric.predicted,
            metric.delta,
            metric.label,
            p = precision,
            unit = metric.unit,
        );
        if metric.tipping_point() {
            let _ = write!(line, " [{}]", metric.tipping_rules.join(", "));
        }
        lines.push(line);
    }
    lines.join("\n")
}
