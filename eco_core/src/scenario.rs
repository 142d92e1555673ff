//! Deterministic projection of impact metrics from driver parameters.
//!
//! Each metric responds linearly to the three drivers. Tipping rules from the scenario config
//! amplify that response once a driver passes a threshold: `excess` rules penalise only the part of
//! the driver value above the threshold, `full` rules scale the metric's whole linear delta.

use std::sync::Arc;

use eco_schema::{ClampKind, Driver, ParameterWarning, ProjectionReport, ScenarioParameters};

use crate::report;
use crate::scenario_config::{Crossing, MetricSpec, ScenarioConfig, TippingRule};

/// Predicted value for one metric before packaging.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Clamped into the metric's domain.
    pub value: f64,
    /// Value before domain clamping.
    pub unclamped: f64,
    /// Ids of the rules that fired, in table order.
    pub fired: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ScenarioModel {
    config: Arc<ScenarioConfig>,
}

impl ScenarioModel {
    pub fn new(config: Arc<ScenarioConfig>) -> Self {
        Self { config }
    }

    pub fn builtin() -> Self {
        Self::new(ScenarioConfig::builtin())
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Move every parameter into its driver domain. Never fails; each adjustment is reported.
    pub fn validate_parameters(
        &self,
        requested: ScenarioParameters,
    ) -> (ScenarioParameters, Vec<ParameterWarning>) {
        let mut applied = requested;
        let mut warnings = Vec::new();

        for driver in Driver::ALL {
            let domain = self.config.drivers().domain(driver);
            let value = requested.get(driver);
            let adjustment = if value.is_nan() {
                Some((None, domain.default, ClampKind::NonFinite))
            } else if value.is_infinite() {
                let bound = if value > 0.0 { domain.max } else { domain.min };
                Some((Some(value), bound, ClampKind::NonFinite))
            } else if value < domain.min {
                Some((Some(value), domain.min, ClampKind::BelowMin))
            } else if value > domain.max {
                Some((Some(value), domain.max, ClampKind::AboveMax))
            } else {
                None
            };

            if let Some((requested, bound, kind)) = adjustment {
                tracing::warn!(
                    target: "eco_engine::scenario",
                    driver = %driver,
                    requested = ?requested,
                    applied = bound,
                    kind = ?kind,
                    "scenario.parameter_clamped"
                );
                applied.set(driver, bound);
                warnings.push(ParameterWarning {
                    driver,
                    requested,
                    applied: bound,
                    kind,
                });
            }
        }

        (applied, warnings)
    }

    /// Project every metric in the table. Identical parameters yield identical reports.
    pub fn project(&self, requested: ScenarioParameters) -> ProjectionReport {
        let (parameters, warnings) = self.validate_parameters(requested);
        let bands = self.config.bands();

        let metrics = self
            .config
            .metrics()
            .iter()
            .map(|metric| {
                let prediction = self.predict(metric, &parameters);
                report::project_metric(metric, bands, prediction.value, prediction.fired)
            })
            .collect();

        let report = ProjectionReport::new(parameters, warnings, metrics);
        tracing::debug!(
            target: "eco_engine::scenario",
            outlook = %report.outlook(),
            tipping = report.tipping_point_detected(),
            hash = report.hash(),
            "scenario.projected"
        );
        report
    }

    /// Predict one metric. `parameters` are used as given; callers wanting domain clamping go
    /// through [`ScenarioModel::project`].
    pub fn predict(&self, metric: &MetricSpec, parameters: &ScenarioParameters) -> Prediction {
        let rules: Vec<&TippingRule> = self.config.rules_for(&metric.id).collect();

        let mut linear = 0.0;
        for driver in Driver::ALL {
            let value = parameters.get(driver);
            let mut excess: Vec<(f64, f64)> = rules
                .iter()
                .filter(|rule| rule.driver == driver && rule.crossing == Crossing::Excess)
                .map(|rule| (rule.threshold, rule.penalty))
                .collect();
            excess.sort_by(|a, b| a.0.total_cmp(&b.0));
            linear += metric.sensitivity.get(driver) * effective_value(value, &excess);
        }

        let full_penalty: f64 = rules
            .iter()
            .filter(|rule| {
                rule.crossing == Crossing::Full && rule.fires(parameters.get(rule.driver))
            })
            .map(|rule| rule.penalty)
            .product();

        let fired: Vec<String> = rules
            .iter()
            .filter(|rule| rule.fires(parameters.get(rule.driver)))
            .map(|rule| rule.id.clone())
            .collect();

        let unclamped = metric.baseline + linear * full_penalty;
        Prediction {
            value: metric.clamp(unclamped),
            unclamped,
            fired,
        }
    }
}

/// Driver value with the portions above each threshold amplified. Rules are `(threshold,
/// penalty)` sorted ascending; penalties compound from one threshold to the next.
fn effective_value(value: f64, rules: &[(f64, f64)]) -> f64 {
    let Some(&(first, _)) = rules.first() else {
        return value;
    };
    if value <= first {
        return value;
    }

    let mut total = first;
    let mut factor = 1.0;
    for (index, &(threshold, penalty)) in rules.iter().enumerate() {
        if value <= threshold {
            break;
        }
        factor *= penalty;
        let upper = rules
            .get(index + 1)
            .map_or(value, |&(next, _)| next.min(value));
        total += (upper - threshold) * factor;
    }
    total
}
