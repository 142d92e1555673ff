//! Pairwise Pearson correlation across the series of a store.

use std::sync::Arc;

use eco_schema::{CorrelationResult, Diagnostic, ExclusionReason, SeriesPair};
use rayon::prelude::*;

use crate::analysis_config::{AlignmentMode, AnalysisConfig};
use crate::store::{align_pair, SeriesStore, StoreError};

/// Results and exclusions of one pairwise pass, both in canonical pair order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairwiseOutcome {
    pub series_count: usize,
    pub results: Vec<CorrelationResult>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct CorrelationAnalyzer {
    config: Arc<AnalysisConfig>,
}

impl CorrelationAnalyzer {
    pub fn new(config: Arc<AnalysisConfig>) -> Self {
        Self { config }
    }

    pub fn builtin() -> Self {
        Self::new(AnalysisConfig::builtin())
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Correlate every unordered pair of the selected series.
    ///
    /// Pairs that cannot be evaluated are reported in `diagnostics` and never abort the batch. In
    /// [`AlignmentMode::Common`] the whole call fails when the selection's common overlap is too
    /// small.
    pub fn analyze(
        &self,
        store: &SeriesStore,
        subset: Option<&[&str]>,
    ) -> Result<PairwiseOutcome, StoreError> {
        let ids = store.select(subset)?;
        let jobs = match self.config.alignment() {
            AlignmentMode::Pairwise => pairwise_jobs(store, &ids)?,
            AlignmentMode::Common => common_jobs(store, &ids, self.config.min_samples())?,
        };
        store.freeze();

        let parallel = jobs.len() >= self.config.parallel_pair_threshold();
        let evaluated: Vec<PairEvaluation> = if parallel {
            jobs.par_iter().map(|job| self.evaluate(job)).collect()
        } else {
            jobs.iter().map(|job| self.evaluate(job)).collect()
        };

        let mut results = Vec::new();
        let mut diagnostics = Vec::new();
        for evaluation in evaluated {
            match evaluation {
                PairEvaluation::Correlated(result) => results.push(result),
                PairEvaluation::Excluded(diagnostic) => {
                    tracing::debug!(
                        target: "eco_engine::analysis",
                        pair = %diagnostic.pair,
                        reason = diagnostic.reason.code(),
                        "analysis.pair_excluded"
                    );
                    diagnostics.push(diagnostic);
                }
            }
        }
        results.sort_by(|a, b| a.pair.cmp(&b.pair));
        diagnostics.sort_by(|a, b| a.pair.cmp(&b.pair));

        tracing::info!(
            target: "eco_engine::analysis",
            series = ids.len(),
            pairs = results.len() + diagnostics.len(),
            correlated = results.len(),
            excluded = diagnostics.len(),
            parallel,
            "analysis.completed"
        );

        Ok(PairwiseOutcome {
            series_count: ids.len(),
            results,
            diagnostics,
        })
    }

    fn evaluate(&self, job: &PairJob) -> PairEvaluation {
        let pair = SeriesPair::new(job.first.as_str(), job.second.as_str());
        let n = job.xs.len();
        let required = self.config.min_samples();
        if n < required {
            return PairEvaluation::Excluded(Diagnostic {
                pair,
                reason: ExclusionReason::InsufficientSamples {
                    aligned: n as u32,
                    required: required as u32,
                },
            });
        }

        match pearson(&job.xs, &job.ys, self.config.zero_variance_epsilon()) {
            Ok(coefficient) => PairEvaluation::Correlated(CorrelationResult {
                pair,
                coefficient,
                sample_size: n as u32,
                confidence: confidence(coefficient, n),
            }),
            Err(flat) => {
                let series = match flat {
                    FlatSide::First => job.first.clone(),
                    FlatSide::Second => job.second.clone(),
                };
                PairEvaluation::Excluded(Diagnostic {
                    pair,
                    reason: ExclusionReason::ZeroVariance { series },
                })
            }
        }
    }
}

#[derive(Debug)]
struct PairJob {
    first: String,
    second: String,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

#[derive(Debug)]
enum PairEvaluation {
    Correlated(CorrelationResult),
    Excluded(Diagnostic),
}

/// `ids` is sorted, so `first < second` holds for every job.
fn pairwise_jobs(store: &SeriesStore, ids: &[String]) -> Result<Vec<PairJob>, StoreError> {
    let mut jobs = Vec::with_capacity(ids.len() * ids.len().saturating_sub(1) / 2);
    for (index, first) in ids.iter().enumerate() {
        let left = store.get(first)?;
        for second in &ids[index + 1..] {
            let right = store.get(second)?;
            let (xs, ys) = align_pair(left, right);
            jobs.push(PairJob {
                first: first.clone(),
                second: second.clone(),
                xs,
                ys,
            });
        }
    }
    Ok(jobs)
}

fn common_jobs(
    store: &SeriesStore,
    ids: &[String],
    min_samples: usize,
) -> Result<Vec<PairJob>, StoreError> {
    if ids.len() < 2 {
        return Ok(Vec::new());
    }
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let subset = store.aligned_subset_with_min(&refs, min_samples)?;

    let mut jobs = Vec::new();
    for (index, first) in ids.iter().enumerate() {
        for second in &ids[index + 1..] {
            let (Some(xs), Some(ys)) = (subset.values(first), subset.values(second)) else {
                continue;
            };
            jobs.push(PairJob {
                first: first.clone(),
                second: second.clone(),
                xs: xs.to_vec(),
                ys: ys.to_vec(),
            });
        }
    }
    Ok(jobs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatSide {
    First,
    Second,
}

/// Pearson coefficient `cov(X, Y) / (σX · σY)`, clamped into [-1, 1].
///
/// Each side is divided by its largest magnitude before the sums, so the result does not depend
/// on the units a series is recorded in. A side whose variance, measured on that unit scale, is
/// at or below `epsilon` is reported instead of dividing by ~0. Sums run in index order so
/// identical inputs give bit-identical output.
pub fn pearson(xs: &[f64], ys: &[f64], epsilon: f64) -> Result<f64, FlatSide> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return Err(FlatSide::First);
    }

    let (dxs, var_x) = scaled_deviations(&xs[..n]);
    if var_x <= epsilon {
        return Err(FlatSide::First);
    }
    let (dys, var_y) = scaled_deviations(&ys[..n]);
    if var_y <= epsilon {
        return Err(FlatSide::Second);
    }

    let mut cov = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_yy = 0.0;
    for (dx, dy) in dxs.iter().zip(&dys) {
        cov += dx * dy;
        sum_xx += dx * dx;
        sum_yy += dy * dy;
    }

    Ok((cov / (sum_xx.sqrt() * sum_yy.sqrt())).clamp(-1.0, 1.0))
}

/// Deviations from the mean after dividing by the largest magnitude, and their population
/// variance. Every scaled value lies in [-1, 1]; a constant series scales to all ones and has
/// variance exactly zero.
fn scaled_deviations(values: &[f64]) -> (Vec<f64>, f64) {
    let scale = values.iter().fold(0.0_f64, |acc, value| acc.max(value.abs()));
    if scale == 0.0 {
        return (vec![0.0; values.len()], 0.0);
    }
    let count = values.len() as f64;
    let mean = values.iter().map(|value| value / scale).sum::<f64>() / count;
    let deviations: Vec<f64> = values.iter().map(|value| value / scale - mean).collect();
    let variance = deviations.iter().map(|d| d * d).sum::<f64>() / count;
    (deviations, variance)
}

/// `clamp01(|r| · (1 − 1/√n))`: few points never report high confidence.
pub fn confidence(coefficient: f64, samples: usize) -> f64 {
    if samples == 0 {
        return 0.0;
    }
    let damping = 1.0 - 1.0 / (samples as f64).sqrt();
    (coefficient.abs() * damping).clamp(0.0, 1.0)
}
