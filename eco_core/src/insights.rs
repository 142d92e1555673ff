//! Turns correlation results into ranked, confidence-tiered insight records.

use std::sync::Arc;

use eco_schema::{CorrelationResult, Insight};

use crate::analysis_config::AnalysisConfig;
use crate::store::SeriesStore;

#[derive(Debug, Clone)]
pub struct InsightRanker {
    config: Arc<AnalysisConfig>,
}

impl InsightRanker {
    pub fn new(config: Arc<AnalysisConfig>) -> Self {
        Self { config }
    }

    pub fn builtin() -> Self {
        Self::new(AnalysisConfig::builtin())
    }

    /// One insight per result, in ranking order.
    pub fn rank(&self, store: &SeriesStore, results: &[CorrelationResult]) -> Vec<Insight> {
        let mut insights: Vec<Insight> = results
            .iter()
            .map(|result| self.insight(store, result))
            .collect();
        insights.sort_by(Insight::rank_cmp);
        insights
    }

    pub fn insight(&self, store: &SeriesStore, result: &CorrelationResult) -> Insight {
        let bands = self.config.severity();
        let severity = bands.classify(result.strength(), result.confidence);
        Insight {
            pair: result.pair.clone(),
            title: self.title(store, result),
            summary: bands.summary(severity).to_string(),
            severity,
            direction: result.direction(),
            coefficient: result.coefficient,
            sample_size: result.sample_size,
            confidence: result.confidence,
            confidence_pct: (result.confidence * 100.0).round().clamp(0.0, 100.0) as u8,
        }
    }

    /// Render the title for a result. Falls back to the generic template and to raw identifiers,
    /// so it always produces text.
    pub fn title(&self, store: &SeriesStore, result: &CorrelationResult) -> String {
        let first = Descriptor::lookup(store, result.pair.first());
        let second = Descriptor::lookup(store, result.pair.second());

        let (text, first, second) = match self
            .config
            .template_for(first.category, second.category)
        {
            Some(template) if template.categories[0] == first.category => {
                (template.text.as_str(), first, second)
            }
            Some(template) => (template.text.as_str(), second, first),
            None => (self.config.generic_template(), first, second),
        };

        render(text, first.label, second.label, result.direction().word())
    }
}

/// Fill the `{first}`, `{second}` and `{direction}` slots in one left-to-right pass. Substituted
/// text is never scanned again, and any other brace sequence is copied as written.
fn render(template: &str, first: &str, second: &str, direction: &str) -> String {
    let mut out = String::with_capacity(template.len() + first.len() + second.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let slot = [("{first}", first), ("{second}", second), ("{direction}", direction)]
            .into_iter()
            .find(|(key, _)| tail.starts_with(key));
        match slot {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

struct Descriptor<'a> {
    label: &'a str,
    category: &'a str,
}

impl<'a> Descriptor<'a> {
    fn lookup(store: &'a SeriesStore, id: &'a str) -> Self {
        match store.get(id) {
            Ok(series) => Self {
                label: series.label().unwrap_or(id),
                category: series.category().unwrap_or(id),
            },
            Err(_) => Self {
                label: id,
                category: id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Series;
    use eco_schema::{Direction, SeriesPair, Severity};

    fn result(a: &str, b: &str, coefficient: f64, confidence: f64) -> CorrelationResult {
        CorrelationResult {
            pair: SeriesPair::new(a, b),
            coefficient,
            sample_size: 12,
            confidence,
        }
    }

    fn store() -> SeriesStore {
        let mut store = SeriesStore::new();
        store
            .add(
                "temp",
                Series::from_values("°C", [14.2, 15.1, 16.8])
                    .with_label("Temperature")
                    .with_category("temperature"),
            )
            .unwrap();
        store
            .add(
                "bio",
                Series::from_values("%", [72.0, 74.0, 76.0])
                    .with_label("Biodiversity")
                    .with_category("biodiversity"),
            )
            .unwrap();
        store
            .add("misc", Series::from_values("", [1.0, 2.0, 4.0]))
            .unwrap();
        store
    }

    #[test]
    fn domain_template_keeps_its_orientation() {
        let ranker = InsightRanker::builtin();
        let store = store();
        // canonical pair order is (bio, temp) but the template is written temperature-first
        let title = ranker.title(&store, &result("temp", "bio", 0.9, 0.6));
        assert_eq!(title, "Biodiversity increasing with rising Temperature");

        let title = ranker.title(&store, &result("temp", "bio", -0.9, 0.6));
        assert_eq!(title, "Biodiversity decreasing with rising Temperature");
    }

    #[test]
    fn generic_template_covers_unknown_pairings() {
        let ranker = InsightRanker::builtin();
        let store = store();
        let title = ranker.title(&store, &result("misc", "temp", 0.0, 0.0));
        assert_eq!(title, "misc and Temperature: unrelated relationship");

        // ids missing from the store still render
        let title = ranker.title(&store, &result("ghost", "phantom", -0.3, 0.1));
        assert_eq!(title, "ghost and phantom: decreasing relationship");
    }

    #[test]
    fn labels_are_inserted_verbatim() {
        let ranker = InsightRanker::builtin();
        let mut store = SeriesStore::new();
        store
            .add(
                "a",
                Series::from_values("", [1.0, 2.0, 3.0]).with_label("Index {second}"),
            )
            .unwrap();
        store
            .add(
                "b",
                Series::from_values("", [3.0, 1.0, 2.0]).with_label("Flow {direction} {x}"),
            )
            .unwrap();
        let title = ranker.title(&store, &result("a", "b", 0.5, 0.3));
        assert_eq!(
            title,
            "Index {second} and Flow {direction} {x}: increasing relationship"
        );

        assert_eq!(render("{{first}} {", "A", "B", "up"), "{A} {");
    }

    #[test]
    fn ranking_is_tiered_then_confident_then_by_pair() {
        let ranker = InsightRanker::builtin();
        let store = store();
        let results = vec![
            result("a", "b", 0.5, 0.40),
            result("c", "d", 0.95, 0.90),
            result("e", "f", 0.95, 0.50),
            result("g", "h", -0.7, 0.55),
            result("i", "j", 0.1, 0.05),
            result("k", "l", 0.5, 0.40),
        ];
        let insights = ranker.rank(&store, &results);
        let summary: Vec<(String, Severity)> = insights
            .iter()
            .map(|insight| (insight.pair.to_string(), insight.severity))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("c/d".to_string(), Severity::Critical),
                ("g/h".to_string(), Severity::High),
                ("e/f".to_string(), Severity::High),
                ("a/b".to_string(), Severity::Moderate),
                ("k/l".to_string(), Severity::Moderate),
                ("i/j".to_string(), Severity::Low),
            ]
        );
        assert_eq!(insights[0].summary, "Critical correlation detected");
        assert_eq!(insights[0].confidence_pct, 90);
        assert_eq!(insights[1].direction, Direction::Decreasing);
    }

    #[test]
    fn every_result_yields_exactly_one_insight() {
        let ranker = InsightRanker::builtin();
        let store = store();
        let results: Vec<CorrelationResult> = (0..10)
            .map(|i| result(&format!("s{i}"), "x", i as f64 / 10.0, i as f64 / 20.0))
            .collect();
        assert_eq!(ranker.rank(&store, &results).len(), results.len());
    }
}
