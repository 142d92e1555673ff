//! Named, time-aligned numeric series held for the duration of one analysis request.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis_config::MIN_SAMPLES;

/// Timestamp or ordinal index of one observation.
pub type Timestamp = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(default)]
    unit: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    category: Option<String>,
    points: Vec<(Timestamp, f64)>,
}

impl Series {
    pub fn new(unit: impl Into<String>, points: Vec<(Timestamp, f64)>) -> Self {
        Self {
            unit: unit.into(),
            label: None,
            category: None,
            points,
        }
    }

    /// Series indexed `0..n` in iteration order.
    pub fn from_values(unit: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        let points = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| (index as Timestamp, value))
            .collect();
        Self::new(unit, points)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn points(&self) -> &[(Timestamp, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn value_at(&self, timestamp: Timestamp) -> Option<f64> {
        self.points
            .binary_search_by_key(&timestamp, |(ts, _)| *ts)
            .ok()
            .map(|index| self.points[index].1)
    }

    fn validate(&self) -> Result<(), ValidationIssue> {
        if self.points.len() < 2 {
            return Err(ValidationIssue::TooFewPoints {
                len: self.points.len(),
            });
        }
        for (index, (_, value)) in self.points.iter().enumerate() {
            if !value.is_finite() {
                return Err(ValidationIssue::NonFiniteValue { index });
            }
        }
        for (index, window) in self.points.windows(2).enumerate() {
            if window[1].0 <= window[0].0 {
                return Err(ValidationIssue::NonIncreasingTimestamp { index: index + 1 });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyIdentifier,
    DuplicateIdentifier,
    TooFewPoints { len: usize },
    NonFiniteValue { index: usize },
    NonIncreasingTimestamp { index: usize },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyIdentifier => f.write_str("identifier is empty"),
            ValidationIssue::DuplicateIdentifier => f.write_str("identifier already exists"),
            ValidationIssue::TooFewPoints { len } => {
                write!(f, "series has {len} points, at least 2 required")
            }
            ValidationIssue::NonFiniteValue { index } => {
                write!(f, "value at position {index} is not finite")
            }
            ValidationIssue::NonIncreasingTimestamp { index } => {
                write!(f, "timestamp at position {index} does not increase")
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("series {id:?} rejected: {issue}")]
    Validation { id: String, issue: ValidationIssue },
    #[error("series {id:?} not found")]
    NotFound { id: String },
    #[error("series {ids:?} share {overlap} aligned points, {required} required")]
    InsufficientOverlap {
        ids: Vec<String>,
        overlap: usize,
        required: usize,
    },
    #[error("store is frozen after analysis; cannot add {id:?}")]
    Frozen { id: String },
}

/// Mapping from identifier to series. Append-only until the first successful analysis read,
/// frozen after.
#[derive(Debug, Default)]
pub struct SeriesStore {
    series: BTreeMap<String, Series>,
    frozen: AtomicBool,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: impl Into<String>, series: Series) -> Result<(), StoreError> {
        let id = id.into();
        if self.is_frozen() {
            return Err(StoreError::Frozen { id });
        }
        let issue = if id.is_empty() {
            Some(ValidationIssue::EmptyIdentifier)
        } else if self.series.contains_key(&id) {
            Some(ValidationIssue::DuplicateIdentifier)
        } else {
            series.validate().err()
        };
        if let Some(issue) = issue {
            tracing::debug!(
                target: "eco_engine::store",
                series = %id,
                issue = %issue,
                "store.add_rejected"
            );
            return Err(StoreError::Validation { id, issue });
        }
        self.series.insert(id, series);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Series, StoreError> {
        self.series.get(id).ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.series.contains_key(id)
    }

    /// Identifiers in canonical (sorted) order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub(crate) fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Resolve a requested subset into sorted, de-duplicated identifiers.
    /// `None` or an empty subset selects every series.
    pub fn select(&self, subset: Option<&[&str]>) -> Result<Vec<String>, StoreError> {
        match subset {
            None | Some([]) => Ok(self.series.keys().cloned().collect()),
            Some(ids) => {
                let mut selected = Vec::with_capacity(ids.len());
                for id in ids {
                    if !self.series.contains_key(*id) {
                        return Err(StoreError::NotFound { id: id.to_string() });
                    }
                    selected.push(id.to_string());
                }
                selected.sort();
                selected.dedup();
                Ok(selected)
            }
        }
    }

    /// Restrict the given series to the intersection of their timestamps.
    pub fn aligned_subset(&self, ids: &[&str]) -> Result<AlignedSubset, StoreError> {
        self.aligned_subset_with_min(ids, MIN_SAMPLES)
    }

    pub fn aligned_subset_with_min(
        &self,
        ids: &[&str],
        min_samples: usize,
    ) -> Result<AlignedSubset, StoreError> {
        let selected = self.select(Some(ids))?;

        let mut members = Vec::with_capacity(selected.len());
        for id in &selected {
            members.push(self.get(id)?);
        }

        let timestamps: Vec<Timestamp> = match members.split_first() {
            None => Vec::new(),
            Some((head, rest)) => head
                .points()
                .iter()
                .map(|(ts, _)| *ts)
                .filter(|ts| rest.iter().all(|series| series.value_at(*ts).is_some()))
                .collect(),
        };

        if timestamps.len() < min_samples {
            return Err(StoreError::InsufficientOverlap {
                ids: selected,
                overlap: timestamps.len(),
                required: min_samples,
            });
        }
        self.freeze();

        let columns = selected
            .into_iter()
            .zip(members)
            .map(|(id, series)| {
                let values = timestamps
                    .iter()
                    .filter_map(|ts| series.value_at(*ts))
                    .collect();
                (id, values)
            })
            .collect();

        Ok(AlignedSubset {
            timestamps,
            columns,
        })
    }
}

/// Series values restricted to a shared, ordered set of timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSubset {
    timestamps: Vec<Timestamp>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl AlignedSubset {
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn values(&self, id: &str) -> Option<&[f64]> {
        self.columns.get(id).map(Vec::as_slice)
    }
}

/// Values of `a` and `b` at the timestamps both series share, in timestamp order.
pub fn align_pair(a: &Series, b: &Series) -> (Vec<f64>, Vec<f64>) {
    let (left, right) = (a.points(), b.points());
    let capacity = left.len().min(right.len());
    let mut xs = Vec::with_capacity(capacity);
    let mut ys = Vec::with_capacity(capacity);
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let (ta, va) = left[i];
        let (tb, vb) = right[j];
        match ta.cmp(&tb) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                xs.push(va);
                ys.push(vb);
                i += 1;
                j += 1;
            }
        }
    }
    (xs, ys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monthly(values: &[f64]) -> Series {
        Series::new(
            "%",
            values
                .iter()
                .enumerate()
                .map(|(index, value)| (index as Timestamp + 1, *value))
                .collect(),
        )
    }

    #[test]
    fn add_rejects_duplicates_and_bad_series() {
        let mut store = SeriesStore::new();
        store.add("air", monthly(&[1.0, 2.0, 3.0])).unwrap();

        let duplicate = store.add("air", monthly(&[1.0, 2.0])).unwrap_err();
        assert_eq!(
            duplicate,
            StoreError::Validation {
                id: "air".to_string(),
                issue: ValidationIssue::DuplicateIdentifier,
            }
        );

        let short = store.add("water", monthly(&[1.0])).unwrap_err();
        assert!(matches!(
            short,
            StoreError::Validation {
                issue: ValidationIssue::TooFewPoints { len: 1 },
                ..
            }
        ));

        let nan = store.add("soil", monthly(&[1.0, f64::NAN, 2.0])).unwrap_err();
        assert!(matches!(
            nan,
            StoreError::Validation {
                issue: ValidationIssue::NonFiniteValue { index: 1 },
                ..
            }
        ));

        let inf = store
            .add("co2", monthly(&[1.0, 2.0, f64::INFINITY]))
            .unwrap_err();
        assert!(matches!(
            inf,
            StoreError::Validation {
                issue: ValidationIssue::NonFiniteValue { index: 2 },
                ..
            }
        ));

        let unordered = store
            .add("ph", Series::new("", vec![(3, 8.1), (2, 8.0)]))
            .unwrap_err();
        assert!(matches!(
            unordered,
            StoreError::Validation {
                issue: ValidationIssue::NonIncreasingTimestamp { index: 1 },
                ..
            }
        ));

        assert!(matches!(
            store.add("", monthly(&[1.0, 2.0])),
            Err(StoreError::Validation {
                issue: ValidationIssue::EmptyIdentifier,
                ..
            })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let store = SeriesStore::new();
        assert_eq!(
            store.get("missing").unwrap_err(),
            StoreError::NotFound {
                id: "missing".to_string()
            }
        );
    }

    #[test]
    fn aligned_subset_uses_timestamp_intersection() {
        let mut store = SeriesStore::new();
        store
            .add("a", Series::new("", vec![(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]))
            .unwrap();
        store
            .add("b", Series::new("", vec![(2, 20.0), (3, 30.0), (4, 40.0), (5, 50.0)]))
            .unwrap();

        let subset = store.aligned_subset(&["b", "a"]).unwrap();
        assert_eq!(subset.timestamps(), &[2, 3, 4]);
        assert_eq!(subset.values("a"), Some(&[2.0, 3.0, 4.0][..]));
        assert_eq!(subset.values("b"), Some(&[20.0, 30.0, 40.0][..]));
        assert_eq!(subset.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn aligned_subset_rejects_small_overlap() {
        let mut store = SeriesStore::new();
        store
            .add("a", Series::new("", vec![(1, 1.0), (2, 2.0), (3, 3.0)]))
            .unwrap();
        store
            .add("b", Series::new("", vec![(3, 1.0), (4, 2.0), (5, 3.0)]))
            .unwrap();

        let err = store.aligned_subset(&["a", "b"]).unwrap_err();
        assert_eq!(
            err,
            StoreError::InsufficientOverlap {
                ids: vec!["a".to_string(), "b".to_string()],
                overlap: 1,
                required: MIN_SAMPLES,
            }
        );
    }

    #[test]
    fn failed_read_leaves_store_open() {
        let mut store = SeriesStore::new();
        store
            .add("a", Series::new("", vec![(1, 1.0), (2, 2.0), (3, 3.0)]))
            .unwrap();
        store
            .add("b", Series::new("", vec![(3, 1.0), (4, 2.0), (5, 3.0)]))
            .unwrap();

        assert!(store.aligned_subset(&["a", "b"]).is_err());
        assert!(!store.is_frozen());

        // the caller can correct its input and ask again
        store
            .add("c", Series::new("", vec![(1, 4.0), (2, 5.0), (3, 7.0)]))
            .unwrap();
        let subset = store.aligned_subset(&["a", "c"]).unwrap();
        assert_eq!(subset.len(), 3);
        assert!(store.is_frozen());
    }

    #[test]
    fn store_freezes_after_first_analysis_read() {
        let mut store = SeriesStore::new();
        store.add("a", monthly(&[1.0, 2.0, 3.0])).unwrap();
        store.add("b", monthly(&[3.0, 2.0, 1.0])).unwrap();
        store.aligned_subset(&["a", "b"]).unwrap();

        assert!(store.is_frozen());
        assert_eq!(
            store.add("c", monthly(&[1.0, 2.0])).unwrap_err(),
            StoreError::Frozen {
                id: "c".to_string()
            }
        );
    }

    #[test]
    fn select_dedups_and_sorts() {
        let mut store = SeriesStore::new();
        store.add("b", monthly(&[1.0, 2.0])).unwrap();
        store.add("a", monthly(&[1.0, 2.0])).unwrap();
        assert_eq!(store.select(None).unwrap(), vec!["a", "b"]);
        assert_eq!(store.select(Some(&["b", "a", "b"][..])).unwrap(), vec!["a", "b"]);
        assert!(matches!(
            store.select(Some(&["z"][..])),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn align_pair_walks_shared_timestamps() {
        let a = Series::new("", vec![(1, 1.0), (3, 3.0), (5, 5.0), (7, 7.0)]);
        let b = Series::new("", vec![(2, 2.0), (3, 30.0), (7, 70.0), (9, 90.0)]);
        let (xs, ys) = align_pair(&a, &b);
        assert_eq!(xs, vec![3.0, 7.0]);
        assert_eq!(ys, vec![30.0, 70.0]);
    }
}
