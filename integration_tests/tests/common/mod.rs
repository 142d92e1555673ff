#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Once;

use anyhow::Context;
use eco_core::{Series, SeriesStore};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[derive(Deserialize)]
struct SeriesFixture {
    series: BTreeMap<String, Series>,
}

/// Monthly dashboard indicators plus two series that can never be correlated: a decadal ocean pH
/// record with no overlap and a flat calibration sensor.
pub fn fixture_store() -> anyhow::Result<SeriesStore> {
    init_tracing();
    let path = fixture_path("environmental_series.json");
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    let fixture: SeriesFixture = serde_json::from_str(&raw)?;

    let mut store = SeriesStore::new();
    for (id, series) in fixture.series {
        store.add(id, series)?;
    }
    Ok(store)
}

/// `n`-point series that track each other exactly, for exercising the top severity tier.
pub fn linear_store(n: usize) -> anyhow::Result<SeriesStore> {
    let mut store = SeriesStore::new();
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    store.add("emissions", Series::from_values("Gt/yr", xs.iter().map(|x| 30.0 + 0.5 * x)))?;
    store.add("warming", Series::from_values("°C", xs.iter().map(|x| 0.8 + 0.02 * x)))?;
    Ok(store)
}
