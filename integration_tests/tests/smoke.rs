mod common;

use eco_core::{analyze_correlations, describe, run_scenario, ScenarioParameters};

#[test]
fn both_operations_answer_on_fixture_data() -> anyhow::Result<()> {
    let store = common::fixture_store()?;
    let analysis = analyze_correlations(&store, None)?;
    assert!(!analysis.insights().is_empty());

    let projection = run_scenario(ScenarioParameters::default());
    assert_eq!(projection.metrics().len(), 8);
    assert!(!describe(&projection).is_empty());
    Ok(())
}
