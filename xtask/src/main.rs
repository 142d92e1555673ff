use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;

use eco_core::{AnalysisConfig, ScenarioConfig};
use jsonschema::JSONSchema;
use schemars::schema_for;
use serde_json::Value;

const DATA_DIR: &str = "eco_core/src/data";
const SCHEMA_DIR: &str = "eco_core/schemas";

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("schema") => write_schemas(),
        Some("validate-config") => validate_configs(),
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(cmd) => {
            eprintln!("Unknown xtask '{cmd}'.");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: cargo xtask schema");
    eprintln!("       cargo xtask validate-config");
    eprintln!("       cargo xtask help");
}

/// JSON schema for each rule table, keyed by the data file stem it governs.
fn schemas() -> Result<Vec<(&'static str, Value)>, Box<dyn Error>> {
    Ok(vec![
        (
            "analysis_config",
            serde_json::to_value(schema_for!(AnalysisConfig))?,
        ),
        (
            "scenario_config",
            serde_json::to_value(schema_for!(ScenarioConfig))?,
        ),
    ])
}

fn write_schemas() -> Result<(), Box<dyn Error>> {
    let dir = Path::new(SCHEMA_DIR);
    fs::create_dir_all(dir)?;
    for (name, schema) in schemas()? {
        let path = dir.join(format!("{name}.schema.json"));
        fs::write(&path, serde_json::to_string_pretty(&schema)? + "\n")?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn validate_configs() -> Result<(), Box<dyn Error>> {
    let schemas = schemas()?;
    let pattern = format!("{DATA_DIR}/*.json");
    let mut failures = 0usize;
    let mut checked = 0usize;

    for entry in glob::glob(&pattern)? {
        let path = entry?;
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let Some((_, schema)) = schemas.iter().find(|(name, _)| *name == stem) else {
            eprintln!("skipping {}: no schema registered", path.display());
            continue;
        };

        checked += 1;
        let problems = check_file(&path, stem, schema)?;
        if problems.is_empty() {
            println!("ok   {}", path.display());
        } else {
            failures += 1;
            println!("FAIL {}", path.display());
            for problem in problems {
                println!("     {problem}");
            }
        }
    }

    if checked == 0 {
        return Err(format!("no config files matched {pattern}").into());
    }
    if failures > 0 {
        return Err(format!("{failures} config file(s) failed validation").into());
    }
    Ok(())
}

/// Structural check against the schema, then the semantic checks the loaders enforce.
fn check_file(path: &Path, stem: &str, schema: &Value) -> Result<Vec<String>, Box<dyn Error>> {
    let compiled =
        JSONSchema::compile(schema).map_err(|err| format!("invalid schema for {stem}: {err}"))?;
    let instance: Value = serde_json::from_str(&fs::read_to_string(path)?)?;

    let mut problems = Vec::new();
    if let Err(errors) = compiled.validate(&instance) {
        problems.extend(
            errors.map(|error| format!("schema: {} at {}", error, error.instance_path)),
        );
    }

    let semantic = match stem {
        "analysis_config" => AnalysisConfig::from_file(path).err().map(|err| err.to_string()),
        "scenario_config" => ScenarioConfig::from_file(path).err().map(|err| err.to_string()),
        _ => None,
    };
    problems.extend(semantic);
    Ok(problems)
}
