//! Shared loading logic for the engine's JSON rule tables.

use std::{
    env, fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Where a loaded rule table came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Builtin,
    File(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Builtin => None,
            ConfigSource::File(path) => Some(path),
        }
    }
}

/// Load a table from the path named by `env_var`, or from `default_path` when the variable is
/// unset. Any failure falls back to the builtin table.
pub(crate) fn load_with_fallback<T, E>(
    name: &str,
    env_var: &str,
    default_path: PathBuf,
    from_file: impl Fn(&Path) -> Result<T, E>,
    builtin: impl FnOnce() -> Arc<T>,
) -> (Arc<T>, ConfigSource)
where
    E: fmt::Display,
{
    let path = env::var(env_var)
        .ok()
        .map(PathBuf::from)
        .unwrap_or(default_path);

    match from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "eco_engine::config",
                config = name,
                path = %path.display(),
                "config.loaded=file"
            );
            return (Arc::new(config), ConfigSource::File(path));
        }
        Err(err) => {
            tracing::warn!(
                target: "eco_engine::config",
                config = name,
                path = %path.display(),
                error = %err,
                "config.load_failed"
            );
        }
    }

    tracing::info!(
        target: "eco_engine::config",
        config = name,
        "config.loaded=builtin"
    );
    (builtin(), ConfigSource::Builtin)
}
