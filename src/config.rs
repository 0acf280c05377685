use crate::options::RunOptions;
use anyhow::Context;
use std::{env, fs, path::Path, path::PathBuf};

/// Environment variable pointing at a run options file.
pub const OPTIONS_ENV_VAR: &str = "WATERFALL_OPTIONS";

/// Locate the run options file.
///
/// Lookup order:
/// 1. `explicit` (e.g. a `--options` flag)
/// 2. `$WATERFALL_OPTIONS`
/// 3. `$XDG_CONFIG_HOME/waterfall/options.json`, if it exists
/// 4. `./waterfall.json`, if it exists
pub fn resolve_options_path(explicit: Option<&Path>) -> Option<PathBuf> {
    resolve_options_path_from(
        explicit,
        env::var(OPTIONS_ENV_VAR).ok(),
        env::var("XDG_CONFIG_HOME").ok(),
        Path::new("."),
    )
}

fn resolve_options_path_from(
    explicit: Option<&Path>,
    env_path: Option<String>,
    xdg_config_home: Option<String>,
    cwd: &Path,
) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }

    if let Some(p) = env_path.filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(p));
    }

    if let Some(xdg) = xdg_config_home {
        let candidate = PathBuf::from(xdg).join("waterfall").join("options.json");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let candidate = cwd.join("waterfall.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

/// Read and validate a run options file.
pub fn load_options_file(path: &Path) -> anyhow::Result<RunOptions> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file {}", path.display()))?;
    let options = RunOptions::from_json_str(&raw)
        .with_context(|| format!("Invalid options file {}", path.display()))?;
    Ok(options)
}

/// Load run options from the resolved options file, or fall back to defaults.
pub fn load_run_options(explicit: Option<&Path>) -> anyhow::Result<RunOptions> {
    match resolve_options_path(explicit) {
        Some(path) => {
            tracing::debug!("Loading run options from {}", path.display());
            load_options_file(&path)
        }
        None => Ok(RunOptions::default()),
    }
}
