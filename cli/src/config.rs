//! Configuration file loading.
//!
//! The configuration is a TOML file of `[watch.<name>]` tables:
//!
//! ```toml
//! [watch.build-logs]
//! directory = "/var/log/builds"
//! pattern = '\.log$'
//! keep = 20
//! max = 40
//! ```
//!
//! Each table is deserialized independently, so one malformed section is
//! skipped with a warning instead of aborting the rest of the file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use filecap_core::WatchSpec;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    watch: toml::Table,
}

/// Load watch specs from a TOML configuration file.
///
/// Fails when the file cannot be read or parsed at all; individual
/// sections with bad fields are skipped with a warning. Semantic
/// validation (directory exists, pattern compiles, `max >= keep`) happens
/// later, when the supervisor compiles each spec.
pub fn load(path: &Path) -> Result<Vec<WatchSpec>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read config file {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&text)
        .with_context(|| format!("could not parse {}", path.display()))?;

    let mut specs = Vec::new();
    for (name, value) in file.watch {
        let section: std::result::Result<WatchSpec, toml::de::Error> = value.try_into();
        match section {
            Ok(mut spec) => {
                spec.name = name;
                specs.push(spec);
            }
            Err(err) => {
                warn!(watch = %name, error = %err, "ignoring invalid watch section");
            }
        }
    }
    Ok(specs)
}
