//! vkma-xml: Doxygen xml → Vulkan-style registry xml generator.
//!
//! Reads the Doxygen xml produced from the memory allocator headers (plus
//! the headers themselves, for handle macros) and writes one registry xml
//! document that binding generators understand.
//!
//! # Quick start
//!
//! Generate the registry from a config (suitable for `build.rs`):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads config TOML, loads the Doxygen xml, writes the registry file.
//! vkma_xml::run(Path::new("vkma-xml.toml"), None).unwrap();
//! ```
//!
//! Or get the xml text without writing to disk:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let generated = vkma_xml::generate(Path::new("vkma-xml.toml")).unwrap();
//! println!("{}", generated.xml);
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

pub mod config;
pub mod diagnostics;
pub mod doxygen;
pub mod emit;
pub mod extract;
pub mod handles;
pub mod model;
pub mod xml;

use diagnostics::{Diagnostics, Stage};

/// Output of one generation run.
#[derive(Debug)]
pub struct Generated {
    /// The registry document.
    pub xml: String,
    /// Everything recoverable that went wrong along the way.
    pub diagnostics: Diagnostics,
    /// Number of registry records after loading.
    pub records: usize,
}

/// Run the full pipeline: load config, read the Doxygen xml, emit the
/// registry, and write the output file.
///
/// `config_path` is the path to a `vkma-xml.toml` configuration file.
/// `output` optionally overrides the output file path from the config.
///
/// Returns the path the registry was written to.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let generated = generate_from_config(&cfg, base_dir);

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => config::resolve_path(&cfg.output.file, base_dir),
    };
    write_output(&output_path, &generated.xml)?;
    Ok(output_path)
}

/// Parse a `vkma-xml.toml` config file and generate the registry without
/// writing to disk.
pub fn generate(config_path: &Path) -> Result<Generated> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    Ok(generate_from_config(&cfg, base_dir))
}

/// Generate the registry from an already-loaded [`config::Config`].
///
/// `base_dir` is the directory relative paths in the config are resolved
/// against (typically the parent directory of the TOML file).
///
/// Never fails: missing inputs only leave their api's contribution out of
/// the registry, and are reported in [`Generated::diagnostics`].
pub fn generate_from_config(cfg: &config::Config, base_dir: &Path) -> Generated {
    info!(
        helpers = cfg.helper.len(),
        api = %cfg.output.api,
        "loaded configuration"
    );

    let main = cfg.main.resolved(base_dir);
    let helpers: Vec<config::ApiConfig> =
        cfg.helper.iter().map(|h| h.resolved(base_dir)).collect();

    let mut diagnostics = Diagnostics::new();
    let registry = extract::build_registry(&main, &helpers, &mut diagnostics);
    let xml = emit::emit_registry_xml(&registry, &cfg.output, &mut diagnostics);

    report_summary(&diagnostics);

    Generated {
        xml,
        diagnostics,
        records: registry.len(),
    }
}

/// Write the registry to `path`, creating its parent directory if needed.
pub fn write_output(path: &Path, xml: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    std::fs::write(path, xml).with_context(|| format!("writing output to {}", path.display()))?;
    info!(path = %path.display(), size = xml.len(), "wrote registry");
    Ok(())
}

/// Log a one-line-per-stage summary of the diagnostic batch.
fn report_summary(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        info!("no diagnostics");
        return;
    }
    for stage in [
        Stage::Load,
        Stage::Handles,
        Stage::Registry,
        Stage::Resolve,
        Stage::Emit,
    ] {
        let count = diagnostics.by_stage(stage).count();
        if count > 0 {
            info!(stage = %stage, count, "diagnostics");
        }
    }
    if !diagnostics.unresolved().is_empty() {
        warn!(
            count = diagnostics.unresolved().len(),
            names = %diagnostics.unresolved().join(", "),
            "undefined types left after loading; they are emitted as forward declarations"
        );
    }
}
