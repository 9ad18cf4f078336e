//! Configuration types for `vkma-xml.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    /// The api whose declarations are generated in full.
    pub main: ApiConfig,
    /// Supporting apis, loaded only to resolve names the main api uses.
    #[serde(default)]
    pub helper: Vec<ApiConfig>,
}

/// Output file and registry header settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output file path (e.g. `output/vk_mem_alloc.xml`).
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
    /// `api` attribute of the emitted `<feature>`.
    #[serde(default = "default_api")]
    pub api: String,
    /// `name` attribute of the emitted `<feature>`.
    #[serde(default = "default_feature")]
    pub feature: String,
    /// `number` attribute of the emitted `<feature>`.
    #[serde(default = "default_number")]
    pub number: String,
    /// Name of the include stub helper types `require`.
    #[serde(default = "default_include")]
    pub include: String,
    /// Header the include stub pulls in.
    #[serde(default = "default_include_header")]
    pub include_header: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_output_file(),
            api: default_api(),
            feature: default_feature(),
            number: default_number(),
            include: default_include(),
            include_header: default_include_header(),
        }
    }
}

fn default_output_file() -> PathBuf {
    PathBuf::from("output/vk_mem_alloc.xml")
}

fn default_api() -> String {
    "vma".to_string()
}

fn default_feature() -> String {
    "VMA_VERSION_1_0".to_string()
}

fn default_number() -> String {
    "1.0".to_string()
}

fn default_include() -> String {
    "vulkan".to_string()
}

fn default_include_header() -> String {
    "vulkan/vulkan.h".to_string()
}

/// One api input: a Doxygen xml directory plus the headers scanned for
/// handle macros.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Directory holding `index.xml`. Header-only apis leave this out.
    #[serde(default)]
    pub xml: Option<PathBuf>,
    #[serde(default)]
    pub headers: Vec<PathBuf>,
}

impl ApiConfig {
    /// Copy of this api with every path resolved against `base_dir`.
    pub fn resolved(&self, base_dir: &Path) -> ApiConfig {
        ApiConfig {
            xml: self.xml.as_deref().map(|p| resolve_path(p, base_dir)),
            headers: self
                .headers
                .iter()
                .map(|h| resolve_path(h, base_dir))
                .collect(),
        }
    }
}

/// Resolve `path` against `base_dir`. Absolute paths are returned as-is.
pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Load and parse a `vkma-xml.toml` configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}
