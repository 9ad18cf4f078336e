//! CLI entry point for vkma-xml.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use vkma_xml::config::{ApiConfig, Config, OutputConfig};

const DEFAULT_XML_DIR: &str = "../doxygen_xml";
const DEFAULT_OUTPUT: &str = "../output/vk_mem_alloc.xml";
const DEFAULT_HEADER: &str = "../include/vk_mem_alloc.h";

/// vkma-xml: generate a Vulkan-style registry xml from Doxygen xml.
#[derive(Parser, Debug)]
#[command(name = "vkma-xml", version, about)]
struct Cli {
    /// Directory holding the Doxygen `index.xml`.
    xml_dir: Option<PathBuf>,

    /// Output registry file.
    output_file: Option<PathBuf>,

    /// Headers scanned for handle macros.
    headers: Vec<PathBuf>,

    /// Read inputs from a vkma-xml.toml instead of the positional arguments.
    #[arg(short, long, conflicts_with_all = ["xml_dir", "output_file", "headers"])]
    config: Option<PathBuf>,

    /// Output file path (overrides config).
    #[arg(short, long, requires = "config")]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vkma_xml=info")),
        )
        .init();

    let cli = Cli::parse();
    // Failures are reported, never turned into a non-zero exit status.
    if let Err(e) = run(cli) {
        error!("{e:#}");
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(config) = &cli.config {
        let path = vkma_xml::run(config, cli.output.as_deref())?;
        info!(path = %path.display(), "success");
        return Ok(());
    }

    let defaulted = cli.xml_dir.is_none() || cli.output_file.is_none() || cli.headers.is_empty();
    let xml_dir = cli.xml_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_XML_DIR));
    let output_file = cli
        .output_file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let headers = if cli.headers.is_empty() {
        vec![PathBuf::from(DEFAULT_HEADER)]
    } else {
        cli.headers
    };
    if defaulted {
        warn!(
            xml = %xml_dir.display(),
            output = %output_file.display(),
            headers = ?headers,
            "not every path was provided, using defaults"
        );
    }

    let cfg = Config {
        output: OutputConfig {
            file: output_file.clone(),
            ..OutputConfig::default()
        },
        main: ApiConfig {
            xml: Some(xml_dir),
            headers,
        },
        helper: Vec::new(),
    };
    let generated = vkma_xml::generate_from_config(&cfg, Path::new("."));
    vkma_xml::write_output(&output_file, &generated.xml)?;
    info!(path = %output_file.display(), "success");
    Ok(())
}
