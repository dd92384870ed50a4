// ScanGate - Main Entry Point
//
// CI adapter around a vulnerability scanner:
// - CLI / environment inputs
// - scanner provisioning through the tool cache
// - scan execution and report persistence
// - build status as the process exit code

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use scangate::config::Config;
use scangate::logging;
use scangate::provision::{DirToolCache, Provisioner, ScriptInstaller};
use scangate::tools::{ExecutorConfig, ScanExecutor};
use scangate::{BuildStatus, ScanInputs, ScanPipeline};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// ScanGate: vulnerability scanning gate for CI pipelines
#[derive(Parser, Debug)]
#[command(name = "scangate")]
#[command(version)]
#[command(about = "Run a vulnerability scanner and gate the build on its findings", long_about = None)]
struct Args {
    /// Container image to scan (mutually exclusive with --path and --sbom)
    #[arg(long, env = "SCANGATE_IMAGE", default_value = "")]
    image: String,

    /// Directory to scan (default: current directory)
    #[arg(long, env = "SCANGATE_PATH", default_value = "")]
    path: String,

    /// SBOM file to scan
    #[arg(long, env = "SCANGATE_SBOM", default_value = "")]
    sbom: String,

    /// Fail the run when findings reach the severity cutoff
    #[arg(long, env = "SCANGATE_FAIL_BUILD", default_value_t = true, action = ArgAction::Set)]
    fail_build: bool,

    /// Report format: sarif, json or table
    #[arg(long, env = "SCANGATE_OUTPUT_FORMAT", default_value = "sarif")]
    output_format: String,

    /// Minimum severity that fails the scan: negligible, low, medium, high, critical (empty for none)
    #[arg(long, env = "SCANGATE_SEVERITY_CUTOFF", default_value = "medium")]
    severity_cutoff: String,

    /// Only report vulnerabilities that have a fix
    #[arg(long, env = "SCANGATE_ONLY_FIXED")]
    only_fixed: bool,

    /// Generate CPEs for packages that have none
    #[arg(long, env = "SCANGATE_ADD_CPES_IF_NONE")]
    add_cpes_if_none: bool,

    /// Orient results by CVE rather than the original advisory
    #[arg(long, env = "SCANGATE_BY_CVE")]
    by_cve: bool,

    /// Registry username for private images
    #[arg(long, env = "SCANGATE_REGISTRY_USERNAME")]
    registry_username: Option<String>,

    /// Registry password for private images
    #[arg(long, env = "SCANGATE_REGISTRY_PASSWORD", hide_env_values = true)]
    registry_password: Option<String>,

    /// Scanner version to use instead of the configured one
    #[arg(long)]
    scanner_version: Option<String>,

    /// Configuration file (default: ~/.config/scangate/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for report files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Append outputs as key=value lines to this file
    #[arg(long, env = "GITHUB_OUTPUT")]
    outputs_file: Option<PathBuf>,

    /// Enable debug logging and verbose scanner output
    #[arg(short, long, alias = "debug")]
    verbose: bool,
}

impl Args {
    fn scan_inputs(&self) -> ScanInputs {
        ScanInputs {
            image: self.image.clone(),
            path: self.path.clone(),
            sbom: self.sbom.clone(),
            fail_build: self.fail_build,
            output_format: self.output_format.clone(),
            severity_cutoff: self.severity_cutoff.clone(),
            only_fixed: self.only_fixed,
            add_cpes_if_none: self.add_cpes_if_none,
            by_cve: self.by_cve,
            registry_username: self.registry_username.clone(),
            registry_password: self.registry_password.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let config = Config::load_from_path(&config_path).context("Failed to load configuration")?;

    logging::init(&config.logging, args.verbose)?;
    if config_path.exists() {
        debug!("Loaded configuration from {}", config_path.display());
    } else {
        debug!("No config file at {}, using defaults", config_path.display());
    }

    let version = args
        .scanner_version
        .clone()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| config.scanner.version.clone());
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.reports.output_dir.clone());

    let installer = ScriptInstaller::new(config.scanner.installer_url.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
    let provisioner = Provisioner::new(
        config.scanner.name.clone(),
        config.scanner.install_root(),
        Arc::new(DirToolCache::new(config.scanner.cache_root())),
        Arc::new(installer),
    );
    let executor = ScanExecutor::with_config(ExecutorConfig::with_debug(args.verbose));
    let pipeline = ScanPipeline::new(provisioner, executor, output_dir);

    info!("Starting {} {} scan", config.scanner.name, version);
    let report = pipeline.run(&args.scan_inputs(), &version).await?;

    println!("{}", serde_json::to_string(&report.outputs)?);
    if let Some(ref path) = args.outputs_file {
        report
            .write_outputs_file(path)
            .await
            .with_context(|| format!("Failed to write outputs to {:?}", path))?;
    }

    match report.status {
        BuildStatus::Failed(message) => Err(anyhow::anyhow!(message)),
        BuildStatus::Passed | BuildStatus::Warning(_) => Ok(()),
    }
}
