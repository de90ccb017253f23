//! usdm-uploader - USDM to OpenStudyBuilder command-line uploader
//!
//! Subcommands:
//! - `create-study`: create a study from a USDM file and print its uid
//! - `upload`: replicate a USDM file's design into an existing study
//! - `download`: export a study's USDM definition from OSB

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use usdm_common::config::TomlConfig;
use usdm_common::UsdmDocument;
use usdm_uploader::config::UploaderSettings;
use usdm_uploader::osb::{lookup_study_uid, OsbClient};
use usdm_uploader::services::{study_creator, usdm_downloader};
use usdm_uploader::StudyUploader;

/// Command-line arguments for usdm-uploader
#[derive(Parser, Debug)]
#[command(name = "usdm-uploader")]
#[command(about = "Upload USDM study definitions to OpenStudyBuilder")]
#[command(version)]
struct Cli {
    /// OSB API base URL (overrides OSB_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Config file (default: <config dir>/usdm-osb/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a study from a USDM file
    CreateStudy {
        /// USDM JSON file
        usdm_file: PathBuf,
    },
    /// Upload a USDM file's design into an existing study
    Upload(UploadArgs),
    /// Download a study's USDM definition
    Download {
        /// Study id, e.g. CDISC-PILOT-LZZT
        study_id: String,
        /// Output file (default: <study uid>_usdm.json)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// USDM JSON file
    usdm_file: PathBuf,

    /// Target study id, resolved to a uid through OSB
    #[arg(long, conflicts_with = "study_uid", required_unless_present = "study_uid")]
    study_id: Option<String>,

    /// Target study uid
    #[arg(long)]
    study_uid: Option<String>,

    /// Study number for placeholder activity groups (default: study id, else uid)
    #[arg(long)]
    study_number: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml_config = TomlConfig::load_or_default(cli.config.as_deref());
    let log_level = toml_config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    info!(
        "Starting usdm-uploader v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml_config = toml_config.context("Failed to load configuration")?;
    let settings = UploaderSettings::resolve(cli.base_url.as_deref(), &toml_config);
    let client = OsbClient::new(&settings.base_url, settings.request_timeout)
        .context("Failed to create OSB client")?;

    match cli.command {
        Command::CreateStudy { usdm_file } => {
            let doc = load_document(&usdm_file)?;
            let study_uid = study_creator::create_study(&client, &doc)
                .await
                .context("Failed to create study")?;
            println!("{}", study_uid);
        }
        Command::Upload(args) => {
            let doc = load_document(&args.usdm_file)?;
            let study_uid = match (&args.study_uid, &args.study_id) {
                (Some(uid), _) => uid.clone(),
                (None, Some(id)) => lookup_study_uid(&client, id)
                    .await
                    .context("Failed to resolve study id")?,
                (None, None) => anyhow::bail!("either --study-id or --study-uid is required"),
            };
            let study_number = args
                .study_number
                .or(args.study_id)
                .unwrap_or_else(|| study_uid.clone());

            let report = StudyUploader::new(&client, settings)
                .upload(&doc, &study_uid, &study_number)
                .await
                .context("Upload failed")?;
            info!(study_uid = %study_uid, "{:?}", report);
        }
        Command::Download { study_id, output } => {
            let path = usdm_downloader::download_usdm(&client, &study_id, output.as_deref())
                .await
                .context("Download failed")?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn load_document(path: &std::path::Path) -> Result<UsdmDocument> {
    UsdmDocument::load(path).with_context(|| format!("Failed to read USDM file {}", path.display()))
}
