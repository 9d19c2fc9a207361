use crate::config::toml_config::ToolConfig;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "cruise-ctd")]
#[command(about = "Shipboard CTD cast tools: platform comparisons, .cnv conversion, sheet updates")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory where output files are saved
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit JSON log lines instead of the compact format
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Compare platform data with the shipboard CTD casts mapped to a deployment
    Compare(CompareArgs),
    /// Convert shipboard CTD .cnv files to .csv files
    Convert(ConvertArgs),
    /// Fill missing cast date/lat/lon in the cast sheet from the .cnv files
    UpdateCasts(UpdateCastsArgs),
    /// Sync the platform-to-cast mapping sheet with the deployment sheets
    UpdateMapping(UpdateMappingArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CompareArgs {
    /// Reference designator, e.g. CP02PMUO-WFP01-03-CTDPFK000
    pub refdes: String,

    /// D00009 compares against the deployment cast, R00009 against the recovery cast
    pub deployment: String,

    /// Delivery method; chosen interactively when omitted
    #[arg(long)]
    pub method: Option<String>,

    /// Data stream; chosen interactively when omitted
    #[arg(long)]
    pub stream: Option<String>,

    #[arg(long, env = "OOI_API_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "OOI_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Platform-to-cast mapping sheet (path or URL)
    #[arg(long)]
    pub mapping_table: Option<String>,

    /// Cast sheet (path or URL)
    #[arg(long)]
    pub cast_table: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ConvertArgs {
    /// A single .cnv file, or a .csv cast sheet (path or URL) listing the files
    pub input: String,

    /// Also bundle the converted files into this ZIP archive
    #[arg(long)]
    pub archive: Option<String>,

    #[arg(long)]
    pub strip_components: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct UpdateCastsArgs {
    /// Cast sheet (path or URL)
    #[arg(long)]
    pub cast_table: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct UpdateMappingArgs {
    /// Deployment directory of an asset management checkout
    pub deployment_dir: PathBuf,

    /// Platform-to-cast mapping sheet (path or URL)
    #[arg(long)]
    pub mapping_table: Option<String>,
}

impl CliConfig {
    /// Loads the TOML file (if any) and applies the command line on top of it.
    pub fn resolve(&self) -> Result<ToolConfig> {
        let mut config = match &self.config {
            Some(path) => ToolConfig::from_file(path)?,
            None => ToolConfig::default(),
        };

        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }

        match &self.command {
            Command::Compare(args) => {
                if let Some(username) = &args.username {
                    config.api.username = username.clone();
                }
                if let Some(token) = &args.token {
                    config.api.token = token.clone();
                }
                if let Some(table) = &args.mapping_table {
                    config.sources.mapping_table = table.clone();
                }
                if let Some(table) = &args.cast_table {
                    config.sources.cast_table = table.clone();
                }
            }
            Command::Convert(args) => {
                if let Some(strip) = args.strip_components {
                    config.convert.strip_components = strip;
                }
            }
            Command::UpdateCasts(args) => {
                if let Some(table) = &args.cast_table {
                    config.sources.cast_table = table.clone();
                }
            }
            Command::UpdateMapping(args) => {
                if let Some(table) = &args.mapping_table {
                    config.sources.mapping_table = table.clone();
                }
            }
        }

        Ok(config)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Compare(args) => {
                validation::validate_refdes("refdes", &args.refdes)?;
                validation::validate_deployment("deployment", &args.deployment)?;
            }
            Command::Convert(args) => {
                validation::validate_location("input", &args.input)?;
                if let Some(archive) = &args.archive {
                    validation::validate_non_empty_string("archive", archive)?;
                }
            }
            Command::UpdateCasts(_) => {}
            Command::UpdateMapping(args) => {
                validation::validate_path(
                    "deployment_dir",
                    &args.deployment_dir.to_string_lossy(),
                )?;
            }
        }
        Ok(())
    }
}
