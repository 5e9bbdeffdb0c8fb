//! Command line surface: `deploy`, `package` and `config get`

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use scf_deploy_sdk::ResourceTree;

use crate::clients::{CosStorage, HttpPlatform};
use crate::config::{AppConfig, ConfigAttr};
use crate::deploy::{DeployOptions, Deployer};
use crate::package::{Archiver, ArtifactResolver, Packager};
use crate::template::{self, Template};

#[derive(Debug, Parser)]
#[command(name = "scf-deploy", version, about = "Package and deploy serverless functions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Package function code and deploy functions with their triggers
    Deploy(DeployArgs),
    /// Package function code and print the resulting template
    Package(PackageArgs),
    /// Show account configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, Args)]
pub struct PackageArgs {
    /// Template file describing namespaces and functions
    #[arg(short = 't', long, env = "SCF_TEMPLATE_FILE", default_value = "template.yaml")]
    pub template_file: PathBuf,

    /// Upload archives to this COS bucket instead of sending them inline
    #[arg(short = 'c', long)]
    pub cos_bucket: Option<String>,

    /// Only handle the function with this name
    #[arg(long)]
    pub function: Option<String>,
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub package: PackageArgs,

    /// Overwrite functions that already exist
    #[arg(short = 'f', long)]
    pub forced: bool,

    /// Leave triggers untouched
    #[arg(long)]
    pub skip_event: bool,

    /// Functions deployed concurrently within a namespace
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print configured attributes; all of them when none is selected
    Get(ConfigGetArgs),
}

#[derive(Debug, Args)]
pub struct ConfigGetArgs {
    #[arg(long)]
    pub secret_id: bool,
    #[arg(long)]
    pub secret_key: bool,
    #[arg(long)]
    pub region: bool,
    #[arg(long)]
    pub appid: bool,
}

impl ConfigGetArgs {
    pub fn selected(&self) -> Vec<ConfigAttr> {
        [
            (self.secret_id, ConfigAttr::SecretId),
            (self.secret_key, ConfigAttr::SecretKey),
            (self.region, ConfigAttr::Region),
            (self.appid, ConfigAttr::Appid),
        ]
        .into_iter()
        .filter_map(|(on, attr)| on.then_some(attr))
        .collect()
    }
}

#[derive(Serialize)]
struct PackagedDocument {
    #[serde(rename = "Resources")]
    resources: ResourceTree,
}

/// Run a parsed command line; the exit code reflects deploy failures
pub async fn run(cli: Cli, config: AppConfig) -> Result<ExitCode> {
    match cli.command {
        Command::Deploy(args) => deploy(args, &config).await,
        Command::Package(args) => package(args, &config).await,
        Command::Config {
            action: ConfigCommand::Get(args),
        } => {
            println!("{}", config.render_attrs(&args.selected()));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn deploy(args: DeployArgs, config: &AppConfig) -> Result<ExitCode> {
    let template = template::load(&args.package.template_file)?;
    let packager = packager(&args.package, config, &template)?;

    let platform = HttpPlatform::from_config(config).context("Failed to set up platform client")?;
    let options = DeployOptions {
        forced: args.forced,
        skip_triggers: args.skip_event,
        jobs: args.jobs.unwrap_or(config.deploy_jobs),
    };
    let deployer = Deployer::new(Arc::new(platform), options);

    let ledger = crate::package_and_deploy(&packager, &deployer, &template.resources).await?;
    print!("{}", ledger);

    Ok(if ledger.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn package(args: PackageArgs, config: &AppConfig) -> Result<ExitCode> {
    let template = template::load(&args.template_file)?;
    let packaged = packager(&args, config, &template)?
        .package(&template.resources)
        .await?;

    let document = PackagedDocument {
        resources: packaged.annotated(),
    };
    print!("{}", serde_yaml::to_string(&document)?);
    Ok(ExitCode::SUCCESS)
}

fn packager(args: &PackageArgs, config: &AppConfig, template: &Template) -> Result<Packager> {
    let resolver = match &args.cos_bucket {
        Some(bucket) => {
            let storage = CosStorage::from_config(config).context("Failed to set up COS client")?;
            ArtifactResolver::remote(bucket.clone(), Arc::new(storage))
        }
        None => ArtifactResolver::local(),
    };

    Ok(Packager::new(Archiver::new(&config.build_dir), resolver)
        .with_base_dir(template.base_dir())
        .with_function_filter(args.function.clone()))
}
