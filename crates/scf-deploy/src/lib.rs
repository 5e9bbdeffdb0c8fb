//! scf-deploy - package serverless function trees and deploy them
//!
//! A run has two phases:
//! - [`package::Packager`] turns every function's code into an artifact
//!   (a local archive or an object-storage reference). Any fatal error here
//!   stops the run before a single remote deploy call is made.
//! - [`deploy::Deployer`] upserts each function and then its triggers,
//!   recording every outcome in a [`deploy::DeployLedger`].

pub mod cli;
pub mod clients;
pub mod config;
pub mod deploy;
pub mod error;
pub mod package;
pub mod template;

#[cfg(test)]
mod testing;

use scf_deploy_sdk::ResourceTree;

pub use config::AppConfig;
pub use deploy::{DeployLedger, DeployOptions, Deployer};
pub use error::{DeployError, Error, Result};
pub use package::{PackagedTree, Packager};

/// Package `tree`, then deploy the packaged result
pub async fn package_and_deploy(
    packager: &Packager,
    deployer: &Deployer,
    tree: &ResourceTree,
) -> Result<DeployLedger> {
    let packaged = packager.package(tree).await?;
    tracing::info!(
        "Packaged {} functions, {} with remote artifacts",
        packaged.tree().function_count(),
        packaged.artifacts().filter(|(_, r)| r.is_remote()).count()
    );
    Ok(deployer.deploy(&packaged).await)
}
