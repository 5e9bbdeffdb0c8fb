//! Deployment of packaged functions and their triggers
//!
//! Each function is upserted independently; its triggers are upserted only
//! after the function itself succeeded. Failures are logged as they happen
//! and recorded in the [`DeployLedger`], never aborting the run.

pub mod ledger;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use scf_deploy_sdk::{FunctionPlatform, TriggerSpec};

use crate::error::DeployError;
use crate::package::PackagedTree;

pub use ledger::{DeployLedger, DeployOutcome, DeployStatus, Target};

/// Run-level deploy switches
#[derive(Debug, Clone, Copy)]
pub struct DeployOptions {
    /// Overwrite functions that already exist
    pub forced: bool,
    /// Leave existing triggers alone
    pub skip_triggers: bool,
    /// Functions of one namespace deployed concurrently; 1 is sequential
    pub jobs: usize,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            forced: false,
            skip_triggers: false,
            jobs: 1,
        }
    }
}

/// Drives function and trigger upserts against a platform
#[derive(Clone)]
pub struct Deployer {
    platform: Arc<dyn FunctionPlatform>,
    options: DeployOptions,
}

impl Deployer {
    pub fn new(platform: Arc<dyn FunctionPlatform>, options: DeployOptions) -> Self {
        Self { platform, options }
    }

    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Deploy every function of `packaged`, namespace by namespace.
    ///
    /// Within a namespace up to `jobs` functions are in flight at once. Results
    /// are collected in tree order, and a namespace's `end` is announced only
    /// once all of its functions (and their triggers) are done.
    pub async fn deploy(&self, packaged: &PackagedTree) -> DeployLedger {
        let mut ledger = DeployLedger::default();
        let jobs = self.options.jobs.max(1);

        for (ns, entry) in packaged.tree().namespaces() {
            if entry.is_empty() {
                continue;
            }

            tracing::info!("deploy {} begin", ns);

            let results: Vec<Vec<DeployOutcome>> = stream::iter(entry.functions())
                .map(|(name, _)| self.deploy_function(packaged, ns, name))
                .buffered(jobs)
                .collect()
                .await;

            for outcomes in results {
                ledger.extend(outcomes);
            }

            tracing::info!("deploy {} end", ns);
        }

        ledger
    }

    async fn deploy_function(
        &self,
        packaged: &PackagedTree,
        namespace: &str,
        name: &str,
    ) -> Vec<DeployOutcome> {
        let Some(spec) = packaged.resolved_spec(namespace, name) else {
            return Vec::new();
        };

        tracing::debug!(status = %DeployStatus::Deploying, "function '{}' in namespace '{}'", name, namespace);

        let result = self
            .platform
            .upsert_function(&spec, name, namespace, self.options.forced)
            .await;

        if let Err(err) = result {
            let err = DeployError::function(err);
            report_failure("function", name, &err);
            return vec![DeployOutcome::failed(Target::function(name), namespace, err)];
        }

        tracing::info!("Deploy function '{}' success", name);
        let mut outcomes = vec![DeployOutcome::deployed(Target::function(name), namespace)];

        if !self.options.skip_triggers {
            for (trigger_name, trigger) in &spec.properties.events {
                outcomes.push(self.deploy_trigger(trigger, trigger_name, name, namespace).await);
            }
        }

        outcomes
    }

    async fn deploy_trigger(
        &self,
        trigger: &TriggerSpec,
        trigger_name: &str,
        function_name: &str,
        namespace: &str,
    ) -> DeployOutcome {
        tracing::debug!(status = %DeployStatus::Deploying, "trigger '{}' of function '{}'", trigger_name, function_name);

        let target = Target::trigger(trigger_name, function_name);
        match self
            .platform
            .upsert_trigger(trigger, trigger_name, function_name, namespace)
            .await
        {
            Ok(()) => {
                tracing::info!("Deploy trigger '{}' success", trigger_name);
                DeployOutcome::deployed(target, namespace)
            }
            Err(err) => {
                let err = DeployError::trigger(err);
                report_failure("trigger", trigger_name, &err);
                DeployOutcome::failed(target, namespace, err)
            }
        }
    }
}

fn report_failure(what: &str, name: &str, err: &DeployError) {
    tracing::error!("Deploy {} '{}' failure. Error: {}.", what, name, err.message);
    if let Some(request_id) = &err.request_id {
        tracing::error!("RequestId: {}", request_id);
    }
}
