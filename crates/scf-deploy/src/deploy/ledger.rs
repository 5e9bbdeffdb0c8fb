//! Per-run record of deploy outcomes

use std::fmt;

use crate::error::DeployError;

/// What was deployed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Function { name: String },
    Trigger { name: String, function: String },
}

impl Target {
    pub fn function(name: impl Into<String>) -> Self {
        Target::Function { name: name.into() }
    }

    pub fn trigger(name: impl Into<String>, function: impl Into<String>) -> Self {
        Target::Trigger {
            name: name.into(),
            function: function.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Target::Function { name } | Target::Trigger { name, .. } => name,
        }
    }
}

/// Lifecycle of a function or trigger within one run.
///
/// `Pending → Deploying → {Deployed, Failed}`; only the terminal states are
/// recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStatus {
    Pending,
    Deploying,
    Deployed,
    Failed,
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeployStatus::Pending => "Pending",
            DeployStatus::Deploying => "Deploying",
            DeployStatus::Deployed => "Deployed",
            DeployStatus::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// Outcome for a single function or trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub target: Target,
    pub namespace: String,
    pub status: DeployStatus,
    pub error: Option<DeployError>,
}

impl DeployOutcome {
    pub fn deployed(target: Target, namespace: impl Into<String>) -> Self {
        Self {
            target,
            namespace: namespace.into(),
            status: DeployStatus::Deployed,
            error: None,
        }
    }

    pub fn failed(target: Target, namespace: impl Into<String>, error: DeployError) -> Self {
        Self {
            target,
            namespace: namespace.into(),
            status: DeployStatus::Failed,
            error: Some(error),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.request_id.as_deref())
    }
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.status)?;
        match &self.target {
            Target::Function { name } => write!(f, "function {}/{}", self.namespace, name)?,
            Target::Trigger { name, function } => {
                write!(f, "trigger {}/{}/{}", self.namespace, function, name)?
            }
        }
        if let Some(error) = &self.error {
            write!(f, ": {}", error.message)?;
            if let Some(request_id) = &error.request_id {
                write!(f, " (RequestId: {})", request_id)?;
            }
        }
        Ok(())
    }
}

/// Every outcome of a run, in deploy order
#[derive(Debug, Clone, Default)]
pub struct DeployLedger {
    outcomes: Vec<DeployOutcome>,
}

impl DeployLedger {
    pub fn record(&mut self, outcome: DeployOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[DeployOutcome] {
        &self.outcomes
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeployOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == DeployStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn status_of_function(&self, namespace: &str, function: &str) -> Option<DeployStatus> {
        self.find(namespace, |target| {
            matches!(target, Target::Function { name } if name == function)
        })
    }

    pub fn status_of_trigger(
        &self,
        namespace: &str,
        function: &str,
        trigger: &str,
    ) -> Option<DeployStatus> {
        self.find(namespace, |target| {
            matches!(target, Target::Trigger { name, function: f } if name == trigger && f == function)
        })
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn find(&self, namespace: &str, matches: impl Fn(&Target) -> bool) -> Option<DeployStatus> {
        self.outcomes
            .iter()
            .find(|o| o.namespace == namespace && matches(&o.target))
            .map(|o| o.status)
    }
}

impl Extend<DeployOutcome> for DeployLedger {
    fn extend<I: IntoIterator<Item = DeployOutcome>>(&mut self, iter: I) {
        self.outcomes.extend(iter);
    }
}

impl fmt::Display for DeployLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures().count();
        writeln!(
            f,
            "Deployed {}, failed {}",
            self.outcomes.len() - failed,
            failed
        )?;
        for outcome in &self.outcomes {
            writeln!(f, "  {}", outcome)?;
        }
        Ok(())
    }
}
