//! Template loading
//!
//! Reads a template file with environment variable substitution and extracts
//! its `Resources` section as a [`ResourceTree`].

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::{Captures, Regex};
use scf_deploy_sdk::ResourceTree;
use serde::Deserialize;

use crate::error::{Error, Result};

pub const NAMESPACE_TYPE: &str = "TencentCloud::Serverless::Namespace";
pub const FUNCTION_TYPE: &str = "TencentCloud::Serverless::Function";

/// A loaded template
#[derive(Debug, Clone)]
pub struct Template {
    pub path: PathBuf,
    pub resources: ResourceTree,
}

#[derive(Deserialize)]
struct Document {
    #[serde(rename = "Resources")]
    resources: Option<ResourceTree>,
}

impl Template {
    /// Directory that relative `CodeUri` values resolve against
    pub fn base_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Load and check a template file
pub fn load(path: impl AsRef<Path>) -> Result<Template> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::TemplateNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    parse(path, &content)
}

/// Parse template content; `path` is only used for messages and `base_dir`
pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Template> {
    let path = path.into();
    let expanded = expand_env_vars(content);

    let document: Document =
        serde_yaml::from_str(&expanded).map_err(|e| Error::template_invalid(&path, e))?;
    let resources = document
        .resources
        .ok_or_else(|| Error::template_invalid(&path, "missing 'Resources' section"))?;

    check(&path, &resources)?;

    tracing::debug!(
        "Loaded template {:?}: {} namespaces, {} functions",
        path,
        resources.namespaces().count(),
        resources.function_count()
    );

    Ok(Template { path, resources })
}

fn check(path: &Path, resources: &ResourceTree) -> Result<()> {
    for (ns, entry) in resources.namespaces() {
        if let Some(kind) = entry.kind.as_deref() {
            if kind != NAMESPACE_TYPE {
                return Err(Error::template_invalid(
                    path,
                    format!("namespace '{}' has type '{}', expected '{}'", ns, kind, NAMESPACE_TYPE),
                ));
            }
        }
        for (name, spec) in entry.functions() {
            if let Some(kind) = spec.kind.as_deref() {
                if kind != FUNCTION_TYPE {
                    return Err(Error::template_invalid(
                        path,
                        format!("function '{}.{}' has type '{}', expected '{}'", ns, name, kind, FUNCTION_TYPE),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn braced_var() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid pattern")
    })
}

/// Expand environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}`; any other `$` text is kept as is.
fn expand_env_vars(input: &str) -> String {
    braced_var()
        .replace_all(input, |caps: &Captures| {
            let default = caps.get(2).map(|m| m.as_str());
            std::env::var(&caps[1]).unwrap_or_else(|_| default.unwrap_or("").to_string())
        })
        .into_owned()
}
