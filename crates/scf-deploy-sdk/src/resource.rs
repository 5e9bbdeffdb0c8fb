//! Resource tree model
//!
//! A template's `Resources` section maps namespace names to namespace
//! entries. Each entry carries a reserved `Type` key marking the namespace's
//! resource type; every other key is a function.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Reserved resource-type key present on namespaces and functions
pub const TYPE_KEY: &str = "Type";

/// Remote artifact: bucket holding the function archive
pub const COS_BUCKET_NAME: &str = "CosBucketName";

/// Remote artifact: object key of the function archive
pub const COS_OBJECT_NAME: &str = "CosObjectName";

/// Local artifact: absolute path of the function archive
pub const LOCAL_ZIP_FILE: &str = "LocalZipFile";

const ARTIFACT_KEYS: &[&str] = &[COS_BUCKET_NAME, COS_OBJECT_NAME, LOCAL_ZIP_FILE];

/// Namespace name → namespace entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTree {
    namespaces: BTreeMap<String, NamespaceEntry>,
}

impl ResourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a namespace
    pub fn insert_namespace(&mut self, name: impl Into<String>, entry: NamespaceEntry) {
        self.namespaces.insert(name.into(), entry);
    }

    pub fn with_namespace(mut self, name: impl Into<String>, entry: NamespaceEntry) -> Self {
        self.insert_namespace(name, entry);
        self
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceEntry> {
        self.namespaces.get(name)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &NamespaceEntry)> {
        self.namespaces.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Every function as `(namespace, function name, spec)`
    pub fn functions(&self) -> impl Iterator<Item = (&str, &str, &FunctionSpec)> {
        self.namespaces().flat_map(|(ns, entry)| {
            entry
                .functions()
                .map(move |(name, spec)| (ns, name, spec))
        })
    }

    pub fn function(&self, namespace: &str, name: &str) -> Option<&FunctionSpec> {
        self.namespace(namespace).and_then(|entry| entry.function(name))
    }

    pub(crate) fn function_mut(&mut self, namespace: &str, name: &str) -> Option<&mut FunctionSpec> {
        self.namespaces
            .get_mut(namespace)
            .and_then(|entry| entry.functions.get_mut(name))
    }

    pub fn function_count(&self) -> usize {
        self.namespaces.values().map(|entry| entry.functions.len()).sum()
    }

    /// Build a new tree that only holds functions named `function`.
    ///
    /// With no filter the copy is complete. Namespaces are always kept, so a
    /// namespace whose functions were all dropped remains as an empty entry.
    pub fn filtered(&self, function: Option<&str>) -> ResourceTree {
        let Some(wanted) = function else {
            return self.clone();
        };

        let namespaces = self
            .namespaces
            .iter()
            .map(|(name, entry)| {
                let functions = entry
                    .functions
                    .iter()
                    .filter(|(func, _)| func.as_str() == wanted)
                    .map(|(func, spec)| (func.clone(), spec.clone()))
                    .collect();
                let filtered = NamespaceEntry {
                    kind: entry.kind.clone(),
                    functions,
                };
                (name.clone(), filtered)
            })
            .collect();

        ResourceTree { namespaces }
    }

    /// Write `reference` into the named function's properties
    pub fn apply_artifact(
        &mut self,
        namespace: &str,
        name: &str,
        reference: &ArtifactReference,
    ) -> bool {
        match self.function_mut(namespace, name) {
            Some(spec) => {
                spec.properties.set_artifact(reference);
                true
            }
            None => false,
        }
    }
}

/// One namespace: its type marker plus its functions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceEntry {
    /// Value of the reserved `Type` key
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Every key other than `Type`
    #[serde(flatten)]
    functions: BTreeMap<String, FunctionSpec>,
}

impl NamespaceEntry {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            functions: BTreeMap::new(),
        }
    }

    pub fn with_function(mut self, name: impl Into<String>, spec: FunctionSpec) -> Self {
        self.functions.insert(name.into(), spec);
        self
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &FunctionSpec)> {
        self.functions.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name)
    }

    /// True when no function is left in the namespace
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }
}

/// Declarative description of one deployable function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(rename = "Properties")]
    pub properties: FunctionProperties,
}

impl FunctionSpec {
    pub fn new(properties: FunctionProperties) -> Self {
        Self {
            kind: None,
            properties,
        }
    }

    pub fn with_event(mut self, name: impl Into<String>, trigger: TriggerSpec) -> Self {
        self.properties.events.insert(name.into(), trigger);
        self
    }

    /// Copy of this spec with `reference` applied to its properties
    pub fn with_artifact(&self, reference: &ArtifactReference) -> FunctionSpec {
        let mut spec = self.clone();
        spec.properties.set_artifact(reference);
        spec
    }
}

/// Declared attributes of a function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionProperties {
    /// Remote URL, local directory or pre-built archive path
    #[serde(rename = "CodeUri", default, skip_serializing_if = "Option::is_none")]
    pub code_uri: Option<String>,

    /// Trigger name → trigger configuration
    #[serde(rename = "Events", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, TriggerSpec>,

    /// Handler, Runtime, MemorySize, ... and the artifact fields
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl FunctionProperties {
    pub fn new(code_uri: impl Into<String>) -> Self {
        Self {
            code_uri: Some(code_uri.into()),
            ..Self::default()
        }
    }

    pub fn with_event(mut self, name: impl Into<String>, trigger: TriggerSpec) -> Self {
        self.events.insert(name.into(), trigger);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Set a declared attribute. Artifact keys are refused; use
    /// [`FunctionProperties::set_artifact`] for those.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if ARTIFACT_KEYS.contains(&key.as_str()) {
            return false;
        }
        self.attributes.insert(key, value);
        true
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Record where the packaged code lives. Any previously set reference of
    /// either kind is removed first, so exactly one kind is present afterwards.
    pub fn set_artifact(&mut self, reference: &ArtifactReference) {
        for key in ARTIFACT_KEYS {
            self.attributes.remove(*key);
        }
        match reference {
            ArtifactReference::Remote { bucket, object_key } => {
                self.attributes
                    .insert(COS_BUCKET_NAME.to_string(), Value::String(bucket.clone()));
                self.attributes
                    .insert(COS_OBJECT_NAME.to_string(), Value::String(object_key.clone()));
            }
            ArtifactReference::Local { path } => {
                self.attributes.insert(
                    LOCAL_ZIP_FILE.to_string(),
                    Value::String(path.to_string_lossy().into_owned()),
                );
            }
        }
    }

    /// The artifact reference currently recorded, if any.
    /// A complete remote pair wins over a local path.
    pub fn artifact(&self) -> Option<ArtifactReference> {
        let text = |key: &str| self.attributes.get(key).and_then(Value::as_str);

        if let (Some(bucket), Some(object_key)) = (text(COS_BUCKET_NAME), text(COS_OBJECT_NAME)) {
            return Some(ArtifactReference::Remote {
                bucket: bucket.to_string(),
                object_key: object_key.to_string(),
            });
        }
        text(LOCAL_ZIP_FILE).map(|path| ArtifactReference::Local {
            path: PathBuf::from(path),
        })
    }
}

/// Opaque trigger configuration, e.g. `{Type: Timer, Properties: {...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerSpec(Map<String, Value>);

impl TriggerSpec {
    pub fn new(config: Map<String, Value>) -> Self {
        Self(config)
    }

    /// Trigger type (`Timer`, `Cos`, `APIGW`, ...)
    pub fn kind(&self) -> Option<&str> {
        self.0.get(TYPE_KEY).and_then(Value::as_str)
    }

    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.0.get("Properties").and_then(Value::as_object)
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Where the packaged code of one function lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactReference {
    /// Archive uploaded to object storage
    Remote { bucket: String, object_key: String },
    /// Archive kept in the local build directory
    Local { path: PathBuf },
}

impl ArtifactReference {
    pub fn is_remote(&self) -> bool {
        matches!(self, ArtifactReference::Remote { .. })
    }
}
