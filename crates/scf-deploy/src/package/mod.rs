//! Function packaging
//!
//! Walks the resource tree, applies the single-function filter, and turns
//! each retained function's code into an artifact:
//!
//! ```text
//! CodeUri ──▶ CodeSource ──▶ Archiver ──▶ ArtifactResolver ──▶ ArtifactReference
//!   ./hello     Directory      <uuid>.zip    upload / keep local   Remote | Local
//! ```
//!
//! The input tree is never mutated. The result pairs the filtered tree with an
//! overlay of artifact references keyed by namespace and function.

pub mod archive;
pub mod resolve;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use scf_deploy_sdk::{ArtifactReference, FunctionSpec, ResourceTree};
use url::Url;

use crate::error::{Error, Result};

pub use archive::{Archive, Archiver};
pub use resolve::ArtifactResolver;

/// Identifies one function in the tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionKey {
    pub namespace: String,
    pub function: String,
}

impl FunctionKey {
    pub fn new(namespace: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            function: function.into(),
        }
    }
}

/// Filtered tree plus the artifact chosen for each of its functions
#[derive(Debug, Clone, Default)]
pub struct PackagedTree {
    tree: ResourceTree,
    artifacts: BTreeMap<FunctionKey, ArtifactReference>,
}

impl PackagedTree {
    /// A tree whose functions carry no artifact yet
    pub fn new(tree: ResourceTree) -> Self {
        Self {
            tree,
            artifacts: BTreeMap::new(),
        }
    }

    pub fn with_artifact(mut self, key: FunctionKey, reference: ArtifactReference) -> Self {
        self.artifacts.insert(key, reference);
        self
    }

    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    pub fn artifact(&self, namespace: &str, function: &str) -> Option<&ArtifactReference> {
        self.artifacts.get(&FunctionKey::new(namespace, function))
    }

    pub fn artifacts(&self) -> impl Iterator<Item = (&FunctionKey, &ArtifactReference)> {
        self.artifacts.iter()
    }

    /// The function spec as the platform receives it, artifact applied
    pub fn resolved_spec(&self, namespace: &str, function: &str) -> Option<FunctionSpec> {
        let spec = self.tree.function(namespace, function)?;
        Some(match self.artifact(namespace, function) {
            Some(reference) => spec.with_artifact(reference),
            None => spec.clone(),
        })
    }

    /// The whole tree with every artifact written into its function
    pub fn annotated(&self) -> ResourceTree {
        let mut tree = self.tree.clone();
        for (key, reference) in &self.artifacts {
            tree.apply_artifact(&key.namespace, &key.function, reference);
        }
        tree
    }
}

/// Where a function's code comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSource {
    /// `cos://<bucket>/<key>`, already staged
    Remote { bucket: String, object_key: String },
    /// Pre-built `.zip` file
    Archive(PathBuf),
    /// Code directory (or single file)
    Directory(PathBuf),
}

impl CodeSource {
    /// Interpret a `CodeUri`; relative paths resolve against `base_dir`
    pub fn parse(code_uri: &str, base_dir: &Path) -> Result<Self> {
        let code_uri = code_uri.trim();
        if code_uri.is_empty() {
            return Err(Error::CodePathNotFound(String::new()));
        }

        // Single-letter schemes are Windows drive letters
        if let Ok(url) = Url::parse(code_uri) {
            if url.scheme().len() > 1 {
                return Self::from_url(code_uri, &url);
            }
        }

        let path = Path::new(code_uri);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        };

        let is_zip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if is_zip && path.is_file() {
            Ok(CodeSource::Archive(path))
        } else {
            Ok(CodeSource::Directory(path))
        }
    }

    fn from_url(code_uri: &str, url: &Url) -> Result<Self> {
        if url.scheme() != "cos" {
            return Err(Error::UnsupportedCodeUri(code_uri.to_string()));
        }
        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::UnsupportedCodeUri(code_uri.to_string()))?;
        let key = url.path().trim_start_matches('/');
        if key.is_empty() {
            return Err(Error::UnsupportedCodeUri(code_uri.to_string()));
        }
        Ok(CodeSource::Remote {
            bucket: bucket.to_string(),
            object_key: format!("/{}", key),
        })
    }
}

/// Produces a [`PackagedTree`] from a template's resources
#[derive(Debug, Clone)]
pub struct Packager {
    archiver: Archiver,
    resolver: ArtifactResolver,
    base_dir: PathBuf,
    function: Option<String>,
}

impl Packager {
    pub fn new(archiver: Archiver, resolver: ArtifactResolver) -> Self {
        Self {
            archiver,
            resolver,
            base_dir: PathBuf::from("."),
            function: None,
        }
    }

    /// Directory relative `CodeUri` values resolve against
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Only package (and later deploy) functions with this name
    pub fn with_function_filter(mut self, function: Option<String>) -> Self {
        self.function = function;
        self
    }

    /// Package every retained function, stopping at the first fatal error
    pub async fn package(&self, tree: &ResourceTree) -> Result<PackagedTree> {
        let filtered = tree.filtered(self.function.as_deref());

        if let Some(name) = &self.function {
            if filtered.function_count() == 0 {
                tracing::warn!("No function named '{}' found in template", name);
            }
        }

        let mut artifacts = BTreeMap::new();
        for (ns, name, spec) in filtered.functions() {
            let reference = self.package_function(spec).await?;
            tracing::debug!("Packaged function '{}' in namespace '{}': {:?}", name, ns, reference);
            artifacts.insert(FunctionKey::new(ns, name), reference);
        }

        Ok(PackagedTree {
            tree: filtered,
            artifacts,
        })
    }

    async fn package_function(&self, spec: &FunctionSpec) -> Result<ArtifactReference> {
        let Some(code_uri) = spec.properties.code_uri.as_deref() else {
            // Pre-staged code declared directly in the template
            return spec
                .properties
                .artifact()
                .ok_or_else(|| Error::CodePathNotFound(String::new()));
        };

        let archive = match CodeSource::parse(code_uri, &self.base_dir)? {
            CodeSource::Remote { bucket, object_key } => {
                return Ok(ArtifactReference::Remote { bucket, object_key });
            }
            CodeSource::Archive(path) => {
                let archiver = self.archiver.clone();
                tokio::task::spawn_blocking(move || archiver.import_zip(&path)).await??
            }
            CodeSource::Directory(path) => {
                if !path.exists() {
                    return Err(Error::CodePathNotFound(code_uri.to_string()));
                }
                let archiver = self.archiver.clone();
                tokio::task::spawn_blocking(move || archiver.archive_dir(&path)).await??
            }
        };

        self.resolver.resolve(&archive).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{function, MemoryStorage};
    use scf_deploy_sdk::resource::{COS_BUCKET_NAME, COS_OBJECT_NAME, LOCAL_ZIP_FILE};
    use scf_deploy_sdk::resource::NamespaceEntry;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::Arc;

    struct Fixture {
        root: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
            }
        }

        fn code_dir(&self, name: &str, files: &[&str]) -> String {
            let dir = self.root.path().join(name);
            for file in files {
                let path = dir.join(file);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, *file).unwrap();
            }
            name.to_string()
        }

        fn packager(&self, resolver: ArtifactResolver) -> Packager {
            Packager::new(Archiver::new(self.root.path().join(".scf_build")), resolver)
                .with_base_dir(self.root.path())
        }
    }

    fn entry_count(path: &Path) -> usize {
        let file = fs::File::open(path).unwrap();
        zip::ZipArchive::new(file).unwrap().len()
    }

    #[tokio::test]
    async fn test_local_packaging() {
        let fx = Fixture::new();
        let uri = fx.code_dir("f1", &["index.py", "lib/a.py", "lib/b.py"]);
        let tree = ResourceTree::new()
            .with_namespace("ns1", NamespaceEntry::new("ns").with_function("f1", function(&uri)));

        let packaged = fx.packager(ArtifactResolver::local()).package(&tree).await.unwrap();

        let annotated = packaged.annotated();
        let props = &annotated.function("ns1", "f1").unwrap().properties;
        let zip_path = PathBuf::from(props.attribute(LOCAL_ZIP_FILE).unwrap().as_str().unwrap());
        assert!(zip_path.is_absolute());
        assert!(zip_path.starts_with(fx.root.path().canonicalize().unwrap().join(".scf_build")));
        assert_eq!(entry_count(&zip_path), 3);
        assert!(props.attribute(COS_BUCKET_NAME).is_none());
        // the input tree is left as it was
        assert!(tree.function("ns1", "f1").unwrap().properties.artifact().is_none());
    }

    #[tokio::test]
    async fn test_remote_packaging() {
        let fx = Fixture::new();
        let uri = fx.code_dir("f1", &["index.py"]);
        let tree = ResourceTree::new()
            .with_namespace("ns1", NamespaceEntry::new("ns").with_function("f1", function(&uri)));
        let storage = Arc::new(MemoryStorage::default());

        let packaged = fx
            .packager(ArtifactResolver::remote("my-bucket", storage.clone()))
            .package(&tree)
            .await
            .unwrap();

        let spec = packaged.resolved_spec("ns1", "f1").unwrap();
        let props = &spec.properties;
        assert_eq!(props.attribute(COS_BUCKET_NAME).unwrap(), "my-bucket");
        let object = props.attribute(COS_OBJECT_NAME).unwrap().as_str().unwrap();
        assert!(object.starts_with('/'));
        assert!(props.attribute(LOCAL_ZIP_FILE).is_none());

        let uploads = storage.objects();
        assert_eq!(uploads.len(), 1);
        assert_eq!(format!("/{}", uploads[0].1), object);
    }

    #[tokio::test]
    async fn test_missing_code_path_is_fatal() {
        let fx = Fixture::new();
        let good = fx.code_dir("good", &["index.py"]);
        let tree = ResourceTree::new().with_namespace(
            "ns1",
            NamespaceEntry::new("ns")
                .with_function("a", function(&good))
                .with_function("b", function("does-not-exist")),
        );

        let err = fx.packager(ArtifactResolver::local()).package(&tree).await.unwrap_err();
        assert!(matches!(err, Error::CodePathNotFound(ref uri) if uri == "does-not-exist"));
    }

    #[tokio::test]
    async fn test_filter_drops_other_functions() {
        let fx = Fixture::new();
        let uri = fx.code_dir("code", &["index.py"]);
        let tree = ResourceTree::new()
            .with_namespace(
                "ns1",
                NamespaceEntry::new("ns")
                    .with_function("f1", function(&uri))
                    .with_function("f2", function("missing-but-filtered")),
            )
            .with_namespace("ns2", NamespaceEntry::new("ns").with_function("f1", function(&uri)));

        let packaged = fx
            .packager(ArtifactResolver::local())
            .with_function_filter(Some("f1".into()))
            .package(&tree)
            .await
            .unwrap();

        let kept: Vec<_> = packaged.tree().functions().map(|(ns, f, _)| (ns, f)).collect();
        assert_eq!(kept, vec![("ns1", "f1"), ("ns2", "f1")]);
        assert_eq!(packaged.artifacts().count(), 2);
    }

    #[tokio::test]
    async fn test_archive_names_are_unique() {
        let fx = Fixture::new();
        let uri = fx.code_dir("code", &["index.py"]);
        let mut entry = NamespaceEntry::new("ns");
        for i in 0..8 {
            entry = entry.with_function(format!("f{i}"), function(&uri));
        }
        let tree = ResourceTree::new().with_namespace("ns1", entry);

        let packaged = fx.packager(ArtifactResolver::local()).package(&tree).await.unwrap();

        let paths: HashSet<_> = packaged
            .artifacts()
            .map(|(_, reference)| match reference {
                ArtifactReference::Local { path } => path.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(paths.len(), 8);
    }

    #[tokio::test]
    async fn test_prebuilt_and_remote_code_uris() {
        let fx = Fixture::new();
        let uri = fx.code_dir("code", &["index.py"]);
        let built = Archiver::new(fx.root.path().join("prebuilt"))
            .archive_dir(&fx.root.path().join(&uri))
            .unwrap();

        let tree = ResourceTree::new().with_namespace(
            "ns1",
            NamespaceEntry::new("ns")
                .with_function("zip", function(built.path.to_str().unwrap()))
                .with_function("cos", function("cos://code-bucket/releases/app.zip")),
        );

        let packaged = fx.packager(ArtifactResolver::local()).package(&tree).await.unwrap();

        match packaged.artifact("ns1", "zip").unwrap() {
            ArtifactReference::Local { path } => {
                assert_ne!(path, &built.path);
                assert_eq!(entry_count(path), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            packaged.artifact("ns1", "cos").unwrap(),
            &ArtifactReference::Remote {
                bucket: "code-bucket".into(),
                object_key: "/releases/app.zip".into()
            }
        );
    }

    #[test]
    fn test_code_source_parse() {
        let base = Path::new("/work");
        assert_eq!(
            CodeSource::parse("./hello", base).unwrap(),
            CodeSource::Directory(PathBuf::from("/work/./hello"))
        );
        assert_eq!(
            CodeSource::parse("/abs/hello", base).unwrap(),
            CodeSource::Directory(PathBuf::from("/abs/hello"))
        );
        assert!(matches!(
            CodeSource::parse("https://example.com/code.zip", base),
            Err(Error::UnsupportedCodeUri(_))
        ));
        assert!(matches!(CodeSource::parse("cos://bucket", base), Err(Error::UnsupportedCodeUri(_))));
        assert!(matches!(CodeSource::parse("  ", base), Err(Error::CodePathNotFound(_))));
    }
}
