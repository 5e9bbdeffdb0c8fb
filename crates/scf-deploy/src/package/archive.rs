//! Function archives
//!
//! Compresses a function's code directory into an in-memory zip and persists
//! it to the build directory under a freshly generated name.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{Error, Result};

/// A persisted function archive
#[derive(Debug, Clone)]
pub struct Archive {
    /// Unique file name, `<uuid>.zip`
    pub name: String,
    /// Absolute path of the persisted file
    pub path: PathBuf,
    /// Archive contents
    pub bytes: Bytes,
    /// Entry names, relative to the code root
    pub entries: Vec<String>,
}

/// Builds archives into a shared build directory
#[derive(Debug, Clone)]
pub struct Archiver {
    build_dir: PathBuf,
}

impl Archiver {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Archive every regular file below `code_root`.
    ///
    /// A regular file given as root yields a one-entry archive. The build
    /// directory is skipped when it lies inside the root. Links to files are
    /// stored under the link's name with the target's contents; links to
    /// directories are not descended into.
    pub fn archive_dir(&self, code_root: &Path) -> Result<Archive> {
        if !code_root.exists() {
            return Err(Error::CodePathNotFound(code_root.display().to_string()));
        }

        let build_dir = self.ensure_build_dir()?;
        let root = code_root.canonicalize()?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = entry_options();
        let mut entries = Vec::new();

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.path() != build_dir);

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_symlink() {
                if !linked_file(entry.path())? {
                    tracing::debug!("Skipping linked directory {:?}", entry.path());
                    continue;
                }
            } else if !entry.file_type().is_file() {
                continue;
            }

            let name = if entry.depth() == 0 {
                entry.file_name().to_string_lossy().into_owned()
            } else {
                match entry.path().strip_prefix(&root) {
                    Ok(relative) => entry_name(relative),
                    Err(_) => continue,
                }
            };

            zip.start_file(name.as_str(), options)?;
            zip.write_all(&fs::read(entry.path())?)?;
            entries.push(name);
        }

        let bytes = zip.finish()?.into_inner();
        tracing::debug!("Compressed {:?}: {} entries, {} bytes", root, entries.len(), bytes.len());

        self.persist(bytes, entries)
    }

    /// Stage an already built archive under a fresh unique name
    pub fn import_zip(&self, zip_path: &Path) -> Result<Archive> {
        if !zip_path.is_file() {
            return Err(Error::CodePathNotFound(zip_path.display().to_string()));
        }
        let bytes = fs::read(zip_path)?;
        let entries = {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))?;
            (0..archive.len())
                .map(|i| archive.by_index(i).map(|file| file.name().to_string()))
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        self.persist(bytes, entries)
    }

    fn ensure_build_dir(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.build_dir)?;
        Ok(self.build_dir.canonicalize()?)
    }

    fn persist(&self, bytes: Vec<u8>, entries: Vec<String>) -> Result<Archive> {
        let build_dir = self.ensure_build_dir()?;
        let name = unique_archive_name();
        let path = build_dir.join(&name);
        fs::write(&path, &bytes)?;

        tracing::debug!("Wrote archive {:?}", path);

        Ok(Archive {
            name,
            path,
            bytes: Bytes::from(bytes),
            entries,
        })
    }
}

/// Collision-free archive file name
pub fn unique_archive_name() -> String {
    format!("{}.zip", Uuid::new_v4())
}

// Fixed timestamp and permissions keep archive contents reproducible
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

/// Whether a symlink resolves to a regular file; dangling links are errors
fn linked_file(link: &Path) -> Result<bool> {
    let target = fs::metadata(link).map_err(|e| {
        std::io::Error::new(e.kind(), format!("broken link {}: {}", link.display(), e))
    })?;
    Ok(target.is_file())
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Read;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read_entries(bytes: &[u8]) -> Vec<(String, String)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = String::new();
                file.read_to_string(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    #[test]
    fn test_archive_nested_directory() {
        let code = tempfile::tempdir().unwrap();
        let build = tempfile::tempdir().unwrap();
        write(code.path(), "index.py", "def main(): pass");
        write(code.path(), "lib/util.py", "X = 1");
        write(code.path(), "lib/deep/data.json", "{}");

        let archive = Archiver::new(build.path()).archive_dir(code.path()).unwrap();

        assert_eq!(archive.entries, vec!["index.py", "lib/deep/data.json", "lib/util.py"]);
        let entries = read_entries(&archive.bytes);
        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&("lib/util.py".to_string(), "X = 1".to_string())));

        assert!(archive.path.is_absolute());
        assert!(archive.path.starts_with(build.path().canonicalize().unwrap()));
        assert_eq!(fs::read(&archive.path).unwrap(), archive.bytes.to_vec());
        assert!(archive.name.ends_with(".zip"));
    }

    #[test]
    fn test_nested_build_dir_is_excluded() {
        let code = tempfile::tempdir().unwrap();
        write(code.path(), "index.js", "exports.main = () => 1");
        let archiver = Archiver::new(code.path().join(".scf_build"));

        let first = archiver.archive_dir(code.path()).unwrap();
        let second = archiver.archive_dir(code.path()).unwrap();

        assert_eq!(first.entries, vec!["index.js"]);
        assert_eq!(second.entries, vec!["index.js"]);
        assert!(second.path.starts_with(code.path().canonicalize().unwrap().join(".scf_build")));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_links_are_archived() {
        use std::os::unix::fs::symlink;

        let code = tempfile::tempdir().unwrap();
        let build = tempfile::tempdir().unwrap();
        write(code.path(), "libfoo.so.1", "ELF");
        write(code.path(), "vendor/pkg.py", "P = 1");
        symlink("libfoo.so.1", code.path().join("libfoo.so")).unwrap();
        // a directory link back to the root must not be walked
        symlink(code.path(), code.path().join("vendor/loop")).unwrap();

        let archive = Archiver::new(build.path()).archive_dir(code.path()).unwrap();

        assert_eq!(archive.entries, vec!["libfoo.so", "libfoo.so.1", "vendor/pkg.py"]);
        let entries = read_entries(&archive.bytes);
        assert!(entries.contains(&("libfoo.so".to_string(), "ELF".to_string())));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_link_fails() {
        let code = tempfile::tempdir().unwrap();
        let build = tempfile::tempdir().unwrap();
        write(code.path(), "index.py", "x");
        std::os::unix::fs::symlink("missing.so.1", code.path().join("missing.so")).unwrap();

        let err = Archiver::new(build.path()).archive_dir(code.path()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("missing.so"));
    }

    #[test]
    fn test_contents_are_reproducible() {
        let code = tempfile::tempdir().unwrap();
        let build = tempfile::tempdir().unwrap();
        write(code.path(), "b.txt", "b");
        write(code.path(), "a.txt", "a");

        let archiver = Archiver::new(build.path());
        let first = archiver.archive_dir(code.path()).unwrap();
        let second = archiver.archive_dir(code.path()).unwrap();

        assert_eq!(first.bytes, second.bytes);
        assert_ne!(first.name, second.name);
    }

    #[test]
    fn test_missing_code_path() {
        let build = tempfile::tempdir().unwrap();
        let err = Archiver::new(build.path())
            .archive_dir(Path::new("/no/such/function"))
            .unwrap_err();
        assert!(matches!(err, Error::CodePathNotFound(path) if path == "/no/such/function"));
    }

    #[test]
    fn test_single_file_root() {
        let code = tempfile::tempdir().unwrap();
        let build = tempfile::tempdir().unwrap();
        write(code.path(), "main.py", "print(1)");

        let archive = Archiver::new(build.path())
            .archive_dir(&code.path().join("main.py"))
            .unwrap();
        assert_eq!(archive.entries, vec!["main.py"]);
    }

    #[test]
    fn test_import_zip() {
        let code = tempfile::tempdir().unwrap();
        let build = tempfile::tempdir().unwrap();
        write(code.path(), "index.py", "x");
        let archiver = Archiver::new(build.path());
        let built = archiver.archive_dir(code.path()).unwrap();

        let imported = archiver.import_zip(&built.path).unwrap();
        assert_eq!(imported.entries, vec!["index.py"]);
        assert_eq!(imported.bytes, built.bytes);
        assert_ne!(imported.path, built.path);
    }

    #[test]
    fn test_unique_names() {
        let names: HashSet<_> = (0..1000).map(|_| unique_archive_name()).collect();
        assert_eq!(names.len(), 1000);
    }
}
