//! File handling for documents and store files.
//!
//! Stores are always replaced atomically: the new JSON is written to a
//! temporary file in the same directory and renamed over the old one. A
//! `<store>.lock` file next to the store keeps two `veil` processes from
//! rewriting the same store at once.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

use veil_store::{Document, EncryptedStore};

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Read a document, choosing its type from the file extension: `.json` is
/// parsed as JSON, `.txt` and `.md` as UTF-8 text, anything else is binary.
pub fn load_document(path: &Path) -> Result<Document> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read document {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("json") => {
            let value = serde_json::from_slice(&bytes)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            Ok(Document::Json(value))
        }
        Some("txt") | Some("md") => {
            let text = String::from_utf8(bytes)
                .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
            Ok(Document::Text(text))
        }
        _ => Ok(Document::Binary(bytes)),
    }
}

/// The bytes a document is written out as.
pub fn document_bytes(document: &Document) -> Result<Vec<u8>> {
    Ok(match document {
        Document::Json(value) => {
            let mut out = serde_json::to_vec_pretty(value)?;
            out.push(b'\n');
            out
        }
        Document::Text(text) => text.as_bytes().to_vec(),
        Document::Binary(bytes) => bytes.clone(),
    })
}

/// Write a document to `output`, or to stdout when `None`.
pub fn write_document(document: &Document, output: Option<&Path>) -> Result<()> {
    let bytes = document_bytes(document)?;
    match output {
        Some(path) => fs::write(path, bytes)
            .with_context(|| format!("failed to write document to {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Store Files
// ---------------------------------------------------------------------------

/// Read and validate a store file.
pub fn load_store(path: &Path) -> Result<EncryptedStore> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read store {}", path.display()))?;
    let store = EncryptedStore::from_json(&json)
        .with_context(|| format!("failed to load store {}", path.display()))?;
    Ok(store)
}

/// Replace `path` with `store` in one rename.
pub fn save_store_atomic(path: &Path, store: &EncryptedStore) -> Result<()> {
    let json = store.to_json()?;
    let dir = parent_dir(path);

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace store {}", path.display()))?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

// ---------------------------------------------------------------------------
// Lock File
// ---------------------------------------------------------------------------

/// Exclusive claim on a store file, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    _file: File,
}

impl StoreLock {
    /// Take the lock for `store_path`, failing if another process holds it.
    pub fn acquire(store_path: &Path) -> Result<Self> {
        let mut name = store_path.as_os_str().to_owned();
        name.push(".lock");
        let path = PathBuf::from(name);

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => bail!(
                "store {} is locked by another process (remove {} if that process is gone)",
                store_path.display(),
                path.display()
            ),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to create lock file {}", path.display()))
            }
        };
        tracing::debug!(lock = %path.display(), "store lock acquired");
        Ok(Self { path, _file: file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(error = %e, lock = %self.path.display(), "failed to remove lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_store::{CryptoStore, KdfParams, Partition, StoreConfig, StoreError};

    fn small_store() -> EncryptedStore {
        CryptoStore::new(StoreConfig {
            threshold: 2,
            id_space_size: 50,
            kdf: KdfParams::insecure_fast(),
            ..StoreConfig::default()
        })
        .unwrap()
        .create(&[Partition::new("k", "p", Document::Text("hi".into()))])
        .unwrap()
    }

    #[test]
    fn document_type_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("a.json");
        let text = dir.path().join("b.txt");
        let bin = dir.path().join("c.bin");
        fs::write(&json, br#"{"x": 1}"#).unwrap();
        fs::write(&text, "hello").unwrap();
        fs::write(&bin, [0u8, 159, 146, 150]).unwrap();

        assert_eq!(
            load_document(&json).unwrap(),
            Document::Json(serde_json::json!({"x": 1}))
        );
        assert_eq!(load_document(&text).unwrap(), Document::Text("hello".into()));
        assert_eq!(
            load_document(&bin).unwrap(),
            Document::Binary(vec![0, 159, 146, 150])
        );
    }

    #[test]
    fn bad_json_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, "{nope").unwrap();
        assert!(load_document(&path).is_err());
    }

    #[test]
    fn store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = small_store();

        save_store_atomic(&path, &store).unwrap();
        assert_eq!(load_store(&path).unwrap(), store);

        // Overwrite in place.
        let other = small_store();
        save_store_atomic(&path, &other).unwrap();
        assert_eq!(load_store(&path).unwrap(), other);
    }

    #[test]
    fn corrupt_store_keeps_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"metadata": {}, "shares": []}"#).unwrap();
        let err = load_store(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::StoreFormat(_))
        ));
    }

    #[test]
    fn lock_is_exclusive_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let lock = StoreLock::acquire(&path).unwrap();
        assert!(StoreLock::acquire(&path).is_err());
        drop(lock);
        assert!(StoreLock::acquire(&path).is_ok());
    }
}
