//! Evidence (invoice) storage.
//!
//! The ledger only keeps the opaque [`EvidenceRef`] returned by an upload.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::debug;

use crate::transfer::EvidenceRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl EvidenceFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    fn extension(&self) -> Option<&str> {
        Path::new(&self.file_name).extension().and_then(|ext| ext.to_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EvidenceError {
    #[error("evidence file is empty file_name={file_name}")]
    Empty { file_name: String },
    #[error("unknown evidence evidence={evidence}")]
    Unknown { evidence: EvidenceRef },
    #[error("cannot store evidence file_name={file_name}, source_error={source}")]
    Io {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait EvidenceStore {
    /// Stores `file`, returning the reference to persist on a transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is empty or cannot be written.
    fn upload(&self, file: &EvidenceFile) -> Result<EvidenceRef, EvidenceError>;

    /// Removes an uploaded blob that no transfer ended up referencing.
    ///
    /// # Errors
    ///
    /// Returns an error if `evidence` is unknown or cannot be removed.
    fn discard(&self, evidence: &EvidenceRef) -> Result<(), EvidenceError>;
}

fn reject_empty(file: &EvidenceFile) -> Result<(), EvidenceError> {
    if file.bytes.is_empty() {
        return Err(EvidenceError::Empty {
            file_name: file.file_name.clone(),
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct InMemoryEvidenceStore {
    blobs: Mutex<Blobs>,
}

#[derive(Debug, Default)]
struct Blobs {
    /// Keys stay unique after a discard.
    uploads: usize,
    files: BTreeMap<String, EvidenceFile>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, evidence: &EvidenceRef) -> Option<EvidenceFile> {
        self.blobs.lock().files.get(&evidence.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().files.is_empty()
    }
}

impl EvidenceStore for InMemoryEvidenceStore {
    fn upload(&self, file: &EvidenceFile) -> Result<EvidenceRef, EvidenceError> {
        reject_empty(file)?;
        let mut blobs = self.blobs.lock();
        blobs.uploads += 1;
        let key = format!("mem://{}/{}", blobs.uploads, file.file_name);
        blobs.files.insert(key.clone(), file.clone());
        Ok(EvidenceRef(key))
    }

    fn discard(&self, evidence: &EvidenceRef) -> Result<(), EvidenceError> {
        self.blobs
            .lock()
            .files
            .remove(&evidence.0)
            .map(|_| ())
            .ok_or_else(|| EvidenceError::Unknown {
                evidence: evidence.clone(),
            })
    }
}

/// Writes each upload to its own file under `root`, named by a random UUID.
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    root: PathBuf,
}

impl FsEvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, evidence: &EvidenceRef) -> PathBuf {
        self.root.join(&evidence.0)
    }
}

impl EvidenceStore for FsEvidenceStore {
    fn upload(&self, file: &EvidenceFile) -> Result<EvidenceRef, EvidenceError> {
        reject_empty(file)?;
        let name = match file.extension() {
            Some(ext) => format!("{}.{ext}", uuid::Uuid::new_v4()),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let io_error = |source| EvidenceError::Io {
            file_name: file.file_name.clone(),
            source,
        };
        std::fs::create_dir_all(&self.root).map_err(io_error)?;
        std::fs::write(self.root.join(&name), &file.bytes).map_err(io_error)?;
        debug!(file_name = %file.file_name, stored_as = %name, "evidence stored");
        Ok(EvidenceRef(name))
    }

    fn discard(&self, evidence: &EvidenceRef) -> Result<(), EvidenceError> {
        std::fs::remove_file(self.path_of(evidence)).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => EvidenceError::Unknown {
                evidence: evidence.clone(),
            },
            _ => EvidenceError::Io {
                file_name: evidence.0.clone(),
                source,
            },
        })?;
        debug!(%evidence, "evidence discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn in_memory_upload_returns_distinct_refs() {
        let store = InMemoryEvidenceStore::new();
        let first = store.upload(&EvidenceFile::new("a.pdf", b"first".to_vec())).unwrap();
        let second = store.upload(&EvidenceFile::new("a.pdf", b"second".to_vec())).unwrap();

        assert!(first != second);
        assert_eq!(store.get(&second).map(|file| file.bytes), Some(b"second".to_vec()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn empty_files_are_rejected() {
        let store = InMemoryEvidenceStore::new();
        assert2::let_assert!(Err(EvidenceError::Empty { file_name }) = store.upload(&EvidenceFile::new("x.pdf", vec![])));
        assert_eq!(file_name, "x.pdf");
        assert!(store.is_empty());
    }

    #[test]
    fn fs_upload_writes_the_blob_and_keeps_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path().join("evidence"));

        let evidence = store.upload(&EvidenceFile::new("invoice.pdf", b"%PDF".to_vec())).unwrap();

        assert!(evidence.0.ends_with(".pdf"), "evidence={evidence}");
        assert_eq!(std::fs::read(store.path_of(&evidence)).unwrap(), b"%PDF".to_vec());
    }

    #[test]
    fn in_memory_discard_removes_the_blob_without_reusing_its_key() {
        let store = InMemoryEvidenceStore::new();
        let first = store.upload(&EvidenceFile::new("a.pdf", b"first".to_vec())).unwrap();
        let second = store.upload(&EvidenceFile::new("a.pdf", b"second".to_vec())).unwrap();

        store.discard(&first).unwrap();
        let third = store.upload(&EvidenceFile::new("a.pdf", b"third".to_vec())).unwrap();

        assert_eq!(store.get(&first), None);
        assert_eq!(store.get(&second).map(|file| file.bytes), Some(b"second".to_vec()));
        assert!(third != second);
        assert_eq!(store.len(), 2);
        assert2::let_assert!(Err(EvidenceError::Unknown { evidence }) = store.discard(&first));
        assert_eq!(evidence, first);
    }

    #[test]
    fn fs_discard_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path());
        let evidence = store.upload(&EvidenceFile::new("scan.jpg", b"jpeg".to_vec())).unwrap();

        store.discard(&evidence).unwrap();

        assert!(!store.path_of(&evidence).exists());
        assert2::let_assert!(Err(EvidenceError::Unknown { .. }) = store.discard(&evidence));
    }
}
