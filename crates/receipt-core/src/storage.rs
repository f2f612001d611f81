use crate::error::StorageError;
use crate::io::{self, sanitize_file_name};
use crate::pdf;
use crate::sheet::Grid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub String);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// A whole-sheet export, the input to conversion.
    SheetExport,
    Pdf,
}

impl DocumentFormat {
    pub fn mime(self) -> &'static str {
        match self {
            DocumentFormat::SheetExport => "application/x-yaml",
            DocumentFormat::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::SheetExport => "yaml",
            DocumentFormat::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: FileId,
    pub name: String,
    /// Where the store put it (a path or URL, store-specific).
    pub location: String,
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// The file-storage service: permanent owner of generated receipts, and the
/// converter used by the primary render strategy.
pub trait FileStore: Send + Sync {
    fn create_file(&self, name: &str, bytes: &[u8]) -> Result<StoredFile, StorageError>;

    fn convert(&self, id: &FileId, format: DocumentFormat) -> Result<Vec<u8>, StorageError>;

    fn trash(&self, id: &FileId) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// DirStore
// ---------------------------------------------------------------------------

const TRASH_DIR: &str = ".trash";

/// A [`FileStore`] on the local filesystem. Each file lives in its own
/// `<folder>/<id>/` directory; trashing moves that directory into `.trash/`.
#[derive(Debug, Clone)]
pub struct DirStore {
    folder: PathBuf,
}

impl DirStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn entry_dir(&self, id: &FileId) -> Result<PathBuf, StorageError> {
        if id.0.is_empty() || id.0.contains(['/', '\\']) || id.0.contains("..") {
            return Err(StorageError::NotFound(id.to_string()));
        }
        let dir = self.folder.join(&id.0);
        if !dir.is_dir() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(dir)
    }

    fn file_path(&self, id: &FileId) -> Result<PathBuf, StorageError> {
        let dir = self.entry_dir(id)?;
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() {
                return Ok(path);
            }
        }
        Err(StorageError::NotFound(id.to_string()))
    }

    /// Files currently stored, excluding the trash.
    pub fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut out = Vec::new();
        if !self.folder.is_dir() {
            return Ok(out);
        }
        for entry in std::fs::read_dir(&self.folder)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name == TRASH_DIR || !entry.path().is_dir() {
                continue;
            }
            let id = FileId(name);
            if let Ok(path) = self.file_path(&id) {
                out.push(StoredFile {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    location: path.display().to_string(),
                    id,
                });
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

impl FileStore for DirStore {
    fn create_file(&self, name: &str, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        let id = FileId(uuid::Uuid::new_v4().to_string());
        let name = sanitize_file_name(name);
        let dir = self.folder.join(&id.0);
        let path = dir.join(&name);
        io::atomic_write(&path, bytes)?;
        Ok(StoredFile {
            id,
            name,
            location: path.display().to_string(),
        })
    }

    fn convert(&self, id: &FileId, format: DocumentFormat) -> Result<Vec<u8>, StorageError> {
        let path = self.file_path(id)?;
        let bytes = std::fs::read(&path)?;
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match format {
            f if ext == f.extension() => Ok(bytes),
            DocumentFormat::Pdf if ext == DocumentFormat::SheetExport.extension() => {
                let grid: Grid = serde_yaml::from_slice(&bytes)
                    .map_err(|e| StorageError::Conversion(e.to_string()))?;
                Ok(pdf::render_grid(&grid))
            }
            other => Err(StorageError::UnsupportedFormat(other.mime().to_string())),
        }
    }

    fn trash(&self, id: &FileId) -> Result<(), StorageError> {
        let dir = self.entry_dir(id)?;
        let trash = self.folder.join(TRASH_DIR);
        std::fs::create_dir_all(&trash)?;
        std::fs::rename(dir, trash.join(&id.0))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::CellValue;
    use tempfile::TempDir;

    #[test]
    fn create_and_list() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path().join("drive"));
        let file = store.create_file("receipt_Kim_1.pdf", b"%PDF-1.4").unwrap();
        assert_eq!(file.name, "receipt_Kim_1.pdf");

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, file.id);
    }

    #[test]
    fn create_leaves_only_the_named_file() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());
        let file = store.create_file("receipt_Kim_1.pdf", b"%PDF-1.4").unwrap();

        let entry = dir.path().join(&file.id.0);
        let names: Vec<String> = std::fs::read_dir(&entry)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["receipt_Kim_1.pdf".to_string()]);
        assert_eq!(std::fs::read(entry.join("receipt_Kim_1.pdf")).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn create_under_a_plain_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("drive");
        std::fs::write(&blocker, b"not a folder").unwrap();
        let store = DirStore::new(&blocker);
        assert!(matches!(
            store.create_file("receipt_Kim_1.pdf", b"%PDF-1.4"),
            Err(StorageError::Io(_))
        ));
    }

    #[test]
    fn converts_sheet_export_to_pdf() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());
        let mut grid = Grid::new("Document");
        grid.set_value(8, 3, CellValue::text("Kim")).unwrap();
        let blob = serde_yaml::to_string(&grid).unwrap();

        let file = store.create_file("temp_sheet.yaml", blob.as_bytes()).unwrap();
        let pdf = store.convert(&file.id, DocumentFormat::Pdf).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
    }

    #[test]
    fn converted_pdf_keeps_hangul_donor_name() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());
        let mut grid = Grid::new("Document");
        grid.set_value(8, 3, CellValue::text("김철수")).unwrap();
        let blob = serde_yaml::to_string(&grid).unwrap();

        let file = store.create_file("temp_sheet.yaml", blob.as_bytes()).unwrap();
        let pdf = store.convert(&file.id, DocumentFormat::Pdf).unwrap();
        let text = String::from_utf8(pdf).unwrap();
        assert!(text.contains("<AE40CCA0C218> Tj"));
    }

    #[test]
    fn trash_hides_file() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());
        let file = store.create_file("temp_sheet.yaml", b"name: x").unwrap();
        store.trash(&file.id).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(dir.path().join(".trash").join(&file.id.0).is_dir());
        assert!(matches!(
            store.convert(&file.id, DocumentFormat::Pdf),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn unknown_id_rejected() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());
        assert!(store.trash(&FileId("../escape".to_string())).is_err());
        assert!(store.trash(&FileId("missing".to_string())).is_err());
    }

    #[test]
    fn garbage_export_fails_conversion() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());
        let file = store.create_file("temp_sheet.yaml", b"[not: a grid").unwrap();
        assert!(matches!(
            store.convert(&file.id, DocumentFormat::Pdf),
            Err(StorageError::Conversion(_))
        ));
    }
}
