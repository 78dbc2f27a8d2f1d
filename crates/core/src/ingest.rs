use crate::error::{IngestError, Result};
use crate::models::SourceDocument;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "docx", "txt", "md"];

/// Recursively collects ingestable files (pdf/docx/txt/md) under `folder`,
/// sorted for deterministic processing order.
pub fn discover_document_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|supported| ext.eq_ignore_ascii_case(supported))
            });

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Reads each path into an ephemeral `SourceDocument` tagged with `source`.
pub fn load_documents(paths: &[PathBuf], source: &str) -> Result<Vec<SourceDocument>> {
    let mut documents = Vec::with_capacity(paths.len());

    for path in paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
            })?;

        let bytes = fs::read(path)?;
        documents.push(SourceDocument::new(bytes, filename).with_source(source));
    }

    Ok(documents)
}

/// Discovers and loads every supported document under `folder`. Errors when
/// the folder holds nothing ingestable.
pub fn load_folder(folder: &Path, source: &str) -> Result<Vec<SourceDocument>> {
    let files = discover_document_files(folder);
    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no ingestable files (pdf/docx/txt/md) found in {}",
            folder.display()
        )));
    }
    load_documents(&files, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discovery_is_recursive_and_extension_filtered() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.txt")).and_then(|mut file| file.write_all(b"alpha"))?;
        File::create(nested.join("b.PDF")).and_then(|mut file| file.write_all(b"%PDF-1.4"))?;
        File::create(nested.join("ignored.png")).and_then(|mut file| file.write_all(b"\x89PNG"))?;

        let files = discover_document_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn loading_tags_documents_with_the_given_source() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.md");
        fs::write(&path, b"## notes")?;

        let documents = load_documents(&[path], "user_upload")?;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].filename, "notes.md");
        assert_eq!(documents[0].source, "user_upload");
        assert_eq!(documents[0].bytes, b"## notes");
        Ok(())
    }

    #[test]
    fn empty_folder_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = load_folder(dir.path(), "user_upload");
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("a.txt");
        fs::write(&path, b"abc")?;

        let first = load_documents(std::slice::from_ref(&path), "user_upload")?;
        let second = load_documents(std::slice::from_ref(&path), "user_upload")?;
        assert_eq!(first[0].checksum, second[0].checksum);
        assert_eq!(first[0].checksum.len(), 64);
        Ok(())
    }
}
