use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::StorageError;

/// Rejects empty names, path separators, and the `.`/`..` directory names.
/// Dots inside a name (`card..v2.pdf`) are fine.
pub fn validate_file_name(name: &str) -> Result<(), StorageError> {
    let invalid = |reason: &str| StorageError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name contains a path separator"));
    }
    if name == "." || name == ".." {
        return Err(invalid("name is a directory reference"));
    }
    if name.contains('\0') {
        return Err(invalid("name contains a NUL byte"));
    }
    Ok(())
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Writes `content` to `path` through a sibling temp file and a rename, so
/// readers see either the old file or the complete new one.
fn write_atomically(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)
    };

    write().map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// Keeps copies of uploaded source files.
pub struct UploadStore {
    upload_directory: PathBuf,
}

impl UploadStore {
    pub fn new<P: AsRef<Path>>(upload_directory: P) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
        }
    }

    pub fn upload_directory(&self) -> &Path {
        &self.upload_directory
    }

    /// Copies `source` in as `<unix-millis>_<original_name>`.
    ///
    /// Directory components of `original_name` are dropped. A name collision
    /// within the same millisecond gets a numeric suffix.
    pub fn store(&self, source: &Path, original_name: &str) -> Result<PathBuf, StorageError> {
        let file_name = Path::new(original_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(original_name);
        validate_file_name(file_name)?;

        ensure_directory(&self.upload_directory)?;

        let stamped = format!("{}_{}", Utc::now().timestamp_millis(), file_name);
        self.copy_exclusive(source, &stamped)
    }

    fn copy_exclusive(&self, source: &Path, filename: &str) -> Result<PathBuf, StorageError> {
        let (base, ext) = if let Some(dot_pos) = filename.rfind('.') {
            (&filename[..dot_pos], Some(&filename[dot_pos..]))
        } else {
            (filename, None)
        };

        for counter in 1..=1000 {
            let try_filename = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };
            let try_path = self.upload_directory.join(&try_filename);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut target) => {
                    let copied = std::fs::File::open(source)
                        .and_then(|mut src| std::io::copy(&mut src, &mut target));
                    if let Err(e) = copied {
                        drop(target);
                        let _ = std::fs::remove_file(&try_path);
                        return Err(StorageError::CopyFile {
                            from: source.to_path_buf(),
                            to: try_path,
                            source: e,
                        });
                    }
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::FileExists(self.upload_directory.join(filename)))
    }
}

/// Writes final artifacts and debug renders into the output directory.
pub struct ArtifactStore {
    output_directory: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Deterministic artifact paths for a base name.
    pub fn artifact_paths(&self, base_name: &str) -> Result<(PathBuf, PathBuf), StorageError> {
        validate_file_name(base_name)?;
        Ok((
            self.output_directory
                .join(format!("processed_{}.png", base_name)),
            self.output_directory
                .join(format!("processed_{}.pdf", base_name)),
        ))
    }

    /// Writes `processed_<base>.png` and `processed_<base>.pdf`, replacing
    /// earlier versions.
    pub fn write_final(
        &self,
        base_name: &str,
        png: &[u8],
        pdf: &[u8],
    ) -> Result<(PathBuf, PathBuf), StorageError> {
        let (png_path, pdf_path) = self.artifact_paths(base_name)?;
        ensure_directory(&self.output_directory)?;

        write_atomically(&png_path, png)?;
        write_atomically(&pdf_path, pdf)?;

        Ok((png_path, pdf_path))
    }

    /// Writes `page_<document_id>.png`.
    pub fn write_debug_page(&self, document_id: &str, png: &[u8]) -> Result<PathBuf, StorageError> {
        validate_file_name(document_id)?;
        ensure_directory(&self.output_directory)?;

        let path = self
            .output_directory
            .join(format!("page_{}.png", document_id));
        write_atomically(&path, png)?;
        Ok(path)
    }
}
