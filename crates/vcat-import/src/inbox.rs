//! Filesystem import inbox: vendor sheets waiting in the import directory,
//! moved to the completed directory once imported.

use std::path::{Path, PathBuf};

use crate::error::ImportError;
use crate::reader::{DocumentFormat, ImportDocument};

#[derive(Debug, Clone)]
pub struct Inbox {
    incoming: PathBuf,
    completed: PathBuf,
}

impl Inbox {
    pub fn new(incoming: impl Into<PathBuf>, completed: impl Into<PathBuf>) -> Self {
        Self {
            incoming: incoming.into(),
            completed: completed.into(),
        }
    }

    #[must_use]
    pub fn incoming(&self) -> &Path {
        &self.incoming
    }

    /// Read every `*.csv` and `*.xlsx` file in the import directory, sorted
    /// by file name.
    ///
    /// A file that cannot be read or parsed is still returned, as an
    /// [unreadable](ImportDocument::unreadable) document, so the run records
    /// it as failed and holds back reconciliation. A missing import directory
    /// yields nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Io`] if the directory exists but cannot be
    /// listed.
    pub async fn load(&self) -> Result<Vec<ImportDocument>, ImportError> {
        let io_err = |source| ImportError::Io {
            path: self.incoming.display().to_string(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&self.incoming).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.incoming.display(), "import directory missing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(io_err(e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(format) = DocumentFormat::from_name(&name) else {
                continue;
            };
            if entry.file_type().await.map_err(io_err)?.is_file() {
                found.push((name, format));
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut documents = Vec::with_capacity(found.len());
        for (name, format) in found {
            let document = match tokio::fs::read(self.incoming.join(&name)).await {
                Ok(bytes) => ImportDocument::load(&name, format, &bytes),
                Err(e) => {
                    tracing::warn!(document = %name, error = %e, "cannot read document");
                    ImportDocument::unreadable(&name, "", &e)
                }
            };
            documents.push(document);
        }
        Ok(documents)
    }

    /// Move a fully imported document to the completed directory.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Io`] if the directory cannot be created or the
    /// file cannot be moved.
    pub async fn archive(&self, name: &str) -> Result<PathBuf, ImportError> {
        tokio::fs::create_dir_all(&self.completed)
            .await
            .map_err(|source| ImportError::Io {
                path: self.completed.display().to_string(),
                source,
            })?;

        let from = self.incoming.join(name);
        let to = self.completed.join(name);
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|source| ImportError::Io {
                path: from.display().to_string(),
                source,
            })?;

        tracing::info!(document = name, to = %to.display(), "document archived");
        Ok(to)
    }
}
