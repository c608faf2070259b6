//! Document persistence.
//!
//! The `LocalRepository` keeps every document in memory and, when opened on
//! a directory, mirrors each one to `<id>.json`. Writes go to a temp file and
//! are renamed into place, so a document is either fully committed or absent.
//! A `sequence` file remembers the next id so deleted ids are never reused.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{DocumentFilter, DocumentId, NewDocument, Principal, StoredDocument};
use crate::error::RepositoryError;

const SEQUENCE_FILE: &str = "sequence";

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Storage contract for documents.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Persist a document atomically and return its new id.
    async fn save(&self, document: NewDocument) -> Result<DocumentId>;

    /// Fetch one document, unscoped.
    async fn get(&self, id: DocumentId) -> Result<Option<StoredDocument>>;

    /// Snapshot of matching documents in ascending id order.
    async fn list(&self, filter: &DocumentFilter) -> Result<Vec<StoredDocument>>;

    /// Remove a document owned by `requester`.
    ///
    /// `Ok(false)` when no such document exists;
    /// [`RepositoryError::Unauthorized`] when the requester is not its author.
    async fn delete(&self, id: DocumentId, requester: &Principal) -> Result<bool>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize>;
}

struct State {
    documents: BTreeMap<DocumentId, StoredDocument>,
    next_id: DocumentId,
}

/// In-memory repository with optional JSON-file persistence.
pub struct LocalRepository {
    root: Option<PathBuf>,
    state: RwLock<State>,
}

impl LocalRepository {
    /// A repository that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            state: RwLock::new(State {
                documents: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Open (or create) a repository backed by a directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root)
            .await
            .map_err(|e| RepositoryError::CreateDirectory(format!("{}: {e}", root.display())))?;

        let documents = Self::load_all(&root).await?;
        let next_id = documents
            .keys()
            .next_back()
            .map_or(1, |id| id + 1)
            .max(Self::read_sequence(&root).await);

        info!(
            "Opened document repository at {} with {} documents",
            root.display(),
            documents.len()
        );

        Ok(Self {
            root: Some(root),
            state: RwLock::new(State { documents, next_id }),
        })
    }

    /// Load every readable record; unreadable ones are logged and skipped.
    async fn load_all(root: &Path) -> Result<BTreeMap<DocumentId, StoredDocument>> {
        let mut documents = BTreeMap::new();

        let mut entries = fs::read_dir(root)
            .await
            .map_err(|e| RepositoryError::ReadFile(format!("{}: {e}", root.display())))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RepositoryError::ReadFile(format!("{e}")))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            match Self::load_file(&path).await {
                Ok(doc) => {
                    debug!("Loaded document {}", doc.id);
                    documents.insert(doc.id, doc);
                }
                Err(e) => {
                    warn!("Failed to load document file {}: {e}", path.display());
                }
            }
        }

        Ok(documents)
    }

    async fn load_file(path: &Path) -> Result<StoredDocument> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| RepositoryError::ReadFile(format!("{}: {e}", path.display())))?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn read_sequence(root: &Path) -> DocumentId {
        match fs::read_to_string(root.join(SEQUENCE_FILE)).await {
            Ok(content) => content.trim().parse().unwrap_or_else(|e| {
                warn!("Ignoring unreadable sequence file in {}: {e}", root.display());
                1
            }),
            Err(_) => 1,
        }
    }

    fn document_path(root: &Path, id: DocumentId) -> PathBuf {
        root.join(format!("{id}.json"))
    }

    /// Write `content` to `path` through a temp file and a rename.
    async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)
            .await
            .map_err(|e| RepositoryError::WriteFile(format!("{}: {e}", temp_path.display())))?;

        if let Err(e) = fs::rename(&temp_path, path).await {
            // Leave nothing half-written behind.
            let _ = fs::remove_file(&temp_path).await;
            return Err(RepositoryError::WriteFile(format!("{}: {e}", path.display())));
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for LocalRepository {
    async fn save(&self, document: NewDocument) -> Result<DocumentId> {
        let mut state = self.state.write().await;

        let id = state.next_id;
        let doc = document.into_stored(id);

        if let Some(root) = &self.root {
            let record = serde_json::to_vec(&doc)?;
            Self::write_atomic(&Self::document_path(root, id), &record).await?;

            // The document is committed; a stale sequence only costs a
            // rescan of the highest id on the next open.
            let sequence = (id + 1).to_string();
            if let Err(e) =
                Self::write_atomic(&root.join(SEQUENCE_FILE), sequence.as_bytes()).await
            {
                warn!("Failed to update id sequence: {e}");
            }
        }

        state.documents.insert(id, doc);
        state.next_id = id + 1;

        debug!("Saved document {id}");
        Ok(id)
    }

    async fn get(&self, id: DocumentId) -> Result<Option<StoredDocument>> {
        Ok(self.state.read().await.documents.get(&id).cloned())
    }

    async fn list(&self, filter: &DocumentFilter) -> Result<Vec<StoredDocument>> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: DocumentId, requester: &Principal) -> Result<bool> {
        let mut state = self.state.write().await;

        let Some(doc) = state.documents.get(&id) else {
            return Ok(false);
        };

        if !requester.owns(doc.author_id.as_deref()) {
            return Err(RepositoryError::Unauthorized);
        }

        if let Some(root) = &self.root {
            let path = Self::document_path(root, id);
            fs::remove_file(&path)
                .await
                .map_err(|e| RepositoryError::DeleteFile(format!("{}: {e}", path.display())))?;
        }

        state.documents.remove(&id);
        info!("Deleted document {id}");
        Ok(true)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.state.read().await.documents.len())
    }
}
