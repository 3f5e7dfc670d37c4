//! The attachment collaborator seam.
//!
//! File-accepting field types store attachment identifiers in their value;
//! turning those identifiers into binary resources (and deleting them when
//! the owning setting goes away) is somebody else's job. This module only
//! defines the boundary.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// A resolved attachment, addressed by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub uuid: Uuid,

    /// Where the binary can be fetched from.
    pub url: String,
}

/// Error returned by an [`AttachmentStore`]
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// The identifier does not name a stored attachment.
    #[error("There is no attachment with the id '{0}'")]
    NotFound(Uuid),

    /// The backing storage failed.
    #[error("{0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// External storage for the binaries referenced by file-type settings.
///
/// Implementations live outside this crate; deployments without binary
/// uploads use [`DisabledAttachments`].
#[async_trait]
pub trait AttachmentStore: Send + Sync + 'static {
    /// Resolves identifiers into fetchable attachments.
    ///
    /// Identifiers without a backing attachment are skipped, not an error.
    async fn resolve(&self, ids: &[Uuid]) -> Result<Vec<AttachmentRef>, AttachmentError>;

    /// Deletes a single attachment and its binary.
    async fn delete(&self, id: Uuid) -> Result<(), AttachmentError>;
}

/// No-op store for deployments without binary uploads.
///
/// Resolution yields nothing and deletion succeeds trivially, so file-type
/// settings remain harmless instead of erroring.
#[derive(Debug, Default)]
pub struct DisabledAttachments;

#[async_trait]
impl AttachmentStore for DisabledAttachments {
    async fn resolve(&self, _ids: &[Uuid]) -> Result<Vec<AttachmentRef>, AttachmentError> {
        Ok(Vec::new())
    }

    async fn delete(&self, _id: Uuid) -> Result<(), AttachmentError> {
        Ok(())
    }
}
