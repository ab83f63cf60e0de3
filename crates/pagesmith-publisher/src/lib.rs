//! Repository publishing for pagesmith
//!
//! The orchestrator depends only on the [`RepositoryPublisher`] contract:
//! existence check, creation, idempotent file publish and static hosting
//! activation. [`GitHubPublisher`] implements it against the GitHub REST API.

mod files;
mod github;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use files::FileSet;
pub use github::GitHubPublisher;
pub use pagesmith_utils::error::PublisherError;

/// A repository that was just created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRepository {
    pub repo_url: String,
    pub clone_url: String,
    pub full_name: String,
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Commit created by the last file written
    pub commit_ref: String,
    /// Paths written, in publish order
    pub files_published: Vec<String>,
}

/// Remote repository operations the pipeline needs.
#[async_trait]
pub trait RepositoryPublisher: Send + Sync {
    /// Whether a repository with this name exists under the configured owner.
    ///
    /// # Errors
    ///
    /// Returns `PublisherError` when the remote cannot answer.
    async fn exists(&self, name: &str) -> Result<bool, PublisherError>;

    /// Create a new repository.
    ///
    /// # Errors
    ///
    /// Returns `PublisherError::NameTaken` when the name is in use; any other
    /// variant for other failures.
    async fn create(&self, name: &str, description: &str)
    -> Result<CreatedRepository, PublisherError>;

    /// Write every file in `files` to `branch`, updating files that already
    /// exist instead of conflicting with them.
    ///
    /// Already-written files stay written if a later one fails.
    ///
    /// # Errors
    ///
    /// Returns `PublisherError` naming the first file that could not be written.
    async fn publish(
        &self,
        name: &str,
        files: &FileSet,
        message: &str,
        branch: &str,
    ) -> Result<PublishReceipt, PublisherError>;

    /// Turn on static hosting for `branch`. Already-enabled hosting is success.
    ///
    /// Returns the hosting URL.
    ///
    /// # Errors
    ///
    /// Returns `PublisherError` on an unexpected remote response.
    async fn enable_hosting(&self, name: &str, branch: &str) -> Result<String, PublisherError>;

    /// Browser URL of the repository, derived without a remote call.
    fn repo_url(&self, name: &str) -> String;

    /// Static hosting URL of the repository, derived without a remote call.
    fn hosting_url(&self, name: &str) -> String;
}
