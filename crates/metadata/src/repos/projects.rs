//! Project repository.

use crate::error::MetadataResult;
use crate::models::ProjectRecord;
use async_trait::async_trait;

/// Repository for projects.
#[async_trait]
pub trait ProjectRepo: Send + Sync {
    /// Create a project. Fails if the slug is taken.
    async fn create_project(
        &self,
        slug: &str,
        name: &str,
        description: Option<&str>,
    ) -> MetadataResult<ProjectRecord>;

    /// Insert-on-missing upsert: creates the project if the slug is unknown,
    /// never overwrites existing fields.
    async fn ensure_project(&self, slug: &str, name: &str) -> MetadataResult<()>;

    /// All projects, newest first.
    async fn list_projects(&self) -> MetadataResult<Vec<ProjectRecord>>;

    /// Look up by slug.
    async fn find_project(&self, slug: &str) -> MetadataResult<Option<ProjectRecord>>;

    /// Remove a project row. Cascading update deletion is the caller's job.
    async fn delete_project(&self, slug: &str) -> MetadataResult<()>;

    /// Adjust the cached update count.
    async fn adjust_update_count(&self, slug: &str, delta: i64) -> MetadataResult<()>;
}
