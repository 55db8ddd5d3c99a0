//! Dashboard-level operations: listing and exporting projects.

use std::path::Path;

use reqwest::Method;

use super::types::{Project, parse_project_listing};
use crate::error::{OverleafError, Result};
use crate::session::Session;

impl Session {
    /// List the account's projects.
    ///
    /// # Arguments
    /// * `trashed` - Include projects in the trash
    /// * `archived` - Include archived projects
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(session: &overleaf_fs::Session) -> overleaf_fs::Result<()> {
    /// for project in session.get_projects(false, false).await? {
    ///     println!("{} ({})", project.name, project.id);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_projects(&self, trashed: bool, archived: bool) -> Result<Vec<Project>> {
        let page = self.get_page("").await?;
        parse_project_listing(&page, trashed, archived)
    }

    /// Find an active project by its exact name.
    pub async fn find_project_by_name(&self, name: &str) -> Result<Project> {
        self.get_projects(false, false)
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| OverleafError::ProjectNotFound(name.to_string()))
    }

    /// Download a project as a zip archive.
    pub async fn download_project(&self, project_id: &str) -> Result<Vec<u8>> {
        let http = self.http()?;
        let request = self.request(Method::GET, &format!("project/{}/download/zip", project_id))?;
        let response = http.send(request).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Download a project as a zip archive into `output`.
    pub async fn download_project_to<P: AsRef<Path>>(&self, project_id: &str, output: P) -> Result<()> {
        let data = self.download_project(project_id).await?;
        tokio::fs::write(output.as_ref(), &data).await?;
        tracing::debug!(project_id, bytes = data.len(), path = %output.as_ref().display(), "project archive written");
        Ok(())
    }
}
