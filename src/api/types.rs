//! Project listing types scraped from the dashboard page.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{OverleafError, Result};
use crate::session::metadata::meta_content;

/// Account referenced by a project (owner, last editor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Dashboard tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

/// A project as listed on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    /// ISO-8601 timestamp of the last change
    #[serde(default)]
    pub last_updated: String,
    /// `owner`, `readAndWrite`, `readOnly`, ...
    #[serde(default)]
    pub access_level: String,
    /// `owner`, `invite`, `token`, ...
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub owner: Option<User>,
    #[serde(default)]
    pub last_updated_by: Option<User>,
    /// Filled from the separate tag listing.
    #[serde(skip)]
    pub tags: Vec<Tag>,
}

#[derive(Deserialize)]
struct ProjectsBlob {
    projects: Vec<Project>,
}

#[derive(Deserialize)]
struct TagEntry {
    #[serde(flatten)]
    tag: Tag,
    #[serde(default)]
    project_ids: Vec<String>,
}

/// Decode the dashboard page into projects.
///
/// Trashed and archived projects are dropped unless requested. Tags are
/// attached to the projects they reference; a page without a tag listing
/// yields untagged projects.
pub fn parse_project_listing(page: &str, trashed: bool, archived: bool) -> Result<Vec<Project>> {
    let blob = meta_content(page, "ol-prefetchedProjectsBlob")
        .ok_or_else(|| OverleafError::MissingMetadata("ol-prefetchedProjectsBlob".to_string()))?;
    let blob: ProjectsBlob = serde_json::from_str(&blob)?;

    let mut projects: Vec<Project> = blob
        .projects
        .into_iter()
        .filter(|p| (trashed || !p.trashed) && (archived || !p.archived))
        .collect();

    if let Some(tags) = meta_content(page, "ol-tags") {
        let tags: Vec<TagEntry> = serde_json::from_str(&tags)?;
        let index: HashMap<String, usize> = projects
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        for entry in tags {
            for project_id in &entry.project_ids {
                if let Some(&i) = index.get(project_id) {
                    projects[i].tags.push(entry.tag.clone());
                }
            }
        }
    }

    Ok(projects)
}
