//! Remote entity operations inside one project.

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::fs::{EntityKind, File, FileKind, Folder};
use crate::session::Session;
use crate::socket::{fetch_project_tree, pull_doc_content};

const UPLOAD_MIME: &str = "application/octet-stream";

#[derive(Deserialize)]
struct UploadResponse {
    entity_id: String,
    entity_type: String,
}

impl Session {
    /// Fetch the project's root folder over the event socket.
    pub async fn project_files(&self, project_id: &str) -> Result<Folder> {
        let socket = self.open_event_socket(project_id).await?;
        fetch_project_tree(socket).await
    }

    /// Create a folder under `parent_folder_id`.
    ///
    /// # Arguments
    /// * `project_id` - Project to modify
    /// * `parent_folder_id` - Id of the containing folder
    /// * `name` - Name of the new folder
    pub async fn create_folder(
        &self,
        project_id: &str,
        parent_folder_id: &str,
        name: &str,
    ) -> Result<Folder> {
        let http = self.http()?;
        let request = self
            .project_request(Method::POST, project_id, &format!("project/{}/folder", project_id))
            .await?
            .json(&json!({
                "parent_folder_id": parent_folder_id,
                "name": name,
            }));
        let response = http.send(request).await?;
        let body: serde_json::Value = response.json().await?;
        let folder = Folder::from_value(&body)?;
        tracing::debug!(project_id, folder_id = %folder.id, name, "folder created");
        Ok(folder)
    }

    /// Upload `content` as `name` into a folder, replacing a same-named file.
    ///
    /// The server decides whether the upload becomes a `doc` or a `file`.
    pub async fn upload_file(
        &self,
        project_id: &str,
        folder_id: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<File> {
        let http = self.http()?;
        let size = content.len();
        let blob = Part::bytes(content)
            .file_name(name.to_string())
            .mime_str(UPLOAD_MIME)?;
        let form = Form::new()
            .text("relativePath", "null")
            .text("name", name.to_string())
            .text("type", UPLOAD_MIME)
            .part("qqfile", blob);

        let request = self
            .project_request(Method::POST, project_id, &format!("project/{}/upload", project_id))
            .await?
            .query(&[("folder_id", folder_id)])
            .multipart(form);
        let response: UploadResponse = http.send(request).await?.json().await?;

        let kind: FileKind = response.entity_type.parse()?;
        tracing::debug!(project_id, folder_id, name, size, %kind, "file uploaded");
        Ok(File::new(response.entity_id, name, kind))
    }

    /// Retrieve a file's content.
    ///
    /// Binary files are downloaded over HTTP; docs are pulled over the event
    /// socket and returned as UTF-8.
    pub async fn download_file(&self, project_id: &str, file: &File) -> Result<Vec<u8>> {
        match file.kind {
            FileKind::File => {
                let http = self.http()?;
                let request = self.request(
                    Method::GET,
                    &format!("project/{}/file/{}", project_id, file.id),
                )?;
                Ok(http.send(request).await?.bytes().await?.to_vec())
            }
            FileKind::Doc => {
                let socket = self.open_event_socket(project_id).await?;
                Ok(pull_doc_content(socket, &file.id).await?.into_bytes())
            }
        }
    }

    /// Delete a folder, file or doc.
    pub async fn delete_entity(
        &self,
        project_id: &str,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<()> {
        let http = self.http()?;
        let request = self
            .project_request(
                Method::DELETE,
                project_id,
                &format!("project/{}/{}/{}", project_id, kind, entity_id),
            )
            .await?
            .json(&json!({}));
        http.send(request).await?;
        tracing::debug!(project_id, %kind, entity_id, "entity deleted");
        Ok(())
    }
}
