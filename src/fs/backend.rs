//! Remote operations the filesystem layer is built on.

use async_trait::async_trait;

use super::node::{EntityKind, File, Folder};
use crate::error::Result;
use crate::session::Session;

/// Project-scoped remote calls used by [`ProjectFs`](super::ProjectFs).
///
/// [`Session`] is the production implementation. Other implementations can
/// serve a tree from memory.
#[async_trait]
pub trait ProjectBackend: Clone + Send + Sync + 'static {
    /// Fetch the project's root folder.
    async fn project_files(&self, project_id: &str) -> Result<Folder>;

    /// Create `name` under `parent_folder_id` and return the new folder.
    async fn create_folder(
        &self,
        project_id: &str,
        parent_folder_id: &str,
        name: &str,
    ) -> Result<Folder>;

    /// Store `content` as `name` in a folder, replacing any same-named file.
    async fn upload_file(
        &self,
        project_id: &str,
        folder_id: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<File>;

    /// Fetch the full content of a file or doc.
    async fn download_file(&self, project_id: &str, file: &File) -> Result<Vec<u8>>;

    /// Delete an entity by kind and id.
    async fn delete_entity(&self, project_id: &str, kind: EntityKind, entity_id: &str) -> Result<()>;
}

#[async_trait]
impl ProjectBackend for Session {
    async fn project_files(&self, project_id: &str) -> Result<Folder> {
        Session::project_files(self, project_id).await
    }

    async fn create_folder(
        &self,
        project_id: &str,
        parent_folder_id: &str,
        name: &str,
    ) -> Result<Folder> {
        Session::create_folder(self, project_id, parent_folder_id, name).await
    }

    async fn upload_file(
        &self,
        project_id: &str,
        folder_id: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<File> {
        Session::upload_file(self, project_id, folder_id, name, content).await
    }

    async fn download_file(&self, project_id: &str, file: &File) -> Result<Vec<u8>> {
        Session::download_file(self, project_id, file).await
    }

    async fn delete_entity(&self, project_id: &str, kind: EntityKind, entity_id: &str) -> Result<()> {
        Session::delete_entity(self, project_id, kind, entity_id).await
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory backend for unit tests.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::OverleafError;
    use crate::fs::node::{Entity, FileKind};
    use crate::fs::tree;

    #[derive(Default)]
    pub struct State {
        pub root: Option<Folder>,
        pub contents: HashMap<String, Vec<u8>>,
        pub next_id: usize,
        pub fetches: usize,
        pub uploads: Vec<(String, String, Vec<u8>)>,
        pub deletes: Vec<(EntityKind, String)>,
    }

    #[derive(Clone, Default)]
    pub struct MemoryBackend {
        pub state: Arc<Mutex<State>>,
    }

    impl MemoryBackend {
        pub fn with_root(root: Folder) -> Self {
            let backend = Self::default();
            backend.state.lock().unwrap().root = Some(root);
            backend
        }

        pub fn set_content(&self, id: &str, data: &[u8]) {
            self.state
                .lock()
                .unwrap()
                .contents
                .insert(id.to_string(), data.to_vec());
        }
    }

    #[async_trait]
    impl ProjectBackend for MemoryBackend {
        async fn project_files(&self, _project_id: &str) -> Result<Folder> {
            let mut state = self.state.lock().unwrap();
            state.fetches += 1;
            Ok(state.root.clone().unwrap_or_else(|| Folder::new("root", "rootFolder")))
        }

        async fn create_folder(&self, _: &str, parent_folder_id: &str, name: &str) -> Result<Folder> {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let folder = Folder::new(format!("folder-{}", state.next_id), name);
            let root = state.root.get_or_insert_with(|| Folder::new("root", "rootFolder"));
            let parent = tree::find_folder_mut(root, parent_folder_id)
                .ok_or_else(|| OverleafError::NotFound(parent_folder_id.to_string()))?;
            parent.children.push(Entity::Folder(folder.clone()));
            Ok(folder)
        }

        async fn upload_file(
            &self,
            _: &str,
            folder_id: &str,
            name: &str,
            content: Vec<u8>,
        ) -> Result<File> {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let kind = if name.ends_with(".tex") {
                FileKind::Doc
            } else {
                FileKind::File
            };
            let file = File::new(format!("file-{}", state.next_id), name, kind);
            state.contents.insert(file.id.clone(), content.clone());
            state
                .uploads
                .push((folder_id.to_string(), name.to_string(), content));
            Ok(file)
        }

        async fn download_file(&self, _: &str, file: &File) -> Result<Vec<u8>> {
            let state = self.state.lock().unwrap();
            state
                .contents
                .get(&file.id)
                .cloned()
                .ok_or_else(|| OverleafError::NotFound(file.id.clone()))
        }

        async fn delete_entity(&self, _: &str, kind: EntityKind, entity_id: &str) -> Result<()> {
            self.state
                .lock()
                .unwrap()
                .deletes
                .push((kind, entity_id.to_string()));
            Ok(())
        }
    }
}
