//! Path-based filesystem view of one project.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use super::backend::ProjectBackend;
use super::file::{OpenMode, RemoteFile, UploadTarget};
use super::node::{EntityRef, Folder};
use super::tree;
use crate::error::{OverleafError, Result};
use crate::session::Session;

/// Lazily fetched root folder, shared with open handles.
pub(crate) type SharedTree = Arc<Mutex<Option<Folder>>>;

pub(crate) fn lock_tree(tree: &SharedTree) -> MutexGuard<'_, Option<Folder>> {
    tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Filesystem operations on one project.
///
/// The project tree is fetched on first use and cached. The cache follows
/// this instance's own changes (created folders, uploads, removals) but not
/// changes made elsewhere; call [`refresh`](Self::refresh) to refetch.
///
/// # Example
/// ```no_run
/// use overleaf_fs::{ClientConfig, ProjectFs, Session};
///
/// # async fn example() -> overleaf_fs::Result<()> {
/// let session = Session::new(ClientConfig::default());
/// session.login_from_cookie_header("overleaf_session2=...")?;
/// let project = session.find_project_by_name("Paper").await?;
///
/// let fs = ProjectFs::new(session, project.id);
/// fs.mkdir("figures/plots", true, true).await?;
/// fs.write("figures/plots/data.csv", b"x,y\n1,2\n").await?;
/// println!("{}", fs.read_to_string("main.tex").await?);
/// # Ok(())
/// # }
/// ```
pub struct ProjectFs<B: ProjectBackend = Session> {
    backend: B,
    project_id: String,
    tree: SharedTree,
}

impl<B: ProjectBackend> ProjectFs<B> {
    pub fn new(backend: B, project_id: impl Into<String>) -> Self {
        Self {
            backend,
            project_id: project_id.into(),
            tree: Arc::new(Mutex::new(None)),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Drop the cached tree; the next operation refetches it.
    pub fn refresh(&self) {
        *lock_tree(&self.tree) = None;
    }

    /// Copy of the cached project tree, fetching it if needed.
    pub async fn root(&self) -> Result<Folder> {
        self.with_root(|root| root.clone()).await
    }

    /// Check whether a path resolves to anything. Fetch errors count as absent.
    pub async fn exists(&self, path: &str) -> bool {
        match self
            .with_root(|root| tree::resolve(root, path).is_some())
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(path, error = %e, "existence check failed");
                false
            }
        }
    }

    /// Names of a folder's children, in server order.
    pub async fn listdir(&self, path: &str) -> Result<Vec<String>> {
        self.with_root(|root| match tree::resolve(root, path) {
            Some(EntityRef::Folder(folder)) => Ok(folder.child_names()),
            _ => Err(OverleafError::NotFound(path.to_string())),
        })
        .await?
    }

    /// Create a folder.
    ///
    /// # Arguments
    /// * `path` - Folder to create
    /// * `exist_ok` - Succeed if the folder already exists
    /// * `parents` - Create missing intermediate folders
    ///
    /// Nothing is created when an intermediate folder is missing and
    /// `parents` is false.
    pub async fn mkdir(&self, path: &str, exist_ok: bool, parents: bool) -> Result<()> {
        let parts = tree::components(path);
        let mut current = self.with_root(|root| root.id.clone()).await?;

        if parts.is_empty() {
            return if exist_ok {
                Ok(())
            } else {
                Err(OverleafError::AlreadyExists(path.to_string()))
            };
        }

        for (i, part) in parts.iter().enumerate() {
            let last = i + 1 == parts.len();
            let existing = self
                .with_root(|root| {
                    let folder = tree::find_folder_mut(root, &current)
                        .ok_or_else(|| OverleafError::NotFound(path.to_string()))?;
                    Ok::<_, OverleafError>(folder.child(part).map(|child| {
                        (child.id().to_string(), child.is_folder())
                    }))
                })
                .await??;

            match existing {
                Some((_, false)) if last => {
                    return Err(OverleafError::AlreadyExists(path.to_string()));
                }
                Some((_, false)) => {
                    return Err(OverleafError::NotADirectory(parts[..=i].join("/")));
                }
                Some(_) if last && !exist_ok => {
                    return Err(OverleafError::AlreadyExists(path.to_string()));
                }
                Some((id, true)) => current = id,
                None if !last && !parents => {
                    return Err(OverleafError::NotFound(parts[..=i].join("/")));
                }
                None => {
                    let created = self
                        .backend
                        .create_folder(&self.project_id, &current, part)
                        .await?;
                    tracing::debug!(path = %parts[..=i].join("/"), id = %created.id, "created folder");
                    let id = created.id.clone();
                    let mut guard = lock_tree(&self.tree);
                    if let Some(parent) = guard
                        .as_mut()
                        .and_then(|root| tree::find_folder_mut(root, &current))
                    {
                        tree::insert_folder(parent, created);
                    }
                    current = id;
                }
            }
        }
        Ok(())
    }

    /// Delete the file, doc or folder at `path`.
    pub async fn remove(&self, path: &str, missing_ok: bool) -> Result<()> {
        let target = self
            .with_root(|root| {
                let root: &Folder = root;
                tree::resolve(root, path).map(|entity| {
                    (
                        entity.id().to_string(),
                        entity.kind(),
                        entity.id() == root.id,
                    )
                })
            })
            .await?;

        let (id, kind) = match target {
            Some((_, _, true)) => {
                return Err(OverleafError::InvalidPath(
                    "cannot remove the project root".to_string(),
                ));
            }
            Some((id, kind, false)) => (id, kind),
            None if missing_ok => return Ok(()),
            None => return Err(OverleafError::NotFound(path.to_string())),
        };

        self.backend
            .delete_entity(&self.project_id, kind, &id)
            .await?;
        if let Some(root) = lock_tree(&self.tree).as_mut() {
            tree::remove_entity(root, &id);
        }
        tracing::debug!(path, %kind, id = %id, "removed");
        Ok(())
    }

    /// Open a buffered handle.
    ///
    /// # Arguments
    /// * `path` - File path; parent components must be folders
    /// * `mode` - `r`, `w`, `a`, optionally with `+` and/or `b`
    /// * `encoding` - Text encoding; only UTF-8 is supported
    ///
    /// `w` modes and `r+` accept a missing file; every other mode requires
    /// it to exist. Existing content is downloaded unless the mode truncates.
    pub async fn open(
        &self,
        path: &str,
        mode: &str,
        encoding: Option<&str>,
    ) -> Result<RemoteFile<B>> {
        let mode = OpenMode::parse(mode)?;
        if let Some(encoding) = encoding {
            check_encoding(encoding)?;
        }
        let (parents, name) = tree::split_parent(path)
            .ok_or_else(|| OverleafError::InvalidPath(path.to_string()))?;

        let (folder_id, entity) = self
            .with_root(|root| {
                let folder = tree::resolve_folder(root, &parents)
                    .ok_or_else(|| OverleafError::NotFound(path.to_string()))?;
                let entity = folder
                    .children
                    .iter()
                    .filter_map(|child| child.view().as_file())
                    .find(|file| file.name == name)
                    .cloned();
                Ok::<_, OverleafError>((folder.id.clone(), entity))
            })
            .await??;

        if entity.is_none() && !mode.creates() {
            return Err(OverleafError::NotFound(path.to_string()));
        }

        let initial = match &entity {
            Some(file) if !mode.truncates() => {
                Some(self.backend.download_file(&self.project_id, file).await?)
            }
            _ => None,
        };

        tracing::debug!(path, %mode, existing = entity.is_some(), "opened");
        RemoteFile::new(
            mode,
            entity,
            initial,
            UploadTarget {
                backend: self.backend.clone(),
                project_id: self.project_id.clone(),
                folder_id,
                name: name.to_string(),
                tree: self.tree.clone(),
            },
        )
    }

    /// Use a handle inside `f`, then close it.
    ///
    /// The handle is closed (and flushed if writable) whether or not `f`
    /// succeeds. An error from `f` takes precedence over one from closing.
    pub async fn with_file<T, F>(&self, path: &str, mode: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut RemoteFile<B>) -> Result<T>,
    {
        let mut file = self.open(path, mode, None).await?;
        let outcome = f(&mut file);
        let closed = file.close().await;
        match outcome {
            Ok(value) => closed.map(|_| value),
            Err(e) => {
                if let Err(close_err) = closed {
                    tracing::warn!(path, error = %close_err, "close failed after error");
                }
                Err(e)
            }
        }
    }

    /// Full content of a file or doc.
    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.with_file(path, "rb", |file| {
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            Ok(data)
        })
        .await
    }

    /// Full content as UTF-8 text.
    pub async fn read_to_string(&self, path: &str) -> Result<String> {
        self.with_file(path, "r", |file| file.read_text()).await
    }

    /// Replace (or create) a file with `data`.
    pub async fn write(&self, path: &str, data: impl AsRef<[u8]>) -> Result<()> {
        self.with_file(path, "wb", |file| Ok(file.write_all(data.as_ref())?))
            .await
    }

    /// Run `f` against the cached root, fetching it first if needed.
    async fn with_root<T>(&self, f: impl FnOnce(&mut Folder) -> T) -> Result<T> {
        loop {
            {
                let mut guard = lock_tree(&self.tree);
                if let Some(root) = guard.as_mut() {
                    return Ok(f(root));
                }
            }

            let root = self.backend.project_files(&self.project_id).await?;
            tracing::debug!(project_id = %self.project_id, root = %root.id, "fetched project tree");
            let mut guard = lock_tree(&self.tree);
            if guard.is_none() {
                *guard = Some(root);
            }
        }
    }
}

impl<B: ProjectBackend> std::fmt::Debug for ProjectFs<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectFs")
            .field("project_id", &self.project_id)
            .field("cached", &lock_tree(&self.tree).is_some())
            .finish()
    }
}

fn check_encoding(encoding: &str) -> Result<()> {
    let normalized = encoding.to_ascii_lowercase().replace(['-', '_'], "");
    if normalized == "utf8" {
        Ok(())
    } else {
        Err(OverleafError::UnsupportedEncoding(encoding.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::backend::memory::MemoryBackend;
    use crate::fs::node::{Entity, EntityKind, File, FileKind};

    fn paper() -> MemoryBackend {
        let mut root = Folder::new("root", "rootFolder");
        let mut sections = Folder::new("sec", "sections");
        sections
            .children
            .push(Entity::File(File::new("d2", "intro.tex", FileKind::Doc)));
        root.children.push(Entity::Folder(sections));
        root.children
            .push(Entity::File(File::new("f1", "logo.png", FileKind::File)));
        root.children
            .push(Entity::File(File::new("d1", "main.tex", FileKind::Doc)));
        let backend = MemoryBackend::with_root(root);
        backend.set_content("d1", b"Hello\nWorld");
        backend.set_content("f1", &[0x89, b'P', b'N', b'G']);
        backend
    }

    #[tokio::test]
    async fn test_tree_fetched_once() {
        let backend = paper();
        let fs = ProjectFs::new(backend.clone(), "p1");
        assert!(fs.exists("main.tex").await);
        assert!(fs.exists("sections/intro.tex").await);
        assert!(!fs.exists("missing").await);
        assert_eq!(backend.state.lock().unwrap().fetches, 1);

        fs.refresh();
        fs.listdir("").await.unwrap();
        assert_eq!(backend.state.lock().unwrap().fetches, 2);
    }

    #[tokio::test]
    async fn test_listdir() {
        let fs = ProjectFs::new(paper(), "p1");
        assert_eq!(
            fs.listdir("/").await.unwrap(),
            vec!["sections", "logo.png", "main.tex"]
        );
        assert_eq!(fs.listdir("sections").await.unwrap(), vec!["intro.tex"]);
        assert!(matches!(
            fs.listdir("main.tex").await,
            Err(OverleafError::NotFound(_))
        ));
        assert!(matches!(
            fs.listdir("nope").await,
            Err(OverleafError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mkdir_conflicts() {
        let fs = ProjectFs::new(paper(), "p1");
        assert!(matches!(
            fs.mkdir("main.tex", true, true).await,
            Err(OverleafError::AlreadyExists(_))
        ));
        assert!(matches!(
            fs.mkdir("main.tex/sub", true, true).await,
            Err(OverleafError::NotADirectory(p)) if p == "main.tex"
        ));
        assert!(matches!(
            fs.mkdir("sections", false, false).await,
            Err(OverleafError::AlreadyExists(_))
        ));
        fs.mkdir("sections", true, false).await.unwrap();
        assert!(matches!(
            fs.mkdir("", false, false).await,
            Err(OverleafError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_mkdir_inserts_into_snapshot() {
        let backend = paper();
        let fs = ProjectFs::new(backend.clone(), "p1");
        fs.mkdir("sections/figures", false, false).await.unwrap();
        assert_eq!(
            fs.listdir("sections").await.unwrap(),
            vec!["intro.tex", "figures"]
        );
        assert_eq!(backend.state.lock().unwrap().fetches, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let backend = paper();
        let fs = ProjectFs::new(backend.clone(), "p1");
        fs.remove("sections/intro.tex", false).await.unwrap();
        assert!(!fs.exists("sections/intro.tex").await);
        fs.remove("sections", false).await.unwrap();

        let deletes = backend.state.lock().unwrap().deletes.clone();
        assert_eq!(
            deletes,
            vec![
                (EntityKind::Doc, "d2".to_string()),
                (EntityKind::Folder, "sec".to_string())
            ]
        );

        assert!(matches!(
            fs.remove("", false).await,
            Err(OverleafError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_open_rules() {
        let fs = ProjectFs::new(paper(), "p1");
        assert!(matches!(
            fs.open("missing.tex", "r", None).await,
            Err(OverleafError::NotFound(_))
        ));
        assert!(matches!(
            fs.open("missing.tex", "a", None).await,
            Err(OverleafError::NotFound(_))
        ));
        assert!(matches!(
            fs.open("nodir/new.tex", "w", None).await,
            Err(OverleafError::NotFound(_))
        ));
        // a file is never a parent
        assert!(matches!(
            fs.open("main.tex/x", "w", None).await,
            Err(OverleafError::NotFound(_))
        ));
        // a folder is never the leaf
        let handle = fs.open("sections", "r+", None).await.unwrap();
        assert!(handle.entity().is_none());
        drop(handle);

        assert!(matches!(
            fs.open("main.tex", "rx", None).await,
            Err(OverleafError::InvalidMode(_))
        ));
        assert!(matches!(
            fs.open("main.tex", "r", Some("latin-1")).await,
            Err(OverleafError::UnsupportedEncoding(_))
        ));
        fs.open("main.tex", "r", Some("UTF-8")).await.unwrap();
        assert!(matches!(
            fs.open("", "w", None).await,
            Err(OverleafError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_open_truncate_skips_download() {
        let fs = ProjectFs::new(paper(), "p1");
        let handle = fs.open("main.tex", "wb", None).await.unwrap();
        assert!(handle.buffer().is_empty());
        assert_eq!(handle.entity().unwrap().id, "d1");
        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_doc() {
        let fs = ProjectFs::new(paper(), "p1");
        assert_eq!(fs.read_to_string("main.tex").await.unwrap(), "Hello\nWorld");
        assert_eq!(fs.read("logo.png").await.unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn test_write_updates_snapshot() {
        let backend = paper();
        let fs = ProjectFs::new(backend.clone(), "p1");
        fs.write("sections/new.bib", b"@book{}").await.unwrap();
        assert_eq!(
            fs.listdir("sections").await.unwrap(),
            vec!["intro.tex", "new.bib"]
        );
        assert_eq!(fs.read("sections/new.bib").await.unwrap(), b"@book{}");

        let uploads = backend.state.lock().unwrap().uploads.clone();
        assert_eq!(uploads[0].0, "sec");
    }

    #[tokio::test]
    async fn test_with_file_closes_on_error() {
        let backend = paper();
        let fs = ProjectFs::new(backend.clone(), "p1");
        let res: Result<()> = fs
            .with_file("notes.txt", "w", |file| {
                file.write_text("partial")?;
                Err(OverleafError::InvalidPath("stop".to_string()))
            })
            .await;
        assert!(matches!(res, Err(OverleafError::InvalidPath(_))));
        let uploads = backend.state.lock().unwrap().uploads.clone();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].2, b"partial");
    }
}
