//! Filesystem view of a project: tree model, backend seam, handles.

mod backend;
mod file;
pub(crate) mod node;
mod project_fs;
pub mod tree;

pub use backend::ProjectBackend;
pub use file::{OpenMode, RemoteFile};
pub use node::{Entity, EntityKind, EntityRef, File, FileKind, Folder};
pub use project_fs::ProjectFs;
