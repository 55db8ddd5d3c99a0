//! # overleaf-fs
//!
//! Client library for Overleaf projects.
//!
//! ## Features
//!
//! - **Authentication**: reuse browser cookies (name/value pairs, a `Cookie`
//!   header or a Netscape `cookies.txt` export), with proxy, TLS and
//!   basic-auth settings carried over to every connection.
//! - **Projects**: list projects with their tags, find one by name, export
//!   a project as a zip archive.
//! - **Filesystem view**: `exists`, `listdir`, `mkdir`, `remove` and
//!   buffered `open` handles on a project's files and docs.
//! - **Real-time socket**: the project tree and doc contents are read over
//!   the editor's event socket.
//!
//! The project tree is cached per [`ProjectFs`]; it follows the instance's
//! own changes, and `ProjectFs::refresh()` picks up changes made elsewhere.
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Write;
//! use overleaf_fs::{ClientConfig, ProjectFs, Session};
//!
//! # async fn example() -> overleaf_fs::Result<()> {
//! let session = Session::new(ClientConfig::default());
//! session.login_from_cookie_file("cookies.txt")?;
//!
//! let project = session.find_project_by_name("Paper").await?;
//! let fs = ProjectFs::new(session.clone(), project.id);
//!
//! for name in fs.listdir("").await? {
//!     println!("{}", name);
//! }
//!
//! fs.with_file("notes.txt", "a", |file| {
//!     file.write_all(b"one more line\n")?;
//!     Ok(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod session;
pub mod socket;

pub use api::{Project, Tag, User};
pub use config::ClientConfig;
pub use error::{OverleafError, Result};
pub use fs::{
    Entity, EntityKind, File, FileKind, Folder, OpenMode, ProjectBackend, ProjectFs, RemoteFile,
};
pub use session::{Cookie, Session};
