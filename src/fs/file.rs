//! Buffered handles on project files.

use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::str::FromStr;

use super::backend::ProjectBackend;
use super::node::File;
use super::project_fs::{SharedTree, lock_tree};
use super::tree;
use crate::error::{OverleafError, Result};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    Read,
    Write,
    Append,
}

/// Parsed `open` mode: one of `r`, `w`, `a`, optionally followed by `+`
/// and/or `b` in either order (`rb+` and `r+b` are the same mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    base: Base,
    plus: bool,
    binary: bool,
}

impl OpenMode {
    pub fn parse(mode: &str) -> Result<Self> {
        mode.parse()
    }

    pub fn readable(&self) -> bool {
        self.base == Base::Read || self.plus
    }

    pub fn writable(&self) -> bool {
        self.base != Base::Read || self.plus
    }

    /// Existing content is discarded (`w` modes).
    pub fn truncates(&self) -> bool {
        self.base == Base::Write
    }

    /// Existing content is kept as a fixed prefix (`a` modes).
    pub fn appends(&self) -> bool {
        self.base == Base::Append
    }

    /// A missing file is acceptable (`w` modes and `r+`).
    pub fn creates(&self) -> bool {
        self.base == Base::Write || (self.base == Base::Read && self.plus)
    }

    /// Raw bytes (`b` modes). Other modes are UTF-8 text handles.
    pub fn is_binary(&self) -> bool {
        self.binary
    }
}

impl FromStr for OpenMode {
    type Err = OverleafError;

    fn from_str(mode: &str) -> Result<Self> {
        let invalid = || OverleafError::InvalidMode(mode.to_string());
        let mut chars = mode.chars();
        let base = match chars.next() {
            Some('r') => Base::Read,
            Some('w') => Base::Write,
            Some('a') => Base::Append,
            _ => return Err(invalid()),
        };

        let mut parsed = OpenMode {
            base,
            plus: false,
            binary: false,
        };
        for c in chars {
            let flag = match c {
                '+' => &mut parsed.plus,
                'b' => &mut parsed.binary,
                _ => return Err(invalid()),
            };
            if *flag {
                return Err(invalid());
            }
            *flag = true;
        }
        Ok(parsed)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.base {
            Base::Read => "r",
            Base::Write => "w",
            Base::Append => "a",
        };
        write!(
            f,
            "{}{}{}",
            base,
            if self.binary { "b" } else { "" },
            if self.plus { "+" } else { "" }
        )
    }
}

/// Where a handle's content is uploaded to.
pub(crate) struct UploadTarget<B> {
    pub backend: B,
    pub project_id: String,
    pub folder_id: String,
    pub name: String,
    pub tree: SharedTree,
}

impl<B: ProjectBackend> UploadTarget<B> {
    async fn upload(&self, data: Vec<u8>) -> Result<File> {
        let file = self
            .backend
            .upload_file(&self.project_id, &self.folder_id, &self.name, data)
            .await?;

        let mut guard = lock_tree(&self.tree);
        if let Some(parent) = guard
            .as_mut()
            .and_then(|root| tree::find_folder_mut(root, &self.folder_id))
        {
            tree::record_file(parent, file.clone());
        }
        Ok(file)
    }
}

/// An open project file, buffered in memory.
///
/// Reads, writes and seeks act on the local buffer through [`Read`],
/// [`Write`] and [`Seek`]. Content reaches the server only through
/// [`flush_remote`](Self::flush_remote) or [`close`](Self::close), each of
/// which uploads the whole content once.
///
/// Handles opened without `b` are text handles: their content must be valid
/// UTF-8 when opened and when uploaded, and only they accept
/// [`read_text`](Self::read_text) and [`write_text`](Self::write_text).
///
/// A writable handle dropped without `close` loses its pending content; use
/// [`ProjectFs::with_file`](super::ProjectFs::with_file) for scoped use.
pub struct RemoteFile<B: ProjectBackend = Session> {
    mode: OpenMode,
    buffer: Cursor<Vec<u8>>,
    prefix: Option<Vec<u8>>,
    entity: Option<File>,
    target: UploadTarget<B>,
    closed: bool,
}

impl<B: ProjectBackend> RemoteFile<B> {
    /// `initial` is the remote content, absent for new or truncated files.
    pub(crate) fn new(
        mode: OpenMode,
        entity: Option<File>,
        initial: Option<Vec<u8>>,
        target: UploadTarget<B>,
    ) -> Result<Self> {
        let mut initial = initial.unwrap_or_default();
        if !mode.is_binary() {
            initial = String::from_utf8(initial)?.into_bytes();
        }
        let (prefix, buffer) = if mode.appends() {
            (Some(initial), Vec::new())
        } else {
            (None, initial)
        };
        Ok(Self {
            mode,
            buffer: Cursor::new(buffer),
            prefix,
            entity,
            target,
            closed: false,
        })
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Leaf name within the parent folder.
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Entity this handle is bound to; `None` for a file not yet uploaded.
    pub fn entity(&self) -> Option<&File> {
        self.entity.as_ref()
    }

    /// Buffer content, without the append prefix.
    pub fn buffer(&self) -> &[u8] {
        self.buffer.get_ref()
    }

    /// Upload the append prefix plus the buffer and rebind to the result.
    ///
    /// A no-op for read-only handles. Text handles refuse to upload content
    /// that is not valid UTF-8.
    pub async fn flush_remote(&mut self) -> Result<()> {
        if !self.mode.writable() {
            return Ok(());
        }
        let mut data = self.prefix.clone().unwrap_or_default();
        data.extend_from_slice(self.buffer.get_ref());
        if !self.mode.is_binary() {
            data = String::from_utf8(data)?.into_bytes();
        }

        let file = self.target.upload(data).await?;
        tracing::debug!(name = %self.target.name, id = %file.id, "handle flushed");
        self.entity = Some(file);
        Ok(())
    }

    /// Flush if writable and release the handle, returning the bound entity.
    pub async fn close(mut self) -> Result<Option<File>> {
        let flushed = self.flush_remote().await;
        self.closed = true;
        flushed?;
        Ok(self.entity.take())
    }

    /// Read the rest of the buffer as text.
    pub fn read_text(&mut self) -> Result<String> {
        self.require_text("read_text")?;
        let mut data = Vec::new();
        self.read_to_end(&mut data)?;
        Ok(String::from_utf8(data)?)
    }

    /// Write text at the cursor.
    pub fn write_text(&mut self, text: &str) -> Result<()> {
        self.require_text("write_text")?;
        self.write_all(text.as_bytes())?;
        Ok(())
    }

    fn require_text(&self, op: &str) -> io::Result<()> {
        if self.mode.is_binary() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{}: {} on a binary handle (mode {})", self.target.name, op, self.mode),
            ));
        }
        Ok(())
    }
}

impl<B: ProjectBackend> Read for RemoteFile<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.mode.readable() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} not opened for reading (mode {})", self.target.name, self.mode),
            ));
        }
        self.buffer.read(buf)
    }
}

impl<B: ProjectBackend> Write for RemoteFile<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.mode.writable() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} not opened for writing (mode {})", self.target.name, self.mode),
            ));
        }
        self.buffer.write(buf)
    }

    /// Local only; see [`RemoteFile::flush_remote`].
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<B: ProjectBackend> Seek for RemoteFile<B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl<B: ProjectBackend> fmt::Debug for RemoteFile<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("name", &self.target.name)
            .field("mode", &self.mode.to_string())
            .field("entity", &self.entity)
            .field("len", &self.buffer.get_ref().len())
            .finish()
    }
}

impl<B: ProjectBackend> Drop for RemoteFile<B> {
    fn drop(&mut self) {
        if self.mode.writable() && !self.closed {
            tracing::warn!(
                name = %self.target.name,
                "writable handle dropped without close; content was not uploaded"
            );
        }
    }
}
