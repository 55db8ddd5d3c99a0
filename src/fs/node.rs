//! Remote project tree node types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OverleafError, Result};

/// Content kind of a leaf entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Binary blob, downloaded over HTTP.
    File,
    /// Collaboratively edited text document, pulled over the event socket.
    Doc,
}

impl FileKind {
    /// Wire tag used by the service.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::File => "file",
            FileKind::Doc => "doc",
        }
    }
}

impl FromStr for FileKind {
    type Err = OverleafError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(FileKind::File),
            "doc" => Ok(FileKind::Doc),
            other => Err(OverleafError::UnknownEntityKind(other.to_string())),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind tag of any entity, as used in delete URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Folder,
    File,
    Doc,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Folder => "folder",
            EntityKind::File => "file",
            EntityKind::Doc => "doc",
        }
    }
}

impl From<FileKind> for EntityKind {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::File => EntityKind::File,
            FileKind::Doc => EntityKind::Doc,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file or doc in a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// Server-assigned id
    pub id: String,
    /// Name within the parent folder
    pub name: String,
    /// Creation timestamp as reported by the server
    pub created: Option<String>,
    /// Content kind
    pub kind: FileKind,
}

impl File {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created: None,
            kind,
        }
    }
}

/// A folder and its ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub name: String,
    /// Sub-folders, then files, then docs, in server order.
    pub children: Vec<Entity>,
}

impl Folder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Synthesized kind tag.
    pub fn kind(&self) -> EntityKind {
        EntityKind::Folder
    }

    /// Decode a folder payload (`_id`, `name`, `folders`, `fileRefs`, `docs`).
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw = RawFolder::deserialize(value)?;
        Ok(raw.into())
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Entity> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Names of all children in order.
    pub fn child_names(&self) -> Vec<String> {
        self.children.iter().map(|c| c.name().to_string()).collect()
    }
}

impl fmt::Display for Folder {
    /// Indented tree rendering, two spaces per level.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.name)?;
        for child in &self.children {
            let rendered = match child {
                Entity::Folder(folder) => folder.to_string(),
                Entity::File(file) => file.name.clone(),
            };
            for line in rendered.lines() {
                write!(f, "\n  {}", line)?;
            }
        }
        Ok(())
    }
}

/// Any node of the project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Folder(Folder),
    File(File),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Folder(f) => &f.id,
            Entity::File(f) => &f.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Folder(f) => &f.name,
            Entity::File(f) => &f.name,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Folder(_) => EntityKind::Folder,
            Entity::File(f) => f.kind.into(),
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Entity::Folder(_))
    }

    pub fn view(&self) -> EntityRef<'_> {
        match self {
            Entity::Folder(f) => EntityRef::Folder(f),
            Entity::File(f) => EntityRef::File(f),
        }
    }
}

/// Borrowed view of a tree node; the root folder resolves to `Folder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef<'a> {
    Folder(&'a Folder),
    File(&'a File),
}

impl<'a> EntityRef<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            EntityRef::Folder(f) => &f.id,
            EntityRef::File(f) => &f.id,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            EntityRef::Folder(f) => &f.name,
            EntityRef::File(f) => &f.name,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Folder(_) => EntityKind::Folder,
            EntityRef::File(f) => f.kind.into(),
        }
    }

    pub fn as_folder(&self) -> Option<&'a Folder> {
        match self {
            EntityRef::Folder(f) => Some(f),
            EntityRef::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&'a File> {
        match self {
            EntityRef::File(f) => Some(f),
            EntityRef::Folder(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct RawFolder {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(default)]
    folders: Vec<RawFolder>,
    #[serde(default, rename = "fileRefs")]
    file_refs: Vec<RawFile>,
    #[serde(default)]
    docs: Vec<RawFile>,
}

#[derive(Deserialize)]
struct RawFile {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(default)]
    created: Option<String>,
}

impl RawFile {
    fn into_file(self, kind: FileKind) -> File {
        File {
            id: self.id,
            name: self.name,
            created: self.created,
            kind,
        }
    }
}

impl From<RawFolder> for Folder {
    fn from(raw: RawFolder) -> Self {
        let mut children =
            Vec::with_capacity(raw.folders.len() + raw.file_refs.len() + raw.docs.len());
        children.extend(raw.folders.into_iter().map(|f| Entity::Folder(f.into())));
        children.extend(
            raw.file_refs
                .into_iter()
                .map(|f| Entity::File(f.into_file(FileKind::File))),
        );
        children.extend(
            raw.docs
                .into_iter()
                .map(|f| Entity::File(f.into_file(FileKind::Doc))),
        );
        Folder {
            id: raw.id,
            name: raw.name,
            children,
        }
    }
}
