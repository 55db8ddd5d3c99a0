//! Path resolution and in-place edits of a cached project tree.

use super::node::{Entity, EntityRef, File, Folder};

/// Split a project-relative path into components.
///
/// Empty parts and `.` are dropped, so "a//b/", "/a/b" and "./a/b" all
/// yield `["a", "b"]`. `..` is kept and matched literally.
pub fn components(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect()
}

/// Split `<project>/<path>` into the project name and project-relative path.
///
/// A leading `/` is ignored; a bare project name yields an empty path.
pub fn split_project_path(path: &str) -> (&str, &str) {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.split_once('/').unwrap_or((path, ""))
}

/// Split a path into its parent components and leaf name.
pub fn split_parent(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut parts = components(path);
    let leaf = parts.pop()?;
    Some((parts, leaf))
}

/// Resolve a path by exact name match at each level.
///
/// The first child with a matching name wins, in insertion order. An empty
/// path resolves to the root itself.
pub fn resolve<'a>(root: &'a Folder, path: &str) -> Option<EntityRef<'a>> {
    let mut current = EntityRef::Folder(root);
    for part in components(path) {
        let folder = current.as_folder()?;
        current = folder.child(part)?.view();
    }
    Some(current)
}

/// Walk folder-only components, skipping same-named files.
pub fn resolve_folder<'a>(root: &'a Folder, parts: &[&str]) -> Option<&'a Folder> {
    let mut current = root;
    for part in parts {
        current = current.children.iter().find_map(|child| match child {
            Entity::Folder(f) if f.name == *part => Some(f),
            _ => None,
        })?;
    }
    Some(current)
}

/// Find a folder anywhere in the tree by id.
pub fn find_folder_mut<'a>(root: &'a mut Folder, id: &str) -> Option<&'a mut Folder> {
    if root.id == id {
        return Some(root);
    }
    root.children.iter_mut().find_map(|child| match child {
        Entity::Folder(f) => find_folder_mut(f, id),
        Entity::File(_) => None,
    })
}

/// Append a newly created folder under `parent`. No remote call is made.
pub fn insert_folder<'a>(parent: &'a mut Folder, folder: Folder) -> &'a mut Folder {
    parent.children.push(Entity::Folder(folder));
    match parent.children.last_mut() {
        Some(Entity::Folder(f)) => f,
        _ => unreachable!("a folder was just pushed"),
    }
}

/// Record an uploaded file under `parent`.
///
/// Replaces the first non-folder child with the same name, or appends.
pub fn record_file(parent: &mut Folder, file: File) {
    let existing = parent.children.iter_mut().find(|child| match child {
        Entity::File(f) => f.name == file.name,
        Entity::Folder(_) => false,
    });
    match existing {
        Some(slot) => *slot = Entity::File(file),
        None => parent.children.push(Entity::File(file)),
    }
}

/// Remove the entity with the given id. Returns it if found.
pub fn remove_entity(root: &mut Folder, id: &str) -> Option<Entity> {
    if let Some(pos) = root.children.iter().position(|c| c.id() == id) {
        return Some(root.children.remove(pos));
    }
    root.children.iter_mut().find_map(|child| match child {
        Entity::Folder(f) => remove_entity(f, id),
        Entity::File(_) => None,
    })
}

/// Reconstruct the root-relative path of the entity with the given id.
///
/// The root itself maps to the empty path.
pub fn path_of(root: &Folder, id: &str) -> Option<String> {
    if root.id == id {
        return Some(String::new());
    }
    let mut stack = Vec::new();
    if ancestry(root, id, &mut stack) {
        Some(stack.join("/"))
    } else {
        None
    }
}

fn ancestry<'a>(folder: &'a Folder, id: &str, stack: &mut Vec<&'a str>) -> bool {
    for child in &folder.children {
        stack.push(child.name());
        if child.id() == id {
            return true;
        }
        if let Entity::Folder(sub) = child {
            if ancestry(sub, id, stack) {
                return true;
            }
        }
        stack.pop();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::node::FileKind;

    fn sample_tree() -> Folder {
        let mut root = Folder::new("root", "rootFolder");
        let mut chapters = Folder::new("ch", "chapters");
        let mut appendix = Folder::new("ap", "appendix");
        appendix
            .children
            .push(Entity::File(File::new("d3", "extra.tex", FileKind::Doc)));
        chapters.children.push(Entity::Folder(appendix));
        chapters
            .children
            .push(Entity::File(File::new("d2", "one.tex", FileKind::Doc)));
        root.children.push(Entity::Folder(chapters));
        root.children
            .push(Entity::File(File::new("f1", "logo.png", FileKind::File)));
        root.children
            .push(Entity::File(File::new("d1", "main.tex", FileKind::Doc)));
        root
    }

    #[test]
    fn test_components() {
        assert_eq!(components("a/b/c"), vec!["a", "b", "c"]);
        assert_eq!(components("/a//b/"), vec!["a", "b"]);
        assert_eq!(components("./a/./b"), vec!["a", "b"]);
        assert_eq!(components("a/../b"), vec!["a", "..", "b"]);
        assert!(components("").is_empty());
        assert!(components("/").is_empty());
    }

    #[test]
    fn test_split_project_path() {
        assert_eq!(split_project_path("Paper/sections/a.tex"), ("Paper", "sections/a.tex"));
        assert_eq!(split_project_path("/Paper/main.tex"), ("Paper", "main.tex"));
        assert_eq!(split_project_path("Paper"), ("Paper", ""));
        assert_eq!(split_project_path("Paper/"), ("Paper", ""));
    }

    #[test]
    fn test_split_parent() {
        let (parent, leaf) = split_parent("chapters/one.tex").unwrap();
        assert_eq!(parent, vec!["chapters"]);
        assert_eq!(leaf, "one.tex");
        assert!(split_parent("/").is_none());
    }

    #[test]
    fn test_resolve() {
        let root = sample_tree();
        assert_eq!(resolve(&root, "").unwrap().id(), "root");
        assert_eq!(resolve(&root, "main.tex").unwrap().id(), "d1");
        assert_eq!(
            resolve(&root, "chapters/appendix/extra.tex").unwrap().id(),
            "d3"
        );
        assert!(resolve(&root, "chapters/missing.tex").is_none());
        assert!(resolve(&root, "main.tex/inner").is_none());
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let mut root = Folder::new("root", "rootFolder");
        root.children.push(Entity::Folder(Folder::new("dir", "same")));
        root.children
            .push(Entity::File(File::new("file", "same", FileKind::File)));
        assert_eq!(resolve(&root, "same").unwrap().id(), "dir");
        assert!(resolve_folder(&root, &["same"]).is_some());
    }

    #[test]
    fn test_resolve_then_path_of_roundtrip() {
        let root = sample_tree();
        for path in [
            "chapters",
            "chapters/appendix",
            "chapters/appendix/extra.tex",
            "chapters/one.tex",
            "logo.png",
            "main.tex",
        ] {
            let id = resolve(&root, path).unwrap().id().to_string();
            assert_eq!(path_of(&root, &id).as_deref(), Some(path));
        }
        assert_eq!(path_of(&root, "root").as_deref(), Some(""));
        assert_eq!(path_of(&root, "nope"), None);
    }

    #[test]
    fn test_insert_folder() {
        let mut root = sample_tree();
        let parent = find_folder_mut(&mut root, "ch").unwrap();
        let inserted = insert_folder(parent, Folder::new("new", "figures"));
        assert_eq!(inserted.id, "new");
        assert_eq!(
            resolve(&root, "chapters/figures").unwrap().id(),
            "new"
        );
    }

    #[test]
    fn test_record_file_replaces_or_appends() {
        let mut root = sample_tree();
        record_file(&mut root, File::new("d1-new", "main.tex", FileKind::Doc));
        assert_eq!(resolve(&root, "main.tex").unwrap().id(), "d1-new");
        assert_eq!(root.children.len(), 3);

        record_file(&mut root, File::new("f9", "refs.bib", FileKind::File));
        assert_eq!(root.children.len(), 4);
        assert_eq!(root.children[3].name(), "refs.bib");
    }

    #[test]
    fn test_remove_entity() {
        let mut root = sample_tree();
        let removed = remove_entity(&mut root, "d3").unwrap();
        assert_eq!(removed.name(), "extra.tex");
        assert!(resolve(&root, "chapters/appendix/extra.tex").is_none());
        assert!(remove_entity(&mut root, "d3").is_none());
    }
}
