//! Shared path manipulation utilities.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Make a path absolute (relative to CWD) and resolve `.`/`..` syntactically.
///
/// Symlinks are deliberately left alone: root identity is the path the account
/// database names, not wherever it happens to point.
pub fn absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    normalize_syntactic(&absolute)
}

/// Whether `path` lies inside `root` on a component boundary.
///
/// Both sides are normalized first, so `/home/al` does not contain
/// `/home/alice/.bash_history` and `/home/a/../b/x` is judged as `/home/b/x`.
/// The root itself is not considered inside.
pub fn is_within(root: &Path, path: &Path) -> bool {
    let root = absolute_path(root);
    let path = absolute_path(path);
    path != root && path.starts_with(&root)
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}
