use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Makes `path` absolute against `base`, removes `.`/`..` components and resolves
/// symlinks along the longest prefix that exists.
///
/// Unlike [`Path::canonicalize`] this never fails for paths that do not exist yet,
/// so it can be used for environments that are about to be created.
pub fn absolute_from(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    let mut existing = normalized.as_path();
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        if let Ok(mut resolved) = existing.canonicalize() {
            for name in missing.iter().rev() {
                resolved.push(name);
            }
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match etcetera::home_dir() {
        Ok(home) if rest.is_empty() => home,
        Ok(home) => home.join(rest),
        Err(_) => PathBuf::from(path),
    }
}

/// Total size in bytes of all regular files below `root`. Symlinks are not followed.
pub fn dir_size(root: &Path) -> io::Result<u64> {
    let mut total = 0;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs_err::read_dir(&dir)? {
            let entry = entry?;
            let metadata = fs_err::symlink_metadata(entry.path())?;
            if metadata.is_dir() {
                pending.push(entry.path());
            } else if metadata.is_file() {
                total += metadata.len();
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_absolute_from_joins_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().canonicalize().unwrap();

        let path = absolute_from(&base, "missing/./child/../env");
        assert_eq!(path, base.join("missing").join("env"));
    }

    #[test]
    fn test_absolute_from_keeps_absolute_paths() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().canonicalize().unwrap();

        let path = absolute_from(Path::new("/elsewhere"), base.join("env"));
        assert_eq!(path, base.join("env"));
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_from_resolves_symlinks_of_existing_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().canonicalize().unwrap();
        fs_err::create_dir(base.join("real")).unwrap();
        std::os::unix::fs::symlink(base.join("real"), base.join("link")).unwrap();

        let path = absolute_from(&base, "link/not-yet");
        assert_eq!(path, base.join("real").join("not-yet"));
    }

    #[test]
    fn test_expand_home_leaves_other_paths_alone() {
        assert_eq!(expand_home("/opt/snape"), PathBuf::from("/opt/snape"));
        assert_eq!(expand_home("~user/envs"), PathBuf::from("~user/envs"));
    }

    #[test]
    fn test_dir_size_counts_nested_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs_err::create_dir_all(root.join("a/b")).unwrap();
        fs_err::write(root.join("top"), [0u8; 10]).unwrap();
        fs_err::write(root.join("a/b/deep"), [0u8; 32]).unwrap();

        assert_eq!(dir_size(root).unwrap(), 42);
    }
}
