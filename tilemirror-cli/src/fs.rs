//! Filesystem helpers built on `cap-std` and `camino`.

use std::io;
use std::path::Component;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};

/// Create the parent directory of `path` if it does not exist yet.
pub(crate) fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() {
        return Ok(());
    }
    let (base, relative) = split_at_root(parent)?;
    if relative
        .components()
        .all(|component| component == Utf8Component::CurDir)
    {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

/// Open the directory a path is anchored at and return the remainder.
///
/// Absolute paths are anchored at their root (or Windows prefix), relative
/// ones at the working directory.
fn split_at_root(path: &Utf8Path) -> io::Result<(Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let anchor: Utf8PathBuf = std_path
        .components()
        .take_while(|component| matches!(component, Component::Prefix(_) | Component::RootDir))
        .map(|component| {
            component
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))
        })
        .collect::<io::Result<_>>()?;

    let (base, relative) = if anchor.as_str().is_empty() {
        (Utf8PathBuf::from("."), path.to_path_buf())
    } else {
        let relative = path
            .strip_prefix(&anchor)
            .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
            .to_path_buf();
        (anchor, relative)
    };
    let dir = Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir")
    }

    #[rstest]
    fn creates_nested_parents_of_absolute_paths() {
        let dir = TempDir::new().expect("tempdir");
        let target = utf8(&dir).join("a/b/out.mbtiles");
        ensure_parent_dir(&target).expect("create parents");
        assert!(target.parent().expect("parent").is_dir());
        assert!(!target.exists());
    }

    #[rstest]
    #[case("out.mbtiles")]
    #[case("./out.mbtiles")]
    fn accepts_paths_in_the_working_directory(#[case] raw: &str) {
        ensure_parent_dir(Utf8Path::new(raw)).expect("nothing to create");
    }

    #[rstest]
    fn existing_parent_is_left_alone() {
        let dir = TempDir::new().expect("tempdir");
        let target = utf8(&dir).join("out.mbtiles");
        ensure_parent_dir(&target).expect("parent exists");
        ensure_parent_dir(&target).expect("still fine");
    }
}
