//! Plain tar encoding and decoding of image directories.

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::Path;

use log::{debug, info};
use tar::{Archive, Builder};

use crate::{Error, Result};

/// Unpack the tar at `archive_path` into `dest`.
pub fn extract<A: AsRef<Path>, D: AsRef<Path>>(archive_path: A, dest: D) -> Result<()> {
    let (archive_path, dest) = (archive_path.as_ref(), dest.as_ref());
    let wrap = |source: io::Error| Error::Extraction {
        path: archive_path.to_path_buf(),
        source,
    };

    info!("Unpacking {}", archive_path.display());
    let file = File::open(archive_path).map_err(wrap)?;
    let mut ar = Archive::new(BufReader::new(file));
    ar.set_preserve_mtime(true);
    ar.unpack(dest).map_err(wrap)?;
    debug!("Unpacked into {}", dest.display());

    Ok(())
}

/// Pack the contents of `src_dir` into a tar at `archive_path`.
///
/// The tar is staged next to the file `archive_path` resolves to and
/// renamed over it once complete, so a failure leaves any existing archive
/// as it was and a symlink to the archive stays a symlink. An existing
/// archive's permissions carry over to the new one.
pub fn archive<S: AsRef<Path>, A: AsRef<Path>>(src_dir: S, archive_path: A) -> Result<()> {
    let (src_dir, archive_path) = (src_dir.as_ref(), archive_path.as_ref());
    let target = fs::canonicalize(archive_path).unwrap_or_else(|_| archive_path.to_path_buf());
    let archive_path = target.as_path();
    let wrap = |source: io::Error| Error::Archive {
        path: archive_path.to_path_buf(),
        source,
    };

    let parent = match archive_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    info!("Packing {}", archive_path.display());
    let mut staged = tempfile::Builder::new()
        .prefix(".docker-retag-")
        .suffix(".tar")
        .tempfile_in(parent)
        .map_err(wrap)?;

    write_tar(src_dir, staged.as_file_mut()).map_err(wrap)?;

    if let Ok(meta) = fs::metadata(archive_path) {
        staged
            .as_file()
            .set_permissions(meta.permissions())
            .map_err(wrap)?;
    }
    staged.as_file().sync_all().map_err(wrap)?;

    staged
        .persist(archive_path)
        .map_err(|err| wrap(err.error))?;
    debug!("Replaced {}", archive_path.display());

    Ok(())
}

/// Write the contents of `src_dir` as a tar stream.
///
/// Entries are stored relative to `src_dir`, each directory followed by
/// its children in file name order.
fn write_tar<W: Write>(src_dir: &Path, out: W) -> io::Result<()> {
    let mut builder = Builder::new(out);
    builder.follow_symlinks(false);

    append_sorted(&mut builder, src_dir, Path::new(""))?;

    builder.into_inner()?.flush()
}

fn append_sorted<W: Write>(builder: &mut Builder<W>, dir: &Path, prefix: &Path) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = prefix.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            builder.append_dir(&name, entry.path())?;
            append_sorted(builder, &entry.path(), &name)?;
        } else {
            builder.append_path_with_name(entry.path(), &name)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::{symlink, PermissionsExt};
    use tempfile::TempDir;

    fn populate(dir: &Path) {
        fs::create_dir_all(dir.join("abc")).unwrap();
        fs::write(dir.join("abc/json"), r#"{"created":"2020-01-01T00:00:00Z"}"#).unwrap();
        fs::write(dir.join("abc/layer.tar"), b"layer bytes").unwrap();
        fs::write(dir.join("repositories"), r#"{"img":{"latest":"abc"}}"#).unwrap();
        symlink("abc/layer.tar", dir.join("shared.tar")).unwrap();
    }

    #[test]
    fn archive_then_extract_restores_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let out = tmp.path().join("out");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&out).unwrap();
        populate(&src);

        let tar_path = tmp.path().join("image.tar");
        archive(&src, &tar_path).unwrap();
        extract(&tar_path, &out).unwrap();

        assert_eq!(fs::read(out.join("abc/layer.tar")).unwrap(), b"layer bytes");
        assert_eq!(
            fs::read_to_string(out.join("repositories")).unwrap(),
            r#"{"img":{"latest":"abc"}}"#
        );
        assert_eq!(
            fs::read_link(out.join("shared.tar")).unwrap(),
            Path::new("abc/layer.tar")
        );
    }

    #[test]
    fn entries_are_stored_without_prefix() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        populate(&src);

        let tar_path = tmp.path().join("image.tar");
        archive(&src, &tar_path).unwrap();

        let mut ar = Archive::new(File::open(&tar_path).unwrap());
        let names: Vec<String> = ar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert_eq!(names[0].trim_end_matches('/'), "abc");
        assert!(names.iter().any(|n| n == "abc/json"));
        assert!(names.iter().any(|n| n == "repositories"));
        assert!(names.iter().all(|n| !n.starts_with("./") && !n.starts_with('/')));
    }

    #[test]
    fn nested_entries_are_in_name_order() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("layer/sub")).unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs::write(src.join("layer").join(name), name).unwrap();
            fs::write(src.join("layer/sub").join(name), name).unwrap();
        }

        let tar_path = tmp.path().join("image.tar");
        archive(&src, &tar_path).unwrap();

        let mut ar = Archive::new(File::open(&tar_path).unwrap());
        let names: Vec<String> = ar
            .entries()
            .unwrap()
            .map(|e| {
                let name = e.unwrap().path().unwrap().display().to_string();
                name.trim_end_matches('/').to_string()
            })
            .collect();
        assert_eq!(
            names,
            [
                "layer",
                "layer/alpha",
                "layer/mid",
                "layer/sub",
                "layer/sub/alpha",
                "layer/sub/mid",
                "layer/sub/zeta",
                "layer/zeta",
            ]
        );
    }

    #[test]
    fn symlinked_archive_is_rewritten_through_link() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        populate(&src);

        let real = tmp.path().join("real.tar");
        fs::write(&real, b"old").unwrap();
        let link = tmp.path().join("link.tar");
        symlink(&real, &link).unwrap();

        archive(&src, &link).unwrap();
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_ne!(fs::read(&real).unwrap(), b"old");
    }

    #[test]
    fn overwrite_keeps_permissions() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        populate(&src);

        let tar_path = tmp.path().join("image.tar");
        fs::write(&tar_path, b"old").unwrap();
        fs::set_permissions(&tar_path, fs::Permissions::from_mode(0o640)).unwrap();

        archive(&src, &tar_path).unwrap();
        let mode = fs::metadata(&tar_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert_ne!(fs::read(&tar_path).unwrap(), b"old");
    }

    #[test]
    fn failed_archive_leaves_original() {
        let tmp = TempDir::new().unwrap();
        let tar_path = tmp.path().join("image.tar");
        fs::write(&tar_path, b"original").unwrap();

        let err = archive(tmp.path().join("missing"), &tar_path).unwrap_err();
        assert!(matches!(err, Error::Archive { .. }), "{err}");
        assert_eq!(fs::read(&tar_path).unwrap(), b"original");
    }

    #[test]
    fn extracting_missing_archive_fails() {
        let tmp = TempDir::new().unwrap();
        let err = extract(tmp.path().join("none.tar"), tmp.path()).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }), "{err}");
    }
}
