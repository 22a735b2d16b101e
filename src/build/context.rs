// ABOUTME: Packs a checkout into the tar archive an image build consumes.
// ABOUTME: Skips the repository's .git directory.

use std::fs;
use std::io;
use std::path::Path;

/// Uncompressed tar of `dir`, with paths relative to it.
pub fn build_context(dir: &Path) -> io::Result<Vec<u8>> {
    let metadata = fs::metadata(dir)?;
    if !metadata.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("build directory {} is not a directory", dir.display()),
        ));
    }

    let mut archive = tar::Builder::new(Vec::new());
    archive.follow_symlinks(false);
    append_tree(&mut archive, dir, Path::new(""))?;
    archive.into_inner()
}

fn append_tree(
    archive: &mut tar::Builder<Vec<u8>>,
    root: &Path,
    relative: &Path,
) -> io::Result<()> {
    let mut entries: Vec<_> = fs::read_dir(root.join(relative))?.collect::<io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        if relative.as_os_str().is_empty() && name == ".git" {
            continue;
        }

        let rel = relative.join(&name);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            archive.append_dir(&rel, entry.path())?;
            append_tree(archive, root, &rel)?;
        } else {
            archive.append_path_with_name(entry.path(), &rel)?;
        }
    }
    Ok(())
}
