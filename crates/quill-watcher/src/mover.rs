//! Relocating processed files
//!
//! The move is the last step of a successful candidate. It never
//! overwrites an existing file in the processed area.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where a processed file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveResult {
    /// The file was relocated to this path
    Moved(PathBuf),
    /// The source was gone and a file of the same name already sits in the
    /// processed area
    AlreadyMoved(PathBuf),
}

impl MoveResult {
    /// Final location of the file
    pub fn destination(&self) -> &Path {
        match self {
            Self::Moved(p) | Self::AlreadyMoved(p) => p,
        }
    }
}

/// Moves files into a processed directory
#[derive(Debug, Clone)]
pub struct FileMover {
    processed_dir: PathBuf,
}

impl FileMover {
    /// Create a mover targeting `processed_dir`
    pub fn new(processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
        }
    }

    /// The processed directory
    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Create the processed directory if it does not exist
    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.processed_dir)
    }

    /// Move `path` into the processed directory.
    ///
    /// The file is hard-linked into place and then unlinked from the watched
    /// directory; linking fails instead of replacing an existing file. A name
    /// already taken in the processed directory gets a ` (n)` suffix, and a
    /// name taken concurrently moves on to the next free one. Across volumes
    /// the file is copied, synced, linked into place and only then removed
    /// from the source.
    pub fn move_to_processed(&self, path: &Path) -> io::Result<MoveResult> {
        let name = path.file_name().ok_or_else(|| {
            io::Error::new(ErrorKind::InvalidInput, format!("{} has no file name", path.display()))
        })?;
        let same_name = self.processed_dir.join(name);

        if !path.exists() {
            if same_name.exists() {
                return Ok(MoveResult::AlreadyMoved(same_name));
            }
            return Err(io::Error::new(
                ErrorKind::NotFound,
                format!("{} no longer exists", path.display()),
            ));
        }

        self.ensure_dir()?;
        let mut attempts = 0;
        loop {
            let dest = free_destination(&self.processed_dir, path)?;
            match place(path, &dest) {
                Ok(()) => {
                    debug!("Moved {} -> {}", path.display(), dest.display());
                    return Ok(MoveResult::Moved(dest));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < MAX_NAME_RACES => {
                    attempts += 1;
                    debug!("{} was taken concurrently, picking another name", dest.display());
                }
                Err(e) => return Err(e),
            }
        }
    }
}

const MAX_NAME_RACES: u32 = 16;

/// Put `source` at `dest` without ever replacing an existing `dest`
fn place(source: &Path, dest: &Path) -> io::Result<()> {
    match fs::hard_link(source, dest) {
        Ok(()) => unlink_source(source, dest),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!("Link across devices, copying {}", source.display());
            copy_then_remove(source, dest)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
        Err(e) if dest.exists() => Err(io::Error::new(ErrorKind::AlreadyExists, e)),
        Err(e) => {
            // Filesystems without hard links
            debug!("Cannot link {} ({}), renaming", source.display(), e);
            fs::rename(source, dest)
        }
    }
}

/// Remove `source` once `dest` holds the file; undo the link on failure
fn unlink_source(source: &Path, dest: &Path) -> io::Result<()> {
    if let Err(e) = fs::remove_file(source) {
        // The file must not end up in both places.
        warn!("Could not remove {} after placing it, undoing", source.display());
        let _ = fs::remove_file(dest);
        return Err(e);
    }
    Ok(())
}

/// First `dir/<stem> (n).<ext>` that does not exist yet, starting with the
/// plain name
fn free_destination(dir: &Path, source: &Path) -> io::Result<PathBuf> {
    let plain = dir.join(source.file_name().unwrap_or_default());
    if !plain.exists() {
        return Ok(plain);
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = source.extension().map(|e| e.to_string_lossy().into_owned());

    for n in 1..10_000u32 {
        let name = match &ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free name for {} in {}", plain.display(), dir.display()),
    ))
}

fn copy_then_remove(source: &Path, dest: &Path) -> io::Result<()> {
    let file_name = dest.file_name().unwrap_or_default().to_string_lossy();
    let staging = dest.with_file_name(format!(".{}.partial", file_name));

    fs::copy(source, &staging)?;
    fs::File::open(&staging)?.sync_all()?;
    let linked = fs::hard_link(&staging, dest);
    let _ = fs::remove_file(&staging);
    linked?;

    unlink_source(source, dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, FileMover) {
        let dir = tempfile::tempdir().unwrap();
        let mover = FileMover::new(dir.path().join("processed"));
        (dir, mover)
    }

    #[test]
    fn test_move_creates_processed_dir() {
        let (dir, mover) = setup();
        let source = dir.path().join("a.md");
        fs::write(&source, "x").unwrap();

        let result = mover.move_to_processed(&source).unwrap();
        assert_eq!(result, MoveResult::Moved(dir.path().join("processed/a.md")));
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(result.destination()).unwrap(), "x");
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let (dir, mover) = setup();
        mover.ensure_dir().unwrap();
        fs::write(dir.path().join("processed/a.md"), "old").unwrap();
        fs::write(dir.path().join("processed/a (1).md"), "older").unwrap();
        let source = dir.path().join("a.md");
        fs::write(&source, "new").unwrap();

        let result = mover.move_to_processed(&source).unwrap();
        assert_eq!(result.destination(), dir.path().join("processed/a (2).md"));
        assert_eq!(fs::read_to_string(dir.path().join("processed/a.md")).unwrap(), "old");
    }

    #[test]
    fn test_collision_without_extension() {
        let (dir, mover) = setup();
        mover.ensure_dir().unwrap();
        fs::write(dir.path().join("processed/notes"), "old").unwrap();
        let source = dir.path().join("notes");
        fs::write(&source, "new").unwrap();

        let result = mover.move_to_processed(&source).unwrap();
        assert_eq!(result.destination(), dir.path().join("processed/notes (1)"));
    }

    #[test]
    fn test_place_never_replaces() {
        let (dir, mover) = setup();
        mover.ensure_dir().unwrap();
        let taken = dir.path().join("processed/weekly (1).md");
        fs::write(&taken, "moved by another worker").unwrap();
        let source = dir.path().join("weekly.md");
        fs::write(&source, "this week").unwrap();

        let err = place(&source, &taken).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&taken).unwrap(), "moved by another worker");
        assert_eq!(fs::read_to_string(&source).unwrap(), "this week");
    }

    #[test]
    fn test_colliding_names_keep_both_files() {
        let (dir, mover) = setup();
        mover.ensure_dir().unwrap();
        fs::write(dir.path().join("processed/weekly.md"), "last week").unwrap();
        let first = dir.path().join("weekly.md");
        let second = dir.path().join("weekly (1).md");
        fs::write(&first, "this week").unwrap();
        fs::write(&second, "literal name").unwrap();

        let a = mover.move_to_processed(&first).unwrap();
        let b = mover.move_to_processed(&second).unwrap();

        assert_eq!(a.destination(), dir.path().join("processed/weekly (1).md"));
        assert_eq!(b.destination(), dir.path().join("processed/weekly (1) (1).md"));
        assert_eq!(fs::read_to_string(a.destination()).unwrap(), "this week");
        assert_eq!(fs::read_to_string(b.destination()).unwrap(), "literal name");
    }

    #[test]
    fn test_already_moved() {
        let (dir, mover) = setup();
        mover.ensure_dir().unwrap();
        fs::write(dir.path().join("processed/a.md"), "x").unwrap();

        let result = mover.move_to_processed(&dir.path().join("a.md")).unwrap();
        assert_eq!(result, MoveResult::AlreadyMoved(dir.path().join("processed/a.md")));
    }

    #[test]
    fn test_missing_everywhere_is_error() {
        let (dir, mover) = setup();
        let err = mover.move_to_processed(&dir.path().join("ghost.md")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_copy_then_remove() {
        let (dir, mover) = setup();
        mover.ensure_dir().unwrap();
        let source = dir.path().join("b.txt");
        fs::write(&source, "payload").unwrap();
        let dest = dir.path().join("processed/b.txt");

        copy_then_remove(&source, &dest).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "payload");
        assert!(!dir.path().join("processed/.b.txt.partial").exists());
    }
}
