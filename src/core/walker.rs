//! Bounded-depth traversal of one artist directory.
//!
//! The walker never fails: every entry it cannot or will not descend into is
//! reported to the skip callback with a raw reason string, and traversal
//! continues. Candidates are audio files only; everything else is a skip.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions that make a file a track candidate.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "flac", "mp3", "m4a", "aac", "ogg", "opus", "wav", "aiff", "alac",
];

/// A file the scanner should consider, with the stat metadata the file
/// index needs.
#[derive(Debug, Clone)]
pub struct TrackCandidate {
    pub path: PathBuf,
    pub ext: String,
    /// Modification time, unix milliseconds.
    pub mtime: i64,
    pub size: u64,
    /// `"{dev}:{ino}"` on filesystems with meaningful inodes.
    pub inode_key: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    pub recursive: bool,
    /// Deepest permitted entry depth; direct children of the artist
    /// directory are depth 0. Ignored when `recursive` is false.
    pub max_depth: u32,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self { recursive: true, max_depth: 3 }
    }
}

/// Collect every track candidate under `artist_path`, reporting each
/// skipped entry through `on_skip` with a raw reason.
pub fn collect_artist_tracks(
    artist_path: &Path,
    opts: WalkOptions,
    on_skip: &mut dyn FnMut(&Path, &str),
) -> Vec<TrackCandidate> {
    let max_depth = if opts.recursive { opts.max_depth } else { 0 };
    let mut candidates = Vec::new();
    walk_directory(artist_path, 0, max_depth, &mut candidates, on_skip);
    candidates
}

fn walk_directory(
    dir: &Path,
    child_depth: u32,
    max_depth: u32,
    candidates: &mut Vec<TrackCandidate>,
    on_skip: &mut dyn FnMut(&Path, &str),
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => {
            on_skip(dir, "unreadable-directory");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                on_skip(dir, &format!("unreadable-path: {err}"));
                continue;
            }
        };
        let path = entry.path();

        if entry.file_name().to_string_lossy().starts_with('.') {
            on_skip(&path, "hidden-path");
            continue;
        }

        let lstat = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(err) => {
                on_skip(&path, &format!("unreadable-path: {err}"));
                continue;
            }
        };

        // resolve symlinks with a full stat; dangling links are skipped
        let meta = if lstat.file_type().is_symlink() {
            match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(_) => {
                    on_skip(&path, "broken-symlink");
                    continue;
                }
            }
        } else {
            lstat
        };

        if child_depth > max_depth {
            on_skip(&path, &format!("depth-exceeded:{max_depth}"));
            continue;
        }

        if meta.is_dir() {
            walk_directory(&path, child_depth + 1, max_depth, candidates, on_skip);
            continue;
        }

        if !meta.is_file() {
            on_skip(&path, "unsupported-file-type");
            continue;
        }

        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            on_skip(&path, &format!("unsupported-extension:{ext}"));
            continue;
        }

        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        candidates.push(TrackCandidate {
            path,
            ext,
            mtime,
            size: meta.len(),
            inode_key: inode_key(&meta),
        });
    }
}

#[cfg(unix)]
fn inode_key(meta: &fs::Metadata) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    Some(format!("{}:{}", meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn inode_key(_meta: &fs::Metadata) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs::File;

    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    fn walk(root: &Path, opts: WalkOptions) -> (Vec<TrackCandidate>, HashMap<String, usize>) {
        let mut skips: HashMap<String, usize> = HashMap::new();
        let found = collect_artist_tracks(root, opts, &mut |_path, reason| {
            *skips.entry(reason.to_string()).or_default() += 1;
        });
        (found, skips)
    }

    #[test]
    fn collects_audio_files_at_any_allowed_depth() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("loose.mp3"));
        touch(&dir.path().join("Waiting (1998)/01-song.mp3"));
        touch(&dir.path().join("Waiting (1998)/CD2/02-song.flac"));

        let (found, skips) = walk(dir.path(), WalkOptions::default());
        assert_eq!(found.len(), 3);
        assert!(skips.is_empty());
    }

    #[test]
    fn non_recursive_visits_direct_children_only() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("loose.mp3"));
        touch(&dir.path().join("Album/nested.mp3"));

        let (found, skips) = walk(dir.path(), WalkOptions { recursive: false, max_depth: 3 });
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path.file_name().unwrap(), "loose.mp3");
        assert_eq!(skips.get("depth-exceeded:0"), Some(&1));
    }

    #[test]
    fn entries_past_max_depth_are_skipped_individually() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/ok.mp3"));
        touch(&dir.path().join("a/b/too-deep.mp3"));
        touch(&dir.path().join("a/b/also-too-deep.mp3"));

        let (found, skips) = walk(dir.path(), WalkOptions { recursive: true, max_depth: 1 });
        assert_eq!(found.len(), 1);
        assert_eq!(skips.get("depth-exceeded:1"), Some(&2));
    }

    #[test]
    fn hidden_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join(".hidden.mp3"));
        touch(&dir.path().join(".hidden-dir/inner.mp3"));
        touch(&dir.path().join("visible.mp3"));

        let (found, skips) = walk(dir.path(), WalkOptions::default());
        assert_eq!(found.len(), 1);
        assert_eq!(skips.get("hidden-path"), Some(&2));
    }

    #[test]
    fn non_audio_extensions_are_skipped_with_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("cover.jpg"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("song.opus"));

        let (found, skips) = walk(dir.path(), WalkOptions::default());
        assert_eq!(found.len(), 1);
        assert_eq!(skips.get("unsupported-extension:jpg"), Some(&1));
        assert_eq!(skips.get("unsupported-extension:txt"), Some(&1));
    }

    #[test]
    fn candidates_carry_stat_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, b"12345").unwrap();

        let (found, _) = walk(dir.path(), WalkOptions::default());
        assert_eq!(found.len(), 1);
        let cand = &found[0];
        assert_eq!(cand.size, 5);
        assert_eq!(cand.ext, "mp3");
        assert!(cand.mtime > 0);
        #[cfg(unix)]
        assert!(cand.inode_key.as_deref().unwrap().contains(':'));
    }

    #[cfg(unix)]
    #[test]
    fn hardlinks_share_an_inode_key() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("song.mp3");
        fs::write(&original, b"data").unwrap();
        let link = dir.path().join("song-link.mp3");
        fs::hard_link(&original, &link).unwrap();

        let (found, _) = walk(dir.path(), WalkOptions::default());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].inode_key, found[1].inode_key);
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlinks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.mp3"), dir.path().join("link.mp3"))
            .unwrap();

        let (found, skips) = walk(dir.path(), WalkOptions::default());
        assert!(found.is_empty());
        assert_eq!(skips.get("broken-symlink"), Some(&1));
    }

    #[cfg(unix)]
    #[test]
    fn live_symlinks_resolve_to_their_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real.mp3");
        fs::write(&target, b"data").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("alias.mp3")).unwrap();

        let (found, skips) = walk(dir.path(), WalkOptions::default());
        assert_eq!(found.len(), 2);
        assert!(skips.is_empty());
        // both resolve to the same inode
        assert_eq!(found[0].inode_key, found[1].inode_key);
    }

    #[test]
    fn missing_root_reports_unreadable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        let (found, skips) = walk(&gone, WalkOptions::default());
        assert!(found.is_empty());
        assert_eq!(skips.get("unreadable-directory"), Some(&1));
    }
}
