//! Library scanner.
//!
//! A scan walks the music root one artist directory at a time, reads
//! embedded tags (through the file index cache), deduplicates by
//! filesystem identity, and materializes the artists/albums/tracks
//! inventory. Full-library runs finish with a soft-delete sweep; runs
//! scoped to a single artist do not.
//!
//! The scanner is single-flight: one scan per process, enforced by an
//! atomic flag. Cancellation is a second flag observed between artists and
//! between files, never mid-file.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::core::tags;
use crate::core::walker::{self, WalkOptions};
use crate::db::tables::{
    AlbumTable, AlbumUpsert, ArtistTable, FileIndexEntry, FileIndexTable, ScanSkippedTable,
    ScanStateTable, TrackTable, TrackUpsert,
};
use crate::models::{ScanSnapshot, ScanStatusKind};
use crate::utils::hashing::{file_content_hash, short_path_hash, virtual_album_path};
use crate::utils::normalize::{normalize_title, slugify};
use crate::utils::now_millis;

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub recursive: bool,
    pub max_depth: u32,
    /// Restrict the run to one artist; scoped runs skip the sweep.
    pub artist_id: Option<i64>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { recursive: true, max_depth: 3, artist_id: None }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartScanOutcome {
    pub started: bool,
    pub status: ScanStatusKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    pub cancelled: bool,
    pub status: ScanStatusKind,
}

/// Map a raw skip reason onto its histogram bucket.
pub fn canonical_skip_reason(raw: &str) -> String {
    if raw.starts_with("unsupported-extension") {
        return "unsupported extension".to_string();
    }
    if raw.starts_with("unreadable") {
        return "unreadable".to_string();
    }
    if raw.starts_with("missing-album-tag") {
        return "missing album tag".to_string();
    }
    if raw.starts_with("missing-artist-tag") {
        return "missing artist tag".to_string();
    }
    if raw.starts_with("deduped") {
        return "duplicate".to_string();
    }
    if raw.starts_with("parse-error") {
        return "parse error".to_string();
    }
    raw.to_string()
}

/// A track that passed every admission filter, waiting to be grouped into
/// an album.
struct AdmittedTrack {
    path: String,
    ext: String,
    mtime: i64,
    album_title: String,
    group_artist: String,
}

enum ArtistOutcome {
    Completed,
    Cancelled,
}

pub struct Scanner {
    pool: SqlitePool,
    running: AtomicBool,
    cancel_requested: AtomicBool,
    progress: Mutex<ScanSnapshot>,
}

impl Scanner {
    /// Build the scanner, seeding the in-memory snapshot from the
    /// persisted scan_state row. A row still marked running belongs to a
    /// scan that died with the previous process and is finalized as an
    /// error.
    pub async fn load(pool: SqlitePool) -> Result<Arc<Self>> {
        let mut snapshot = ScanStateTable::snapshot(&pool).await?;

        if snapshot.status == ScanStatusKind::Running {
            warn!("previous scan was interrupted; marking it as errored");
            ScanStateTable::finalize(
                &pool,
                ScanStatusKind::Error,
                snapshot.scanned_files,
                snapshot.skipped_files,
                &snapshot.skipped_reasons,
                now_millis(),
                Some("scan interrupted by shutdown"),
            )
            .await?;
            snapshot = ScanStateTable::snapshot(&pool).await?;
        }

        Ok(Arc::new(Self {
            pool,
            running: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            progress: Mutex::new(snapshot),
        }))
    }

    /// Kick off a scan in the background. Rejects a second concurrent scan
    /// without touching the one in flight.
    pub fn start_scan(self: &Arc<Self>, music_root: PathBuf, opts: ScanOptions) -> StartScanOutcome {
        if self.running.swap(true, Ordering::SeqCst) {
            return StartScanOutcome { started: false, status: self.status().status };
        }

        let started_at = now_millis();
        self.cancel_requested.store(false, Ordering::SeqCst);
        {
            let mut progress = self.progress.lock();
            *progress = ScanSnapshot {
                status: ScanStatusKind::Running,
                started_at: Some(started_at),
                ..ScanSnapshot::idle()
            };
        }

        let scanner = Arc::clone(self);
        tokio::spawn(async move {
            scanner.run(music_root, opts, started_at).await;
        });

        StartScanOutcome { started: true, status: ScanStatusKind::Running }
    }

    /// Flag the running scan for cancellation. Returns whether a scan was
    /// actually running.
    pub fn request_cancel(&self) -> CancelOutcome {
        if self.running.load(Ordering::SeqCst) {
            self.cancel_requested.store(true, Ordering::SeqCst);
            CancelOutcome { cancelled: true, status: self.status().status }
        } else {
            CancelOutcome { cancelled: false, status: self.status().status }
        }
    }

    pub fn status(&self) -> ScanSnapshot {
        self.progress.lock().clone()
    }

    async fn run(self: Arc<Self>, music_root: PathBuf, opts: ScanOptions, started_at: i64) {
        match self.scan_library(&music_root, opts, started_at).await {
            Ok(status) => {
                let progress = self.status();
                info!(
                    "scan finished with status {:?}: {} scanned, {} skipped",
                    status, progress.scanned_files, progress.skipped_files
                );
            }
            Err(err) => {
                error!("scan failed: {err:?}");
                let message = err.to_string();
                let finished_at = now_millis();
                let snapshot = {
                    let mut progress = self.progress.lock();
                    progress.status = ScanStatusKind::Error;
                    progress.error = Some(message.clone());
                    progress.finished_at = Some(finished_at);
                    progress.current_path = None;
                    progress.clone()
                };
                if let Err(persist_err) = ScanStateTable::finalize(
                    &self.pool,
                    ScanStatusKind::Error,
                    snapshot.scanned_files,
                    snapshot.skipped_files,
                    &snapshot.skipped_reasons,
                    finished_at,
                    Some(&message),
                )
                .await
                {
                    error!("failed to persist scan error state: {persist_err:?}");
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    async fn scan_library(
        &self,
        music_root: &Path,
        opts: ScanOptions,
        started_at: i64,
    ) -> Result<ScanStatusKind> {
        ScanStateTable::mark_running(&self.pool, started_at).await?;
        ScanSkippedTable::clear_before(&self.pool, started_at).await?;

        let full_run = opts.artist_id.is_none();
        let artist_dirs = self.resolve_artist_dirs(music_root, opts.artist_id).await?;

        // dedupe ledger for the whole run: hardlinks and copies collapse to
        // their first sighting regardless of artist
        let mut seen_identity_keys: HashSet<String> = HashSet::new();
        let mut cancelled = false;

        for (artist_name, artist_path) in &artist_dirs {
            if self.cancel_requested.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            match self
                .scan_artist(artist_name, artist_path, opts, started_at, &mut seen_identity_keys)
                .await
            {
                Ok(ArtistOutcome::Completed) => {}
                Ok(ArtistOutcome::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(err) => {
                    warn!("artist unit failed for {artist_name}: {err:?}");
                    self.record_skip(started_at, artist_path, &format!("artist-error: {err}"))
                        .await;
                }
            }

            let progress = self.status();
            ScanStateTable::update_progress(
                &self.pool,
                progress.current_path.as_deref().unwrap_or(""),
                progress.scanned_files,
                progress.skipped_files,
            )
            .await?;
        }

        if full_run && !cancelled {
            let tracks = TrackTable::sweep(&self.pool, started_at).await?;
            let albums = AlbumTable::sweep(&self.pool, started_at).await?;
            let artists = ArtistTable::sweep(&self.pool, started_at).await?;
            let pruned = FileIndexTable::prune(&self.pool, started_at).await?;
            if tracks + albums + artists + pruned > 0 {
                info!(
                    "sweep: {} tracks, {} albums, {} artists soft-deleted; {} index rows pruned",
                    tracks, albums, artists, pruned
                );
            }
        }

        let final_status = if cancelled { ScanStatusKind::Cancelled } else { ScanStatusKind::Idle };
        let finished_at = now_millis();
        let snapshot = {
            let mut progress = self.progress.lock();
            progress.status = final_status;
            progress.finished_at = Some(finished_at);
            progress.current_path = None;
            progress.clone()
        };
        ScanStateTable::finalize(
            &self.pool,
            final_status,
            snapshot.scanned_files,
            snapshot.skipped_files,
            &snapshot.skipped_reasons,
            finished_at,
            None,
        )
        .await?;

        Ok(final_status)
    }

    /// Top-level artist directories in case-sensitive ascending name
    /// order, or the single directory for a scoped run. Loose files and
    /// dotfiles at the root are not artist content.
    async fn resolve_artist_dirs(
        &self,
        music_root: &Path,
        artist_id: Option<i64>,
    ) -> Result<Vec<(String, PathBuf)>> {
        if let Some(id) = artist_id {
            let artist = ArtistTable::by_id(&self.pool, id)
                .await?
                .filter(|a| !a.deleted)
                .with_context(|| format!("artist {id} not found"))?;
            let dir = music_root.join(&artist.name);
            if !dir.is_dir() {
                bail!("artist directory {} is missing", dir.display());
            }
            return Ok(vec![(artist.name, dir)]);
        }

        let entries = fs::read_dir(music_root)
            .with_context(|| format!("cannot read music root {}", music_root.display()))?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.context("cannot enumerate music root")?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().context("cannot stat music root entry")?;
            let is_dir = if file_type.is_symlink() {
                fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false)
            } else {
                file_type.is_dir()
            };
            if is_dir {
                dirs.push((name, entry.path()));
            }
        }

        dirs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(dirs)
    }

    async fn scan_artist(
        &self,
        artist_name: &str,
        artist_path: &Path,
        opts: ScanOptions,
        started_at: i64,
        seen_identity_keys: &mut HashSet<String>,
    ) -> Result<ArtistOutcome> {
        let artist =
            ArtistTable::upsert_seen(&self.pool, artist_name, &slugify(artist_name), started_at)
                .await?;

        let walk_opts = WalkOptions { recursive: opts.recursive, max_depth: opts.max_depth };
        let walk_root = artist_path.to_path_buf();
        let (candidates, walk_skips) = tokio::task::spawn_blocking(move || {
            let mut skips: Vec<(PathBuf, String)> = Vec::new();
            let candidates = walker::collect_artist_tracks(&walk_root, walk_opts, &mut |p, r| {
                skips.push((p.to_path_buf(), r.to_string()))
            });
            (candidates, skips)
        })
        .await
        .context("walker task panicked")?;

        for (path, reason) in walk_skips {
            self.record_skip(started_at, &path, &reason).await;
        }

        let normalized_folder_artist = normalize_title(artist_name);
        let mut admitted: Vec<AdmittedTrack> = Vec::new();

        for candidate in candidates {
            if self.cancel_requested.load(Ordering::SeqCst) {
                return Ok(ArtistOutcome::Cancelled);
            }

            let path_str = candidate.path.to_string_lossy().to_string();
            {
                let mut progress = self.progress.lock();
                progress.current_path = Some(path_str.clone());
            }

            // cache hit on unchanged (mtime, size) skips re-parse entirely
            let cached = FileIndexTable::get(&self.pool, &path_str).await?;
            let entry = match cached {
                Some(entry)
                    if entry.mtime == candidate.mtime && entry.size == candidate.size as i64 =>
                {
                    FileIndexTable::touch(&self.pool, &path_str, started_at).await?;
                    entry
                }
                _ => {
                    let tag = tags::read_tags(&candidate.path, &candidate.ext).unwrap_or_default();
                    let file_hash = if candidate.inode_key.is_none() {
                        match file_content_hash(&candidate.path) {
                            Ok(hash) => Some(hash),
                            Err(err) => {
                                self.record_skip(
                                    started_at,
                                    &candidate.path,
                                    &format!("unreadable-path: {err}"),
                                )
                                .await;
                                continue;
                            }
                        }
                    } else {
                        None
                    };

                    let entry = FileIndexEntry {
                        path: path_str.clone(),
                        mtime: candidate.mtime,
                        size: candidate.size as i64,
                        inode_key: candidate.inode_key.clone(),
                        file_hash,
                        tag_album: tag.album,
                        tag_album_artist: tag.album_artist,
                        tag_artist: tag.artist,
                        tag_year: tag.year,
                        tag_title: tag.title,
                        last_scan_at: started_at,
                    };
                    FileIndexTable::upsert(&self.pool, &entry).await?;
                    entry
                }
            };

            let album_tag = entry.tag_album.as_deref().map(str::trim).unwrap_or("");
            if album_tag.is_empty() {
                self.record_skip(started_at, &candidate.path, "missing-album-tag").await;
                continue;
            }

            let album_artist_tag = entry.tag_album_artist.as_deref().map(str::trim).unwrap_or("");
            let artist_tag = entry.tag_artist.as_deref().map(str::trim).unwrap_or("");
            if album_artist_tag.is_empty() && artist_tag.is_empty() {
                self.record_skip(started_at, &candidate.path, "missing-artist-tag").await;
                continue;
            }
            if !album_artist_tag.is_empty()
                && normalize_title(album_artist_tag) != normalized_folder_artist
            {
                self.record_skip(
                    started_at,
                    &candidate.path,
                    "missing-artist-tag: folder and tag disagree",
                )
                .await;
                continue;
            }

            let identity_key = match &entry.inode_key {
                Some(key) => format!("inode:{key}"),
                None => format!(
                    "fallback:{}:{}:{}",
                    entry.size,
                    entry.mtime / 1000,
                    short_path_hash(&entry.path)
                ),
            };
            if !seen_identity_keys.insert(identity_key) {
                self.record_skip(started_at, &candidate.path, "deduped: same file seen earlier")
                    .await;
                continue;
            }

            let group_artist =
                if album_artist_tag.is_empty() { artist_tag } else { album_artist_tag };
            admitted.push(AdmittedTrack {
                path: path_str,
                ext: candidate.ext,
                mtime: candidate.mtime,
                album_title: album_tag.to_string(),
                group_artist: group_artist.to_string(),
            });
            self.progress.lock().scanned_files += 1;
        }

        // deterministic album grouping: normalized album-artist + title
        let mut groups: BTreeMap<String, Vec<AdmittedTrack>> = BTreeMap::new();
        for track in admitted {
            let key = format!(
                "{}::{}",
                normalize_title(&track.group_artist),
                normalize_title(&track.album_title)
            );
            groups.entry(key).or_default().push(track);
        }

        for tracks in groups.into_values() {
            let title = tracks[0].album_title.clone();
            let path = virtual_album_path(artist_path, &title);

            let mut formats: Vec<String> = tracks.iter().map(|t| t.ext.clone()).collect();
            formats.sort();
            formats.dedup();

            let album_id = AlbumTable::upsert(
                &self.pool,
                &AlbumUpsert {
                    path,
                    artist_id: artist.id,
                    title,
                    formats,
                    track_count: tracks.len() as i64,
                    last_file_mtime: tracks.iter().map(|t| t.mtime).max().unwrap_or(0),
                    seen_at: started_at,
                },
            )
            .await?;

            for track in &tracks {
                TrackTable::upsert(
                    &self.pool,
                    &TrackUpsert {
                        path: track.path.clone(),
                        album_id,
                        ext: track.ext.clone(),
                        mtime: track.mtime,
                        seen_at: started_at,
                    },
                )
                .await?;
            }
        }

        Ok(ArtistOutcome::Completed)
    }

    async fn record_skip(&self, started_at: i64, path: &Path, raw_reason: &str) {
        let reason = canonical_skip_reason(raw_reason);
        {
            let mut progress = self.progress.lock();
            progress.skipped_files += 1;
            *progress.skipped_reasons.entry(reason.clone()).or_insert(0) += 1;
        }
        if let Err(err) =
            ScanSkippedTable::insert(&self.pool, started_at, &path.to_string_lossy(), &reason).await
        {
            warn!("failed to record skip for {}: {err:?}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use std::time::Duration;

    use super::*;
    use crate::db::engine::connect_memory;

    /// Dummy audio payload with an ID3v1 trailer.
    fn mp3_with_id3v1(title: &str, artist: &str, album: &str, year: &str) -> Vec<u8> {
        let mut trailer = [0u8; 128];
        trailer[0..3].copy_from_slice(b"TAG");
        let put = |buf: &mut [u8], text: &str| {
            let bytes = text.as_bytes();
            let n = bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&bytes[..n]);
        };
        put(&mut trailer[3..33], title);
        put(&mut trailer[33..63], artist);
        put(&mut trailer[63..93], album);
        put(&mut trailer[93..97], year);

        let mut out = vec![0xffu8; 64];
        out.extend_from_slice(&trailer);
        out
    }

    fn write_file(path: &Path, bytes: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap().write_all(bytes).unwrap();
    }

    async fn run_and_wait(scanner: &Arc<Scanner>, root: &Path, opts: ScanOptions) -> ScanSnapshot {
        let outcome = scanner.start_scan(root.to_path_buf(), opts);
        assert!(outcome.started, "scan rejected unexpectedly");
        wait_for_idle(scanner).await
    }

    async fn wait_for_idle(scanner: &Arc<Scanner>) -> ScanSnapshot {
        for _ in 0..500 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let snapshot = scanner.status();
            if snapshot.status != ScanStatusKind::Running {
                return snapshot;
            }
        }
        panic!("scan did not finish in time");
    }

    #[tokio::test]
    async fn nested_mp3_import_materializes_one_album() {
        let pool = connect_memory().await.unwrap();
        let lib = tempfile::tempdir().unwrap();
        write_file(
            &lib.path().join("New Found Glory/Waiting (1998)/01-song.mp3"),
            &mp3_with_id3v1("Something I Call Personality", "New Found Glory", "Waiting", "1998"),
        );

        let scanner = Scanner::load(pool.clone()).await.unwrap();
        let snapshot = run_and_wait(
            &scanner,
            lib.path(),
            ScanOptions { recursive: true, max_depth: 4, artist_id: None },
        )
        .await;

        assert_eq!(snapshot.status, ScanStatusKind::Idle);
        assert_eq!(snapshot.scanned_files, 1);
        assert_eq!(snapshot.skipped_files, 0);

        let artists = ArtistTable::all_active(&pool).await.unwrap();
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].name, "New Found Glory");
        assert_eq!(artists[0].slug, "new-found-glory");

        let albums = AlbumTable::active_by_artist(&pool, artists[0].id).await.unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].title, "Waiting");
        assert_eq!(albums[0].track_count, 1);
        assert_eq!(albums[0].formats, vec!["mp3".to_string()]);
        assert!(albums[0].path.contains("/.crate/"));
        assert!(albums[0].owned);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hardlinked_duplicates_collapse_to_one_track() {
        let pool = connect_memory().await.unwrap();
        let lib = tempfile::tempdir().unwrap();
        let original = lib.path().join("New Found Glory/Waiting (1998)/01-song.mp3");
        write_file(
            &original,
            &mp3_with_id3v1("Hit or Miss", "New Found Glory", "Waiting", "1998"),
        );
        fs::hard_link(&original, lib.path().join("New Found Glory/01-track-hardlink.mp3"))
            .unwrap();

        let scanner = Scanner::load(pool.clone()).await.unwrap();
        let snapshot = run_and_wait(
            &scanner,
            lib.path(),
            ScanOptions { recursive: true, max_depth: 4, artist_id: None },
        )
        .await;

        assert_eq!(TrackTable::count_active(&pool).await.unwrap(), 1);
        assert_eq!(snapshot.skipped_reasons.get("duplicate"), Some(&1));
        assert_eq!(snapshot.scanned_files, 1);
        assert_eq!(snapshot.skipped_files, 1);
    }

    #[tokio::test]
    async fn untagged_files_skip_with_missing_album_tag() {
        let pool = connect_memory().await.unwrap();
        let lib = tempfile::tempdir().unwrap();
        write_file(&lib.path().join("X/Album Y/song.ogg"), b"OggS no tags here");

        let scanner = Scanner::load(pool.clone()).await.unwrap();
        let snapshot = run_and_wait(&scanner, lib.path(), ScanOptions::default()).await;

        assert_eq!(snapshot.scanned_files, 0);
        assert_eq!(snapshot.skipped_reasons.get("missing album tag"), Some(&1));
        assert_eq!(AlbumTable::count_active(&pool).await.unwrap(), 0);
        // the artist directory itself was still catalogued
        assert_eq!(ArtistTable::count_active(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn album_artist_mismatch_is_rejected() {
        let pool = connect_memory().await.unwrap();
        let lib = tempfile::tempdir().unwrap();
        // FLAC carries ALBUMARTIST, which disagrees with the folder
        let mut payload = Vec::new();
        let vendor = b"test";
        payload.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        payload.extend_from_slice(vendor);
        let comments: Vec<String> = vec![
            "ALBUM=Somewhere".into(),
            "ARTIST=Band".into(),
            "ALBUMARTIST=A Different Band".into(),
        ];
        payload.extend_from_slice(&(comments.len() as u32).to_le_bytes());
        for c in &comments {
            payload.extend_from_slice(&(c.len() as u32).to_le_bytes());
            payload.extend_from_slice(c.as_bytes());
        }
        let mut flac = b"fLaC".to_vec();
        flac.push(0x84);
        flac.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
        flac.extend_from_slice(&payload);
        write_file(&lib.path().join("Band/song.flac"), &flac);

        let scanner = Scanner::load(pool.clone()).await.unwrap();
        let snapshot = run_and_wait(&scanner, lib.path(), ScanOptions::default()).await;

        assert_eq!(snapshot.scanned_files, 0);
        assert_eq!(snapshot.skipped_reasons.get("missing artist tag"), Some(&1));
    }

    #[tokio::test]
    async fn full_scan_sweeps_missing_files_but_preserves_owned_flag() {
        let pool = connect_memory().await.unwrap();
        let lib = tempfile::tempdir().unwrap();
        let keep = lib.path().join("A/Keep/01.mp3");
        let lose = lib.path().join("B/Lose/01.mp3");
        write_file(&keep, &mp3_with_id3v1("One", "A", "Keep", "2000"));
        write_file(&lose, &mp3_with_id3v1("Two", "B", "Lose", "2000"));

        let scanner = Scanner::load(pool.clone()).await.unwrap();
        run_and_wait(&scanner, lib.path(), ScanOptions::default()).await;

        let artists = ArtistTable::all_active(&pool).await.unwrap();
        assert_eq!(artists.len(), 2);
        let keep_artist = artists.iter().find(|a| a.name == "A").unwrap();
        let keep_album = AlbumTable::active_by_artist(&pool, keep_artist.id).await.unwrap()[0].id;
        AlbumTable::set_owned(&pool, keep_album, false).await.unwrap();

        fs::remove_dir_all(lib.path().join("B")).unwrap();
        run_and_wait(&scanner, lib.path(), ScanOptions::default()).await;

        let artists = ArtistTable::all_active(&pool).await.unwrap();
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].name, "A");
        assert_eq!(TrackTable::count_active(&pool).await.unwrap(), 1);
        assert_eq!(AlbumTable::count_active(&pool).await.unwrap(), 1);

        // user state survived the rescan
        let kept = AlbumTable::by_id(&pool, keep_album).await.unwrap().unwrap();
        assert!(!kept.owned);
        assert!(!kept.deleted);
    }

    #[tokio::test]
    async fn artist_scoped_scan_does_not_sweep_other_artists() {
        let pool = connect_memory().await.unwrap();
        let lib = tempfile::tempdir().unwrap();
        write_file(&lib.path().join("A/One/01.mp3"), &mp3_with_id3v1("T", "A", "One", "2000"));
        write_file(&lib.path().join("B/Two/01.mp3"), &mp3_with_id3v1("T", "B", "Two", "2000"));

        let scanner = Scanner::load(pool.clone()).await.unwrap();
        run_and_wait(&scanner, lib.path(), ScanOptions::default()).await;

        let artist_a = ArtistTable::by_name(&pool, "A").await.unwrap().unwrap();

        // delete B's files on disk, then rescan only A
        fs::remove_dir_all(lib.path().join("B")).unwrap();
        run_and_wait(
            &scanner,
            lib.path(),
            ScanOptions { artist_id: Some(artist_a.id), ..ScanOptions::default() },
        )
        .await;

        // B's rows survive because scoped runs never sweep
        assert_eq!(ArtistTable::count_active(&pool).await.unwrap(), 2);
        assert_eq!(AlbumTable::count_active(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn second_scan_request_is_rejected_while_running() {
        let pool = connect_memory().await.unwrap();
        let lib = tempfile::tempdir().unwrap();
        write_file(&lib.path().join("A/One/01.mp3"), &mp3_with_id3v1("T", "A", "One", "2000"));

        let scanner = Scanner::load(pool.clone()).await.unwrap();
        let first = scanner.start_scan(lib.path().to_path_buf(), ScanOptions::default());
        assert!(first.started);

        // the spawned task has not run yet; the flag already excludes us
        let second = scanner.start_scan(lib.path().to_path_buf(), ScanOptions::default());
        assert!(!second.started);
        assert_eq!(second.status, ScanStatusKind::Running);

        wait_for_idle(&scanner).await;
        let third = scanner.start_scan(lib.path().to_path_buf(), ScanOptions::default());
        assert!(third.started);
        wait_for_idle(&scanner).await;
    }

    #[tokio::test]
    async fn cancelled_scan_finalizes_without_sweeping() {
        let pool = connect_memory().await.unwrap();
        let lib = tempfile::tempdir().unwrap();
        write_file(&lib.path().join("A/One/01.mp3"), &mp3_with_id3v1("T", "A", "One", "2000"));

        // a stale artist that a completed full scan would sweep
        ArtistTable::upsert_seen(&pool, "Stale", "stale", 1).await.unwrap();

        let scanner = Scanner::load(pool.clone()).await.unwrap();
        let outcome = scanner.start_scan(lib.path().to_path_buf(), ScanOptions::default());
        assert!(outcome.started);

        // cancel before the spawned task gets a chance to run
        let cancel = scanner.request_cancel();
        assert!(cancel.cancelled);

        let snapshot = wait_for_idle(&scanner).await;
        assert_eq!(snapshot.status, ScanStatusKind::Cancelled);

        // no sweep happened: the stale artist is still live
        let stale = ArtistTable::by_name(&pool, "Stale").await.unwrap().unwrap();
        assert!(!stale.deleted);

        let persisted = ScanStateTable::snapshot(&pool).await.unwrap();
        assert_eq!(persisted.status, ScanStatusKind::Cancelled);
    }

    #[tokio::test]
    async fn cancel_without_a_running_scan_reports_false() {
        let pool = connect_memory().await.unwrap();
        let scanner = Scanner::load(pool).await.unwrap();
        let outcome = scanner.request_cancel();
        assert!(!outcome.cancelled);
        assert_eq!(outcome.status, ScanStatusKind::Idle);
    }

    #[tokio::test]
    async fn missing_music_root_sets_error_status() {
        let pool = connect_memory().await.unwrap();
        let scanner = Scanner::load(pool.clone()).await.unwrap();

        let outcome =
            scanner.start_scan(PathBuf::from("/definitely/not/here"), ScanOptions::default());
        assert!(outcome.started);

        let snapshot = wait_for_idle(&scanner).await;
        assert_eq!(snapshot.status, ScanStatusKind::Error);
        assert!(snapshot.error.as_deref().unwrap().contains("music root"));

        let persisted = ScanStateTable::snapshot(&pool).await.unwrap();
        assert_eq!(persisted.status, ScanStatusKind::Error);
    }

    #[tokio::test]
    async fn unchanged_files_reuse_the_cached_tags() {
        let pool = connect_memory().await.unwrap();
        let lib = tempfile::tempdir().unwrap();
        let song = lib.path().join("A/One/01.mp3");
        write_file(&song, &mp3_with_id3v1("T", "A", "One", "2000"));

        let scanner = Scanner::load(pool.clone()).await.unwrap();
        run_and_wait(&scanner, lib.path(), ScanOptions::default()).await;

        // poison the cached album tag; an unchanged file must not re-parse
        sqlx::query("UPDATE file_index SET tag_album = 'Cached Album' WHERE path = ?")
            .bind(song.to_string_lossy().to_string())
            .execute(&pool)
            .await
            .unwrap();

        run_and_wait(&scanner, lib.path(), ScanOptions::default()).await;

        let artist = ArtistTable::by_name(&pool, "A").await.unwrap().unwrap();
        let albums = AlbumTable::active_by_artist(&pool, artist.id).await.unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].title, "Cached Album");
    }

    #[tokio::test]
    async fn interrupted_scan_state_is_marked_errored_on_load() {
        let pool = connect_memory().await.unwrap();
        ScanStateTable::mark_running(&pool, 1000).await.unwrap();

        let scanner = Scanner::load(pool.clone()).await.unwrap();
        let snapshot = scanner.status();
        assert_eq!(snapshot.status, ScanStatusKind::Error);
        assert!(snapshot.error.as_deref().unwrap().contains("interrupted"));
    }

    #[test]
    fn canonicalization_buckets_raw_reasons() {
        assert_eq!(canonical_skip_reason("unsupported-extension:jpg"), "unsupported extension");
        assert_eq!(canonical_skip_reason("unreadable-directory"), "unreadable");
        assert_eq!(canonical_skip_reason("unreadable-path: denied"), "unreadable");
        assert_eq!(canonical_skip_reason("missing-album-tag"), "missing album tag");
        assert_eq!(
            canonical_skip_reason("missing-artist-tag: folder and tag disagree"),
            "missing artist tag"
        );
        assert_eq!(canonical_skip_reason("deduped: same file seen earlier"), "duplicate");
        assert_eq!(canonical_skip_reason("parse-error: bad header"), "parse error");
        assert_eq!(canonical_skip_reason("hidden-path"), "hidden-path");
        assert_eq!(canonical_skip_reason("depth-exceeded:3"), "depth-exceeded:3");
    }
}
