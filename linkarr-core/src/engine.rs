//! The ingestion engine: discovery, bounded-parallel processing, and the
//! orphan sweep, with progress fanned out through the event bus.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use linkarr_config::ConfigStore;
use linkarr_model::{
    Event, MediaKind, MediaRecord, RecordStatus, ReprocessSummary, ScanSummary,
};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::arr::{RadarrClient, SonarrClient};
use crate::catalog::Matcher;
use crate::error::{CoreError, Result};
use crate::events::EventBus;
use crate::linker::FileLinker;
use crate::parser::MediaParser;
use crate::store::{NewRecord, RecordStore};

/// Files processed per chunk; cancellation takes effect between chunks.
const CHUNK_SIZE: usize = 100;
/// Bounded worker set gated by a counting semaphore.
const PARALLEL_WORKERS: usize = 15;
/// Progress event cadence, in processed files.
const PROGRESS_EVERY: usize = 50;

struct ScanCounters {
    summary: ScanSummary,
    processed_total: usize,
    total: usize,
}

struct ScanGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

struct WorkerOutcome {
    created: bool,
    processed: Option<RecordStatus>,
}

/// Drives the pipeline: walk sources, diff against the store, process
/// pending records through match + link, sweep orphans.
pub struct IngestionEngine {
    config: Arc<ConfigStore>,
    store: RecordStore,
    parser: MediaParser,
    matcher: Arc<dyn Matcher>,
    linker: FileLinker,
    radarr: RadarrClient,
    sonarr: SonarrClient,
    bus: Arc<EventBus>,
    scan_active: Arc<AtomicBool>,
}

impl std::fmt::Debug for IngestionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionEngine")
            .field("scan_active", &self.scan_active.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl IngestionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<ConfigStore>,
        store: RecordStore,
        matcher: Arc<dyn Matcher>,
        linker: FileLinker,
        radarr: RadarrClient,
        sonarr: SonarrClient,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            store,
            parser: MediaParser::new(),
            matcher,
            linker,
            radarr,
            sonarr,
            bus,
            scan_active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn parser(&self) -> &MediaParser {
        &self.parser
    }

    pub fn radarr(&self) -> &RadarrClient {
        &self.radarr
    }

    pub fn sonarr(&self) -> &SonarrClient {
        &self.sonarr
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_active.load(Ordering::SeqCst)
    }

    fn begin_scan(&self) -> Result<ScanGuard> {
        if self
            .scan_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CoreError::ScanInProgress);
        }
        Ok(ScanGuard {
            flag: Arc::clone(&self.scan_active),
        })
    }

    /// Start a scan in the background. The guard is acquired here,
    /// synchronously, so a concurrent caller gets `ScanInProgress` instead
    /// of a scan that silently never ran.
    pub fn spawn_scan(self: &Arc<Self>, directory: Option<PathBuf>) -> Result<()> {
        let guard = self.begin_scan()?;
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = engine
                .run_scan(guard, directory, CancellationToken::new())
                .await
            {
                warn!(%err, "background scan failed");
            }
        });
        Ok(())
    }

    /// Run one full scan to completion.
    pub async fn scan(self: &Arc<Self>, directory: Option<PathBuf>) -> Result<ScanSummary> {
        self.scan_with_cancel(directory, CancellationToken::new())
            .await
    }

    /// Run one full scan; `cancel` aborts between chunks.
    pub async fn scan_with_cancel(
        self: &Arc<Self>,
        directory: Option<PathBuf>,
        cancel: CancellationToken,
    ) -> Result<ScanSummary> {
        let guard = self.begin_scan()?;
        self.run_scan(guard, directory, cancel).await
    }

    /// Scan body. The caller already holds the guard; it is released when
    /// this returns.
    async fn run_scan(
        self: &Arc<Self>,
        _guard: ScanGuard,
        directory: Option<PathBuf>,
        cancel: CancellationToken,
    ) -> Result<ScanSummary> {
        self.check_arr_gate().await?;

        let files = match &directory {
            Some(dir) => self.collect_videos(dir, None).await,
            None => self.discover_sources().await,
        };
        let total = files.len();
        info!(total, "scan started");

        self.bus.emit(Event::ScanStarted);
        self.bus.emit(Event::ScanProgress {
            current: 0,
            total,
            filename: format!("scanning {total} files"),
        });

        let semaphore = Arc::new(Semaphore::new(PARALLEL_WORKERS));
        let counters = Arc::new(Mutex::new(ScanCounters {
            summary: ScanSummary {
                scanned: total,
                ..ScanSummary::default()
            },
            processed_total: 0,
            total,
        }));

        for chunk in files.chunks(CHUNK_SIZE) {
            if cancel.is_cancelled() {
                info!("scan cancelled at chunk boundary");
                break;
            }

            let mut workers = JoinSet::new();
            for (path, forced_kind) in chunk.iter().cloned() {
                let engine = Arc::clone(self);
                let semaphore = Arc::clone(&semaphore);
                let counters = Arc::clone(&counters);
                workers.spawn(async move {
                    let _permit =
                        semaphore.acquire_owned().await.expect("semaphore never closed");
                    engine.process_one(path, forced_kind, counters).await;
                });
            }
            while workers.join_next().await.is_some() {}

            match self.store.stats().await {
                Ok(stats) => self.bus.emit(Event::StatsUpdated(stats)),
                Err(err) => warn!(%err, "stats snapshot failed"),
            }
        }

        // Orphan sweep runs over the whole store regardless of scan scope.
        let deleted = self.sweep_orphans().await;

        let mut summary = {
            let counters = counters.lock().await;
            counters.summary
        };
        summary.deleted = deleted;

        match self.store.stats().await {
            Ok(stats) => self.bus.emit(Event::StatsUpdated(stats)),
            Err(err) => warn!(%err, "stats snapshot failed"),
        }
        self.bus.emit(Event::ScanCompleted(summary));
        info!(?summary, "scan completed");
        Ok(summary)
    }

    async fn check_arr_gate(&self) -> Result<()> {
        if !self.config.load().require_arr {
            return Ok(());
        }
        let (radarr_ok, radarr_message) = self.radarr.test_connection().await;
        let (sonarr_ok, sonarr_message) = self.sonarr.test_connection().await;
        if radarr_ok && sonarr_ok {
            return Ok(());
        }
        let mut reasons = Vec::new();
        if !radarr_ok {
            reasons.push(radarr_message);
        }
        if !sonarr_ok {
            reasons.push(sonarr_message);
        }
        Err(CoreError::ArrUnavailable(reasons.join("; ")))
    }

    /// Walk the configured sources per the source mode.
    async fn discover_sources(&self) -> Vec<(PathBuf, Option<MediaKind>)> {
        let config = self.config.load();
        match config.source_mode {
            linkarr_config::SourceMode::Separate => {
                let mut files = self
                    .collect_videos(&config.source_movies_path(), Some(MediaKind::Movie))
                    .await;
                files.extend(
                    self.collect_videos(&config.source_tv_path(), Some(MediaKind::Tv))
                        .await,
                );
                files
            }
            linkarr_config::SourceMode::Unified => {
                self.collect_videos(&config.source_path(), None).await
            }
        }
    }

    /// Recursively gather qualifying video files under `root`. Hidden
    /// entries are skipped; files must clear the extension, size, and
    /// ignore filters.
    async fn collect_videos(
        &self,
        root: &Path,
        forced_kind: Option<MediaKind>,
    ) -> Vec<(PathBuf, Option<MediaKind>)> {
        let config = self.config.load();
        let extensions = config.video_extensions();
        let min_size = config.min_video_size();

        let mut results = Vec::new();
        if !tokio::fs::try_exists(root).await.unwrap_or(false) {
            return results;
        }

        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };
                if file_type.is_dir() {
                    stack.push(entry.path());
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let path = entry.path();
                let extension = path
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
                    .unwrap_or_default();
                if !extensions.contains(&extension) {
                    continue;
                }
                let size = match entry.metadata().await {
                    Ok(metadata) => metadata.len(),
                    Err(_) => continue,
                };
                if size < min_size {
                    continue;
                }
                if self.parser.should_ignore(&name) {
                    continue;
                }
                results.push((path, forced_kind));
            }
        }
        results
    }

    async fn process_one(
        self: Arc<Self>,
        path: PathBuf,
        forced_kind: Option<MediaKind>,
        counters: Arc<Mutex<ScanCounters>>,
    ) {
        let outcome = self.process_path(&path, forced_kind).await;

        let mut counters = counters.lock().await;
        match outcome {
            Ok(outcome) => {
                if outcome.created {
                    counters.summary.new += 1;
                }
                if let Some(status) = outcome.processed {
                    counters.summary.processed += 1;
                    match status {
                        RecordStatus::Linked => counters.summary.linked += 1,
                        RecordStatus::Failed => counters.summary.failed += 1,
                        RecordStatus::Manual => counters.summary.manual += 1,
                        _ => {}
                    }
                }
            }
            Err(err) => {
                error!(path = %path.display(), %err, "worker failed");
                counters.summary.failed += 1;
            }
        }

        counters.processed_total += 1;
        if counters.processed_total % PROGRESS_EVERY == 0 {
            self.bus.emit(Event::ScanProgress {
                current: counters.processed_total,
                total: counters.total,
                filename: format!(
                    "{}/{} files processed",
                    counters.processed_total, counters.total
                ),
            });
        }
    }

    /// Worker body for one source path: observe, then process if pending.
    async fn process_path(
        &self,
        path: &Path,
        forced_kind: Option<MediaKind>,
    ) -> Result<WorkerOutcome> {
        let (record, created) = self.get_or_create(path, forced_kind).await?;
        if created {
            self.bus.emit(Event::FileAdded(record.clone()));
        }
        if record.status != RecordStatus::Pending {
            return Ok(WorkerOutcome {
                created,
                processed: None,
            });
        }

        let record = self.run_pipeline(record).await;
        let status = record.status;
        self.bus.emit(Event::FileUpdated(record));
        Ok(WorkerOutcome {
            created,
            processed: Some(status),
        })
    }

    async fn get_or_create(
        &self,
        path: &Path,
        forced_kind: Option<MediaKind>,
    ) -> Result<(MediaRecord, bool)> {
        let source_path = path.display().to_string();
        if let Some(existing) = self.store.find_by_source_path(&source_path).await? {
            return Ok((existing, false));
        }

        let parsed = self.parser.parse_path(path);
        let file_size = tokio::fs::metadata(path)
            .await
            .map(|metadata| metadata.len() as i64)
            .unwrap_or(0);
        let record = self
            .store
            .insert(NewRecord {
                source_path,
                source_filename: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                file_size,
                parsed_title: parsed.title,
                parsed_year: parsed.year,
                parsed_season: parsed.season,
                parsed_episode: parsed.episode,
                media_kind: forced_kind.unwrap_or(parsed.kind),
            })
            .await?;
        Ok((record, true))
    }

    /// Match + link a pending record. Errors become record state; the
    /// updated record is persisted either way.
    async fn run_pipeline(&self, mut record: MediaRecord) -> MediaRecord {
        if let Err(err) = self.match_and_link(&mut record).await {
            record.status = RecordStatus::Failed;
            record.error_message = Some(err.to_string());
        }
        match self.store.update(&record).await {
            Ok(updated) => updated,
            Err(err) => {
                error!(id = record.id, %err, "record update failed");
                record
            }
        }
    }

    async fn match_and_link(&self, record: &mut MediaRecord) -> Result<()> {
        let title = record.parsed_title.clone().unwrap_or_default();
        let found = self
            .matcher
            .match_media(&title, record.parsed_year, record.media_kind)
            .await;
        let source = PathBuf::from(&record.source_path);

        let Some(found) = found else {
            record.status = RecordStatus::Manual;
            record.error_message = Some("no catalog match".to_string());
            // Holding link is best effort; the record stays manual either way.
            if let Ok(destination) = self.linker.link_manual(&source, record.media_kind).await
            {
                record.destination_path = Some(destination.display().to_string());
            }
            return Ok(());
        };

        record.catalog_id = Some(found.id);
        record.catalog_title = Some(found.title.clone());
        record.catalog_year = found.year;
        record.catalog_poster_url = found.poster_url.clone();
        if found.kind != MediaKind::Unknown {
            record.media_kind = found.kind;
        }
        record.status = RecordStatus::Matched;

        let linked = match record.media_kind {
            MediaKind::Movie => Some(
                self.linker
                    .link_movie(&source, &found.title, found.year)
                    .await,
            ),
            MediaKind::Tv => match (record.parsed_season, record.parsed_episode) {
                (Some(season), Some(episode)) => Some(
                    self.linker
                        .link_tv_episode(&source, &found.title, found.year, season, episode)
                        .await,
                ),
                _ => {
                    record.status = RecordStatus::Manual;
                    record.error_message = Some("missing season or episode".to_string());
                    None
                }
            },
            MediaKind::Unknown => {
                record.status = RecordStatus::Manual;
                record.error_message = Some("unknown media kind".to_string());
                None
            }
        };

        if let Some(linked) = linked {
            match linked {
                Ok(destination) => {
                    record.destination_path = Some(destination.display().to_string());
                    record.status = RecordStatus::Linked;
                    record.processed_at = Some(Utc::now());
                    record.error_message = None;
                }
                Err(err) => {
                    record.status = RecordStatus::Failed;
                    record.error_message = Some(err.to_string());
                }
            }
        }
        Ok(())
    }

    /// Remove records whose source file disappeared: destination unlinked,
    /// empty ancestors pruned, row deleted.
    async fn sweep_orphans(&self) -> usize {
        let records = match self.store.list_all().await {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, "orphan sweep skipped");
                return 0;
            }
        };

        let mut deleted = 0;
        for record in records {
            if tokio::fs::try_exists(&record.source_path).await.unwrap_or(false) {
                continue;
            }
            if let Some(destination) = &record.destination_path
                && let Err(err) = self.linker.remove_link(Path::new(destination)).await
            {
                warn!(id = record.id, %err, "orphan destination removal failed");
            }
            match self.store.delete(record.id).await {
                Ok(()) => {
                    self.bus.emit(Event::FileDeleted { id: record.id });
                    deleted += 1;
                }
                Err(err) => warn!(id = record.id, %err, "orphan record delete failed"),
            }
        }
        if deleted > 0 {
            info!(deleted, "orphan sweep removed records");
        }
        deleted
    }

    /// Re-parse and re-run the pipeline for one record, synchronously.
    pub async fn process_file(&self, id: i64) -> Result<MediaRecord> {
        let Some(mut record) = self.store.get(id).await? else {
            return Err(CoreError::NotFound(format!("record {id}")));
        };

        let parsed = self.parser.parse_path(Path::new(&record.source_path));
        record.parsed_title = parsed.title;
        record.parsed_year = parsed.year;
        record.parsed_season = parsed.season;
        record.parsed_episode = parsed.episode;
        if parsed.kind != MediaKind::Unknown {
            record.media_kind = parsed.kind;
        }
        record.catalog_id = None;
        record.catalog_title = None;
        record.catalog_year = None;
        record.catalog_poster_url = None;
        record.status = RecordStatus::Pending;
        record.error_message = None;
        let record = self.store.update(&record).await?;

        let record = self.run_pipeline(record).await;
        self.bus.emit(Event::FileUpdated(record.clone()));
        match self.store.stats().await {
            Ok(stats) => self.bus.emit(Event::StatsUpdated(stats)),
            Err(err) => warn!(%err, "stats snapshot failed"),
        }
        Ok(record)
    }

    /// Push every record in `statuses` back through the pipeline.
    pub async fn reprocess(&self, statuses: &[RecordStatus]) -> Result<ReprocessSummary> {
        let records = self.store.list_by_statuses(statuses).await?;
        let total = records.len();
        self.bus.emit(Event::ReprocessStarted { total });

        let mut summary = ReprocessSummary {
            total,
            ..ReprocessSummary::default()
        };

        for (index, mut record) in records.into_iter().enumerate() {
            let filename = record.source_filename.clone();

            record.catalog_id = None;
            record.catalog_title = None;
            record.catalog_year = None;
            record.catalog_poster_url = None;
            record.status = RecordStatus::Pending;
            record.error_message = None;
            let record = match self.store.update(&record).await {
                Ok(record) => record,
                Err(err) => {
                    warn!(%err, "reprocess reset failed");
                    continue;
                }
            };

            let updated = self.run_pipeline(record).await;
            summary.processed += 1;
            match updated.status {
                RecordStatus::Linked => summary.linked += 1,
                RecordStatus::Failed => summary.failed += 1,
                RecordStatus::Manual => summary.manual += 1,
                _ => {}
            }
            self.bus.emit(Event::FileUpdated(updated));
            self.bus.emit(Event::ReprocessProgress {
                current: index + 1,
                total,
                linked: summary.linked,
                filename,
            });
        }

        match self.store.stats().await {
            Ok(stats) => self.bus.emit(Event::StatsUpdated(stats)),
            Err(err) => warn!(%err, "stats snapshot failed"),
        }
        self.bus.emit(Event::ReprocessCompleted(summary));
        Ok(summary)
    }

    /// Operator delete: unlink the destination, prune, drop the record.
    pub async fn remove_record(&self, id: i64) -> Result<()> {
        let Some(record) = self.store.get(id).await? else {
            return Err(CoreError::NotFound(format!("record {id}")));
        };
        if let Some(destination) = &record.destination_path
            && let Err(err) = self.linker.remove_link(Path::new(destination)).await
        {
            warn!(id, %err, "destination removal failed");
        }
        self.store.delete(id).await?;
        self.bus.emit(Event::FileDeleted { id });
        Ok(())
    }

    /// Operator ignore: record is excluded from processing; any existing
    /// destination link is removed.
    pub async fn ignore_record(&self, id: i64) -> Result<MediaRecord> {
        let Some(mut record) = self.store.get(id).await? else {
            return Err(CoreError::NotFound(format!("record {id}")));
        };
        if let Some(destination) = record.destination_path.take()
            && let Err(err) = self.linker.remove_link(Path::new(&destination)).await
        {
            warn!(id, %err, "destination removal failed");
        }
        record.status = RecordStatus::Ignored;
        record.error_message = None;
        let record = self.store.update(&record).await?;
        self.bus.emit(Event::FileUpdated(record.clone()));
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogMatch;
    use async_trait::async_trait;
    use linkarr_config::ConfigPatch;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Table-driven matcher used in place of the remote catalogs.
    #[derive(Default)]
    struct StubMatcher {
        by_title: HashMap<String, CatalogMatch>,
    }

    impl StubMatcher {
        fn with(mut self, title: &str, found: CatalogMatch) -> Self {
            self.by_title.insert(title.to_string(), found);
            self
        }
    }

    #[async_trait]
    impl Matcher for StubMatcher {
        async fn match_media(
            &self,
            title: &str,
            _year: Option<i64>,
            _kind: MediaKind,
        ) -> Option<CatalogMatch> {
            self.by_title.get(title).cloned()
        }
    }

    struct Fixture {
        _dir: TempDir,
        engine: Arc<IngestionEngine>,
        config: Arc<ConfigStore>,
        source_root: PathBuf,
        movies_root: PathBuf,
        tv_root: PathBuf,
    }

    async fn fixture(matcher: StubMatcher) -> Fixture {
        let dir = TempDir::new().unwrap();
        let source_root = dir.path().join("src");
        let movies_root = dir.path().join("movies");
        let tv_root = dir.path().join("tv");
        std::fs::create_dir_all(&source_root).unwrap();

        let config = Arc::new(ConfigStore::new(dir.path().join("config.json")));
        config
            .update(ConfigPatch {
                source_path: Some(source_root.display().to_string()),
                movies_path: Some(movies_root.display().to_string()),
                tv_path: Some(tv_root.display().to_string()),
                min_video_size_mb: Some(0),
                ..ConfigPatch::default()
            })
            .unwrap();

        let store = RecordStore::in_memory().await.unwrap();
        let bus = Arc::new(EventBus::new());
        let engine = Arc::new(IngestionEngine::new(
            Arc::clone(&config),
            store,
            Arc::new(matcher),
            FileLinker::new(Arc::clone(&config)),
            RadarrClient::new(Arc::clone(&config)),
            SonarrClient::new(Arc::clone(&config)),
            bus,
        ));

        Fixture {
            engine,
            config,
            source_root,
            movies_root,
            tv_root,
            _dir: dir,
        }
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"video-bytes").unwrap();
    }

    fn movie_match(id: i64, title: &str, year: i64) -> CatalogMatch {
        CatalogMatch {
            id,
            title: title.to_string(),
            year: Some(year),
            poster_url: Some(format!("https://image.example/{id}.jpg")),
            kind: MediaKind::Movie,
            popularity: 50.0,
        }
    }

    fn tv_match(id: i64, title: &str, year: i64) -> CatalogMatch {
        CatalogMatch {
            kind: MediaKind::Tv,
            ..movie_match(id, title, year)
        }
    }

    #[tokio::test]
    async fn scan_links_movie_to_canonical_destination() {
        let f = fixture(
            StubMatcher::default().with("The Matrix", movie_match(603, "The Matrix", 1999)),
        )
        .await;
        touch(&f.source_root.join("The.Matrix.1999.1080p.BluRay.mkv"));

        let summary = f.engine.scan(None).await.unwrap();
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.new, 1);
        assert_eq!(summary.linked, 1);

        let destination = f
            .movies_root
            .join("The Matrix (1999)")
            .join("The Matrix (1999).mkv");
        assert!(destination.exists());

        let record = f
            .engine
            .store()
            .find_by_source_path(
                &f.source_root
                    .join("The.Matrix.1999.1080p.BluRay.mkv")
                    .display()
                    .to_string(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, RecordStatus::Linked);
        assert_eq!(record.catalog_id, Some(603));
        assert_eq!(
            record.destination_path.as_deref(),
            Some(destination.display().to_string().as_str())
        );
    }

    #[tokio::test]
    async fn scan_links_episode_and_special() {
        let f = fixture(
            StubMatcher::default()
                .with("Breaking Bad", tv_match(1396, "Breaking Bad", 2008))
                .with("Akame ga Kill!", tv_match(61, "Akame ga Kill!", 2014)),
        )
        .await;
        touch(&f.source_root.join("Breaking.Bad.S01E07.720p.mkv"));
        touch(&f.source_root.join("Akame ga Kill! S01 - NCOP 01 [sub].mkv"));

        let summary = f.engine.scan(None).await.unwrap();
        assert_eq!(summary.linked, 2);

        assert!(
            f.tv_root
                .join("Breaking Bad (2008)")
                .join("Season 01")
                .join("Breaking Bad - S01E07.mkv")
                .exists()
        );
        assert!(
            f.tv_root
                .join("Akame ga Kill! (2014)")
                .join("Specials")
                .join("Akame ga Kill! - S00E01.mkv")
                .exists()
        );
    }

    #[tokio::test]
    async fn no_match_goes_manual_with_holding_link() {
        let f = fixture(StubMatcher::default()).await;
        touch(&f.source_root.join("Obscure.Film.2001.mkv"));

        let summary = f.engine.scan(None).await.unwrap();
        assert_eq!(summary.manual, 1);

        let records = f.engine.store().list_all().await.unwrap();
        let record = &records[0];
        assert_eq!(record.status, RecordStatus::Manual);
        assert_eq!(record.error_message.as_deref(), Some("no catalog match"));
        let destination = record.destination_path.as_ref().unwrap();
        assert!(destination.contains("_Manual"));
        assert!(Path::new(destination).exists());
    }

    #[tokio::test]
    async fn tv_without_episode_goes_manual() {
        let f = fixture(StubMatcher::default().with("Some Show", tv_match(5, "Some Show", 2010)))
            .await;
        // Parses to a bare title; the stub forces a TV match with no
        // season/episode to link.
        touch(&f.source_root.join("Some.Show.2010.mkv"));

        f.engine.scan(None).await.unwrap();
        let records = f.engine.store().list_all().await.unwrap();
        assert_eq!(records[0].status, RecordStatus::Manual);
        assert_eq!(
            records[0].error_message.as_deref(),
            Some("missing season or episode")
        );
    }

    #[tokio::test]
    async fn discovery_filters_size_hidden_and_ignored() {
        let f = fixture(StubMatcher::default()).await;
        f.config
            .update(ConfigPatch {
                min_video_size_mb: Some(1),
                ..ConfigPatch::default()
            })
            .unwrap();

        touch(&f.source_root.join("too-small.mkv"));
        touch(&f.source_root.join(".hidden.mkv"));
        touch(&f.source_root.join(".stash").join("inside-hidden.mkv"));
        touch(&f.source_root.join("notes.txt"));
        touch(&f.source_root.join("Show NCOP.mkv"));

        let big = f.source_root.join("big-enough.mkv");
        touch(&big);
        std::fs::write(&big, vec![0u8; 2 * 1024 * 1024]).unwrap();

        let summary = f.engine.scan(None).await.unwrap();
        assert_eq!(summary.scanned, 1);
    }

    #[tokio::test]
    async fn separate_mode_forces_kinds() {
        let f = fixture(StubMatcher::default()).await;
        let movies_src = f.source_root.join("movies-in");
        let tv_src = f.source_root.join("tv-in");
        touch(&movies_src.join("ambiguous.mkv"));
        touch(&tv_src.join("also-ambiguous.mkv"));
        f.config
            .update(ConfigPatch {
                source_mode: Some(linkarr_config::SourceMode::Separate),
                source_movies_path: Some(movies_src.display().to_string()),
                source_tv_path: Some(tv_src.display().to_string()),
                ..ConfigPatch::default()
            })
            .unwrap();

        f.engine.scan(None).await.unwrap();

        let records = f.engine.store().list_all().await.unwrap();
        let kinds: HashMap<String, MediaKind> = records
            .iter()
            .map(|r| (r.source_filename.clone(), r.media_kind))
            .collect();
        assert_eq!(kinds["ambiguous.mkv"], MediaKind::Movie);
        assert_eq!(kinds["also-ambiguous.mkv"], MediaKind::Tv);
    }

    #[tokio::test]
    async fn second_scan_skips_processed_records() {
        let f = fixture(
            StubMatcher::default().with("The Matrix", movie_match(603, "The Matrix", 1999)),
        )
        .await;
        touch(&f.source_root.join("The.Matrix.1999.mkv"));

        let first = f.engine.scan(None).await.unwrap();
        assert_eq!(first.processed, 1);
        let second = f.engine.scan(None).await.unwrap();
        assert_eq!(second.new, 0);
        assert_eq!(second.processed, 0);
    }

    #[tokio::test]
    async fn orphan_sweep_removes_record_and_destination() {
        let f = fixture(
            StubMatcher::default().with("The Matrix", movie_match(603, "The Matrix", 1999)),
        )
        .await;
        let source = f.source_root.join("The.Matrix.1999.mkv");
        touch(&source);

        f.engine.scan(None).await.unwrap();
        let destination = f
            .movies_root
            .join("The Matrix (1999)")
            .join("The Matrix (1999).mkv");
        assert!(destination.exists());

        std::fs::remove_file(&source).unwrap();
        let summary = f.engine.scan(None).await.unwrap();
        assert_eq!(summary.deleted, 1);
        assert!(!destination.exists());
        assert!(!f.movies_root.join("The Matrix (1999)").exists());
        assert!(f.engine.store().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_scan_is_rejected() {
        let f = fixture(StubMatcher::default()).await;
        let _guard = f.engine.begin_scan().unwrap();
        let result = f.engine.scan(None).await;
        assert!(matches!(result, Err(CoreError::ScanInProgress)));
        assert!(f.engine.is_scanning());
    }

    #[tokio::test]
    async fn spawn_scan_rejects_synchronously_while_scanning() {
        let f = fixture(StubMatcher::default()).await;

        let guard = f.engine.begin_scan().unwrap();
        assert!(matches!(
            f.engine.spawn_scan(None),
            Err(CoreError::ScanInProgress)
        ));
        drop(guard);

        // The guard is taken before spawn_scan returns, so a second call
        // fails even though the scan itself runs in the background.
        f.engine.spawn_scan(None).unwrap();
        assert!(f.engine.is_scanning());
        assert!(matches!(
            f.engine.spawn_scan(None),
            Err(CoreError::ScanInProgress)
        ));

        for _ in 0..100 {
            if !f.engine.is_scanning() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!f.engine.is_scanning());
    }

    #[tokio::test]
    async fn scan_guard_clears_on_completion() {
        let f = fixture(StubMatcher::default()).await;
        f.engine.scan(None).await.unwrap();
        assert!(!f.engine.is_scanning());
    }

    #[tokio::test]
    async fn require_arr_blocks_scan_when_unconfigured() {
        let f = fixture(StubMatcher::default()).await;
        f.config
            .update(ConfigPatch {
                require_arr: Some(true),
                ..ConfigPatch::default()
            })
            .unwrap();
        let result = f.engine.scan(None).await;
        assert!(matches!(result, Err(CoreError::ArrUnavailable(_))));
        assert!(!f.engine.is_scanning());
    }

    #[tokio::test]
    async fn cancelled_scan_still_reports_summary() {
        let f = fixture(StubMatcher::default()).await;
        touch(&f.source_root.join("a.file.2000.mkv"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = f
            .engine
            .scan_with_cancel(None, cancel)
            .await
            .unwrap();
        // Cancelled before the first chunk: nothing processed, summary
        // still emitted with the discovery count.
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn scan_emits_lifecycle_events() {
        let f = fixture(
            StubMatcher::default().with("The Matrix", movie_match(603, "The Matrix", 1999)),
        )
        .await;
        touch(&f.source_root.join("The.Matrix.1999.mkv"));

        let bus = Arc::new(EventBus::new());
        // Rebuild an engine sharing the fixture store but with an observable bus.
        let engine = Arc::new(IngestionEngine::new(
            Arc::clone(&f.config),
            f.engine.store().clone(),
            Arc::new(
                StubMatcher::default().with("The Matrix", movie_match(603, "The Matrix", 1999)),
            ),
            FileLinker::new(Arc::clone(&f.config)),
            RadarrClient::new(Arc::clone(&f.config)),
            SonarrClient::new(Arc::clone(&f.config)),
            Arc::clone(&bus),
        ));

        let mut subscription = bus.subscribe();
        engine.scan(None).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            subscription.recv(),
        )
        .await
        {
            kinds.push(event.kind());
        }
        assert!(kinds.contains(&"scan_started"));
        assert!(kinds.contains(&"file_added"));
        assert!(kinds.contains(&"file_updated"));
        assert!(kinds.contains(&"stats_updated"));
        assert_eq!(kinds.last(), Some(&"scan_completed"));
    }

    #[tokio::test]
    async fn process_file_reparses_and_relinks() {
        let f = fixture(
            StubMatcher::default().with("The Matrix", movie_match(603, "The Matrix", 1999)),
        )
        .await;
        touch(&f.source_root.join("The.Matrix.1999.mkv"));
        f.engine.scan(None).await.unwrap();

        let records = f.engine.store().list_all().await.unwrap();
        let record = f.engine.process_file(records[0].id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Linked);
        assert_eq!(record.catalog_id, Some(603));
    }

    #[tokio::test]
    async fn reprocess_retries_manual_records() {
        let f = fixture(StubMatcher::default()).await;
        touch(&f.source_root.join("Obscure.Film.2001.mkv"));
        f.engine.scan(None).await.unwrap();

        // The catalog has since learned about the film.
        let engine = Arc::new(IngestionEngine::new(
            Arc::clone(&f.config),
            f.engine.store().clone(),
            Arc::new(
                StubMatcher::default().with("Obscure Film", movie_match(9, "Obscure Film", 2001)),
            ),
            FileLinker::new(Arc::clone(&f.config)),
            RadarrClient::new(Arc::clone(&f.config)),
            SonarrClient::new(Arc::clone(&f.config)),
            Arc::new(EventBus::new()),
        ));

        let summary = engine.reprocess(&[RecordStatus::Manual]).await.unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.linked, 1);

        let records = engine.store().list_all().await.unwrap();
        assert_eq!(records[0].status, RecordStatus::Linked);
    }

    #[tokio::test]
    async fn remove_record_unlinks_destination() {
        let f = fixture(
            StubMatcher::default().with("The Matrix", movie_match(603, "The Matrix", 1999)),
        )
        .await;
        touch(&f.source_root.join("The.Matrix.1999.mkv"));
        f.engine.scan(None).await.unwrap();

        let records = f.engine.store().list_all().await.unwrap();
        let destination = PathBuf::from(records[0].destination_path.clone().unwrap());
        f.engine.remove_record(records[0].id).await.unwrap();

        assert!(!destination.exists());
        assert!(f.engine.store().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ignored_record_is_skipped_by_later_scans() {
        let f = fixture(StubMatcher::default()).await;
        touch(&f.source_root.join("Obscure.Film.2001.mkv"));
        f.engine.scan(None).await.unwrap();

        let records = f.engine.store().list_all().await.unwrap();
        let record = f.engine.ignore_record(records[0].id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Ignored);
        assert!(record.destination_path.is_none());

        let summary = f.engine.scan(None).await.unwrap();
        assert_eq!(summary.processed, 0);
        let records = f.engine.store().list_all().await.unwrap();
        assert_eq!(records[0].status, RecordStatus::Ignored);
    }
}
