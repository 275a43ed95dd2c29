//! Canonical destination paths and link materialization.
//!
//! Path layout follows media-server conventions:
//! `Movies/Title (Year)/Title (Year).ext` and
//! `TV/Title (Year)/Season NN/Title - SnnEnn.ext`, with season 0 under
//! `Specials/`. Materialization is a hardlink, falling back to a symlink
//! when source and destination live on different filesystems.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use linkarr_config::ConfigStore;
use linkarr_model::MediaKind;
use tracing::debug;

use crate::error::{CoreError, Result};

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_COMPONENT_LEN: usize = 200;

/// Strip filesystem-hostile characters from one path component, trim
/// whitespace and trailing dots, and cap the length.
pub fn sanitize_component(name: &str) -> String {
    let mut cleaned: String = name.chars().filter(|c| !INVALID_CHARS.contains(c)).collect();
    cleaned = cleaned.trim().trim_end_matches('.').to_string();
    if cleaned.len() > MAX_COMPONENT_LEN {
        let mut cut = MAX_COMPONENT_LEN;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
    }
    cleaned
}

fn titled(title: &str, year: Option<i64>) -> String {
    match year {
        Some(year) => format!("{title} ({year})"),
        None => title.to_string(),
    }
}

fn season_folder(season: i64) -> String {
    if season == 0 {
        "Specials".to_string()
    } else {
        format!("Season {season:02}")
    }
}

fn extension_of(source: &Path) -> String {
    source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// How a destination entry was materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMethod {
    Hardlink,
    Symlink,
}

/// Builds canonical destination paths and materializes them.
#[derive(Debug, Clone)]
pub struct FileLinker {
    config: Arc<ConfigStore>,
}

impl FileLinker {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }

    fn movies_root(&self) -> PathBuf {
        self.config.load().movies_path()
    }

    fn tv_root(&self) -> PathBuf {
        self.config.load().tv_path()
    }

    /// `<movies_root>/<Title> (<Year>)/<Title> (<Year>)<ext>`.
    pub fn build_movie_path(
        &self,
        title: &str,
        year: Option<i64>,
        source: &Path,
    ) -> PathBuf {
        let name = sanitize_component(&titled(title, year));
        let file = format!("{name}{}", extension_of(source));
        self.movies_root().join(&name).join(file)
    }

    /// `<tv_root>/<Title> (<Year>)/Season <NN>/<Title> - S<NN>E<NN><ext>`.
    /// Season 0 maps to `Specials/`; the episode field widens past 99.
    pub fn build_tv_path(
        &self,
        title: &str,
        year: Option<i64>,
        season: i64,
        episode: i64,
        source: &Path,
    ) -> PathBuf {
        let series = sanitize_component(&titled(title, year));
        let file = sanitize_component(&format!(
            "{} - S{season:02}E{episode:02}",
            sanitize_component(title)
        ));
        self.tv_root()
            .join(&series)
            .join(season_folder(season))
            .join(format!("{file}{}", extension_of(source)))
    }

    /// Holding area for records awaiting operator attention:
    /// `<root>/_Manual/<kind>/<filename>`.
    pub fn build_manual_path(&self, kind: MediaKind, source: &Path) -> PathBuf {
        let root = match kind {
            MediaKind::Tv => self.tv_root(),
            MediaKind::Movie | MediaKind::Unknown => self.movies_root(),
        };
        let filename = source
            .file_name()
            .map(|name| sanitize_component(&name.to_string_lossy()))
            .unwrap_or_default();
        root.join("_Manual").join(kind.as_str()).join(filename)
    }

    pub async fn link_movie(
        &self,
        source: &Path,
        title: &str,
        year: Option<i64>,
    ) -> Result<PathBuf> {
        let destination = self.build_movie_path(title, year, source);
        self.materialize(source, &destination).await?;
        Ok(destination)
    }

    pub async fn link_tv_episode(
        &self,
        source: &Path,
        title: &str,
        year: Option<i64>,
        season: i64,
        episode: i64,
    ) -> Result<PathBuf> {
        let destination = self.build_tv_path(title, year, season, episode, source);
        self.materialize(source, &destination).await?;
        Ok(destination)
    }

    pub async fn link_manual(&self, source: &Path, kind: MediaKind) -> Result<PathBuf> {
        let destination = self.build_manual_path(kind, source);
        self.materialize(source, &destination).await?;
        Ok(destination)
    }

    /// Hardlink `source` at `destination`, replacing any existing entry.
    /// Cross-device sources fall back to a symlink. Idempotent.
    pub async fn materialize(&self, source: &Path, destination: &Path) -> Result<LinkMethod> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(CoreError::Link(format!(
                "source file not found: {}",
                source.display()
            )));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        remove_entry(destination).await?;

        match tokio::fs::hard_link(source, destination).await {
            Ok(()) => {
                debug!(destination = %destination.display(), "hardlink created");
                Ok(LinkMethod::Hardlink)
            }
            Err(err) if is_cross_device(&err) => {
                symlink(source, destination).await.map_err(|err| {
                    CoreError::Link(format!(
                        "symlink fallback failed for {}: {err}",
                        destination.display()
                    ))
                })?;
                debug!(destination = %destination.display(), "symlink created (cross-device)");
                Ok(LinkMethod::Symlink)
            }
            Err(err) => Err(CoreError::Link(format!(
                "hardlink failed for {}: {err}",
                destination.display()
            ))),
        }
    }

    /// Delete a destination entry (file or symlink) and prune now-empty
    /// ancestor directories up to, but never including, the configured
    /// roots.
    pub async fn remove_link(&self, destination: &Path) -> Result<()> {
        remove_entry(destination).await?;
        if let Some(parent) = destination.parent() {
            self.cleanup_empty_dirs(parent).await;
        }
        Ok(())
    }

    async fn cleanup_empty_dirs(&self, start: &Path) {
        let roots = [self.movies_root(), self.tv_root()];
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            if roots.iter().any(|root| *root == dir) {
                break;
            }
            match tokio::fs::read_dir(&dir).await {
                Ok(mut entries) => match entries.next_entry().await {
                    Ok(None) => {
                        if tokio::fs::remove_dir(&dir).await.is_err() {
                            break;
                        }
                        current = dir.parent().map(Path::to_path_buf);
                    }
                    _ => break,
                },
                Err(_) => break,
            }
        }
    }
}

/// Remove a regular file or dangling symlink; missing entries are fine.
async fn remove_entry(path: &Path) -> Result<()> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => tokio::fs::remove_file(path).await.map_err(CoreError::from),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices || err.raw_os_error() == Some(18)
}

#[cfg(unix)]
async fn symlink(source: &Path, destination: &Path) -> io::Result<()> {
    tokio::fs::symlink(source, destination).await
}

#[cfg(windows)]
async fn symlink(source: &Path, destination: &Path) -> io::Result<()> {
    tokio::fs::symlink_file(source, destination).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkarr_config::{ConfigPatch, ConfigStore};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        linker: FileLinker,
        source_root: PathBuf,
        movies_root: PathBuf,
        tv_root: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let source_root = dir.path().join("src");
        let movies_root = dir.path().join("movies");
        let tv_root = dir.path().join("tv");
        std::fs::create_dir_all(&source_root).unwrap();

        let config = Arc::new(ConfigStore::new(dir.path().join("config.json")));
        config
            .update(ConfigPatch {
                movies_path: Some(movies_root.display().to_string()),
                tv_path: Some(tv_root.display().to_string()),
                ..ConfigPatch::default()
            })
            .unwrap();

        Fixture {
            linker: FileLinker::new(config),
            source_root,
            movies_root,
            tv_root,
            _dir: dir,
        }
    }

    fn touch(path: &Path) {
        std::fs::write(path, b"video").unwrap();
    }

    #[test]
    fn sanitize_strips_invalid_characters() {
        assert_eq!(sanitize_component("Who? What: A/B\\C*"), "Who What ABC");
        assert_eq!(sanitize_component("  Trailing. . "), "Trailing");
        let long = "x".repeat(300);
        assert_eq!(sanitize_component(&long).len(), MAX_COMPONENT_LEN);
    }

    #[test]
    fn movie_path_layout() {
        let f = fixture();
        let path = f
            .linker
            .build_movie_path("The Matrix", Some(1999), Path::new("/s/The.Matrix.mkv"));
        assert_eq!(
            path,
            f.movies_root.join("The Matrix (1999)").join("The Matrix (1999).mkv")
        );
    }

    #[test]
    fn movie_path_without_year_drops_parens() {
        let f = fixture();
        let path = f
            .linker
            .build_movie_path("Some Film", None, Path::new("/s/film.mp4"));
        assert_eq!(path, f.movies_root.join("Some Film").join("Some Film.mp4"));
    }

    #[test]
    fn tv_path_layout_and_specials() {
        let f = fixture();
        let path = f.linker.build_tv_path(
            "Akame ga Kill!",
            Some(2014),
            0,
            1,
            Path::new("/s/e.mkv"),
        );
        assert_eq!(
            path,
            f.tv_root
                .join("Akame ga Kill! (2014)")
                .join("Specials")
                .join("Akame ga Kill! - S00E01.mkv")
        );

        let path =
            f.linker
                .build_tv_path("Show", Some(2020), 17, 3, Path::new("/s/e.mkv"));
        assert!(path.ends_with("Show (2020)/Season 17/Show - S17E03.mkv"));
    }

    #[test]
    fn tv_path_widens_past_episode_99() {
        let f = fixture();
        let path =
            f.linker
                .build_tv_path("One Piece", None, 1, 104, Path::new("/s/e.mkv"));
        assert!(path.ends_with("One Piece/Season 01/One Piece - S01E104.mkv"));
    }

    #[test]
    fn manual_path_is_kind_bucketed() {
        let f = fixture();
        let path = f
            .linker
            .build_manual_path(MediaKind::Tv, Path::new("/s/mystery.mkv"));
        assert_eq!(path, f.tv_root.join("_Manual").join("tv").join("mystery.mkv"));
    }

    #[tokio::test]
    async fn materialize_creates_hardlink() {
        let f = fixture();
        let source = f.source_root.join("a.mkv");
        touch(&source);
        let destination = f.movies_root.join("A (2020)").join("A (2020).mkv");

        let method = f.linker.materialize(&source, &destination).await.unwrap();
        assert_eq!(method, LinkMethod::Hardlink);
        assert!(destination.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let src_meta = std::fs::metadata(&source).unwrap();
            let dst_meta = std::fs::metadata(&destination).unwrap();
            assert_eq!(src_meta.ino(), dst_meta.ino());
        }
    }

    #[tokio::test]
    async fn materialize_is_idempotent() {
        let f = fixture();
        let source = f.source_root.join("a.mkv");
        touch(&source);
        let destination = f.movies_root.join("A").join("A.mkv");

        f.linker.materialize(&source, &destination).await.unwrap();
        f.linker.materialize(&source, &destination).await.unwrap();
        assert!(destination.exists());
    }

    #[tokio::test]
    async fn materialize_replaces_existing_destination() {
        let f = fixture();
        let old_source = f.source_root.join("old.mkv");
        let new_source = f.source_root.join("new.mkv");
        touch(&old_source);
        touch(&new_source);
        let destination = f.movies_root.join("A").join("A.mkv");

        f.linker.materialize(&old_source, &destination).await.unwrap();
        f.linker.materialize(&new_source, &destination).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let new_meta = std::fs::metadata(&new_source).unwrap();
            let dst_meta = std::fs::metadata(&destination).unwrap();
            assert_eq!(new_meta.ino(), dst_meta.ino());
        }
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let f = fixture();
        let result = f
            .linker
            .materialize(&f.source_root.join("ghost.mkv"), &f.movies_root.join("g.mkv"))
            .await;
        assert!(matches!(result, Err(CoreError::Link(_))));
    }

    #[tokio::test]
    async fn remove_link_prunes_empty_ancestors_but_not_root() {
        let f = fixture();
        let source = f.source_root.join("a.mkv");
        touch(&source);

        let destination = f
            .linker
            .link_tv_episode(&source, "Show", Some(2020), 1, 1)
            .await
            .unwrap();
        assert!(destination.exists());

        f.linker.remove_link(&destination).await.unwrap();
        assert!(!destination.exists());
        // Season and series folders are gone, the root remains.
        assert!(!f.tv_root.join("Show (2020)").exists());
        assert!(f.tv_root.exists());
    }

    #[tokio::test]
    async fn remove_link_keeps_non_empty_ancestors() {
        let f = fixture();
        let source_a = f.source_root.join("a.mkv");
        let source_b = f.source_root.join("b.mkv");
        touch(&source_a);
        touch(&source_b);

        let destination_a = f
            .linker
            .link_tv_episode(&source_a, "Show", None, 1, 1)
            .await
            .unwrap();
        let destination_b = f
            .linker
            .link_tv_episode(&source_b, "Show", None, 1, 2)
            .await
            .unwrap();

        f.linker.remove_link(&destination_a).await.unwrap();
        assert!(destination_b.exists());
        assert!(f.tv_root.join("Show").join("Season 01").exists());
    }

    #[tokio::test]
    async fn remove_link_handles_dangling_symlink() {
        let f = fixture();
        std::fs::create_dir_all(&f.movies_root).unwrap();
        let destination = f.movies_root.join("dangling.mkv");
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink("/nowhere/ghost.mkv", &destination).unwrap();
            assert!(std::fs::symlink_metadata(&destination).is_ok());
            f.linker.remove_link(&destination).await.unwrap();
            assert!(std::fs::symlink_metadata(&destination).is_err());
        }
    }
}
