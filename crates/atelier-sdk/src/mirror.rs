//! Disk mirroring and board export.
//!
//! The mirror is an optional convenience copy of saved images on the local
//! filesystem. Nothing ever reads it back: resolution works the same with
//! or without it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use atelier_boards::Board;
use atelier_types::{ImageId, ImageRef};

use crate::error::GalleryResult;
use crate::resolve::{resolve_for_board, ResolveContext};

const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make a board name or image id safe to use as one path component.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else if let Some(rest) = cleaned.strip_prefix('.') {
        format!("_{rest}")
    } else {
        cleaned
    }
}

/// Writes copies of saved images somewhere outside the object store.
#[async_trait]
pub trait DiskMirror: Send + Sync {
    /// Copy one image. Returns where it was written, or `None` if this
    /// reference is not something the mirror copies.
    async fn mirror(
        &self,
        board_name: &str,
        image_id: &ImageId,
        reference: &str,
    ) -> GalleryResult<Option<PathBuf>>;
}

/// Mirrors inline images to `<root>/<board name>/<image id>.<ext>`.
///
/// Remote and transient references are not fetched.
#[derive(Clone, Debug)]
pub struct FsMirror {
    root: PathBuf,
}

impl FsMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where an image with this extension would be written.
    pub fn path_for(&self, board_name: &str, image_id: &ImageId, ext: &str) -> PathBuf {
        self.root
            .join(sanitize_component(board_name))
            .join(format!("{}.{ext}", sanitize_component(image_id.as_str())))
    }
}

#[async_trait]
impl DiskMirror for FsMirror {
    async fn mirror(
        &self,
        board_name: &str,
        image_id: &ImageId,
        reference: &str,
    ) -> GalleryResult<Option<PathBuf>> {
        let ImageRef::Inline(inline) = ImageRef::classify(reference) else {
            debug!(image = ?image_id, "reference is not inline; not mirrored");
            return Ok(None);
        };

        let bytes = inline.decode()?;
        let path = self.path_for(board_name, image_id, inline.extension());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        debug!(image = ?image_id, path = %path.display(), bytes = bytes.len(), "image mirrored");
        Ok(Some(path))
    }
}

/// Outcome of [`export_boards`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub boards: usize,
    pub written: Vec<PathBuf>,
    /// Images that resolved to something other than inline data, or did
    /// not resolve at all.
    pub skipped: usize,
}

/// Write every inline image of every board to
/// `<dir>/<board name>/<board name>-<n>.<ext>`, where `n` is the image's
/// 1-based position on the board.
pub async fn export_boards(
    boards: &[Board],
    ctx: &ResolveContext<'_>,
    dir: &Path,
) -> GalleryResult<ExportReport> {
    let mut report = ExportReport::default();

    for board in boards {
        let folder_name = sanitize_component(&board.name);
        let folder = dir.join(&folder_name);
        tokio::fs::create_dir_all(&folder).await?;
        report.boards += 1;

        for (i, image_id) in board.image_ids.iter().enumerate() {
            let inline = match resolve_for_board(image_id, ctx).map(|r| ImageRef::classify(&r)) {
                Some(ImageRef::Inline(inline)) => inline,
                _ => {
                    report.skipped += 1;
                    continue;
                }
            };
            let bytes = match inline.decode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(image = ?image_id, error = %e, "undecodable image; skipping");
                    report.skipped += 1;
                    continue;
                }
            };
            let path = folder.join(format!("{folder_name}-{}.{}", i + 1, inline.extension()));
            tokio::fs::write(&path, &bytes).await?;
            report.written.push(path);
        }
    }

    info!(
        dir = %dir.display(),
        boards = report.boards,
        written = report.written.len(),
        skipped = report.skipped,
        "boards exported"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ObjectSnapshot;
    use atelier_types::{BoardId, InlineImage};

    #[test]
    fn sanitize_replaces_reserved() {
        assert_eq!(sanitize_component("My Creations"), "My Creations");
        assert_eq!(sanitize_component("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_component(".."), "_.");
        assert_eq!(sanitize_component("  "), "_");
    }

    #[tokio::test]
    async fn mirror_writes_inline_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = FsMirror::new(dir.path());
        let url = InlineImage::from_bytes(b"jpeg bytes", "image/jpeg").to_data_url();
        let id = ImageId::new("img-1-abc");

        let path = mirror.mirror("Sketches", &id, &url).await.unwrap().unwrap();
        assert_eq!(path, dir.path().join("Sketches").join("img-1-abc.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn mirror_skips_remote() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = FsMirror::new(dir.path());
        let out = mirror
            .mirror("B", &ImageId::new("img-1-a"), "https://example.com/a.png")
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn export_names_files_by_position() {
        let dir = tempfile::tempdir().unwrap();
        let png = InlineImage::from_bytes(b"png", "image/png").to_data_url();
        let webp = InlineImage::from_bytes(b"webp", "image/webp").to_data_url();

        let mut snapshot = ObjectSnapshot::new();
        snapshot.insert(ImageId::new("img-2-b"), webp);
        let ctx = ResolveContext::new(&snapshot, None);

        let mut board = Board::default_board();
        board.image_ids = vec![
            ImageId::new(png.as_str()),
            ImageId::new("https://example.com/remote.png"),
            ImageId::new("img-2-b"),
        ];
        let other = Board::new(BoardId::new("board-1-x"), "Empty");

        let report = export_boards(&[board, other], &ctx, dir.path()).await.unwrap();
        assert_eq!(report.boards, 2);
        assert_eq!(report.skipped, 1);
        let folder = dir.path().join("My Creations");
        assert_eq!(
            report.written,
            vec![folder.join("My Creations-1.png"), folder.join("My Creations-3.webp")]
        );
        assert_eq!(std::fs::read(folder.join("My Creations-3.webp")).unwrap(), b"webp");
        assert!(dir.path().join("Empty").is_dir());
    }
}
