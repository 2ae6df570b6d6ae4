use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use atelier_boards::{Board, BoardError, BoardResult, BoardSet, BoardUpdate};
use atelier_settings::{
    Flusher, InMemorySettingsStore, JsonSettingsStore, SettingsDocument, SettingsStore,
};
use atelier_store::{GalleryRecord, InMemoryObjectStore, LogObjectStore, ObjectStore};
use atelier_types::{BoardId, Edit, Generation, ImageId, InlineImage, ProjectHistory};

use crate::config::AtelierConfig;
use crate::error::{GalleryError, GalleryResult};
use crate::mirror::{export_boards, DiskMirror, ExportReport, FsMirror};
use crate::resolve::{
    board_items, resolve, resolve_for_board, BoardItem, ObjectSnapshot, ResolveContext,
};

/// Image content handed to [`Gallery::save_image_to_board`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// Raw image bytes; stored as an inline data URL.
    Bytes { data: Vec<u8>, mime: String },
    /// Any reference (data URL, remote URL), stored as given.
    Reference(String),
}

impl ImageSource {
    fn into_reference(self) -> String {
        match self {
            ImageSource::Bytes { data, mime } => InlineImage::from_bytes(&data, &mime).to_data_url(),
            ImageSource::Reference(reference) => reference,
        }
    }
}

/// Result of a successful save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedImage {
    pub image_id: ImageId,
    /// Where the disk mirror wrote a copy, if it did.
    pub disk_path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Also delete object-store records that no board references.
    pub collect_orphans: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Membership entries removed because no tier could resolve them.
    pub dangling_removed: Vec<(BoardId, ImageId)>,
    /// Records deleted because no board referenced them.
    pub orphans_deleted: Vec<ImageId>,
}

struct GalleryState {
    document: SettingsDocument,
    snapshot: ObjectSnapshot,
}

/// The image gallery: boards, saved images and project history.
///
/// Board operations are synchronous in-memory mutations followed by a
/// fire-and-forget settings flush. Image saves write the object store
/// first and the board second; [`Gallery::reconcile`] repairs whatever a
/// crash between the two leaves behind.
///
/// When durable storage fails the gallery keeps working from memory and
/// reports [`is_degraded`](Gallery::is_degraded).
pub struct Gallery {
    config: AtelierConfig,
    store: Arc<dyn ObjectStore>,
    /// Holds records the durable store refused.
    session_store: InMemoryObjectStore,
    flusher: Flusher,
    mirror: Option<Arc<dyn DiskMirror>>,
    state: RwLock<GalleryState>,
    /// Images written to a store but not yet added to their board.
    in_flight: Mutex<HashSet<ImageId>>,
    degraded: AtomicBool,
}

impl Gallery {
    /// Open the gallery described by `config`.
    pub async fn open(config: AtelierConfig) -> GalleryResult<Self> {
        if config.in_memory {
            return Self::with_backends(
                config,
                Arc::new(InMemoryObjectStore::new()),
                Arc::new(InMemorySettingsStore::new()),
                None,
            )
            .await;
        }

        tokio::fs::create_dir_all(&config.data_dir).await?;

        let mut log_failed = false;
        let store: Arc<dyn ObjectStore> =
            match LogObjectStore::open(&config.log_path(), config.log_store_config()) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!(error = %e, path = %config.log_path().display(), "record log unavailable");
                    log_failed = true;
                    Arc::new(InMemoryObjectStore::new())
                }
            };
        let settings: Arc<dyn SettingsStore> = Arc::new(JsonSettingsStore::new(
            config.settings_path(),
            config.settings_config(),
        ));
        let mirror = config
            .mirror_dir
            .clone()
            .map(|dir| Arc::new(FsMirror::new(dir)) as Arc<dyn DiskMirror>);

        let gallery = Self::with_backends(config, store, settings, mirror).await?;
        if log_failed {
            gallery.mark_degraded("record log could not be opened");
        }
        Ok(gallery)
    }

    /// Assemble a gallery from explicit backends.
    pub async fn with_backends(
        config: AtelierConfig,
        store: Arc<dyn ObjectStore>,
        settings: Arc<dyn SettingsStore>,
        mirror: Option<Arc<dyn DiskMirror>>,
    ) -> GalleryResult<Self> {
        let (document, settings_ok) = match settings.load() {
            Ok(document) => (document, true),
            Err(e) => {
                warn!(error = %e, "settings could not be read; starting fresh");
                (SettingsDocument::new(), false)
            }
        };

        let gallery = Self {
            flusher: Flusher::new(settings, config.background_flush),
            config,
            store,
            session_store: InMemoryObjectStore::new(),
            mirror,
            state: RwLock::new(GalleryState {
                document,
                snapshot: ObjectSnapshot::new(),
            }),
            in_flight: Mutex::new(HashSet::new()),
            degraded: AtomicBool::new(false),
        };
        if !settings_ok {
            gallery.mark_degraded("settings could not be read");
        }

        let records = gallery.refresh_snapshot().await;
        info!(
            boards = gallery.read_state().document.boards.len(),
            records,
            in_memory = gallery.config.in_memory,
            "gallery opened"
        );
        Ok(gallery)
    }

    /// Flush settings and release the stores.
    pub async fn close(&self) -> GalleryResult<()> {
        self.flusher.settle().await;
        let document = self.read_state().document.clone();
        let flushed = self.flusher.flush_now(&document);

        let unsaved = self.session_store.len().await.unwrap_or(0);
        if unsaved > 0 {
            warn!(unsaved, "closing with images that were never written to disk");
        }

        self.store.close().await?;
        self.session_store.close().await?;
        flushed?;
        info!("gallery closed");
        Ok(())
    }

    pub fn config(&self) -> &AtelierConfig {
        &self.config
    }

    /// `true` once any durable tier has failed; changes since then may only
    /// live in memory.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst) || self.flusher.has_failed()
    }

    fn mark_degraded(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(reason, "gallery degraded; some changes will last for this session only");
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, GalleryState> {
        self.state.read().expect("gallery state lock poisoned")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, GalleryState> {
        self.state.write().expect("gallery state lock poisoned")
    }

    fn persist(&self, document: SettingsDocument) {
        self.flusher.submit(document);
        if self.flusher.has_failed() {
            self.mark_degraded("settings could not be written");
        }
    }

    /// Apply a board mutation and flush the result.
    fn mutate_boards<T>(
        &self,
        f: impl FnOnce(&mut BoardSet) -> BoardResult<T>,
    ) -> GalleryResult<T> {
        let (out, document) = {
            let mut state = self.write_state();
            let out = f(&mut state.document.boards)?;
            (out, state.document.clone())
        };
        self.persist(document);
        Ok(out)
    }

    // ---- Images ----

    /// Save an image and add it to a board.
    ///
    /// The record is written before the membership entry. If the object
    /// store refuses it, the record is kept for this session only and the
    /// gallery becomes degraded.
    pub async fn save_image_to_board(
        &self,
        board_id: &BoardId,
        source: ImageSource,
    ) -> GalleryResult<SavedImage> {
        let board_name = self
            .read_state()
            .document
            .boards
            .get(board_id)
            .map(|b| b.name.clone())
            .ok_or_else(|| BoardError::NotFound {
                id: board_id.to_string(),
            })?;

        let reference = source.into_reference();
        let image_id = ImageId::mint();

        self.in_flight_set().insert(image_id.clone());
        let result = self
            .store_and_add(board_id, board_name, &image_id, reference)
            .await;
        self.in_flight_set().remove(&image_id);

        let disk_path = result?;
        debug!(image = ?image_id, board = %board_id, "image saved");
        Ok(SavedImage {
            image_id,
            disk_path,
        })
    }

    fn in_flight_set(&self) -> MutexGuard<'_, HashSet<ImageId>> {
        self.in_flight.lock().expect("in-flight lock poisoned")
    }

    /// The two phases of a save: object store first, then membership.
    async fn store_and_add(
        &self,
        board_id: &BoardId,
        board_name: String,
        image_id: &ImageId,
        reference: String,
    ) -> GalleryResult<Option<PathBuf>> {
        let disk_path = match &self.mirror {
            Some(mirror) => match mirror.mirror(&board_name, image_id, &reference).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(image = ?image_id, error = %e, "disk mirror failed");
                    None
                }
            },
            None => None,
        };

        let mut record = GalleryRecord::new(
            image_id.clone(),
            reference.clone(),
            board_id.clone(),
            board_name,
        );
        if let Some(path) = &disk_path {
            record = record.with_disk_path(path.display().to_string());
        }

        if let Err(e) = self.store.put(&record).await {
            if !e.is_unavailable() {
                return Err(e.into());
            }
            warn!(image = ?image_id, error = %e, "object store refused image; keeping it in memory");
            self.mark_degraded("object store unavailable");
            self.session_store.put(&record).await?;
        }

        let document = {
            let mut state = self.write_state();
            state.snapshot.insert(image_id.clone(), reference);
            state.document.boards.add_image(board_id, image_id)?;
            state.document.clone()
        };
        self.persist(document);
        Ok(disk_path)
    }

    /// Resolve an image id against the cached snapshot and project history.
    pub fn resolve_image_url(&self, image_id: &ImageId) -> Option<String> {
        let state = self.read_state();
        let ctx = ResolveContext::new(&state.snapshot, state.document.project.as_ref());
        resolve(image_id, &ctx)
    }

    /// Like [`resolve_image_url`](Self::resolve_image_url), but an
    /// unavailable image is [`GalleryError::ImageNotFound`].
    pub fn image_url(&self, image_id: &ImageId) -> GalleryResult<String> {
        self.resolve_image_url(image_id)
            .ok_or_else(|| GalleryError::ImageNotFound(image_id.to_string()))
    }

    /// Re-read every record into the cached snapshot. Returns the number of
    /// records cached.
    ///
    /// If the object store cannot be read the previous snapshot is kept.
    pub async fn refresh_snapshot(&self) -> usize {
        let durable = match self.store.get_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "object store could not be read; keeping cached snapshot");
                self.mark_degraded("object store unavailable");
                return self.read_state().snapshot.len();
            }
        };
        let session = self.session_store.get_all().await.unwrap_or_default();

        let snapshot = ObjectSnapshot::from_records(durable.into_iter().chain(session));
        let len = snapshot.len();
        self.write_state().snapshot = snapshot;
        debug!(records = len, "snapshot refreshed");
        len
    }

    /// Read one stored record, durable or session-only.
    pub async fn record(&self, image_id: &ImageId) -> GalleryResult<Option<GalleryRecord>> {
        if let Some(record) = self.session_store.get_by_id(image_id).await? {
            return Ok(Some(record));
        }
        Ok(self.store.get_by_id(image_id).await?)
    }

    /// Delete an image's record and every membership entry for it.
    pub async fn delete_image(&self, image_id: &ImageId) -> GalleryResult<bool> {
        let in_store = match self.store.delete(image_id).await {
            Ok(existed) => existed,
            Err(e) if e.is_unavailable() => {
                warn!(image = ?image_id, error = %e, "object store refused delete");
                self.mark_degraded("object store unavailable");
                false
            }
            Err(e) => return Err(e.into()),
        };
        let in_session = self.session_store.delete(image_id).await.unwrap_or(false);

        let (boards, document) = {
            let mut state = self.write_state();
            state.snapshot.remove(image_id);
            let boards = state.document.boards.remove_image_everywhere(image_id);
            (boards, state.document.clone())
        };
        if boards > 0 {
            self.persist(document);
        }

        debug!(image = ?image_id, in_store, in_session, boards, "image deleted");
        Ok(in_store || in_session || boards > 0)
    }

    /// Drop membership entries nothing can resolve and, on request, records
    /// no board references.
    pub async fn reconcile(&self, options: ReconcileOptions) -> GalleryResult<ReconcileReport> {
        self.refresh_snapshot().await;

        let mut report = ReconcileReport::default();
        let document = {
            let mut state = self.write_state();
            let GalleryState { document, snapshot } = &mut *state;
            let ctx = ResolveContext::new(snapshot, document.project.as_ref());
            report.dangling_removed = document
                .boards
                .retain_images(|_, id| resolve_for_board(id, &ctx).is_some());
            document.clone()
        };
        if !report.dangling_removed.is_empty() {
            self.persist(document);
        }

        if options.collect_orphans {
            for record in self.store.get_all().await? {
                if self.is_orphan(&record.id) && self.store.delete(&record.id).await? {
                    report.orphans_deleted.push(record.id);
                }
            }
            for record in self.session_store.get_all().await? {
                if self.is_orphan(&record.id) && self.session_store.delete(&record.id).await? {
                    report.orphans_deleted.push(record.id);
                }
            }
            let mut state = self.write_state();
            for id in &report.orphans_deleted {
                state.snapshot.remove(id);
            }
        }

        info!(
            dangling = report.dangling_removed.len(),
            orphans = report.orphans_deleted.len(),
            "reconcile complete"
        );
        Ok(report)
    }

    /// Checked right before each delete: membership and in-flight saves may
    /// have changed since the reconcile pass began.
    fn is_orphan(&self, image_id: &ImageId) -> bool {
        let state = self.read_state();
        state.document.boards.boards_containing(image_id).is_empty()
            && !self.in_flight_set().contains(image_id)
    }

    // ---- Boards ----

    pub fn boards(&self) -> Vec<Board> {
        self.read_state().document.boards.boards().to_vec()
    }

    pub fn board(&self, board_id: &BoardId) -> Option<Board> {
        self.read_state().document.boards.get(board_id).cloned()
    }

    /// Look a board up by id, or failing that by name.
    pub fn find_board(&self, key: &str) -> Option<Board> {
        self.read_state().document.boards.find(key).cloned()
    }

    pub fn selected_board(&self) -> Option<Board> {
        self.read_state().document.boards.selected().cloned()
    }

    pub fn create_board(
        &self,
        name: &str,
        emoji: Option<String>,
        description: Option<String>,
    ) -> GalleryResult<Board> {
        self.mutate_boards(|boards| boards.create_board(name, emoji, description))
    }

    /// Rename a board. Returns `false` if no board has this id.
    pub fn rename_board(&self, board_id: &BoardId, new_name: &str) -> GalleryResult<bool> {
        match self.mutate_boards(|boards| boards.rename_board(board_id, new_name)) {
            Ok(()) => Ok(true),
            Err(GalleryError::Board(BoardError::NotFound { .. })) => {
                info!(board = %board_id, "rename of unknown board ignored");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn update_board(&self, board_id: &BoardId, update: BoardUpdate) -> GalleryResult<()> {
        self.mutate_boards(|boards| boards.update_board(board_id, update))
    }

    /// Delete a board; its images stay stored. Returns `false` if no board
    /// has this id.
    pub fn delete_board(&self, board_id: &BoardId) -> GalleryResult<bool> {
        match self.mutate_boards(|boards| boards.delete_board(board_id)) {
            Ok(_) => Ok(true),
            Err(GalleryError::Board(BoardError::NotFound { .. })) => {
                info!(board = %board_id, "delete of unknown board ignored");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn select_board(&self, board_id: &BoardId) -> GalleryResult<()> {
        self.mutate_boards(|boards| boards.select(board_id))
    }

    pub fn add_image_to_board(&self, board_id: &BoardId, image_id: &ImageId) -> GalleryResult<bool> {
        self.mutate_boards(|boards| boards.add_image(board_id, image_id))
    }

    pub fn remove_image_from_board(
        &self,
        board_id: &BoardId,
        image_id: &ImageId,
    ) -> GalleryResult<bool> {
        self.mutate_boards(|boards| boards.remove_image(board_id, image_id))
    }

    pub fn move_image_to_board(&self, target: &BoardId, image_id: &ImageId) -> GalleryResult<()> {
        self.mutate_boards(|boards| boards.move_image(target, image_id))
    }

    /// Renderable items of a board, newest first.
    pub fn board_items(&self, board_id: &BoardId) -> GalleryResult<Vec<BoardItem>> {
        let state = self.read_state();
        let board = state
            .document
            .boards
            .get(board_id)
            .ok_or_else(|| BoardError::NotFound {
                id: board_id.to_string(),
            })?;
        let ctx = ResolveContext::new(&state.snapshot, state.document.project.as_ref());
        Ok(board_items(board, &ctx))
    }

    /// Write every board's inline images under `dir`.
    pub async fn export_boards(&self, dir: &Path) -> GalleryResult<ExportReport> {
        let (boards, snapshot, project) = {
            let state = self.read_state();
            (
                state.document.boards.boards().to_vec(),
                state.snapshot.clone(),
                state.document.project.clone(),
            )
        };
        let ctx = ResolveContext::new(&snapshot, project.as_ref());
        export_boards(&boards, &ctx, dir).await
    }

    // ---- Project history ----

    pub fn project(&self) -> Option<ProjectHistory> {
        self.read_state().document.project.clone()
    }

    pub fn record_generation(&self, generation: Generation) {
        let document = {
            let mut state = self.write_state();
            state.document.project_mut().push_generation(generation);
            state.document.clone()
        };
        self.persist(document);
    }

    pub fn record_edit(&self, edit: Edit) {
        let document = {
            let mut state = self.write_state();
            state.document.project_mut().push_edit(edit);
            state.document.clone()
        };
        self.persist(document);
    }
}

impl std::fmt::Debug for Gallery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("Gallery")
            .field("data_dir", &self.config.data_dir)
            .field("boards", &state.document.boards.len())
            .field("records", &state.snapshot.len())
            .field("degraded", &self.is_degraded())
            .finish()
    }
}
