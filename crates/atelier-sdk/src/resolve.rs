//! Image resolution: from a board's membership string to something that
//! can be rendered.
//!
//! Resolution is synchronous. The object store is read once into an
//! [`ObjectSnapshot`] and every lookup after that is a map probe.

use std::collections::HashMap;

use serde::Serialize;

use atelier_boards::Board;
use atelier_store::GalleryRecord;
use atelier_types::{classify, Edit, Generation, ImageId, ProjectHistory};

/// Object-store references, keyed by id, as of the last refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectSnapshot {
    references: HashMap<ImageId, String>,
}

impl ObjectSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records; a later record for the same id wins.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = GalleryRecord>,
    {
        let references = records
            .into_iter()
            .map(|record| (record.id, record.reference))
            .collect();
        Self { references }
    }

    pub fn insert(&mut self, id: ImageId, reference: String) {
        self.references.insert(id, reference);
    }

    pub fn remove(&mut self, id: &ImageId) -> Option<String> {
        self.references.remove(id)
    }

    pub fn get(&self, id: &ImageId) -> Option<&str> {
        self.references.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &ImageId) -> bool {
        self.references.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ImageId> {
        self.references.keys()
    }
}

/// Everything resolution may consult.
#[derive(Clone, Copy, Debug)]
pub struct ResolveContext<'a> {
    pub generations: &'a [Generation],
    pub edits: &'a [Edit],
    pub snapshot: &'a ObjectSnapshot,
}

impl<'a> ResolveContext<'a> {
    pub fn new(snapshot: &'a ObjectSnapshot, project: Option<&'a ProjectHistory>) -> Self {
        match project {
            Some(p) => Self {
                generations: &p.generations,
                edits: &p.edits,
                snapshot,
            },
            None => Self {
                generations: &[],
                edits: &[],
                snapshot,
            },
        }
    }
}

/// Resolve an image id to a renderable reference.
///
/// First match wins:
///
/// 1. a self-describing id is returned unchanged, with no lookup;
/// 2. the object-store snapshot;
/// 3. a generation whose primary output reference equals the id;
/// 4. an edit likewise.
///
/// `None` means the image is unavailable; callers skip it.
pub fn resolve(id: &ImageId, ctx: &ResolveContext<'_>) -> Option<String> {
    let raw = id.as_str();

    if classify(raw).self_describing {
        return Some(raw.to_string());
    }

    if let Some(reference) = ctx.snapshot.get(id) {
        return Some(reference.to_string());
    }

    if let Some(reference) = ctx
        .generations
        .iter()
        .filter_map(Generation::primary_output)
        .find(|output| *output == raw)
    {
        return Some(reference.to_string());
    }

    ctx.edits
        .iter()
        .filter_map(Edit::primary_output)
        .find(|output| *output == raw)
        .map(str::to_string)
}

/// Resolution for board views: [`resolve`], then a generation or edit
/// whose own id equals the image id, yielding its primary output.
pub fn resolve_for_board(id: &ImageId, ctx: &ResolveContext<'_>) -> Option<String> {
    resolve(id, ctx).or_else(|| {
        let raw = id.as_str();
        ctx.generations
            .iter()
            .find(|g| g.id == raw)
            .and_then(Generation::primary_output)
            .or_else(|| {
                ctx.edits
                    .iter()
                    .find(|e| e.id == raw)
                    .and_then(Edit::primary_output)
            })
            .map(str::to_string)
    })
}

/// Where a board item came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Generation,
    Edit,
    /// Uploaded or otherwise untracked image.
    Asset,
}

/// One renderable entry of a board view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardItem {
    pub image_id: ImageId,
    pub url: String,
    pub kind: ItemKind,
    /// Unix milliseconds; 0 when unknown.
    pub timestamp: i64,
}

fn classify_item(id: &ImageId, ctx: &ResolveContext<'_>) -> (ItemKind, i64) {
    if let Some(at) = id.minted_at() {
        return (ItemKind::Generation, at);
    }

    let raw = id.as_str();
    if id.is_self_describing() {
        if let Some(g) = ctx.generations.iter().find(|g| g.has_output(raw)) {
            return (ItemKind::Generation, g.timestamp);
        }
        if let Some(e) = ctx.edits.iter().find(|e| e.has_output(raw)) {
            return (ItemKind::Edit, e.timestamp);
        }
    } else {
        if let Some(g) = ctx.generations.iter().find(|g| g.id == raw) {
            return (ItemKind::Generation, g.timestamp);
        }
        if let Some(e) = ctx.edits.iter().find(|e| e.id == raw) {
            return (ItemKind::Edit, e.timestamp);
        }
    }

    (ItemKind::Asset, 0)
}

/// Renderable items of a board, newest first. Ids that do not resolve are
/// skipped; ties keep membership order.
pub fn board_items(board: &Board, ctx: &ResolveContext<'_>) -> Vec<BoardItem> {
    let mut items: Vec<BoardItem> = board
        .image_ids
        .iter()
        .filter_map(|id| {
            let url = resolve_for_board(id, ctx)?;
            let (kind, timestamp) = classify_item(id, ctx);
            Some(BoardItem {
                image_id: id.clone(),
                url,
                kind,
                timestamp,
            })
        })
        .collect();
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    items
}

/// Split items into the images tab (generations and edits) and the assets
/// tab.
pub fn split_tabs(items: Vec<BoardItem>) -> (Vec<BoardItem>, Vec<BoardItem>) {
    items.into_iter().partition(|item| item.kind != ItemKind::Asset)
}
