//! The board set: every board plus the active selection.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use atelier_types::{BoardId, ImageId};

use crate::board::Board;
use crate::error::{BoardError, BoardResult};
use crate::names::{names_collide, normalize_name};

/// A partial update of a board's metadata.
///
/// `None` leaves a field unchanged. For the optional fields, `Some(None)`
/// clears the value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardUpdate {
    pub name: Option<String>,
    pub emoji: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

impl BoardUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn not_found(id: &BoardId) -> BoardError {
    BoardError::NotFound { id: id.to_string() }
}

/// Owns every board and the current selection.
///
/// Invariants upheld by every operation:
///
/// - exactly one board has the id `"default"`, and it is never removed;
/// - board ids are unique;
/// - no two boards created or renamed through this type share a name,
///   compared case-insensitively;
/// - a board never lists the same image twice;
/// - the selection, when present, names an existing board.
///
/// A failed operation leaves the set unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardSet {
    boards: Vec<Board>,
    selected: Option<BoardId>,
}

impl Default for BoardSet {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardSet {
    /// A first-run board set: the default board, selected.
    pub fn new() -> Self {
        Self {
            boards: vec![Board::default_board()],
            selected: Some(BoardId::default_board()),
        }
    }

    /// Rebuild a board set from persisted state, repairing what it can.
    ///
    /// Boards with an already-seen id are dropped, duplicate membership
    /// entries are collapsed, a missing default board is prepended, and a
    /// selection naming a missing board falls back to the first board.
    pub fn from_parts(boards: Vec<Board>, selected: Option<BoardId>) -> Self {
        let mut seen = HashSet::new();
        let mut kept: Vec<Board> = Vec::with_capacity(boards.len() + 1);
        for mut board in boards {
            if !seen.insert(board.id.clone()) {
                warn!(id = %board.id, "dropping board with duplicate id");
                continue;
            }
            board.dedup_images();
            kept.push(board);
        }

        if !kept.iter().any(Board::is_default) {
            debug!("restoring missing default board");
            kept.insert(0, Board::default_board());
        }

        let selected = match selected {
            Some(id) if kept.iter().any(|b| b.id == id) => Some(id),
            Some(id) => {
                warn!(id = %id, "selected board is missing; selecting first board");
                kept.first().map(|b| b.id.clone())
            }
            None => None,
        };

        Self {
            boards: kept,
            selected,
        }
    }

    /// Split into the boards and the selection, for persistence.
    pub fn into_parts(self) -> (Vec<Board>, Option<BoardId>) {
        (self.boards, self.selected)
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn iter(&self) -> impl Iterator<Item = &Board> {
        self.boards.iter()
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    /// Always `false` for a set built through this type.
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    pub fn get(&self, id: &BoardId) -> Option<&Board> {
        self.boards.iter().find(|b| &b.id == id)
    }

    /// Look a board up by id, or failing that by name.
    pub fn find(&self, key: &str) -> Option<&Board> {
        self.boards
            .iter()
            .find(|b| b.id.as_str() == key)
            .or_else(|| self.boards.iter().find(|b| names_collide(&b.name, key)))
    }

    fn position(&self, id: &BoardId) -> BoardResult<usize> {
        self.boards
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| not_found(id))
    }

    fn ensure_name_free(&self, name: &str, except: Option<&BoardId>) -> BoardResult<()> {
        let clash = self
            .boards
            .iter()
            .filter(|b| Some(&b.id) != except)
            .any(|b| names_collide(&b.name, name));
        if clash {
            return Err(BoardError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn fresh_id(&self) -> BoardId {
        loop {
            let id = BoardId::mint();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    // ------------------------------------------------------------------
    // Board lifecycle
    // ------------------------------------------------------------------

    /// Create an empty board with a fresh id.
    pub fn create_board(
        &mut self,
        name: &str,
        emoji: Option<String>,
        description: Option<String>,
    ) -> BoardResult<Board> {
        let name = normalize_name(name)?;
        self.ensure_name_free(&name, None)?;

        let mut board = Board::new(self.fresh_id(), name);
        board.emoji = clean_optional(emoji);
        board.description = clean_optional(description);

        debug!(id = %board.id, name = %board.name, "board created");
        self.boards.push(board.clone());
        Ok(board)
    }

    pub fn rename_board(&mut self, id: &BoardId, new_name: &str) -> BoardResult<()> {
        self.update_board(id, BoardUpdate::rename(new_name))
    }

    /// Apply a metadata update. The name rules of [`create_board`] apply.
    ///
    /// [`create_board`]: BoardSet::create_board
    pub fn update_board(&mut self, id: &BoardId, update: BoardUpdate) -> BoardResult<()> {
        let idx = self.position(id)?;
        let name = match update.name.as_deref() {
            Some(raw) => {
                let name = normalize_name(raw)?;
                self.ensure_name_free(&name, Some(id))?;
                Some(name)
            }
            None => None,
        };

        let board = &mut self.boards[idx];
        if let Some(name) = name {
            board.name = name;
        }
        if let Some(emoji) = update.emoji {
            board.emoji = clean_optional(emoji);
        }
        if let Some(description) = update.description {
            board.description = clean_optional(description);
        }
        board.touch();

        debug!(id = %board.id, name = %board.name, "board updated");
        Ok(())
    }

    /// Delete a board. Its images stay in the object store.
    ///
    /// If the board was selected, the selection moves to the first
    /// remaining board.
    pub fn delete_board(&mut self, id: &BoardId) -> BoardResult<Board> {
        if id.is_default() {
            return Err(BoardError::ProtectedBoard { id: id.to_string() });
        }
        let idx = self.position(id)?;
        let board = self.boards.remove(idx);

        if self.selected.as_ref() == Some(id) {
            self.selected = self.boards.first().map(|b| b.id.clone());
        }

        debug!(id = %board.id, images = board.len(), "board deleted");
        Ok(board)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn select(&mut self, id: &BoardId) -> BoardResult<()> {
        self.position(id)?;
        self.selected = Some(id.clone());
        Ok(())
    }

    pub fn selected_id(&self) -> Option<&BoardId> {
        self.selected.as_ref()
    }

    pub fn selected(&self) -> Option<&Board> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Add an image to a board. Returns `false` if it was already there.
    pub fn add_image(&mut self, board_id: &BoardId, image_id: &ImageId) -> BoardResult<bool> {
        let idx = self.position(board_id)?;
        let added = self.boards[idx].insert_image(image_id);
        debug!(board = %board_id, image = ?image_id, added, "add image");
        Ok(added)
    }

    /// Remove an image from a board. Returns `false` if it was not there.
    pub fn remove_image(&mut self, board_id: &BoardId, image_id: &ImageId) -> BoardResult<bool> {
        let idx = self.position(board_id)?;
        let removed = self.boards[idx].remove_image(image_id);
        debug!(board = %board_id, image = ?image_id, removed, "remove image");
        Ok(removed)
    }

    /// Make `target` the only board holding `image_id`.
    ///
    /// Applied in a single pass over all boards, so no intermediate state
    /// is observable.
    pub fn move_image(&mut self, target: &BoardId, image_id: &ImageId) -> BoardResult<()> {
        self.position(target)?;
        for board in &mut self.boards {
            if &board.id == target {
                board.insert_image(image_id);
            } else {
                board.remove_image(image_id);
            }
        }
        debug!(board = %target, image = ?image_id, "move image");
        Ok(())
    }

    /// Remove an image from every board. Returns how many boards held it.
    pub fn remove_image_everywhere(&mut self, image_id: &ImageId) -> usize {
        self.boards
            .iter_mut()
            .map(|board| board.remove_image(image_id))
            .filter(|&removed| removed)
            .count()
    }

    pub fn boards_containing(&self, image_id: &ImageId) -> Vec<&Board> {
        self.boards.iter().filter(|b| b.contains(image_id)).collect()
    }

    /// Every image id referenced by any board.
    pub fn image_ids(&self) -> BTreeSet<ImageId> {
        self.boards
            .iter()
            .flat_map(|b| b.image_ids.iter().cloned())
            .collect()
    }

    /// Keep only the membership entries for which `keep` returns `true`.
    ///
    /// Returns the `(board, image)` pairs that were removed.
    pub fn retain_images<F>(&mut self, mut keep: F) -> Vec<(BoardId, ImageId)>
    where
        F: FnMut(&BoardId, &ImageId) -> bool,
    {
        let mut removed = Vec::new();
        for board in &mut self.boards {
            let board_id = board.id.clone();
            let before = board.image_ids.len();
            board.image_ids.retain(|id| {
                if keep(&board_id, id) {
                    true
                } else {
                    removed.push((board_id.clone(), id.clone()));
                    false
                }
            });
            if board.image_ids.len() != before {
                board.touch();
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn img(s: &str) -> ImageId {
        ImageId::new(s)
    }

    fn default_id() -> BoardId {
        BoardId::default_board()
    }

    // ---- Lifecycle ----

    #[test]
    fn new_set_has_selected_default() {
        let set = BoardSet::new();
        assert_eq!(set.len(), 1);
        assert!(set.selected().unwrap().is_default());
    }

    #[test]
    fn create_board_assigns_fresh_id() {
        let mut set = BoardSet::new();
        let a = set.create_board("Sketches", Some("✏️".into()), None).unwrap();
        let b = set.create_board("Logos", None, Some("  ".into())).unwrap();
        assert_ne!(a.id, b.id);
        assert!(!a.id.is_default());
        assert!(a.is_empty());
        assert_eq!(a.emoji.as_deref(), Some("✏️"));
        assert_eq!(b.description, None);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn duplicate_name_is_case_insensitive() {
        let mut set = BoardSet::new();
        set.create_board("Sketches", None, None).unwrap();
        let err = set.create_board("sketches", None, None).unwrap_err();
        assert!(matches!(err, BoardError::DuplicateName { .. }));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn duplicate_of_default_name() {
        let mut set = BoardSet::new();
        assert!(set.create_board(" my creations ", None, None).is_err());
    }

    #[test]
    fn empty_name_rejected() {
        let mut set = BoardSet::new();
        assert!(matches!(
            set.create_board("  ", None, None),
            Err(BoardError::InvalidName { .. })
        ));
    }

    #[test]
    fn rename_excludes_self() {
        let mut set = BoardSet::new();
        let a = set.create_board("Sketches", None, None).unwrap();
        set.create_board("Logos", None, None).unwrap();

        set.rename_board(&a.id, "SKETCHES").unwrap();
        assert_eq!(set.get(&a.id).unwrap().name, "SKETCHES");

        let err = set.rename_board(&a.id, "logos").unwrap_err();
        assert!(matches!(err, BoardError::DuplicateName { .. }));
        assert_eq!(set.get(&a.id).unwrap().name, "SKETCHES");
    }

    #[test]
    fn rename_unknown_is_not_found() {
        let mut set = BoardSet::new();
        assert!(matches!(
            set.rename_board(&BoardId::new("ghost"), "x"),
            Err(BoardError::NotFound { .. })
        ));
    }

    #[test]
    fn update_board_sets_and_clears_metadata() {
        let mut set = BoardSet::new();
        let a = set.create_board("A", Some("🎨".into()), Some("d".into())).unwrap();
        set.update_board(
            &a.id,
            BoardUpdate {
                emoji: Some(None),
                description: Some(Some("new".into())),
                ..BoardUpdate::default()
            },
        )
        .unwrap();
        let board = set.get(&a.id).unwrap();
        assert_eq!(board.name, "A");
        assert_eq!(board.emoji, None);
        assert_eq!(board.description.as_deref(), Some("new"));
    }

    #[test]
    fn default_board_is_protected() {
        let mut set = BoardSet::new();
        set.add_image(&default_id(), &img("img-1-a")).unwrap();
        let err = set.delete_board(&default_id()).unwrap_err();
        assert!(matches!(err, BoardError::ProtectedBoard { .. }));
        assert_eq!(set.get(&default_id()).unwrap().image_ids, vec![img("img-1-a")]);
    }

    #[test]
    fn delete_selected_falls_back_to_first() {
        let mut set = BoardSet::new();
        let a = set.create_board("A", None, None).unwrap();
        set.select(&a.id).unwrap();
        let removed = set.delete_board(&a.id).unwrap();
        assert_eq!(removed.id, a.id);
        assert_eq!(set.selected_id(), Some(&default_id()));
    }

    #[test]
    fn delete_unselected_keeps_selection() {
        let mut set = BoardSet::new();
        let a = set.create_board("A", None, None).unwrap();
        let b = set.create_board("B", None, None).unwrap();
        set.select(&b.id).unwrap();
        set.delete_board(&a.id).unwrap();
        assert_eq!(set.selected_id(), Some(&b.id));
    }

    #[test]
    fn find_by_id_or_name() {
        let mut set = BoardSet::new();
        let a = set.create_board("Sketches", None, None).unwrap();
        assert_eq!(set.find(a.id.as_str()).unwrap().id, a.id);
        assert_eq!(set.find("sketches").unwrap().id, a.id);
        assert!(set.find("nothing").is_none());
    }

    // ---- Membership ----

    #[test]
    fn add_image_is_idempotent() {
        let mut set = BoardSet::new();
        assert!(set.add_image(&default_id(), &img("x")).unwrap());
        assert!(!set.add_image(&default_id(), &img("x")).unwrap());
        assert_eq!(set.get(&default_id()).unwrap().len(), 1);
    }

    #[test]
    fn unknown_board_fails_without_mutation() {
        let mut set = BoardSet::new();
        let before = set.clone();
        let ghost = BoardId::new("ghost");
        assert!(set.add_image(&ghost, &img("x")).is_err());
        assert!(set.remove_image(&ghost, &img("x")).is_err());
        assert!(set.move_image(&ghost, &img("x")).is_err());
        assert_eq!(set, before);
    }

    #[test]
    fn move_leaves_exactly_one_board() {
        let mut set = BoardSet::new();
        let sketches = set.create_board("Sketches", None, None).unwrap();
        let other = set.create_board("Other", None, None).unwrap();
        let id = img("img-1-a");
        set.add_image(&default_id(), &id).unwrap();
        set.add_image(&other.id, &id).unwrap();

        set.move_image(&sketches.id, &id).unwrap();

        let holders = set.boards_containing(&id);
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].id, sketches.id);
        assert_eq!(set.get(&sketches.id).unwrap().image_ids, vec![id]);
    }

    #[test]
    fn remove_image_everywhere_counts() {
        let mut set = BoardSet::new();
        let a = set.create_board("A", None, None).unwrap();
        set.add_image(&default_id(), &img("x")).unwrap();
        set.add_image(&a.id, &img("x")).unwrap();
        assert_eq!(set.remove_image_everywhere(&img("x")), 2);
        assert!(set.image_ids().is_empty());
    }

    #[test]
    fn retain_images_reports_removed_pairs() {
        let mut set = BoardSet::new();
        set.add_image(&default_id(), &img("keep")).unwrap();
        set.add_image(&default_id(), &img("drop")).unwrap();
        let removed = set.retain_images(|_, id| id.as_str() == "keep");
        assert_eq!(removed, vec![(default_id(), img("drop"))]);
        assert_eq!(set.get(&default_id()).unwrap().image_ids, vec![img("keep")]);
    }

    // ---- Repair on load ----

    #[test]
    fn from_parts_prepends_default_and_dedups() {
        let a = Board::new(BoardId::new("board-1-a"), "A");
        let mut a_dup = Board::new(BoardId::new("board-1-a"), "A again");
        a_dup.image_ids.push(img("x"));
        let set = BoardSet::from_parts(vec![a, a_dup], Some(BoardId::new("board-1-a")));
        assert_eq!(set.len(), 2);
        assert!(set.boards()[0].is_default());
        assert_eq!(set.get(&BoardId::new("board-1-a")).unwrap().name, "A");
        assert_eq!(set.selected_id(), Some(&BoardId::new("board-1-a")));
    }

    #[test]
    fn from_parts_repairs_dangling_selection() {
        let set = BoardSet::from_parts(vec![Board::default_board()], Some(BoardId::new("gone")));
        assert_eq!(set.selected_id(), Some(&default_id()));
        let set = BoardSet::from_parts(vec![Board::default_board()], None);
        assert_eq!(set.selected_id(), None);
    }

    // ---- Properties ----

    #[derive(Clone, Debug)]
    enum Op {
        Create(String),
        Rename(usize, String),
        Delete(usize),
        Add(usize, u8),
        Remove(usize, u8),
        Move(usize, u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let name = "[a-cA-C]{1,2}";
        prop_oneof![
            name.prop_map(Op::Create),
            (0usize..6, name).prop_map(|(i, n)| Op::Rename(i, n)),
            (0usize..6).prop_map(Op::Delete),
            (0usize..6, 0u8..5).prop_map(|(i, n)| Op::Add(i, n)),
            (0usize..6, 0u8..5).prop_map(|(i, n)| Op::Remove(i, n)),
            (0usize..6, 0u8..5).prop_map(|(i, n)| Op::Move(i, n)),
        ]
    }

    fn board_at(set: &BoardSet, i: usize) -> BoardId {
        set.boards()[i % set.len()].id.clone()
    }

    proptest! {
        #[test]
        fn invariants_hold_under_any_sequence(ops in proptest::collection::vec(op_strategy(), 0..40)) {
            let mut set = BoardSet::new();
            for op in ops {
                let _ = match op {
                    Op::Create(n) => set.create_board(&n, None, None).map(|_| ()),
                    Op::Rename(i, n) => { let id = board_at(&set, i); set.rename_board(&id, &n) }
                    Op::Delete(i) => { let id = board_at(&set, i); set.delete_board(&id).map(|_| ()) }
                    Op::Add(i, n) => { let id = board_at(&set, i); set.add_image(&id, &img(&n.to_string())).map(|_| ()) }
                    Op::Remove(i, n) => { let id = board_at(&set, i); set.remove_image(&id, &img(&n.to_string())).map(|_| ()) }
                    Op::Move(i, n) => {
                        let id = board_at(&set, i);
                        let image = img(&n.to_string());
                        let result = set.move_image(&id, &image);
                        prop_assert_eq!(set.boards_containing(&image).len(), 1);
                        result
                    }
                };

                prop_assert_eq!(set.iter().filter(|b| b.is_default()).count(), 1);
                let names: HashSet<String> = set.iter().map(|b| b.name.to_lowercase()).collect();
                prop_assert_eq!(names.len(), set.len());
                for board in set.iter() {
                    let unique: HashSet<&ImageId> = board.image_ids.iter().collect();
                    prop_assert_eq!(unique.len(), board.len());
                }
                if let Some(selected) = set.selected_id() {
                    prop_assert!(set.get(selected).is_some());
                }
            }
        }
    }
}
