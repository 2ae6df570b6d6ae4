//! The persisted settings document.
//!
//! ```json
//! {
//!   "version": 1,
//!   "boards": [ { "id": "default", "name": "My Creations", "imageIds": [] } ],
//!   "selectedBoardId": "default",
//!   "project": { "generations": [], "edits": [] }
//! }
//! ```
//!
//! Reading is lenient: whatever part of the document is damaged falls back
//! to its first-run value, and the rest is kept.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use atelier_boards::{Board, BoardSet};
use atelier_types::{BoardId, ProjectHistory};

use crate::error::SettingsResult;

/// Current document format version.
pub const SETTINGS_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDocument<'a> {
    version: u32,
    boards: &'a [Board],
    selected_board_id: Option<&'a BoardId>,
    project: Option<&'a ProjectHistory>,
}

/// Boards, selection and project history: everything Atelier persists
/// besides image records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsDocument {
    pub boards: BoardSet,
    /// `None` until a project is started.
    pub project: Option<ProjectHistory>,
}

impl SettingsDocument {
    /// The first-run document: the default board, selected, and no project.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document. Never fails.
    ///
    /// - unparseable text yields the first-run document;
    /// - a missing or damaged `boards` field yields a single default board;
    /// - a board list lacking the default board gets one prepended;
    /// - duplicate board ids keep the first occurrence;
    /// - a damaged `project` yields no project.
    pub fn from_json(text: &str) -> Self {
        let value: Value = match serde_json::from_str(text) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(_) => {
                warn!("settings document is not an object; using defaults");
                return Self::new();
            }
            Err(e) => {
                warn!(error = %e, "settings document is not valid JSON; using defaults");
                return Self::new();
            }
        };

        let boards = match value.get("boards") {
            Some(raw @ Value::Array(_)) => match serde_json::from_value::<Vec<Board>>(raw.clone()) {
                Ok(boards) => boards,
                Err(e) => {
                    warn!(error = %e, "board list is damaged; restoring default board");
                    vec![Board::default_board()]
                }
            },
            Some(_) => {
                warn!("board list is not an array; restoring default board");
                vec![Board::default_board()]
            }
            None => vec![Board::default_board()],
        };

        let selected = match value.get("selectedBoardId") {
            None => Some(BoardId::default_board()),
            Some(Value::String(id)) => Some(BoardId::new(id.as_str())),
            Some(_) => None,
        };

        let project = match value.get("project") {
            None | Some(Value::Null) => None,
            Some(raw) => match serde_json::from_value::<ProjectHistory>(raw.clone()) {
                Ok(project) => Some(project),
                Err(e) => {
                    warn!(error = %e, "project history is damaged; dropping it");
                    None
                }
            },
        };

        Self {
            boards: BoardSet::from_parts(boards, selected),
            project,
        }
    }

    /// Serialize, keeping at most `history_limit` of the most recent
    /// generations and edits.
    pub fn to_json(&self, history_limit: Option<usize>) -> SettingsResult<String> {
        let truncated = match (&self.project, history_limit) {
            (Some(project), Some(limit)) => Some(project.truncated(limit)),
            _ => None,
        };
        let wire = WireDocument {
            version: SETTINGS_VERSION,
            boards: self.boards.boards(),
            selected_board_id: self.boards.selected_id(),
            project: truncated.as_ref().or(self.project.as_ref()),
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// The project history, started on first use.
    pub fn project_mut(&mut self) -> &mut ProjectHistory {
        self.project.get_or_insert_with(ProjectHistory::new)
    }
}
