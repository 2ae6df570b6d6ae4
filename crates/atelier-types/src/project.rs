//! Project history: generation and edit records.
//!
//! History records carry their own output references. They are never
//! written to the object store but act as a resolution fallback for board
//! entries that point at a generation's raw output.

use serde::{Deserialize, Serialize};

/// One output produced by a generation or an edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputAsset {
    pub id: String,
    /// Renderable reference (usually a data URL).
    pub url: String,
}

impl OutputAsset {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// A text-to-image generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub output_assets: Vec<OutputAsset>,
    /// Unix milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_generation_id: Option<String>,
}

impl Generation {
    /// The first output's reference.
    pub fn primary_output(&self) -> Option<&str> {
        self.output_assets.first().map(|a| a.url.as_str())
    }

    /// Returns `true` if any output has exactly this reference.
    pub fn has_output(&self, url: &str) -> bool {
        self.output_assets.iter().any(|a| a.url == url)
    }
}

/// An instruction-driven edit of an existing image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub id: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub output_assets: Vec<OutputAsset>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_generation_id: Option<String>,
}

impl Edit {
    pub fn primary_output(&self) -> Option<&str> {
        self.output_assets.first().map(|a| a.url.as_str())
    }

    pub fn has_output(&self, url: &str) -> bool {
        self.output_assets.iter().any(|a| a.url == url)
    }
}

/// Append-only generation and edit history of the current project.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectHistory {
    #[serde(default)]
    pub generations: Vec<Generation>,
    #[serde(default)]
    pub edits: Vec<Edit>,
}

impl ProjectHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_generation(&mut self, generation: Generation) {
        self.generations.push(generation);
    }

    pub fn push_edit(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    pub fn generation(&self, id: &str) -> Option<&Generation> {
        self.generations.iter().find(|g| g.id == id)
    }

    pub fn edit(&self, id: &str) -> Option<&Edit> {
        self.edits.iter().find(|e| e.id == id)
    }

    /// Copy keeping only the most recent `limit` generations and edits.
    pub fn truncated(&self, limit: usize) -> Self {
        fn tail<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
            items[items.len().saturating_sub(limit)..].to_vec()
        }
        Self {
            generations: tail(&self.generations, limit),
            edits: tail(&self.edits, limit),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty() && self.edits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation(n: usize) -> Generation {
        Generation {
            id: format!("gen-{n}"),
            prompt: format!("prompt {n}"),
            output_assets: vec![OutputAsset::new(format!("a-{n}"), format!("data:image/png;base64,{n}"))],
            timestamp: n as i64,
            parent_generation_id: None,
        }
    }

    #[test]
    fn primary_output_is_first_asset() {
        let mut g = generation(1);
        g.output_assets.push(OutputAsset::new("second", "https://x/2.png"));
        assert_eq!(g.primary_output(), Some("data:image/png;base64,1"));
        assert!(g.has_output("https://x/2.png"));
    }

    #[test]
    fn primary_output_empty() {
        let e = Edit {
            id: "edit-1".into(),
            instruction: "make it blue".into(),
            output_assets: vec![],
            timestamp: 0,
            parent_generation_id: None,
        };
        assert_eq!(e.primary_output(), None);
    }

    #[test]
    fn truncated_keeps_latest() {
        let mut history = ProjectHistory::new();
        for n in 0..30 {
            history.push_generation(generation(n));
        }
        let cut = history.truncated(20);
        assert_eq!(cut.generations.len(), 20);
        assert_eq!(cut.generations[0].id, "gen-10");
        assert_eq!(cut.generations[19].id, "gen-29");
        assert!(cut.edits.is_empty());
    }

    #[test]
    fn truncated_shorter_than_limit() {
        let mut history = ProjectHistory::new();
        history.push_generation(generation(0));
        assert_eq!(history.truncated(20), history);
    }

    #[test]
    fn lookups_by_id() {
        let mut history = ProjectHistory::new();
        history.push_generation(generation(7));
        assert!(history.generation("gen-7").is_some());
        assert!(history.generation("gen-8").is_none());
        assert!(history.edit("gen-7").is_none());
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let json = r#"{"generations":[{"id":"g1","outputAssets":[{"id":"a","url":"u"}]}]}"#;
        let history: ProjectHistory = serde_json::from_str(json).unwrap();
        assert_eq!(history.generations[0].primary_output(), Some("u"));
        assert!(history.edits.is_empty());
    }
}
