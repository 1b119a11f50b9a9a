//! Handedness label resolution.
//!
//! Detector builds disagree on which field carries the hand label.  A
//! [`Category`] accepts every known variant and [`Category::handedness`]
//! resolves them through a fixed fallback chain:
//!
//! ```text
//! categoryName → displayName → label → name → Unknown
//! ```
//!
//! The first field that is present and non-empty wins, even if its value is
//! not a recognised label.  A future field name would silently resolve to
//! `Unknown`.

use serde::{Deserialize, Serialize};

use super::types::Handedness;

/// One classification entry as produced by the detector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub score: f32,
}

impl Category {
    /// Convenience constructor using the `categoryName` field.
    pub fn named(category_name: impl Into<String>, score: f32) -> Self {
        Self {
            category_name: Some(category_name.into()),
            score,
            ..Self::default()
        }
    }

    /// The raw label text, taken from the first populated field.
    pub fn raw_label(&self) -> Option<&str> {
        [
            &self.category_name,
            &self.display_name,
            &self.label,
            &self.name,
        ]
        .into_iter()
        .filter_map(|f| f.as_deref())
        .find(|s| !s.is_empty())
    }

    pub fn handedness(&self) -> Handedness {
        self.raw_label().map_or(Handedness::Unknown, parse_label)
    }
}

/// Map label text to a [`Handedness`].  Matching is exact apart from
/// surrounding whitespace and ASCII case.
pub fn parse_label(raw: &str) -> Handedness {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("left") {
        Handedness::Left
    } else if s.eq_ignore_ascii_case("right") {
        Handedness::Right
    } else {
        Handedness::Unknown
    }
}

/// Resolve handedness and score for the hand at `index` from the
/// detector's per-hand category lists.  Missing entries yield
/// `(Unknown, 0.0)`.
pub fn resolve(handednesses: Option<&[Vec<Category>]>, index: usize) -> (Handedness, f32) {
    handednesses
        .and_then(|all| all.get(index))
        .and_then(|cats| cats.first())
        .map_or((Handedness::Unknown, 0.0), |c| (c.handedness(), c.score))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
