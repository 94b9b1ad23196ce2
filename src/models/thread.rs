//! Thread data structures.

use std::fmt;

/// A single discussion thread parsed from the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord {
    /// Forum-assigned identifier, stable across polls
    pub id: String,

    /// Display title from the preview anchor, if one exists
    pub title: Option<String>,

    /// Thread link from the preview anchor, usually relative
    pub link: Option<String>,

    /// Current post count
    pub post_count: u32,

    /// Pinned to the top of the listing
    pub is_sticky: bool,
}

impl ThreadRecord {
    /// Title for display, falling back to a placeholder.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(untitled)")
    }

    /// Fully-qualified link: `base_url` concatenated with the thread link.
    pub fn full_link(&self, base_url: &str) -> String {
        format!("{}{}", base_url, self.link.as_deref().unwrap_or(""))
    }
}

impl fmt::Display for ThreadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_title(), self.id)
    }
}

/// Outcome of comparing a thread against the persisted baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// No baseline entry for this thread id
    New,
    /// Baseline post count differs from the observed one
    Updated,
    /// Baseline matches
    Unchanged,
}

impl Classification {
    /// Whether this classification produces a notification.
    pub fn is_change(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}
