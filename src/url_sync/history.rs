//! Session history of document locations.

use reqwest::Url;
use tracing::debug;

/// Linear history with a cursor, like a browser tab.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Url>,
    index: usize,
}

impl History {
    pub fn new(initial: Url) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
        }
    }

    /// Current document location.
    pub fn location(&self) -> &Url {
        &self.entries[self.index]
    }

    /// Replaces the current entry without creating a new one.
    pub fn replace_state(&mut self, url: Url) {
        debug!("replace_state {}", url);
        self.entries[self.index] = url;
    }

    /// Pushes a new entry, discarding any forward entries.
    pub fn push_state(&mut self, url: Url) {
        debug!("push_state {}", url);
        self.entries.truncate(self.index + 1);
        self.entries.push(url);
        self.index += 1;
    }

    /// Moves back one entry. Returns whether a pop-state occurred.
    pub fn back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Moves forward one entry. Returns whether a pop-state occurred.
    pub fn forward(&mut self) -> bool {
        if self.index + 1 >= self.entries.len() {
            return false;
        }
        self.index += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
