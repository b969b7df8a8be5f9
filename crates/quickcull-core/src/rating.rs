//! Star ratings and rating-based filtering.
//!
//! Ratings drive everything downstream of culling: which frames stay visible
//! in the filmstrip and which land in the export folder. The store itself is
//! deliberately dumb - toggle-to-clear and similar gestures belong to the
//! caller, which decides what rating to set.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Highest assignable star rating.
pub const MAX_RATING: u8 = 5;

/// Star ratings keyed by path.
///
/// Zero means "unrated" and is identical to absence: setting zero deletes
/// the key, so the map only ever holds entries with rating 1 and up.
#[derive(Debug, Clone, Default)]
pub struct RatingStore {
    ratings: HashMap<PathBuf, u8>,
}

impl RatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a rating. Zero removes the entry; values above the maximum
    /// clamp to it.
    pub fn set(&mut self, path: &Path, rating: u8) {
        if rating == 0 {
            self.ratings.remove(path);
        } else {
            self.ratings
                .insert(path.to_path_buf(), rating.min(MAX_RATING));
        }
    }

    /// The rating for a path, zero if absent.
    pub fn get(&self, path: &Path) -> u8 {
        self.ratings.get(path).copied().unwrap_or(0)
    }

    /// Every rated path (rating >= 1 by construction).
    pub fn all(&self) -> &HashMap<PathBuf, u8> {
        &self.ratings
    }

    /// Number of rated paths.
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    /// Whether nothing has been rated yet.
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Drop all ratings (folder change).
    pub fn clear(&mut self) {
        self.ratings.clear();
    }

    /// The rated subset that passes the active filter, sorted by path so
    /// export order is stable.
    pub fn export_selection(&self, filter: &RatingFilter) -> Vec<(PathBuf, u8)> {
        let mut selected: Vec<(PathBuf, u8)> = self
            .ratings
            .iter()
            .filter(|&(_, &rating)| filter.matches(rating))
            .map(|(path, &rating)| (path.clone(), rating))
            .collect();
        selected.sort();
        selected
    }
}

/// The set of ratings the filmstrip is currently filtered to.
///
/// An empty set means "show everything" - matching the UI convention where
/// deselecting every filter button resets the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingFilter {
    active: BTreeSet<u8>,
}

impl RatingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or remove one rating from the filter.
    pub fn toggle(&mut self, rating: u8) {
        let rating = rating.min(MAX_RATING);
        if !self.active.remove(&rating) {
            self.active.insert(rating);
        }
    }

    /// Filter to every rated frame (stars 1 through 5).
    pub fn select_rated(&mut self) {
        self.active = (1..=MAX_RATING).collect();
    }

    /// Reset to showing everything.
    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Whether no filter is active.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Whether a frame with this rating passes the filter.
    pub fn matches(&self, rating: u8) -> bool {
        self.active.is_empty() || self.active.contains(&rating)
    }
}
