//! Timeline: the ordered sequence of media items a player works through

use serde::{Deserialize, Serialize};

use super::MediaItem;

/// Ordered media items, optionally with a shuffle order
///
/// The shuffle order, when present, lists timeline indices in the order they
/// are played while shuffle is enabled. It is validated when the owning
/// snapshot is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    items: Vec<MediaItem>,
    shuffle_order: Option<Vec<usize>>,
}

impl Timeline {
    /// An empty timeline
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(items: Vec<MediaItem>) -> Self {
        Self {
            items,
            shuffle_order: None,
        }
    }

    /// Attach a shuffle order
    pub fn with_shuffle_order(mut self, order: Vec<usize>) -> Self {
        self.shuffle_order = Some(order);
        self
    }

    /// Timeline holding only `item`
    pub fn single(item: MediaItem) -> Self {
        Self::new(vec![item])
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&MediaItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn shuffle_order(&self) -> Option<&[usize]> {
        self.shuffle_order.as_deref()
    }

    pub(crate) fn without_shuffle_order(mut self) -> Self {
        self.shuffle_order = None;
        self
    }

    /// Whether the shuffle order (if any) is a permutation of `0..len`
    pub fn has_valid_shuffle_order(&self) -> bool {
        match &self.shuffle_order {
            None => true,
            Some(order) => {
                if order.len() != self.items.len() {
                    return false;
                }
                let mut seen = vec![false; order.len()];
                for &index in order {
                    match seen.get_mut(index) {
                        Some(slot) if !*slot => *slot = true,
                        _ => return false,
                    }
                }
                true
            }
        }
    }
}

impl From<Vec<MediaItem>> for Timeline {
    fn from(items: Vec<MediaItem>) -> Self {
        Self::new(items)
    }
}
