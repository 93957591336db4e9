//! Legacy queue built from the visible timeline

use serde::{Deserialize, Serialize};
use tracing::debug;

use session_model::{MediaItem, Timeline};

/// Queue id reported when no item is active or the index is not visible
pub const UNKNOWN_QUEUE_ID: i64 = -1;

/// Default ceiling for the encoded queue, matching common IPC payload limits
pub const DEFAULT_QUEUE_SIZE_LIMIT_BYTES: usize = 256 * 1024;

/// One legacy queue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Position of the item in the timeline
    pub queue_id: i64,
    pub media_id: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
}

impl QueueItem {
    pub fn from_media_item(item: &MediaItem, index: usize) -> Self {
        Self {
            queue_id: queue_item_id(Some(index)),
            media_id: item.media_id.clone(),
            title: item.metadata.effective_title().map(str::to_string),
            subtitle: item.metadata.artist.clone(),
        }
    }
}

/// Queue id for a timeline index
pub fn queue_item_id(index: Option<usize>) -> i64 {
    index
        .and_then(|index| i64::try_from(index).ok())
        .unwrap_or(UNKNOWN_QUEUE_ID)
}

/// Queue entries for every item of `timeline`, in timeline order
pub fn build_queue(timeline: &Timeline) -> Vec<QueueItem> {
    timeline
        .items()
        .iter()
        .enumerate()
        .map(|(index, item)| QueueItem::from_media_item(item, index))
        .collect()
}

/// Longest prefix of `items` whose cumulative encoded size stays below
/// `limit_bytes`
///
/// Entries are never reordered or skipped; the first entry that does not
/// fit ends the queue.
pub fn truncate_by_size(items: Vec<QueueItem>, limit_bytes: usize) -> Vec<QueueItem> {
    let total = items.len();
    let mut used = 0usize;
    let mut kept = Vec::with_capacity(total);

    for item in items {
        let size = serde_json::to_vec(&item)
            .map(|encoded| encoded.len())
            .unwrap_or(usize::MAX);
        used = used.saturating_add(size);
        if used >= limit_bytes {
            break;
        }
        kept.push(item);
    }

    if kept.len() < total {
        debug!(
            "Legacy queue truncated to {} of {} items ({} byte limit)",
            kept.len(),
            total,
            limit_bytes
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(n: usize) -> Timeline {
        Timeline::new(
            (0..n)
                .map(|i| MediaItem::titled(format!("media-{}", i), format!("Title {}", i)))
                .collect(),
        )
    }

    #[test]
    fn test_queue_ids_are_indices() {
        let queue = build_queue(&timeline(3));
        let ids: Vec<i64> = queue.iter().map(|item| item.queue_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(queue[1].title.as_deref(), Some("Title 1"));
    }

    #[test]
    fn test_queue_item_id_unknown() {
        assert_eq!(queue_item_id(None), UNKNOWN_QUEUE_ID);
        assert_eq!(queue_item_id(Some(4)), 4);
    }

    #[test]
    fn test_truncate_keeps_prefix() {
        let queue = build_queue(&timeline(10));
        let one = serde_json::to_vec(&queue[0]).unwrap().len();

        // Room for three entries but not four
        let truncated = truncate_by_size(queue.clone(), one * 3 + one / 2);
        assert_eq!(truncated.len(), 3);
        assert_eq!(truncated[..], queue[..3]);
    }

    #[test]
    fn test_truncate_under_limit_keeps_all() {
        let queue = build_queue(&timeline(5));
        assert_eq!(truncate_by_size(queue.clone(), DEFAULT_QUEUE_SIZE_LIMIT_BYTES), queue);
    }

    #[test]
    fn test_truncate_zero_limit() {
        assert!(truncate_by_size(build_queue(&timeline(2)), 0).is_empty());
    }
}
