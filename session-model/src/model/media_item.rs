//! Media item and metadata types

use serde::{Deserialize, Serialize};

/// Descriptive metadata for a media item or for the playlist as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Item title
    pub title: Option<String>,
    /// Artist name
    pub artist: Option<String>,
    /// Album title
    pub album_title: Option<String>,
    /// Title preferred for display, overriding `title` when set
    pub display_title: Option<String>,
    /// Artwork URI
    pub artwork_uri: Option<String>,
}

impl MediaMetadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Create metadata with a title
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Set the artist
    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Set the album title
    pub fn album_title(mut self, album_title: impl Into<String>) -> Self {
        self.album_title = Some(album_title.into());
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album_title.is_none()
            && self.display_title.is_none()
            && self.artwork_uri.is_none()
    }

    /// `display_title` if set, otherwise `title`
    pub fn effective_title(&self) -> Option<&str> {
        self.display_title.as_deref().or(self.title.as_deref())
    }
}

/// One entry of a timeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Application-defined identifier, may be empty
    pub media_id: String,
    pub metadata: MediaMetadata,
}

impl MediaItem {
    pub fn new(media_id: impl Into<String>, metadata: MediaMetadata) -> Self {
        Self {
            media_id: media_id.into(),
            metadata,
        }
    }

    /// Create an item with only an id and a title
    pub fn titled(media_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(media_id, MediaMetadata::with_title(title))
    }
}
