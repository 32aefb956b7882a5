//! Track catalog - selection state and cross-indexing
//!
//! The catalog is single-writer (only its own refresh/selection methods
//! mutate it) and multi-reader; readers observe the latest fully-replaced
//! snapshot, never a partially updated one. Selection and inventory are
//! refreshed independently and may transiently disagree; the catalog
//! tolerates the mismatch.

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};
use vpb_common::events::{EventBus, PlayerEvent};

use super::{
    parse_track_list, positional_descriptor_indices, StreamDescriptor, Track, TrackKind,
};
use crate::engine::gateway::EngineGateway;
use crate::engine::protocol::props;

#[derive(Debug, Default)]
struct CatalogInner {
    video: Vec<Track>,
    audio: Vec<Track>,
    subtitle: Vec<Track>,
    selected_video: Option<i64>,
    selected_audio: Option<i64>,
    selected_subtitle: Option<i64>,
    selected_secondary_subtitle: Option<i64>,
    /// Externally supplied stream descriptors for cross-indexing
    descriptors: Vec<StreamDescriptor>,
}

/// Authoritative snapshot of the engine's track inventory
pub struct TrackCatalog {
    gateway: Arc<EngineGateway>,
    events: EventBus,
    inner: RwLock<CatalogInner>,
}

impl TrackCatalog {
    pub fn new(gateway: Arc<EngineGateway>, events: EventBus) -> Self {
        Self {
            gateway,
            events,
            inner: RwLock::new(CatalogInner::default()),
        }
    }

    /// Re-read the inventory and selection properties, replacing the
    /// catalog atomically
    ///
    /// A missing or malformed inventory yields an empty catalog; this never
    /// fails.
    pub fn refresh(&self) {
        let payload = self.gateway.get_property_string(props::TRACK_LIST);
        let (video, audio, subtitle) = match payload {
            Some(json) => parse_track_list(&json),
            None => {
                debug!("Track inventory unavailable; catalog empty");
                (Vec::new(), Vec::new(), Vec::new())
            }
        };

        let selected_video = self.read_selection(props::VIDEO_TRACK);
        let selected_audio = self.read_selection(props::AUDIO_TRACK);
        let selected_subtitle = self.read_selection(props::SUBTITLE_TRACK);
        let selected_secondary_subtitle = self.read_selection(props::SECONDARY_SUBTITLE_TRACK);

        let (video_count, audio_count, subtitle_count) =
            (video.len(), audio.len(), subtitle.len());

        {
            let mut inner = self.inner.write().unwrap();

            if let Some(id) = selected_audio {
                if !audio.iter().any(|t| t.id == id) {
                    debug!(
                        "Selected audio id {} absent from latest inventory (transient)",
                        id
                    );
                }
            }

            inner.video = video;
            inner.audio = audio;
            inner.subtitle = subtitle;
            inner.selected_video = selected_video;
            inner.selected_audio = selected_audio;
            inner.selected_subtitle = selected_subtitle;
            inner.selected_secondary_subtitle = selected_secondary_subtitle;
        }

        self.events.emit_lossy(PlayerEvent::TracksChanged {
            video_count,
            audio_count,
            subtitle_count,
            timestamp: vpb_common::time::now(),
        });
    }

    /// Selection properties report a positive id or fail ("no"/"auto");
    /// non-positive and failed reads both mean no explicit selection.
    fn read_selection(&self, prop: &str) -> Option<i64> {
        let id = self.gateway.get_property_int(prop);
        if id > 0 {
            Some(id)
        } else {
            None
        }
    }

    /// Reset to the empty catalog
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        let descriptors = std::mem::take(&mut inner.descriptors);
        *inner = CatalogInner::default();
        // Descriptors describe the item, not the engine state; they are
        // replaced when the next item's metadata arrives
        inner.descriptors = descriptors;
    }

    /// Install the external stream descriptors for the current item
    pub fn set_stream_descriptors(&self, descriptors: Vec<StreamDescriptor>) {
        self.inner.write().unwrap().descriptors = descriptors;
    }

    // ========================================
    // Selection
    // ========================================

    /// Select a video track; `None` or a non-positive id means "auto"
    pub fn select_video_track(&self, id: Option<i64>) {
        match normalize_id(id) {
            Some(id) => self.gateway.set_property_int(props::VIDEO_TRACK, id),
            None => self.gateway.set_property_string(props::VIDEO_TRACK, "auto"),
        }
        let mut inner = self.inner.write().unwrap();
        inner.selected_video = normalize_id(id);
    }

    /// Select an audio track; `None` or a non-positive id means "auto"
    pub fn select_audio_track(&self, id: Option<i64>) {
        match normalize_id(id) {
            Some(id) => self.gateway.set_property_int(props::AUDIO_TRACK, id),
            None => self.gateway.set_property_string(props::AUDIO_TRACK, "auto"),
        }
        let mut inner = self.inner.write().unwrap();
        inner.selected_audio = normalize_id(id);
    }

    /// Select a subtitle track; `None` or a non-positive id disables
    /// subtitles (and hides them - visibility is a separate flag that is
    /// kept in step here)
    pub fn select_subtitle_track(&self, id: Option<i64>) {
        match normalize_id(id) {
            Some(id) => {
                self.gateway.set_property_int(props::SUBTITLE_TRACK, id);
                self.gateway.set_property_bool(props::SUBTITLE_VISIBILITY, true);
            }
            None => {
                self.gateway.set_property_string(props::SUBTITLE_TRACK, "no");
                self.gateway
                    .set_property_bool(props::SUBTITLE_VISIBILITY, false);
            }
        }
        let mut inner = self.inner.write().unwrap();
        inner.selected_subtitle = normalize_id(id);
    }

    /// Select a secondary subtitle track; `None` disables it
    pub fn select_secondary_subtitle_track(&self, id: Option<i64>) {
        match normalize_id(id) {
            Some(id) => {
                self.gateway
                    .set_property_int(props::SECONDARY_SUBTITLE_TRACK, id);
                self.gateway
                    .set_property_bool(props::SECONDARY_SUBTITLE_VISIBILITY, true);
            }
            None => {
                self.gateway
                    .set_property_string(props::SECONDARY_SUBTITLE_TRACK, "no");
                self.gateway
                    .set_property_bool(props::SECONDARY_SUBTITLE_VISIBILITY, false);
            }
        }
        let mut inner = self.inner.write().unwrap();
        inner.selected_secondary_subtitle = normalize_id(id);
    }

    /// Flip subtitle visibility without changing the selected id
    pub fn toggle_subtitle_visibility(&self) {
        let visible = self.gateway.get_property_bool(props::SUBTITLE_VISIBILITY);
        self.gateway
            .set_property_bool(props::SUBTITLE_VISIBILITY, !visible);
    }

    /// Load an external subtitle file and refresh the catalog
    pub fn add_external_subtitle(
        &self,
        path: &str,
        title: Option<&str>,
        language: Option<&str>,
        select: bool,
    ) {
        let flag = if select { "select" } else { "auto" };
        let title = title.unwrap_or("");
        let language = language.unwrap_or("");
        if self
            .gateway
            .execute_command(&["sub-add", path, flag, title, language])
            .is_err()
        {
            warn!("External subtitle load failed: {}", path);
            return;
        }
        self.refresh();
    }

    /// Unload an external subtitle track and refresh the catalog
    pub fn remove_external_subtitle(&self, id: i64) {
        let id_arg = id.to_string();
        if self
            .gateway
            .execute_command(&["sub-remove", &id_arg])
            .is_err()
        {
            warn!("External subtitle unload failed: id {}", id);
            return;
        }
        self.refresh();
    }

    // ========================================
    // Readers
    // ========================================

    pub fn video_tracks(&self) -> Vec<Track> {
        self.inner.read().unwrap().video.clone()
    }

    pub fn audio_tracks(&self) -> Vec<Track> {
        self.inner.read().unwrap().audio.clone()
    }

    pub fn subtitle_tracks(&self) -> Vec<Track> {
        self.inner.read().unwrap().subtitle.clone()
    }

    pub fn selected_video_track(&self) -> Option<i64> {
        self.inner.read().unwrap().selected_video
    }

    pub fn selected_audio_track(&self) -> Option<i64> {
        self.inner.read().unwrap().selected_audio
    }

    pub fn selected_subtitle_track(&self) -> Option<i64> {
        self.inner.read().unwrap().selected_subtitle
    }

    pub fn selected_secondary_subtitle_track(&self) -> Option<i64> {
        self.inner.read().unwrap().selected_secondary_subtitle
    }

    // ========================================
    // Cross-indexing
    // ========================================
    //
    // The Nth engine track of a kind corresponds to the Nth non-external
    // descriptor of that kind. Precondition: both orderings enumerate the
    // same underlying streams in the same relative order.

    /// Map an engine track id to the external stream index
    pub fn descriptor_index_for_track(&self, kind: TrackKind, id: i64) -> Option<usize> {
        let inner = self.inner.read().unwrap();
        let tracks = inner.tracks_of(kind);
        let position = tracks.iter().position(|t| t.id == id)?;
        let indices = positional_descriptor_indices(&inner.descriptors, kind, tracks.len());
        indices.get(position).copied()
    }

    /// Map an external stream index to the engine track id
    pub fn track_id_for_descriptor_index(&self, kind: TrackKind, index: usize) -> Option<i64> {
        let inner = self.inner.read().unwrap();
        let tracks = inner.tracks_of(kind);
        let indices = positional_descriptor_indices(&inner.descriptors, kind, tracks.len());
        let position = indices.iter().position(|i| *i == index)?;
        tracks.get(position).map(|t| t.id)
    }
}

impl CatalogInner {
    fn tracks_of(&self, kind: TrackKind) -> &[Track] {
        match kind {
            TrackKind::Video => &self.video,
            TrackKind::Audio => &self.audio,
            TrackKind::Subtitle => &self.subtitle,
        }
    }
}

/// Non-positive ids collapse to `None` ("auto"/"disabled")
fn normalize_id(id: Option<i64>) -> Option<i64> {
    id.filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id(Some(3)), Some(3));
        assert_eq!(normalize_id(Some(0)), None);
        assert_eq!(normalize_id(Some(-1)), None);
        assert_eq!(normalize_id(None), None);
    }
}
