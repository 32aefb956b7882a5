//! Track model and inventory parsing
//!
//! Tracks are parsed from the engine's JSON track inventory. The catalog is
//! replaced wholesale on each refresh; malformed records are skipped and a
//! malformed payload yields an empty inventory rather than an error.

pub mod catalog;

pub use catalog::TrackCatalog;

use serde_json::Value;
use tracing::warn;

/// Media type of a track (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
}

impl TrackKind {
    /// Parse the engine's type tag ("video" / "audio" / "sub")
    pub fn from_engine_str(s: &str) -> Option<Self> {
        match s {
            "video" => Some(TrackKind::Video),
            "audio" => Some(TrackKind::Audio),
            "sub" => Some(TrackKind::Subtitle),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Type-specific track attributes
#[derive(Debug, Clone, PartialEq)]
pub enum TrackDetail {
    Video {
        width: i64,
        height: i64,
        fps: f64,
    },
    Audio {
        channels: i64,
        sample_rate: i64,
    },
    Subtitle {
        /// Loaded from an external file rather than the media container
        external: bool,
        /// Source path for external subtitles
        path: Option<String>,
    },
}

/// One selectable elementary stream within a media item
///
/// The id is unique within its type-scope, not globally.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: i64,
    pub kind: TrackKind,
    pub title: Option<String>,
    pub language: Option<String>,
    pub codec: Option<String>,
    pub is_default: bool,
    pub is_forced: bool,
    pub is_selected: bool,
    pub detail: TrackDetail,
}

impl Track {
    /// Human-readable label: title, falling back to language, then codec
    pub fn display_title(&self) -> String {
        if let Some(title) = &self.title {
            if !title.is_empty() {
                return title.clone();
            }
        }
        if let Some(lang) = &self.language {
            if !lang.is_empty() {
                return lang.clone();
            }
        }
        match &self.codec {
            Some(codec) if !codec.is_empty() => codec.clone(),
            _ => format!("{} {}", self.kind, self.id),
        }
    }
}

/// Externally supplied stream descriptor used for cross-indexing
///
/// The descriptor list comes from application-level metadata, not from the
/// engine; `index` is the application's stream index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub kind: TrackKind,
    pub is_external: bool,
    pub index: usize,
}

/// Parse the engine's track inventory JSON into per-kind sequences
///
/// Engine-reported order is preserved within each kind. Returns empty
/// sequences on malformed or missing payload.
pub(crate) fn parse_track_list(json: &str) -> (Vec<Track>, Vec<Track>, Vec<Track>) {
    let mut video = Vec::new();
    let mut audio = Vec::new();
    let mut subtitle = Vec::new();

    let parsed: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed track inventory: {}", e);
            return (video, audio, subtitle);
        }
    };

    let Some(records) = parsed.as_array() else {
        warn!("Track inventory is not an array");
        return (video, audio, subtitle);
    };

    for record in records {
        match parse_track(record) {
            Some(track) => match track.kind {
                TrackKind::Video => video.push(track),
                TrackKind::Audio => audio.push(track),
                TrackKind::Subtitle => subtitle.push(track),
            },
            None => warn!("Skipping unparseable track record: {}", record),
        }
    }

    (video, audio, subtitle)
}

/// Parse one inventory record; `None` when id or type is missing/unknown
fn parse_track(record: &Value) -> Option<Track> {
    let id = record.get("id")?.as_i64()?;
    let kind = TrackKind::from_engine_str(record.get("type")?.as_str()?)?;

    let detail = match kind {
        TrackKind::Video => TrackDetail::Video {
            width: field_i64(record, "demux-w"),
            height: field_i64(record, "demux-h"),
            fps: record
                .get("demux-fps")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        },
        TrackKind::Audio => TrackDetail::Audio {
            channels: field_i64(record, "demux-channel-count"),
            sample_rate: field_i64(record, "demux-samplerate"),
        },
        TrackKind::Subtitle => TrackDetail::Subtitle {
            external: field_bool(record, "external"),
            path: field_string(record, "external-filename"),
        },
    };

    Some(Track {
        id,
        kind,
        title: field_string(record, "title"),
        language: field_string(record, "lang"),
        codec: field_string(record, "codec"),
        is_default: field_bool(record, "default"),
        is_forced: field_bool(record, "forced"),
        is_selected: field_bool(record, "selected"),
        detail,
    })
}

fn field_string(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn field_bool(record: &Value, key: &str) -> bool {
    record.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn field_i64(record: &Value, key: &str) -> i64 {
    record.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Positional cross-index between the engine's per-kind track order and the
/// non-external entries of the descriptor list
///
/// The Nth engine track (inventory order) corresponds to the Nth
/// non-external descriptor (descriptor order) of the same kind. Both
/// orderings must enumerate the same underlying streams in the same
/// relative order; this is a hard precondition on the caller. A count
/// mismatch is logged and the mapping proceeds over the shorter prefix.
pub(crate) fn positional_descriptor_indices(
    descriptors: &[StreamDescriptor],
    kind: TrackKind,
    native_count: usize,
) -> Vec<usize> {
    let positions: Vec<usize> = descriptors
        .iter()
        .filter(|d| d.kind == kind && !d.is_external)
        .map(|d| d.index)
        .collect();

    if !positions.is_empty() && positions.len() != native_count {
        warn!(
            "{} descriptor count ({}) does not match engine track count ({}); \
             cross-index limited to the shorter prefix",
            kind,
            positions.len(),
            native_count
        );
    }

    positions
}
