//! Chapter catalog and navigation
//!
//! Chapters are parsed from the engine's inventory into one atomic snapshot
//! (ordered by ascending start time) together with the current chapter
//! index. The index domain is [-1, count-1]; -1 means unknown/none.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use vpb_common::events::{EventBus, PlayerEvent};
use vpb_common::time::secs_to_duration;

use crate::engine::gateway::EngineGateway;
use crate::engine::protocol::props;

/// One chapter of the current media item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Zero-based index within the catalog
    pub index: usize,
    /// Engine-reported title; possibly empty
    pub title: String,
    /// Start time from the beginning of the item
    pub start: Duration,
}

impl Chapter {
    /// Display label, falling back to "Chapter N" for untitled chapters
    pub fn display_title(&self) -> String {
        if self.title.is_empty() {
            format!("Chapter {}", self.index + 1)
        } else {
            self.title.clone()
        }
    }
}

/// Parse the engine's chapter inventory JSON
///
/// Records are `{title?, time}`; unparseable payloads and records without a
/// time yield an empty / shortened list. The result is sorted by ascending
/// start time and re-indexed.
pub(crate) fn parse_chapter_list(json: &str) -> Vec<Chapter> {
    let parsed: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed chapter inventory: {}", e);
            return Vec::new();
        }
    };

    let Some(records) = parsed.as_array() else {
        warn!("Chapter inventory is not an array");
        return Vec::new();
    };

    let mut chapters: Vec<Chapter> = records
        .iter()
        .filter_map(|record| {
            let time = record.get("time")?.as_f64()?;
            let title = record
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            Some(Chapter {
                index: 0,
                title,
                start: secs_to_duration(time),
            })
        })
        .collect();

    chapters.sort_by_key(|c| c.start);
    for (index, chapter) in chapters.iter_mut().enumerate() {
        chapter.index = index;
    }
    chapters
}

/// Resolve the last chapter whose start time is <= `t`
///
/// `None` when `t` precedes the first chapter's start (or there are no
/// chapters).
pub(crate) fn resolve_chapter_at(chapters: &[Chapter], t: Duration) -> Option<usize> {
    let mut result = None;
    for chapter in chapters {
        if chapter.start <= t {
            result = Some(chapter.index);
        } else {
            break;
        }
    }
    result
}

#[derive(Debug, Default)]
struct ChapterInner {
    chapters: Vec<Chapter>,
    /// Domain [-1, count-1]; -1 means unknown/none
    current: i64,
}

/// Authoritative snapshot of the engine's chapter inventory
pub struct ChapterCatalog {
    gateway: Arc<EngineGateway>,
    events: EventBus,
    inner: RwLock<ChapterInner>,
}

impl ChapterCatalog {
    pub fn new(gateway: Arc<EngineGateway>, events: EventBus) -> Self {
        Self {
            gateway,
            events,
            inner: RwLock::new(ChapterInner {
                chapters: Vec::new(),
                current: -1,
            }),
        }
    }

    /// Re-read the inventory and the current index as one atomic snapshot
    ///
    /// Empty or unparseable payload yields an empty catalog with index -1.
    pub fn refresh(&self) {
        let chapters = match self.gateway.get_property_string(props::CHAPTER_LIST) {
            Some(json) => parse_chapter_list(&json),
            None => {
                debug!("Chapter inventory unavailable; catalog empty");
                Vec::new()
            }
        };

        let current = if chapters.is_empty() {
            -1
        } else {
            clamp_index(self.gateway.get_property_int(props::CHAPTER), chapters.len())
        };

        let changed = {
            let mut inner = self.inner.write().unwrap();
            let changed = inner.current != current;
            inner.chapters = chapters;
            inner.current = current;
            changed
        };

        if changed {
            self.emit_current(current);
        }
    }

    /// Re-read only the index property and republish if it changed
    ///
    /// Cheaper than a full refresh; used by polling-driven updates.
    pub fn update_current_chapter(&self) {
        let current = {
            let inner = self.inner.read().unwrap();
            if inner.chapters.is_empty() {
                return;
            }
            clamp_index(
                self.gateway.get_property_int(props::CHAPTER),
                inner.chapters.len(),
            )
        };

        let changed = {
            let mut inner = self.inner.write().unwrap();
            if inner.current == current {
                false
            } else {
                inner.current = current;
                true
            }
        };

        if changed {
            self.emit_current(current);
        }
    }

    /// Reset to the empty catalog with index -1
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.chapters.clear();
        inner.current = -1;
    }

    /// Seek to a chapter by index
    ///
    /// Returns false without side effects for out-of-range input; on success
    /// the local index is updated optimistically.
    pub fn seek_to_chapter(&self, index: usize) -> bool {
        {
            let inner = self.inner.read().unwrap();
            if index >= inner.chapters.len() {
                return false;
            }
        }

        self.gateway.set_property_int(props::CHAPTER, index as i64);

        let changed = {
            let mut inner = self.inner.write().unwrap();
            let changed = inner.current != index as i64;
            inner.current = index as i64;
            changed
        };
        if changed {
            self.emit_current(index as i64);
        }
        true
    }

    /// Whether a chapter follows the current one
    pub fn has_next_chapter(&self) -> bool {
        let inner = self.inner.read().unwrap();
        !inner.chapters.is_empty() && inner.current < inner.chapters.len() as i64 - 1
    }

    /// Whether a chapter precedes the current one
    pub fn has_previous_chapter(&self) -> bool {
        let inner = self.inner.read().unwrap();
        !inner.chapters.is_empty() && inner.current > 0
    }

    /// Step to the next chapter; the index is left to the next refresh
    pub fn next_chapter(&self) -> bool {
        if !self.has_next_chapter() {
            return false;
        }
        self.gateway
            .execute_command(&["add", props::CHAPTER, "1"])
            .is_ok()
    }

    /// Step to the previous chapter; the index is left to the next refresh
    pub fn previous_chapter(&self) -> bool {
        if !self.has_previous_chapter() {
            return false;
        }
        self.gateway
            .execute_command(&["add", props::CHAPTER, "-1"])
            .is_ok()
    }

    /// The chapter containing position `t`, if any
    pub fn chapter_at_time(&self, t: Duration) -> Option<Chapter> {
        let inner = self.inner.read().unwrap();
        resolve_chapter_at(&inner.chapters, t).map(|i| inner.chapters[i].clone())
    }

    /// Seek to the chapter containing position `t`
    ///
    /// Returns false when `t` precedes the first chapter's start.
    pub fn seek_to_chapter_at_time(&self, t: Duration) -> bool {
        let index = {
            let inner = self.inner.read().unwrap();
            resolve_chapter_at(&inner.chapters, t)
        };
        match index {
            Some(index) => self.seek_to_chapter(index),
            None => false,
        }
    }

    pub fn chapters(&self) -> Vec<Chapter> {
        self.inner.read().unwrap().chapters.clone()
    }

    pub fn chapter_count(&self) -> usize {
        self.inner.read().unwrap().chapters.len()
    }

    /// Current chapter index; -1 when unknown/none
    pub fn current_index(&self) -> i64 {
        self.inner.read().unwrap().current
    }

    fn emit_current(&self, index: i64) {
        self.events.emit_lossy(PlayerEvent::ChapterChanged {
            index,
            timestamp: vpb_common::time::now(),
        });
    }
}

/// Clamp an engine-reported index into [-1, count-1]
fn clamp_index(index: i64, count: usize) -> i64 {
    index.clamp(-1, count as i64 - 1)
}
