use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Surface, Tone};

/// One batch attempt, recorded whether or not generation succeeded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub tone: Tone,
    pub surfaces: Vec<Surface>,
}

impl HistoryEntry {
    pub fn new(tone: Tone, surfaces: Vec<Surface>) -> Self {
        Self {
            timestamp: Utc::now(),
            tone,
            surfaces,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToneCount {
    pub tone: Tone,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurfaceCount {
    pub surface: Surface,
    pub count: u64,
}

/// Ranked usage distributions, descending by count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rollup {
    pub tones: Vec<ToneCount>,
    pub surfaces: Vec<SurfaceCount>,
    /// Sum of surfaces across all entries.
    pub total_posts: u64,
}

impl Rollup {
    pub fn top_tone(&self) -> Option<Tone> {
        self.tones.first().map(|t| t.tone)
    }

    pub fn top_surface(&self) -> Option<Surface> {
        self.surfaces.first().map(|s| s.surface)
    }

    pub fn is_empty(&self) -> bool {
        self.tones.is_empty() && self.surfaces.is_empty()
    }
}

/// Entries are stored oldest first; display order is newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted records, which are kept newest first.
    pub fn from_persisted(mut newest_first: Vec<HistoryEntry>) -> Self {
        newest_first.reverse();
        Self {
            entries: newest_first,
        }
    }

    /// Records in persisted (newest first) order.
    pub fn to_persisted(&self) -> Vec<HistoryEntry> {
        self.newest_first().cloned().collect()
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Append entries given oldest first.
    pub fn extend(&mut self, chronological: impl IntoIterator<Item = HistoryEntry>) {
        self.entries.extend(chronological);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    pub fn chronological(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Tone counts are weighted by batch size; surface counts add one per
    /// entry. Counting walks newest first, and ties keep that
    /// first-encountered order, so the most recent wins a tie.
    pub fn rollup(&self) -> Rollup {
        let mut tones: Vec<ToneCount> = Vec::new();
        let mut surfaces: Vec<SurfaceCount> = Vec::new();
        let mut total_posts = 0u64;

        for entry in self.newest_first() {
            let weight = entry.surfaces.len() as u64;
            total_posts += weight;
            match tones.iter_mut().find(|t| t.tone == entry.tone) {
                Some(t) => t.count += weight,
                None => tones.push(ToneCount {
                    tone: entry.tone,
                    count: weight,
                }),
            }
            for surface in &entry.surfaces {
                match surfaces.iter_mut().find(|s| s.surface == *surface) {
                    Some(s) => s.count += 1,
                    None => surfaces.push(SurfaceCount {
                        surface: *surface,
                        count: 1,
                    }),
                }
            }
        }

        // sort_by is stable
        tones.sort_by(|a, b| b.count.cmp(&a.count));
        surfaces.sort_by(|a, b| b.count.cmp(&a.count));
        Rollup {
            tones,
            surfaces,
            total_posts,
        }
    }
}
