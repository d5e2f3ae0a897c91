//! Display/export sink abstraction
//!
//! The coordinator pushes named-track points, a formatted status block,
//! snapshot triggers and (optionally) synthesized GNSS sentences to a sink.
//! What the sink does with them (plotting, logging, forwarding to another
//! serial port) is not the coordinator's concern.

use crate::core::types::{GeoPoint, Track};
use std::sync::{Arc, Mutex};

/// Consumer of display and export data
pub trait Sink: Send {
    /// Append one point to a named track
    fn update_track(&mut self, track: Track, latitude: f64, longitude: f64);

    /// Replace a track's contents wholesale
    fn replace_track(&mut self, track: Track, points: &[GeoPoint]);

    /// Show the current status text block
    fn status_text(&mut self, text: &str);

    /// Ask the display to persist a snapshot
    fn snapshot(&mut self);

    /// Forward synthesized GNSS sentences downstream
    fn gnss_sentences(&mut self, sentences: &str);
}

/// Sink that discards everything (headless operation, tests)
pub struct NullSink;

impl Sink for NullSink {
    fn update_track(&mut self, _track: Track, _latitude: f64, _longitude: f64) {}
    fn replace_track(&mut self, _track: Track, _points: &[GeoPoint]) {}
    fn status_text(&mut self, _text: &str) {}
    fn snapshot(&mut self) {}
    fn gnss_sentences(&mut self, _sentences: &str) {}
}

#[derive(Default)]
struct RecordingState {
    track_points: Vec<(Track, f64, f64)>,
    statuses: Vec<String>,
    snapshots: usize,
    gnss: Vec<String>,
}

/// Sink that records everything it receives; clones share state, so a
/// held clone can inspect what the coordinator produced
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_points(&self, track: Track) -> Vec<(f64, f64)> {
        self.lock()
            .track_points
            .iter()
            .filter(|(t, _, _)| *t == track)
            .map(|(_, lat, lon)| (*lat, *lon))
            .collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.lock().statuses.clone()
    }

    pub fn snapshot_count(&self) -> usize {
        self.lock().snapshots
    }

    pub fn gnss_output(&self) -> Vec<String> {
        self.lock().gnss.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sink for RecordingSink {
    fn update_track(&mut self, track: Track, latitude: f64, longitude: f64) {
        self.lock().track_points.push((track, latitude, longitude));
    }

    fn replace_track(&mut self, track: Track, points: &[GeoPoint]) {
        let mut state = self.lock();
        state.track_points.retain(|(t, _, _)| *t != track);
        for p in points {
            state.track_points.push((track, p.latitude, p.longitude));
        }
    }

    fn status_text(&mut self, text: &str) {
        self.lock().statuses.push(text.to_string());
    }

    fn snapshot(&mut self) {
        self.lock().snapshots += 1;
    }

    fn gnss_sentences(&mut self, sentences: &str) {
        self.lock().gnss.push(sentences.to_string());
    }
}
