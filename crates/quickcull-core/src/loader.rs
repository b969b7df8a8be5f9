//! Background priority loader feeding the filmstrip and preview pane.
//!
//! A single worker thread decodes speculatively around the user's current
//! position so that scrolling through hundreds of frames stays responsive.
//! Each pass runs in strict priority order:
//!
//! 1. Preview for the current position (what the user is looking at)
//! 2. Preview for the next position (the likely next keypress)
//! 3. Thumbnails for the sliding window around the position
//!
//! The thumbnail sweep is preemptible between every item: the instant the
//! position moves or the path list changes, the stale window is abandoned
//! and the pass restarts from the new state. Finishing a window the user has
//! scrolled away from is wasted work, and worse, it delays the frames they
//! can actually see.
//!
//! All shared state lives in one mutex-protected struct with a condition
//! variable for wakeups; the worker sleeps when no update is pending. Decoded
//! frames flow back to the UI thread over an mpsc channel, fire-and-forget.

use std::collections::HashSet;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use crate::decode::{self, BoxSize, DecodedImage, FilterType, PREVIEW_FILTER, THUMBNAIL_FILTER};

/// Decoded-image events delivered to the UI thread.
///
/// A path may be announced more than once across passes (for example after
/// the preview box changes), but at most once per slot within a pass.
#[derive(Debug)]
pub enum LoadEvent {
    /// A filmstrip thumbnail finished decoding.
    ThumbnailReady { path: PathBuf, image: DecodedImage },
    /// A viewing-pane preview finished decoding.
    PreviewReady { path: PathBuf, image: DecodedImage },
}

/// Source of decoded frames - the seam between scheduling and decoding.
///
/// Failures surface as `None`: the loader treats a missing frame as a
/// skipped slot, never as a reason to stop the pass.
pub trait ImageSource: Send + Sync {
    /// Decode `path` scaled proportionally into `max_box`.
    fn decode_to_box(
        &self,
        path: &Path,
        max_box: BoxSize,
        filter: FilterType,
    ) -> Option<DecodedImage>;

    /// Decode `path` at native resolution (zoom path, no scaling).
    fn decode_full(&self, path: &Path) -> Option<DecodedImage>;
}

/// Filesystem-backed source using the decode pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl ImageSource for FsSource {
    fn decode_to_box(
        &self,
        path: &Path,
        max_box: BoxSize,
        filter: FilterType,
    ) -> Option<DecodedImage> {
        match decode::decode_to_box(path, max_box, filter) {
            Ok(image) => Some(image),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "decode failed");
                None
            }
        }
    }

    fn decode_full(&self, path: &Path) -> Option<DecodedImage> {
        match decode::decode_full(path) {
            Ok(image) => Some(image),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "full decode failed");
                None
            }
        }
    }
}

/// Loader configuration: resolution tiers and prefetch window shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Bounding box for filmstrip thumbnails.
    pub thumbnail_box: BoxSize,
    /// Bounding box for viewing-pane previews (runtime reconfigurable).
    pub preview_box: BoxSize,
    /// Thumbnail slots prefetched behind the current position.
    pub window_back: usize,
    /// Thumbnail slots prefetched ahead of the current position.
    pub window_front: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            thumbnail_box: BoxSize::new(160, 120),
            preview_box: BoxSize::new(720, 720),
            window_back: 15,
            window_front: 30,
        }
    }
}

/// The index window eligible for thumbnail prefetch around `index`:
/// `[index - back, index + front]`, clipped to `[0, len)`.
pub fn load_window(index: usize, len: usize, back: usize, front: usize) -> Range<usize> {
    let start = index.saturating_sub(back).min(len);
    let end = index.saturating_add(front).saturating_add(1).min(len);
    start..end.max(start)
}

/// Shared mutable state between the UI-facing handle and the worker.
struct LoaderState {
    paths: Arc<Vec<PathBuf>>,
    current_index: usize,
    preview_box: BoxSize,
    /// Thumbnail decodes already attempted for the current path list.
    loaded: HashSet<PathBuf>,
    needs_update: bool,
    running: bool,
}

struct Shared {
    state: Mutex<LoaderState>,
    wake: Condvar,
}

/// Handle to the background loading thread.
///
/// Dropping the handle stops the worker; `stop` does the same explicitly and
/// blocks until the thread has exited.
pub struct PriorityLoader {
    shared: Arc<Shared>,
    source: Arc<dyn ImageSource>,
    worker: Option<JoinHandle<()>>,
}

impl PriorityLoader {
    /// Start the worker thread and return the handle plus the event channel.
    pub fn spawn(source: Arc<dyn ImageSource>, config: LoaderConfig) -> (Self, Receiver<LoadEvent>) {
        let (events, receiver) = mpsc::channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(LoaderState {
                paths: Arc::new(Vec::new()),
                current_index: 0,
                preview_box: config.preview_box,
                loaded: HashSet::new(),
                needs_update: false,
                running: true,
            }),
            wake: Condvar::new(),
        });

        let worker = Worker {
            shared: Arc::clone(&shared),
            source: Arc::clone(&source),
            events,
            thumbnail_box: config.thumbnail_box,
            window_back: config.window_back,
            window_front: config.window_front,
        };
        let handle = thread::spawn(move || worker.run());

        (
            Self {
                shared,
                source,
                worker: Some(handle),
            },
            receiver,
        )
    }

    /// Replace the path list (folder change). Resets the position to 0 and
    /// forgets which thumbnails were already produced.
    pub fn set_paths(&self, paths: Vec<PathBuf>) {
        let mut state = self.lock_state();
        state.paths = Arc::new(paths);
        state.loaded.clear();
        state.current_index = 0;
        state.needs_update = true;
        self.shared.wake.notify_one();
    }

    /// Record that the user moved to `index`. Never blocks; the worker picks
    /// the change up at its next preemption check.
    pub fn update_position(&self, index: usize) {
        let mut state = self.lock_state();
        state.current_index = index;
        state.needs_update = true;
        self.shared.wake.notify_one();
    }

    /// Change the preview bounding box, triggering a redecode of the
    /// currently-viewed frame. A no-op if the box is unchanged.
    pub fn set_preview_box(&self, preview_box: BoxSize) {
        let mut state = self.lock_state();
        if state.preview_box == preview_box {
            return;
        }
        state.preview_box = preview_box;
        state.needs_update = true;
        self.shared.wake.notify_one();
    }

    /// Synchronous full-resolution decode for zoom.
    ///
    /// Runs on the calling thread, bypasses the priority queue, and touches
    /// no cache or window state.
    pub fn get_full_resolution(&self, path: &Path) -> Option<DecodedImage> {
        self.source.decode_full(path)
    }

    /// Stop the worker and block until it has exited. No background work
    /// survives this call returning.
    pub fn stop(&mut self) {
        {
            let mut state = self.lock_state();
            state.running = false;
            self.shared.wake.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        self.shared.state.lock().unwrap()
    }
}

impl Drop for PriorityLoader {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Claim {
    Decode,
    AlreadyLoaded,
    Abort,
}

struct Worker {
    shared: Arc<Shared>,
    source: Arc<dyn ImageSource>,
    events: Sender<LoadEvent>,
    thumbnail_box: BoxSize,
    window_back: usize,
    window_front: usize,
}

impl Worker {
    fn run(self) {
        while let Some((paths, index, preview_box)) = self.next_snapshot() {
            self.run_pass(&paths, index, preview_box);
        }
        tracing::debug!("loader worker exiting");
    }

    /// Sleep until an update is pending, then snapshot the state to work
    /// against. Returns `None` on shutdown.
    fn next_snapshot(&self) -> Option<(Arc<Vec<PathBuf>>, usize, BoxSize)> {
        let mut state = self.shared.state.lock().unwrap();
        while state.running && !state.needs_update {
            state = self.shared.wake.wait(state).unwrap();
        }
        if !state.running {
            return None;
        }
        state.needs_update = false;
        Some((Arc::clone(&state.paths), state.current_index, state.preview_box))
    }

    /// One pass over the priority order for a snapshotted position.
    fn run_pass(&self, paths: &[PathBuf], index: usize, preview_box: BoxSize) {
        if paths.is_empty() {
            return;
        }

        // 1. What the user is looking at right now
        if let Some(path) = paths.get(index) {
            self.emit_preview(path, preview_box);
        }

        // 2. The likely next frame
        if let Some(path) = paths.get(index + 1) {
            self.emit_preview(path, preview_box);
        }

        // 3. Window thumbnails, preemptible between every item
        for i in load_window(index, paths.len(), self.window_back, self.window_front) {
            let path = &paths[i];
            match self.claim_thumbnail(path) {
                Claim::Abort => return,
                Claim::AlreadyLoaded => continue,
                Claim::Decode => {}
            }
            if let Some(image) = self
                .source
                .decode_to_box(path, self.thumbnail_box, THUMBNAIL_FILTER)
            {
                let _ = self.events.send(LoadEvent::ThumbnailReady {
                    path: path.clone(),
                    image,
                });
            }
        }
    }

    /// Decide what to do with a window slot. Claiming marks the path as
    /// attempted so failed decodes are not retried every pass.
    fn claim_thumbnail(&self, path: &Path) -> Claim {
        let mut state = self.shared.state.lock().unwrap();
        if !state.running || state.needs_update {
            return Claim::Abort;
        }
        if state.loaded.insert(path.to_path_buf()) {
            Claim::Decode
        } else {
            Claim::AlreadyLoaded
        }
    }

    fn emit_preview(&self, path: &Path, preview_box: BoxSize) {
        if let Some(image) = self.source.decode_to_box(path, preview_box, PREVIEW_FILTER) {
            let _ = self.events.send(LoadEvent::PreviewReady {
                path: path.to_path_buf(),
                image,
            });
        }
    }
}
