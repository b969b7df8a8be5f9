//! Quickcull Core - photo culling engine
//!
//! This crate provides the non-GUI core of the Quickcull photo-culling tool:
//! folder scanning, the background priority loader with its decode pipeline
//! (including embedded-preview extraction from RAW files), the bounded LRU
//! caches the UI reads from, star ratings with filtering, and export of the
//! rated subset.
//!
//! The UI collaborator drives the engine with a path list and a current
//! position, and consumes decoded-image events; see [`loader`] for the
//! scheduling contract.

pub mod cache;
pub mod decode;
pub mod export;
pub mod loader;
pub mod rating;
pub mod scan;

pub use cache::{ImageCache, PREVIEW_CACHE_CAPACITY, THUMBNAIL_CACHE_CAPACITY};
pub use decode::{BoxSize, DecodeError, DecodedImage, FilterType};
pub use export::{ExportEngine, ExportEvent, ExportSettings, ExportSummary, ExportWorker};
pub use loader::{
    load_window, FsSource, ImageSource, LoadEvent, LoaderConfig, PriorityLoader,
};
pub use rating::{RatingFilter, RatingStore, MAX_RATING};
pub use scan::{scan_folder, ScanError};
