//! Export of the rated subset into a destination folder.
//!
//! Copying runs on its own worker thread so the interactive thread never
//! blocks on disk. Each item is isolated: a file that cannot be produced is
//! counted and reported, and the batch moves on.
//!
//! Files can optionally be routed through an external command-line converter
//! (ImageMagick-style) for resize, recompression, and automatic correction.
//! The tool being absent from the host, or failing on a file, degrades that
//! file to an unmodified copy - an export never dies because a converter is
//! not installed.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

/// Post-processing knobs applied by the external converter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Shrink-only resize to this maximum edge, when set.
    pub resize: Option<u32>,
    /// Output JPEG quality (0-100), when set.
    pub quality: Option<u8>,
    /// Apply the converter's automatic level correction.
    pub auto_correct: bool,
}

/// How each exported file is produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportEngine {
    /// Byte-for-byte copy, metadata preserved.
    #[default]
    NoEdit,
    /// Route through an ImageMagick-style converter binary.
    ExternalTool { command: String },
}

impl ExportEngine {
    /// The conventional converter name for the host platform.
    pub fn external_default() -> Self {
        let command = if cfg!(windows) { "magick" } else { "convert" };
        Self::ExternalTool {
            command: command.to_string(),
        }
    }

    /// Produce `dest` from `src`. Returns whether a file was produced.
    pub fn apply(&self, src: &Path, dest: &Path, settings: &ExportSettings) -> bool {
        match self {
            Self::NoEdit => copy_plain(src, dest),
            Self::ExternalTool { command } => {
                if run_tool(command, src, dest, settings) {
                    true
                } else {
                    tracing::warn!(
                        src = %src.display(),
                        command,
                        "external tool unavailable or failed, copying unmodified"
                    );
                    copy_plain(src, dest)
                }
            }
        }
    }
}

fn copy_plain(src: &Path, dest: &Path) -> bool {
    match fs::copy(src, dest) {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(src = %src.display(), error = %err, "copy failed");
            false
        }
    }
}

/// Build the converter argument list for one file.
fn tool_args(src: &Path, dest: &Path, settings: &ExportSettings) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![src.as_os_str().to_os_string()];
    if let Some(max_edge) = settings.resize {
        args.push("-resize".into());
        // The trailing '>' keeps the tool from enlarging smaller frames
        args.push(format!("{max_edge}x{max_edge}>").into());
    }
    if let Some(quality) = settings.quality {
        args.push("-quality".into());
        args.push(quality.to_string().into());
    }
    if settings.auto_correct {
        args.push("-auto-level".into());
    }
    args.push(dest.as_os_str().to_os_string());
    args
}

fn run_tool(command: &str, src: &Path, dest: &Path, settings: &ExportSettings) -> bool {
    match Command::new(command)
        .args(tool_args(src, dest, settings))
        .output()
    {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            tracing::warn!(command, status = %output.status, "external tool exited with failure");
            false
        }
        Err(err) => {
            tracing::warn!(command, error = %err, "external tool could not be launched");
            false
        }
    }
}

/// Progress notifications from the export worker.
#[derive(Debug)]
pub enum ExportEvent {
    /// One file landed in the destination folder.
    Copied {
        done: usize,
        total: usize,
        path: PathBuf,
    },
    /// One file could not be produced; the batch continues.
    Failed { path: PathBuf, reason: String },
    /// The batch finished.
    Finished(ExportSummary),
}

/// Final tally of an export batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub copied: usize,
    pub failed: usize,
}

/// Handle to a running export batch.
pub struct ExportWorker {
    handle: Option<JoinHandle<ExportSummary>>,
}

impl ExportWorker {
    /// Start copying `items` into `dest_dir` on a background thread.
    ///
    /// Progress arrives on the returned channel; `wait` joins the worker and
    /// returns the summary.
    pub fn spawn(
        items: Vec<PathBuf>,
        dest_dir: PathBuf,
        engine: ExportEngine,
        settings: ExportSettings,
    ) -> (Self, Receiver<ExportEvent>) {
        let (events, receiver) = mpsc::channel();
        let handle =
            thread::spawn(move || run_export(&items, &dest_dir, &engine, &settings, &events));
        (
            Self {
                handle: Some(handle),
            },
            receiver,
        )
    }

    /// Block until the batch completes.
    pub fn wait(mut self) -> ExportSummary {
        self.handle
            .take()
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default()
    }
}

fn run_export(
    items: &[PathBuf],
    dest_dir: &Path,
    engine: &ExportEngine,
    settings: &ExportSettings,
    events: &Sender<ExportEvent>,
) -> ExportSummary {
    let total = items.len();
    let mut summary = ExportSummary::default();

    if let Err(err) = fs::create_dir_all(dest_dir) {
        tracing::warn!(dest = %dest_dir.display(), error = %err, "cannot create destination");
        for path in items {
            summary.failed += 1;
            let _ = events.send(ExportEvent::Failed {
                path: path.clone(),
                reason: err.to_string(),
            });
        }
        let _ = events.send(ExportEvent::Finished(summary));
        return summary;
    }

    for path in items {
        let Some(file_name) = path.file_name() else {
            summary.failed += 1;
            let _ = events.send(ExportEvent::Failed {
                path: path.clone(),
                reason: "path has no file name".to_string(),
            });
            continue;
        };

        let dest = dest_dir.join(file_name);
        if engine.apply(path, &dest, settings) {
            summary.copied += 1;
            let _ = events.send(ExportEvent::Copied {
                done: summary.copied,
                total,
                path: path.clone(),
            });
        } else {
            summary.failed += 1;
            let _ = events.send(ExportEvent::Failed {
                path: path.clone(),
                reason: "file could not be produced".to_string(),
            });
        }
    }

    let _ = events.send(ExportEvent::Finished(summary));
    summary
}
