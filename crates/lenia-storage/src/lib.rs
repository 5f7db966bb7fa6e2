//! Frame persistence for Lenia runs: per-generation JSON files and an
//! asynchronous FIFO pipeline that moves sink work off the simulation thread.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, mpsc},
    thread,
};

use lenia_core::{FrameRecord, FrameSink, Generation, ParameterSet, Position, RunResult, SinkError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Axis names used for the first four lattice axes in frame files.
pub const AXIS_NAMES: [&str; 4] = ["x", "y", "z", "w"];

/// File name of the run summary written next to the frames.
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Storage error wrapper.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame files support 2 to 4 axes, got {0}")]
    UnsupportedDimension(usize),
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("storage worker error: {0}")]
    Worker(String),
}

impl From<StorageError> for SinkError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(io) => SinkError::Io(io),
            StorageError::Worker(msg) => SinkError::Closed(msg),
            other => SinkError::Encode(other.to_string()),
        }
    }
}

/// One alive cell as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<i32>,
    pub value: f32,
}

impl CellRecord {
    fn from_cell<const D: usize>(pos: Position<D>, value: f32) -> Result<Self, StorageError> {
        if !(2..=AXIS_NAMES.len()).contains(&D) {
            return Err(StorageError::UnsupportedDimension(D));
        }
        let c = pos.coords();
        Ok(Self {
            x: c[0],
            y: c[1],
            z: c.get(2).copied(),
            w: c.get(3).copied(),
            value,
        })
    }

    fn to_cell<const D: usize>(self) -> Result<(Position<D>, f32), StorageError> {
        if !(2..=AXIS_NAMES.len()).contains(&D) {
            return Err(StorageError::UnsupportedDimension(D));
        }
        let axes = [Some(self.x), Some(self.y), self.z, self.w];
        if axes[D..].iter().any(Option::is_some) {
            return Err(StorageError::Malformed(format!(
                "cell has more than {D} axes"
            )));
        }
        let mut coords = [0_i32; D];
        for (axis, slot) in coords.iter_mut().enumerate() {
            *slot = axes[axis].ok_or_else(|| {
                StorageError::Malformed(format!("cell is missing axis {}", AXIS_NAMES[axis]))
            })?;
        }
        Ok((Position(coords), self.value))
    }
}

/// On-disk layout of a single frame file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDocument {
    #[serde(default)]
    pub generation: u32,
    pub cells: Vec<CellRecord>,
}

impl FrameDocument {
    pub fn from_frame<const D: usize>(frame: &FrameRecord<D>) -> Result<Self, StorageError> {
        let cells = frame
            .cells
            .iter()
            .map(|&(pos, value)| CellRecord::from_cell(pos, value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            generation: frame.generation.0,
            cells,
        })
    }

    pub fn into_frame<const D: usize>(self) -> Result<FrameRecord<D>, StorageError> {
        let cells = self
            .cells
            .into_iter()
            .map(CellRecord::to_cell::<D>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FrameRecord {
            generation: Generation(self.generation),
            cells,
        })
    }
}

/// Writes each frame to `<dir>/frame_<generation>.json`.
#[derive(Debug)]
pub struct JsonFrameWriter {
    dir: PathBuf,
    pretty: bool,
    written: u32,
}

impl JsonFrameWriter {
    /// Create the writer, creating `dir` if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            pretty: false,
            written: 0,
        })
    }

    /// Indent frame files for reading by hand.
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames written so far.
    #[must_use]
    pub const fn written(&self) -> u32 {
        self.written
    }

    #[must_use]
    pub fn frame_path(&self, generation: Generation) -> PathBuf {
        frame_path(&self.dir, generation)
    }

    fn write<const D: usize>(&mut self, frame: &FrameRecord<D>) -> Result<(), StorageError> {
        let document = FrameDocument::from_frame(frame)?;
        let path = self.frame_path(frame.generation);
        let mut out = BufWriter::new(File::create(&path)?);
        if self.pretty {
            serde_json::to_writer_pretty(&mut out, &document)?;
        } else {
            serde_json::to_writer(&mut out, &document)?;
        }
        out.flush()?;
        self.written += 1;
        debug!(
            generation = frame.generation.0,
            cells = frame.cells.len(),
            path = %path.display(),
            "frame written"
        );
        Ok(())
    }
}

impl<const D: usize> FrameSink<D> for JsonFrameWriter {
    fn on_frame(&mut self, frame: &FrameRecord<D>) -> Result<(), SinkError> {
        self.write(frame).map_err(SinkError::from)
    }
}

/// Path of the frame file for `generation` inside `dir`.
#[must_use]
pub fn frame_path(dir: &Path, generation: Generation) -> PathBuf {
    dir.join(format!("frame_{}.json", generation.0))
}

/// Load a frame file written by [`JsonFrameWriter`].
pub fn read_frame<const D: usize>(path: impl AsRef<Path>) -> Result<FrameRecord<D>, StorageError> {
    let reader = BufReader::new(File::open(path)?);
    let document: FrameDocument = serde_json::from_reader(reader)?;
    document.into_frame()
}

/// Outcome of a run as archived next to its frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub dimension: usize,
    pub result: RunResult,
    pub parameters: ParameterSet,
}

/// Write `run_summary.json` into `dir` and return its path.
pub fn write_run_summary(
    dir: impl AsRef<Path>,
    summary: &RunSummary,
) -> Result<PathBuf, StorageError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(SUMMARY_FILE);
    let mut out = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut out, summary)?;
    out.flush()?;
    Ok(path)
}

pub fn read_run_summary(path: impl AsRef<Path>) -> Result<RunSummary, StorageError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

enum PipelineCommand<const D: usize> {
    Frame(FrameRecord<D>),
    Finish,
    Shutdown,
}

type ErrorSlot = Arc<Mutex<Option<SinkError>>>;

fn record_error(slot: &ErrorSlot, err: SinkError) {
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.is_none() {
        *guard = Some(err);
    }
}

/// Asynchronous FIFO frame sink.
///
/// Frames are cloned onto a channel and handed to the inner sink by a worker
/// thread in the order they were sent. The first inner error stops further
/// writes and is returned by the next [`FrameSink::on_frame`] or by
/// [`FrameSink::finish`]. `finish` drains the queue and joins the worker.
pub struct FramePipeline<const D: usize> {
    tx: mpsc::Sender<PipelineCommand<D>>,
    error: ErrorSlot,
    handle: Option<thread::JoinHandle<()>>,
    failed: bool,
}

impl<const D: usize> FramePipeline<D> {
    /// Move `inner` onto a dedicated worker thread.
    pub fn spawn<S>(inner: S) -> Result<Self, StorageError>
    where
        S: FrameSink<D> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<PipelineCommand<D>>();
        let error: ErrorSlot = Arc::new(Mutex::new(None));
        let worker_error = Arc::clone(&error);
        let handle = thread::Builder::new()
            .name("lenia-frame-worker".into())
            .spawn(move || {
                let mut inner = inner;
                let mut failed = false;
                while let Ok(command) = rx.recv() {
                    match command {
                        PipelineCommand::Frame(frame) => {
                            if failed {
                                continue;
                            }
                            if let Err(err) = inner.on_frame(&frame) {
                                warn!(
                                    generation = frame.generation.0,
                                    error = %err,
                                    "frame sink worker failed"
                                );
                                failed = true;
                                record_error(&worker_error, err);
                            }
                        }
                        PipelineCommand::Finish => {
                            if !failed && let Err(err) = inner.finish() {
                                warn!(error = %err, "frame sink worker failed to finish");
                                record_error(&worker_error, err);
                            }
                            break;
                        }
                        PipelineCommand::Shutdown => {
                            if !failed && let Err(err) = inner.finish() {
                                warn!(error = %err, "frame sink worker failed during shutdown");
                            }
                            break;
                        }
                    }
                }
            })
            .map_err(|err| {
                StorageError::Worker(format!("failed to spawn frame worker thread: {err}"))
            })?;

        Ok(Self {
            tx,
            error,
            handle: Some(handle),
            failed: false,
        })
    }

    fn take_error(&self) -> Option<SinkError> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn join(&mut self) -> Result<(), SinkError> {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            return Err(SinkError::Closed("frame worker thread panicked".to_string()));
        }
        Ok(())
    }
}

impl<const D: usize> FrameSink<D> for FramePipeline<D> {
    fn on_frame(&mut self, frame: &FrameRecord<D>) -> Result<(), SinkError> {
        if self.handle.is_none() || self.failed {
            return Err(SinkError::Closed("frame pipeline already closed".to_string()));
        }
        if let Some(err) = self.take_error() {
            self.failed = true;
            return Err(err);
        }
        self.tx
            .send(PipelineCommand::Frame(frame.clone()))
            .map_err(|_| SinkError::Closed("frame worker channel closed".to_string()))
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if self.handle.is_none() {
            return Ok(());
        }
        // A send failure means the worker is gone; the join below reports why.
        let _ = self.tx.send(PipelineCommand::Finish);
        self.join()?;
        match self.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<const D: usize> Drop for FramePipeline<D> {
    fn drop(&mut self) {
        let _ = self.tx.send(PipelineCommand::Shutdown);
        if let Err(err) = self.join() {
            warn!(error = %err, "frame worker did not shut down cleanly");
        }
    }
}
