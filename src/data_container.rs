//! This module defines the data structures used while scanning shot records: the reusable shot
//! buffer that traces are accumulated into, the per-shot pick result and the mute-window table
//! that collects the results of a whole stream.

use crate::io::TraceHeader;
use ndarray::{s, Array2, ArrayView2, ArrayViewMut1};
use serde::{Deserialize, Serialize};

/// Reusable buffer holding the traces of one shot.
///
/// The buffer is sized once for `nx` traces of `ntfft` samples and is cleared at the start of
/// every shot, so scanning a stream does not allocate per shot.
///
/// # Fields
/// - `data`: Trace samples with shape `(nx, ntfft)`, one row per trace in arrival order.
/// - `trace`: Scratch buffer a single trace is read into before it is stored.
/// - `receiver_x`: Scaled receiver coordinate for every stored trace.
/// - `first` / `last`: Headers of the first and the most recent trace of the shot.
#[derive(Clone, Debug)]
pub struct ShotGather {
    data: Array2<f32>,
    trace: Vec<f32>,
    receiver_x: Vec<f32>,
    nt: usize,
    first: Option<TraceHeader>,
    last: Option<TraceHeader>,
}

impl ShotGather {
    /// Creates an empty gather for at most `nx` traces of `ntfft` samples.
    pub fn new(nx: usize, ntfft: usize) -> Self {
        ShotGather {
            data: Array2::zeros((nx, ntfft)),
            trace: vec![0.0; ntfft],
            receiver_x: Vec::with_capacity(nx),
            nt: 0,
            first: None,
            last: None,
        }
    }

    /// Zeroes the samples and forgets all traces of the previous shot.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.receiver_x.clear();
        self.nt = 0;
        self.first = None;
        self.last = None;
    }

    /// Maximum number of traces.
    pub fn capacity(&self) -> usize {
        self.data.nrows()
    }

    /// Padded trace length.
    pub fn ntfft(&self) -> usize {
        self.data.ncols()
    }

    /// Number of traces stored for the current shot.
    pub fn len(&self) -> usize {
        self.receiver_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver_x.is_empty()
    }

    /// Number of live samples per trace.
    pub fn nt(&self) -> usize {
        self.nt
    }

    /// Header of the first trace of the current shot.
    pub fn first_header(&self) -> Option<&TraceHeader> {
        self.first.as_ref()
    }

    /// Header of the most recent trace of the current shot.
    pub fn last_header(&self) -> Option<&TraceHeader> {
        self.last.as_ref()
    }

    pub fn receiver_x(&self) -> &[f32] {
        &self.receiver_x
    }

    /// Scratch slice of `nt` samples the next trace is read into.
    pub fn scratch_trace(&mut self, nt: usize) -> &mut [f32] {
        &mut self.trace[..nt]
    }

    /// Stores the trace currently held in the scratch buffer as the next trace of the shot.
    ///
    /// The caller guarantees there is room for another trace and that `header.ns` fits the
    /// padded length.
    pub fn commit_trace(&mut self, header: TraceHeader) {
        let itrace = self.len();
        let nt = usize::from(header.ns);
        debug_assert!(itrace < self.capacity(), "shot buffer is full");
        debug_assert!(nt <= self.ntfft(), "trace longer than the padded length");

        let mut row: ArrayViewMut1<f32> = self.data.row_mut(itrace);
        for (dst, src) in row.iter_mut().zip(&self.trace[..nt]) {
            *dst = *src;
        }
        if self.first.is_none() {
            self.first = Some(header);
            self.nt = nt;
        }
        self.last = Some(header);
        self.receiver_x.push(header.receiver_x());
    }

    /// The stored traces, restricted to the live samples.
    pub fn traces(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![..self.len(), ..self.nt])
    }

    /// The stored traces including the zero padded tail.
    pub fn padded_traces(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![..self.len(), ..])
    }
}

/// Mute-window picks of one shot.
///
/// # Fields
/// - `shot_id`: Field record number of the shot.
/// - `source_x`, `source_z`: Scaled source position.
/// - `receiver_x`: Scaled receiver positions in arrival order.
/// - `anchor`: Index of the trace nearest to the source, where the search started.
/// - `mute_samples`: The picked sample index for every receiver.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShotWindow {
    pub shot_id: i32,
    pub source_x: f32,
    pub source_z: f32,
    pub receiver_x: Vec<f32>,
    pub anchor: usize,
    pub mute_samples: Vec<usize>,
}

impl ShotWindow {
    pub fn n_receivers(&self) -> usize {
        self.receiver_x.len()
    }

    /// Largest difference between the picks of neighbouring receivers.
    pub fn max_step(&self) -> usize {
        self.mute_samples
            .windows(2)
            .map(|w| w[0].abs_diff(w[1]))
            .max()
            .unwrap_or(0)
    }
}

/// Collects the mute windows of all shots in a stream.
///
/// The table is owned by the caller and filled in place by the picker. `nx` is the maximum
/// number of receivers per shot and fixes the width of the exported tables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MuteWindowTable {
    nx: usize,
    shots: Vec<ShotWindow>,
}

impl MuteWindowTable {
    pub fn new(nx: usize) -> Self {
        MuteWindowTable { nx, shots: vec![] }
    }

    /// Creates a table with room for `n_shots` shots.
    pub fn with_capacity(n_shots: usize, nx: usize) -> Self {
        MuteWindowTable {
            nx,
            shots: Vec::with_capacity(n_shots),
        }
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    pub fn clear(&mut self) {
        self.shots.clear();
    }

    pub fn push(&mut self, shot: ShotWindow) {
        debug_assert!(shot.n_receivers() <= self.nx, "shot wider than the table");
        self.shots.push(shot);
    }

    pub fn shots(&self) -> &[ShotWindow] {
        &self.shots
    }

    pub fn get(&self, shot: usize) -> Option<&ShotWindow> {
        self.shots.get(shot)
    }

    /// Source x coordinate of every shot.
    pub fn source_x(&self) -> Vec<f32> {
        self.shots.iter().map(|s| s.source_x).collect()
    }

    /// Source elevation of every shot.
    pub fn source_z(&self) -> Vec<f32> {
        self.shots.iter().map(|s| s.source_z).collect()
    }

    /// Number of receivers of every shot.
    pub fn receiver_counts(&self) -> Vec<usize> {
        self.shots.iter().map(|s| s.n_receivers()).collect()
    }

    /// Picks in the flat `(shot, receiver)` layout of shape `(n_shots, nx)`.
    ///
    /// Slots beyond the receiver count of a shot are set to `-1`.
    pub fn sample_table(&self) -> Array2<i32> {
        let mut table = Array2::from_elem((self.shots.len(), self.nx), -1);
        for (mut row, shot) in table.rows_mut().into_iter().zip(&self.shots) {
            for (dst, &sample) in row.iter_mut().zip(&shot.mute_samples) {
                *dst = sample as i32;
            }
        }
        table
    }

    /// Receiver coordinates in the flat `(shot, receiver)` layout, zero filled.
    pub fn receiver_table(&self) -> Array2<f32> {
        let mut table = Array2::zeros((self.shots.len(), self.nx));
        for (mut row, shot) in table.rows_mut().into_iter().zip(&self.shots) {
            for (dst, &x) in row.iter_mut().zip(&shot.receiver_x) {
                *dst = x;
            }
        }
        table
    }
}
