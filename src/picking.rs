//! Mute-window picking on shot records.
//!
//! The picker scans a stream of trace records once, groups consecutive traces with the same
//! source position and record number into shots, and picks one sample per receiver that marks
//! the arrival used to build time-domain mute windows.
//!
//! Per shot the search starts at the trace nearest to the source, where the sample of maximum
//! absolute amplitude over the whole trace is taken. From there the pick is propagated to the
//! neighbouring receivers in both directions, each time searching only `hw` samples around the
//! pick of the previous receiver. Neighbouring picks therefore never differ by more than `hw`
//! samples, which keeps the picks on one event even if a stronger, unrelated event exists
//! further away.

use crate::config::PickerSettings;
use crate::data_container::{MuteWindowTable, ShotGather, ShotWindow};
use crate::io::{TraceHeader, TraceReader};
use crate::math_tools::{argmax_abs, argmax_abs_around, nint};
use ndarray::ArrayView2;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Shot geometries for which no anchor trace can be determined.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("shot has a single trace, receiver spacing is undefined")]
    SingleTrace,

    #[error("first and last receiver are both at {0}, receiver spacing is zero")]
    ZeroSpacing(f32),
}

#[derive(Debug, thiserror::Error)]
pub enum PickError {
    #[error("input file {} has an error: {}", .path.display(), .source)]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read trace data: {0}")]
    Io(#[from] io::Error),

    #[error("invalid geometry in shot {shot}: {source}")]
    Geometry {
        shot: usize,
        #[source]
        source: GeometryError,
    },

    #[error("shot {shot} has more than {nx} traces")]
    TooManyTraces { shot: usize, nx: usize },

    #[error("trace has {ns} samples but the padded trace length is {ntfft}")]
    TraceTooLong { ns: usize, ntfft: usize },

    #[error("trace has {found} samples, expected {expected} like the first trace")]
    SampleCountMismatch { expected: usize, found: usize },

    #[error("output table holds {table} receivers per shot, picker needs {nx}")]
    TableTooNarrow { table: usize, nx: usize },

    #[error("invalid picker settings: {0}")]
    InvalidSettings(String),
}

/// Finds the trace nearest to the source on the receiver line of a shot.
///
/// The receiver spacing is taken from the first and the last receiver, the source position is
/// projected onto that grid and rounded to the nearest trace. Sources beyond either end of the
/// spread are clamped to the end trace.
pub fn anchor_trace(source_x: f32, receiver_x: &[f32]) -> Result<usize, GeometryError> {
    let n = receiver_x.len();
    if n < 2 {
        return Err(GeometryError::SingleTrace);
    }
    let first = receiver_x[0];
    let dx = (receiver_x[n - 1] - first) / (n - 1) as f32;
    if dx == 0.0 {
        return Err(GeometryError::ZeroSpacing(first));
    }

    let index = nint((source_x - first) / dx);
    let last = (n - 1) as i64;
    if !(0..=last).contains(&index) {
        log::warn!(
            "source at {} lies outside the receiver spread, anchoring at the nearest end trace",
            source_x
        );
    }
    Ok(index.clamp(0, last) as usize)
}

/// Picks one sample per trace, starting at the `anchor` trace.
///
/// `traces` holds one trace per row. The anchor pick is the maximum absolute amplitude of the
/// whole anchor trace; every other pick is the maximum within `hw` samples of its neighbour's
/// pick towards the anchor.
pub fn pick_shot(traces: ArrayView2<f32>, anchor: usize, hw: usize) -> Vec<usize> {
    let (n, nt) = traces.dim();
    let mut picks = vec![0; n];
    if n == 0 || nt == 0 {
        return picks;
    }
    debug_assert!(anchor < n, "anchor trace {anchor} outside a shot of {n} traces");

    picks[anchor] = argmax_abs(traces.row(anchor), 0, nt - 1);
    for i in anchor + 1..n {
        picks[i] = argmax_abs_around(traces.row(i), picks[i - 1], hw);
    }
    for i in (0..anchor).rev() {
        picks[i] = argmax_abs_around(traces.row(i), picks[i + 1], hw);
    }
    picks
}

/// Reads shot records and fills a `MuteWindowTable`.
#[derive(Clone, Debug)]
pub struct ShotWindowPicker {
    settings: PickerSettings,
}

impl ShotWindowPicker {
    pub fn new(settings: PickerSettings) -> Result<Self, PickError> {
        if settings.nx == 0 {
            return Err(PickError::InvalidSettings(
                "at least one receiver per shot is required".to_string(),
            ));
        }
        if settings.ntfft == 0 {
            return Err(PickError::InvalidSettings(
                "padded trace length must be positive".to_string(),
            ));
        }
        Ok(ShotWindowPicker { settings })
    }

    pub fn settings(&self) -> &PickerSettings {
        &self.settings
    }

    /// Picks all shots in the file at `path`, or in standard input if no path is given.
    ///
    /// Shots are appended to `table`. Returns the number of shots read.
    pub fn pick_file(
        &self,
        path: Option<&Path>,
        table: &mut MuteWindowTable,
    ) -> Result<usize, PickError> {
        let mut reader = match TraceReader::open(path, self.settings.endianness) {
            Ok(reader) => reader,
            Err(source) => {
                let path = path.map_or_else(|| PathBuf::from("<stdin>"), Path::to_path_buf);
                log::error!("input file {} has an error: {}", path.display(), source);
                return Err(PickError::Open { path, source });
            }
        };
        self.pick(&mut reader, table)
    }

    /// Picks all shots remaining in `reader`.
    ///
    /// Shots are appended to `table`. Returns the number of shots read. A truncated header or
    /// trace ends the input; the shot in progress is kept if it has at least one complete trace.
    pub fn pick<R: Read>(
        &self,
        reader: &mut TraceReader<R>,
        table: &mut MuteWindowTable,
    ) -> Result<usize, PickError> {
        if table.nx() < self.settings.nx {
            return Err(PickError::TableTooNarrow {
                table: table.nx(),
                nx: self.settings.nx,
            });
        }

        let mut gather = ShotGather::new(self.settings.nx, self.settings.ntfft);
        let mut nt = None;
        let mut n_shots = 0;

        let mut pending = reader.read_header()?;
        while let Some(first) = pending.take() {
            gather.clear();
            let mut header = first;
            let complete = loop {
                let ns = self.check_trace(&header, &gather, &mut nt, n_shots)?;
                if !reader.read_samples(gather.scratch_trace(ns))? {
                    break false;
                }
                gather.commit_trace(header);

                match reader.read_header()? {
                    Some(next) if next.same_shot(&first) => header = next,
                    next => {
                        pending = next;
                        break true;
                    }
                }
            };

            if !gather.is_empty() {
                log::debug!(
                    "finished reading shot {} ({}) with {} traces",
                    first.sx,
                    n_shots,
                    gather.len()
                );
                table.push(self.pick_gather(&first, &gather, n_shots)?);
                n_shots += 1;
            }
            if !complete {
                break;
            }
        }
        Ok(n_shots)
    }

    /// Validates the next trace against the shot buffer and returns its sample count.
    fn check_trace(
        &self,
        header: &TraceHeader,
        gather: &ShotGather,
        nt: &mut Option<usize>,
        shot: usize,
    ) -> Result<usize, PickError> {
        let ns = usize::from(header.ns);
        if ns > self.settings.ntfft {
            return Err(PickError::TraceTooLong {
                ns,
                ntfft: self.settings.ntfft,
            });
        }
        match *nt {
            None => *nt = Some(ns),
            Some(expected) if expected != ns => {
                return Err(PickError::SampleCountMismatch {
                    expected,
                    found: ns,
                })
            }
            Some(_) => {}
        }
        if gather.len() >= gather.capacity() {
            return Err(PickError::TooManyTraces {
                shot,
                nx: gather.capacity(),
            });
        }
        Ok(ns)
    }

    fn pick_gather(
        &self,
        first: &TraceHeader,
        gather: &ShotGather,
        shot: usize,
    ) -> Result<ShotWindow, PickError> {
        let source_x = first.source_x();
        let anchor = anchor_trace(source_x, gather.receiver_x())
            .map_err(|source| PickError::Geometry { shot, source })?;
        let mute_samples = pick_shot(gather.traces(), anchor, self.settings.hw);
        log::debug!(
            "mute max at source trace {} is sample {}",
            anchor,
            mute_samples[anchor]
        );

        Ok(ShotWindow {
            shot_id: first.fldr,
            source_x,
            source_z: first.source_z(),
            receiver_x: gather.receiver_x().to_vec(),
            anchor,
            mute_samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Endianness;
    use byteorder::{LittleEndian, WriteBytesExt};
    use ndarray::Array2;
    use std::io::Cursor;

    struct SyntheticTrace {
        fldr: i32,
        sx: i32,
        gx: i32,
        samples: Vec<f32>,
    }

    fn impulse(nt: usize, at: usize, amplitude: f32) -> Vec<f32> {
        let mut samples = vec![0.0; nt];
        samples[at] = amplitude;
        samples
    }

    /// One shot at `sx` with receivers every 10 units from 0 and a unit impulse at `arrivals[i]`.
    fn shot(fldr: i32, sx: i32, nt: usize, arrivals: &[usize]) -> Vec<SyntheticTrace> {
        arrivals
            .iter()
            .enumerate()
            .map(|(i, &at)| SyntheticTrace {
                fldr,
                sx,
                gx: 10 * i as i32,
                samples: impulse(nt, at, 1.0),
            })
            .collect()
    }

    fn encode(traces: &[SyntheticTrace]) -> Vec<u8> {
        let mut bytes = vec![];
        for trace in traces {
            let header = TraceHeader {
                fldr: trace.fldr,
                sx: trace.sx,
                gx: trace.gx,
                ns: trace.samples.len() as u16,
                ..Default::default()
            };
            bytes.extend_from_slice(&header.encode(Endianness::Little));
            for &v in &trace.samples {
                bytes.write_f32::<LittleEndian>(v).unwrap();
            }
        }
        bytes
    }

    fn settings(nx: usize, ntfft: usize, hw: usize) -> PickerSettings {
        PickerSettings {
            nx,
            ntfft,
            hw,
            endianness: Endianness::Little,
        }
    }

    fn run(bytes: Vec<u8>, settings: PickerSettings) -> Result<MuteWindowTable, PickError> {
        let mut table = MuteWindowTable::new(settings.nx);
        let picker = ShotWindowPicker::new(settings)?;
        let mut reader = TraceReader::new(Cursor::new(bytes), Endianness::Little);
        picker.pick(&mut reader, &mut table)?;
        Ok(table)
    }

    #[test]
    fn test_linear_moveout_is_tracked_exactly() {
        for hw in [2, 3, 10] {
            let bytes = encode(&shot(1, 20, 64, &[10, 12, 14, 16, 18]));
            let table = run(bytes, settings(8, 64, hw)).unwrap();
            assert_eq!(table.len(), 1);
            let window = &table.shots()[0];
            assert_eq!(window.anchor, 2);
            assert_eq!(window.mute_samples, vec![10, 12, 14, 16, 18]);
            assert_eq!(window.receiver_x, vec![0.0, 10.0, 20.0, 30.0, 40.0]);
            assert_eq!(window.source_x, 20.0);
        }
    }

    #[test]
    fn test_propagates_in_both_directions_from_anchor() {
        let bytes = encode(&shot(3, 21, 48, &[22, 18, 14, 18, 22]));
        let table = run(bytes, settings(5, 64, 4)).unwrap();
        assert_eq!(table.shots()[0].anchor, 2);
        assert_eq!(table.shots()[0].mute_samples, vec![22, 18, 14, 18, 22]);
    }

    #[test]
    fn test_decoy_outside_window_is_ignored() {
        let hw = 3;
        let arrivals: Vec<usize> = (0..8).map(|i| 20 + 2 * i).collect();
        let mut traces = shot(1, 0, 80, &arrivals);
        traces[5].samples[70] = 10.0;
        traces[6].samples[5] = -8.0;
        assert_eq!(argmax_abs(ndarray::ArrayView1::from(traces[5].samples.as_slice()), 0, 79), 70);

        let table = run(encode(&traces), settings(8, 80, hw)).unwrap();
        let window = &table.shots()[0];
        assert_eq!(window.anchor, 0);
        assert_eq!(window.mute_samples, arrivals);
        assert!(window.max_step() <= hw);
    }

    #[test]
    fn test_steps_never_exceed_half_window() {
        let (n, nt, hw) = (12, 100, 2);
        let traces = Array2::from_shape_fn((n, nt), |(i, j)| {
            // strong event jumping far away from the weak trend on every other trace
            if j == 10 + i {
                1.0
            } else if i % 2 == 1 && j == 90 - 3 * i {
                5.0
            } else {
                0.0
            }
        });
        let picks = pick_shot(traces.view(), 0, hw);
        for w in picks.windows(2) {
            assert!(w[0].abs_diff(w[1]) <= hw, "jump between {} and {}", w[0], w[1]);
        }
    }

    #[test]
    fn test_single_trace_shot_is_rejected() {
        let bytes = encode(&shot(1, 0, 16, &[4]));
        let result = run(bytes, settings(4, 16, 2));
        assert!(matches!(
            result,
            Err(PickError::Geometry {
                shot: 0,
                source: GeometryError::SingleTrace
            })
        ));
        assert!(matches!(
            anchor_trace(0.0, &[5.0, 5.0, 5.0]),
            Err(GeometryError::ZeroSpacing(_))
        ));
    }

    #[test]
    fn test_multiple_shots_are_picked_independently() {
        let mut traces = shot(1, 0, 64, &[40, 41, 42, 43, 44, 45]);
        for trace in traces.iter_mut() {
            trace.samples.iter_mut().for_each(|v| *v *= 50.0);
        }
        traces.extend(shot(2, 30, 64, &[9, 7, 5, 3]));
        // same source position, new record number
        traces.extend(shot(3, 30, 64, &[12, 12, 12]));

        let table = run(encode(&traces), settings(6, 128, 2)).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.receiver_counts(), vec![6, 4, 3]);
        assert_eq!(table.shots()[0].mute_samples, vec![40, 41, 42, 43, 44, 45]);
        assert_eq!(table.shots()[1].anchor, 3);
        assert_eq!(table.shots()[1].mute_samples, vec![9, 7, 5, 3]);
        assert_eq!(table.shots()[2].shot_id, 3);
        assert_eq!(table.shots()[2].mute_samples, vec![12, 12, 12]);

        let samples = table.sample_table();
        assert_eq!(samples.dim(), (3, 6));
        assert_eq!(samples.row(1).to_vec(), vec![9, 7, 5, 3, -1, -1]);
    }

    #[test]
    fn test_truncated_trace_ends_input_and_keeps_complete_traces() {
        let mut bytes = encode(&shot(1, 10, 32, &[3, 4, 5, 6]));
        bytes.truncate(bytes.len() - 10);
        let table = run(bytes, settings(4, 32, 2)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.shots()[0].mute_samples, vec![3, 4, 5]);

        let mut bytes = encode(&shot(1, 10, 32, &[3, 4, 5]));
        bytes.extend_from_slice(&[0u8; 17]);
        let table = run(bytes, settings(4, 32, 2)).unwrap();
        assert_eq!(table.len(), 1);

        let table = run(vec![], settings(4, 32, 2)).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_source_outside_spread_anchors_at_end_trace() {
        assert_eq!(anchor_trace(-50.0, &[0.0, 10.0, 20.0]).unwrap(), 0);
        assert_eq!(anchor_trace(500.0, &[0.0, 10.0, 20.0]).unwrap(), 2);
        assert_eq!(anchor_trace(14.0, &[20.0, 10.0, 0.0]).unwrap(), 1);
        assert_eq!(anchor_trace(26.0, &[0.0, 10.0, 20.0, 30.0]).unwrap(), 3);
    }

    #[test]
    fn test_framing_errors() {
        let bytes = encode(&shot(1, 0, 16, &[1, 2, 3]));
        assert!(matches!(
            run(bytes.clone(), settings(2, 16, 2)),
            Err(PickError::TooManyTraces { shot: 0, nx: 2 })
        ));
        assert!(matches!(
            run(bytes, settings(4, 8, 2)),
            Err(PickError::TraceTooLong { ns: 16, ntfft: 8 })
        ));

        let mut traces = shot(1, 0, 16, &[1, 2]);
        traces.extend(shot(2, 5, 12, &[1, 2]));
        assert!(matches!(
            run(encode(&traces), settings(4, 16, 2)),
            Err(PickError::SampleCountMismatch {
                expected: 16,
                found: 12
            })
        ));

        let picker = ShotWindowPicker::new(settings(4, 16, 2)).unwrap();
        let mut narrow = MuteWindowTable::new(3);
        let mut reader = TraceReader::new(Cursor::new(vec![]), Endianness::Little);
        assert!(matches!(
            picker.pick(&mut reader, &mut narrow),
            Err(PickError::TableTooNarrow { table: 3, nx: 4 })
        ));
        assert!(ShotWindowPicker::new(settings(0, 16, 2)).is_err());
    }

    #[test]
    fn test_missing_file_is_an_open_error() {
        let picker = ShotWindowPicker::new(settings(4, 16, 2)).unwrap();
        let mut table = MuteWindowTable::new(4);
        let result = picker.pick_file(
            Some(Path::new("/nonexistent/shot_records.su")),
            &mut table,
        );
        assert!(matches!(result, Err(PickError::Open { .. })));
        assert!(table.is_empty());
    }
}
