use std::path::Path;

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::containers::{persist, DataMatrix};
use crate::error::{Error, Result};

/// What happens to the columns skipped by a non-zero shift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftBorder {
    /// Skipped columns wrap around to the end
    #[default]
    Roll,
    /// Skipped columns are dropped
    Shift,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SequencerParams {
    pub frames: usize,
    /// Defaults to `frames`, giving non-overlapping sequences
    pub hop_length_frames: Option<usize>,
    /// Replicate the last column to complete a partial final sequence
    pub padding: bool,
    pub shift_step: usize,
    pub shift_border: ShiftBorder,
    /// Shift wraps back to 0 once it exceeds this
    pub shift_max: Option<usize>,
}

impl Default for SequencerParams {
    fn default() -> Self {
        Self {
            frames: 10,
            hop_length_frames: None,
            padding: false,
            shift_step: 0,
            shift_border: ShiftBorder::Roll,
            shift_max: None,
        }
    }
}

/// Cuts a 2D matrix into fixed-length frame windows.
///
/// Output is `[vector, frames, sequence]`; sequence `k` at position `t` holds
/// input column `shift + k * hop + t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequencer {
    params: SequencerParams,
    #[serde(default)]
    shift: usize,
}

impl Sequencer {
    pub fn new(params: SequencerParams) -> Result<Self> {
        if params.frames == 0 {
            return Err(Error::config("sequence length must be positive"));
        }
        if params.hop_length_frames == Some(0) {
            return Err(Error::config("sequence hop must be positive"));
        }
        Ok(Self { params, shift: 0 })
    }

    pub fn params(&self) -> &SequencerParams {
        &self.params
    }

    pub fn hop(&self) -> usize {
        self.params.hop_length_frames.unwrap_or(self.params.frames)
    }

    pub fn shift(&self) -> usize {
        self.shift
    }

    /// Add `step` (or the configured `shift_step`) to the running shift.
    /// Restore a running shift, e.g. from saved chain state.
    pub fn set_shift(&mut self, shift: usize) -> &mut Self {
        self.shift = shift;
        self
    }

    pub fn increase_shifting(&mut self, step: Option<usize>) -> usize {
        self.shift += step.unwrap_or(self.params.shift_step);
        if let Some(max) = self.params.shift_max {
            if self.shift > max {
                self.shift = 0;
            }
        }
        debug!(shift = self.shift, "sequencer shift updated");
        self.shift
    }

    fn source_column(&self, column: usize, length: usize) -> usize {
        match self.params.shift_border {
            ShiftBorder::Roll => (column + self.shift) % length,
            ShiftBorder::Shift => column + self.shift,
        }
    }

    pub fn sequence(&self, data: &DataMatrix) -> Result<DataMatrix> {
        let focused = data.get_focused();
        let view = focused.view2()?;
        let (rows, length) = view.dim();
        let frames = self.params.frames;
        let hop = self.hop();

        let usable = match self.params.shift_border {
            ShiftBorder::Roll => length,
            ShiftBorder::Shift => length.saturating_sub(self.shift),
        };
        if usable == 0 {
            return Err(Error::shape(format!(
                "no columns left to sequence (length {}, shift {})",
                length, self.shift
            )));
        }

        let starts: Vec<usize> = if self.params.padding {
            (0..usable).step_by(hop).collect()
        } else {
            (0..usable)
                .step_by(hop)
                .take_while(|start| start + frames <= usable)
                .collect()
        };
        if starts.is_empty() {
            return Err(Error::shape(format!(
                "cannot cut sequences of {} frames from {} columns",
                frames, usable
            )));
        }

        let mut output = Array3::zeros((rows, frames, starts.len()));
        for (k, start) in starts.iter().enumerate() {
            for t in 0..frames {
                let column = (start + t).min(usable - 1);
                let source = self.source_column(column, length);
                output
                    .slice_mut(ndarray::s![.., t, k])
                    .assign(&view.column(source));
            }
        }
        debug!(
            sequences = starts.len(),
            frames,
            hop,
            shift = self.shift,
            "sequenced matrix"
        );
        Ok(DataMatrix::from_3d(output, None))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<&Self> {
        persist::save_json(self, path)?;
        Ok(self)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        persist::load_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn columns(rows: usize, length: usize) -> DataMatrix {
        DataMatrix::from_2d(
            Array2::from_shape_fn((rows, length), |(r, c)| (r * 1000 + c) as f64),
            Some(0.02),
        )
    }

    fn sequencer(frames: usize, hop: Option<usize>) -> Sequencer {
        Sequencer::new(SequencerParams {
            frames,
            hop_length_frames: hop,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn non_overlapping_windows() {
        let out = sequencer(10, Some(10)).sequence(&columns(40, 100)).unwrap();
        assert_eq!(out.shape(), &[40, 10, 10]);
        for k in 0..10 {
            assert_eq!(out.data()[[0, 0, k]], (10 * k) as f64);
            assert_eq!(out.data()[[3, 9, k]], (3000 + 10 * k + 9) as f64);
        }
        assert_eq!(out.time_resolution, None);
    }

    #[test]
    fn overlapping_windows_follow_formula() {
        let out = sequencer(10, Some(5)).sequence(&columns(2, 100)).unwrap();
        // floor((100 - 10) / 5) + 1
        assert_eq!(out.length(), 19);
        assert_eq!(out.data()[[0, 2, 3]], 17.0);
    }

    #[test]
    fn too_short_input_without_padding_fails() {
        let err = sequencer(10, None).sequence(&columns(2, 7)).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn padding_replicates_last_column() {
        let sequencer = Sequencer::new(SequencerParams {
            frames: 4,
            padding: true,
            ..Default::default()
        })
        .unwrap();
        let out = sequencer.sequence(&columns(1, 6)).unwrap();
        assert_eq!(out.shape(), &[1, 4, 2]);
        assert_eq!(out.data()[[0, 1, 1]], 5.0);
        assert_eq!(out.data()[[0, 3, 1]], 5.0);
    }

    #[test]
    fn shift_offsets_sequence_start() {
        let mut sequencer = Sequencer::new(SequencerParams {
            frames: 5,
            shift_step: 2,
            shift_border: ShiftBorder::Shift,
            ..Default::default()
        })
        .unwrap();
        sequencer.increase_shifting(None);
        sequencer.increase_shifting(Some(1));
        assert_eq!(sequencer.shift(), 3);

        let out = sequencer.sequence(&columns(1, 20)).unwrap();
        // 17 usable columns -> 3 full sequences
        assert_eq!(out.length(), 3);
        assert_eq!(out.data()[[0, 0, 0]], 3.0);
        assert_eq!(out.data()[[0, 1, 2]], 14.0);
    }

    #[test]
    fn roll_wraps_columns() {
        let mut sequencer = sequencer(5, None);
        sequencer.increase_shifting(Some(3));
        let out = sequencer.sequence(&columns(1, 10)).unwrap();
        assert_eq!(out.length(), 2);
        assert_eq!(out.data()[[0, 0, 0]], 3.0);
        assert_eq!(out.data()[[0, 4, 1]], 2.0);
    }

    #[test]
    fn shift_resets_past_maximum() {
        let mut sequencer = Sequencer::new(SequencerParams {
            frames: 5,
            shift_step: 2,
            shift_max: Some(3),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(sequencer.increase_shifting(None), 2);
        assert_eq!(sequencer.increase_shifting(None), 0);
    }

    #[test]
    fn state_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequencer.json");
        let mut sequencer = sequencer(10, Some(10));
        sequencer.increase_shifting(Some(4));
        sequencer.save(&path).unwrap();
        let loaded = Sequencer::load(&path).unwrap();
        assert_eq!(loaded, sequencer);
        assert_eq!(loaded.shift(), 4);
    }
}
