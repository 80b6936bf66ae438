use std::path::Path;

use ndarray::{
    concatenate, Array1, Array2, Array3, ArrayD, ArrayView2, Axis, Ix2, IxDyn, Slice,
};
use serde::{Deserialize, Serialize};

use super::persist;
use crate::error::{Error, Result};

/// Ways to express a focus window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FocusSpec {
    Frames { start: usize, stop: usize },
    FramesDuration { start: usize, duration: usize },
    Seconds { start: f64, stop: f64 },
    SecondsDuration { start: f64, duration: f64 },
}

/// Per-row statistics over the time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixStats {
    pub mean: Array1<f64>,
    /// Population standard deviation
    pub std: Array1<f64>,
    pub n: usize,
    pub s1: Array1<f64>,
    pub s2: Array1<f64>,
}

/// Feature matrix with the feature axis first and the time axis last.
///
/// 2D data is `[vector, time]`; 3D sequenced data is `[vector, frame, sequence]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataMatrix {
    data: ArrayD<f64>,
    /// Seconds per time step
    #[serde(default)]
    pub time_resolution: Option<f64>,
    #[serde(default)]
    focus_start: Option<usize>,
    #[serde(default)]
    focus_stop: Option<usize>,
}

impl DataMatrix {
    pub fn new(data: ArrayD<f64>, time_resolution: Option<f64>) -> Result<Self> {
        if !(2..=3).contains(&data.ndim()) {
            return Err(Error::shape(format!(
                "data matrix must be 2D or 3D, got {} dimensions",
                data.ndim()
            )));
        }
        Ok(Self {
            data,
            time_resolution,
            focus_start: None,
            focus_stop: None,
        })
    }

    pub fn from_2d(data: Array2<f64>, time_resolution: Option<f64>) -> Self {
        Self {
            data: data.into_dyn(),
            time_resolution,
            focus_start: None,
            focus_stop: None,
        }
    }

    pub fn from_3d(data: Array3<f64>, time_resolution: Option<f64>) -> Self {
        Self {
            data: data.into_dyn(),
            time_resolution,
            focus_start: None,
            focus_stop: None,
        }
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.data
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    /// Replace the data, keeping time resolution and dropping the focus window.
    pub fn set_data(&mut self, data: ArrayD<f64>) -> Result<()> {
        let replacement = Self::new(data, self.time_resolution)?;
        *self = replacement;
        Ok(())
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn time_axis(&self) -> Axis {
        Axis(self.data.ndim() - 1)
    }

    /// Frame count along the time axis.
    pub fn length(&self) -> usize {
        self.data.len_of(self.time_axis())
    }

    pub fn frames(&self) -> usize {
        self.length()
    }

    pub fn vector_length(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow as a 2D `[vector, time]` view; 3D data is rejected.
    pub fn view2(&self) -> Result<ArrayView2<'_, f64>> {
        self.data
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| Error::shape(format!("expected 2D data, got shape {:?}", self.shape())))
    }

    pub fn focus_start(&self) -> Option<usize> {
        self.focus_start
    }

    pub fn focus_stop(&self) -> Option<usize> {
        self.focus_stop
    }

    pub fn set_focus(&mut self, spec: FocusSpec) -> Result<&mut Self> {
        let (start, stop) = match spec {
            FocusSpec::Frames { start, stop } => (start, stop),
            FocusSpec::FramesDuration { start, duration } => (start, start + duration),
            FocusSpec::Seconds { start, stop } => {
                (self.time_to_frame(start)?, self.time_to_frame(stop)?)
            }
            FocusSpec::SecondsDuration { start, duration } => (
                self.time_to_frame(start)?,
                self.time_to_frame(start + duration)?,
            ),
        };
        let length = self.length();
        let (start, stop) = (start.min(length), stop.min(length));
        let (start, stop) = if stop < start {
            (stop, start)
        } else {
            (start, stop)
        };
        self.focus_start = Some(start);
        self.focus_stop = Some(stop);
        Ok(self)
    }

    pub fn reset_focus(&mut self) -> &mut Self {
        self.focus_start = None;
        self.focus_stop = None;
        self
    }

    /// Copy of the focused window, or the full matrix when no focus is set.
    pub fn get_focused(&self) -> DataMatrix {
        let data = match (self.focus_start, self.focus_stop) {
            (Some(start), Some(stop)) => self
                .data
                .slice_axis(self.time_axis(), Slice::from(start..stop))
                .to_owned(),
            _ => self.data.clone(),
        };
        Self {
            data,
            time_resolution: self.time_resolution,
            focus_start: None,
            focus_stop: None,
        }
    }

    /// Make the focused window the container's data.
    pub fn freeze(&mut self) -> &mut Self {
        *self = self.get_focused();
        self
    }

    /// Select frames, then rows, then keep every `frame_hop`-th frame.
    pub fn get_frames(
        &self,
        frame_ids: Option<&[usize]>,
        vector_ids: Option<&[usize]>,
        frame_hop: usize,
    ) -> Result<ArrayD<f64>> {
        if frame_hop == 0 {
            return Err(Error::config("frame_hop must be positive"));
        }
        let time_axis = self.time_axis();
        let mut data = self.data.view().to_owned();
        if let Some(ids) = frame_ids {
            check_indices(ids, self.length(), "frame")?;
            data = data.select(time_axis, ids);
        }
        if let Some(ids) = vector_ids {
            check_indices(ids, self.vector_length(), "vector")?;
            data = data.select(Axis(0), ids);
        }
        if frame_hop > 1 {
            data = data
                .slice_axis(time_axis, Slice::new(0, None, frame_hop as isize))
                .to_owned();
        }
        Ok(data)
    }

    /// Row statistics where every non-feature element counts as one sample.
    pub fn stats(&self) -> MatrixStats {
        let rows = self.vector_length();
        let mut s1 = Array1::zeros(rows);
        let mut s2 = Array1::zeros(rows);
        let mut n = 0;
        for (idx, row) in self.data.axis_iter(Axis(0)).enumerate() {
            n = row.len();
            s1[idx] = row.sum();
            s2[idx] = row.iter().map(|v| v * v).sum::<f64>();
        }
        let count = n.max(1) as f64;
        let mean = &s1 / count;
        let std = (&s2 / count - &mean * &mean).mapv(|v: f64| v.max(0.0).sqrt());
        MatrixStats {
            mean,
            std,
            n,
            s1,
            s2,
        }
    }

    /// Zero-pad or truncate the time axis to `length` frames.
    pub fn pad(&mut self, length: usize) -> &mut Self {
        let time_axis = self.time_axis();
        let current = self.length();
        if length < current {
            self.data = self
                .data
                .slice_axis(time_axis, Slice::from(0..length))
                .to_owned();
        } else if length > current {
            let mut shape = self.data.shape().to_vec();
            shape[time_axis.index()] = length - current;
            let padding = ArrayD::zeros(IxDyn(&shape));
            if let Ok(padded) = concatenate(time_axis, &[self.data.view(), padding.view()]) {
                self.data = padded;
            }
        }
        self.reset_focus();
        self
    }

    fn time_to_frame(&self, seconds: f64) -> Result<usize> {
        let resolution = self
            .time_resolution
            .filter(|res| *res > 0.0)
            .ok_or_else(|| Error::config("time resolution not set, cannot convert seconds"))?;
        let frame = (seconds / resolution).floor();
        Ok(if frame <= 0.0 {
            0
        } else {
            (frame as usize).min(self.length())
        })
    }

    /// Focus window must satisfy `start <= stop <= length` when set.
    pub(crate) fn check_focus(&self) -> Result<()> {
        if let (Some(start), Some(stop)) = (self.focus_start, self.focus_stop) {
            if start > stop || stop > self.length() {
                return Err(Error::config(format!(
                    "focus window {}..{} does not fit {} frames",
                    start,
                    stop,
                    self.length()
                )));
            }
        }
        Ok(())
    }

    /// Write as JSON; non-finite values are rejected.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<&Self> {
        persist::check_finite(self.data.iter(), "data matrix")?;
        persist::save_json(self, path)?;
        Ok(self)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let matrix: DataMatrix = persist::load_json(path)?;
        let mut checked = Self::new(matrix.data, matrix.time_resolution)?;
        checked.focus_start = matrix.focus_start;
        checked.focus_stop = matrix.focus_stop;
        checked.check_focus()?;
        Ok(checked)
    }
}

fn check_indices(ids: &[usize], bound: usize, kind: &str) -> Result<()> {
    match ids.iter().find(|&&id| id >= bound) {
        Some(bad) => Err(Error::shape(format!(
            "{} index {} out of range (size {})",
            kind, bad, bound
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn ramp(rows: usize, cols: usize) -> DataMatrix {
        let data = Array2::from_shape_fn((rows, cols), |(r, c)| (r * 100 + c) as f64);
        DataMatrix::from_2d(data, Some(0.02))
    }

    #[test]
    fn reports_shape_properties() {
        let matrix = ramp(40, 501);
        assert_eq!(matrix.vector_length(), 40);
        assert_eq!(matrix.length(), 501);
        assert_eq!(matrix.shape(), &[40, 501]);

        let cube = DataMatrix::from_3d(Array3::zeros((40, 10, 7)), None);
        assert_eq!(cube.length(), 7);
        assert!(cube.view2().is_err());
    }

    #[test]
    fn rejects_one_dimensional_data() {
        assert!(DataMatrix::new(ArrayD::zeros(IxDyn(&[5])), None).is_err());
    }

    #[test]
    fn focus_by_frames_and_seconds() {
        let mut matrix = ramp(2, 100);
        matrix.set_focus(FocusSpec::Frames { start: 10, stop: 20 }).unwrap();
        let focused = matrix.get_focused();
        assert_eq!(focused.length(), 10);
        assert_eq!(focused.data()[[0, 0]], 10.0);

        matrix
            .set_focus(FocusSpec::Seconds {
                start: 0.5,
                stop: 1.0,
            })
            .unwrap();
        assert_eq!(matrix.focus_start(), Some(25));
        assert_eq!(matrix.focus_stop(), Some(50));
    }

    #[test]
    fn focus_clamps_and_swaps_reversed_points() {
        let mut matrix = ramp(2, 100);
        matrix
            .set_focus(FocusSpec::Frames {
                start: 500,
                stop: 40,
            })
            .unwrap();
        assert_eq!(matrix.focus_start(), Some(40));
        assert_eq!(matrix.focus_stop(), Some(100));
    }

    #[test]
    fn freeze_replaces_data_with_focus() {
        let mut matrix = ramp(3, 50);
        matrix
            .set_focus(FocusSpec::FramesDuration {
                start: 5,
                duration: 5,
            })
            .unwrap();
        matrix.freeze();
        assert_eq!(matrix.length(), 5);
        assert_eq!(matrix.focus_start(), None);
        assert_eq!(matrix.data()[[2, 0]], 205.0);
    }

    #[test]
    fn seconds_focus_without_resolution_fails() {
        let mut matrix = DataMatrix::from_2d(Array2::zeros((2, 10)), None);
        assert!(matrix
            .set_focus(FocusSpec::SecondsDuration {
                start: 0.0,
                duration: 1.0
            })
            .is_err());
    }

    #[test]
    fn get_frames_selects_and_hops() {
        let matrix = ramp(4, 10);
        let frames = matrix
            .get_frames(Some(&[1, 2, 3, 4]), Some(&[0, 3]), 2)
            .unwrap();
        assert_eq!(frames.shape(), &[2, 2]);
        assert_eq!(frames[[1, 1]], 303.0);
        assert!(matrix.get_frames(Some(&[10]), None, 1).is_err());
    }

    #[test]
    fn stats_are_per_row() {
        let matrix = DataMatrix::from_2d(array![[1.0, 3.0], [2.0, 2.0]], None);
        let stats = matrix.stats();
        assert_eq!(stats.n, 2);
        assert_abs_diff_eq!(stats.mean[0], 2.0);
        assert_abs_diff_eq!(stats.std[0], 1.0);
        assert_abs_diff_eq!(stats.std[1], 0.0);
        assert_abs_diff_eq!(stats.s2[0], 10.0);
    }

    #[test]
    fn pad_extends_and_truncates_time_axis() {
        let mut matrix = DataMatrix::from_2d(Array2::ones((3, 4)), Some(0.1));
        matrix.pad(6);
        assert_eq!(matrix.shape(), &[3, 6]);
        assert_eq!(matrix.data()[[0, 5]], 0.0);
        matrix.pad(2);
        assert_eq!(matrix.shape(), &[3, 2]);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.json");
        let matrix = ramp(5, 12);
        matrix.save(&path).unwrap();
        let loaded = DataMatrix::load(&path).unwrap();
        assert_eq!(loaded, matrix);
        assert_eq!(loaded.time_resolution, Some(0.02));
    }

    #[test]
    fn load_rejects_focus_outside_the_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_focus.json");
        let mut stored = serde_json::to_value(ramp(1, 3)).unwrap();

        stored["focus_start"] = 1.into();
        stored["focus_stop"] = 9.into();
        std::fs::write(&path, stored.to_string()).unwrap();
        assert!(matches!(DataMatrix::load(&path), Err(Error::Config(_))));

        stored["focus_start"] = 2.into();
        stored["focus_stop"] = 1.into();
        std::fs::write(&path, stored.to_string()).unwrap();
        assert!(DataMatrix::load(&path).is_err());

        stored["focus_start"] = 0.into();
        stored["focus_stop"] = 3.into();
        std::fs::write(&path, stored.to_string()).unwrap();
        assert_eq!(DataMatrix::load(&path).unwrap().get_focused().length(), 3);
    }

    #[test]
    fn save_keeps_fractional_values_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sines.json");
        let data = Array2::from_shape_fn((3, 200), |(r, c)| ((r * 200 + c) as f64).sin() / 3.0);
        let mut matrix = DataMatrix::from_2d(data, Some(0.02));
        matrix.set_focus(FocusSpec::Frames { start: 5, stop: 50 }).unwrap();
        matrix.save(&path).unwrap();

        let loaded = DataMatrix::load(&path).unwrap();
        assert_eq!(loaded, matrix);
        assert_eq!(loaded.get_focused().length(), 45);
    }

    #[test]
    fn save_rejects_non_finite_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inf.json");
        let matrix = DataMatrix::from_2d(array![[0.5, f64::NEG_INFINITY]], None);
        assert!(matches!(matrix.save(&path), Err(Error::Config(_))));
        assert!(!path.exists());
    }
}
