use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::containers::DataMatrix;
use crate::error::{Error, Result};

const EPSILON: f64 = 1e-12;

/// Per-window reduction; each contributes one contiguous block of output rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AggregationMethod {
    Flatten,
    Mean,
    Std,
    Cov,
    Kurtosis,
    Skew,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::Flatten => "flatten",
            AggregationMethod::Mean => "mean",
            AggregationMethod::Std => "std",
            AggregationMethod::Cov => "cov",
            AggregationMethod::Kurtosis => "kurtosis",
            AggregationMethod::Skew => "skew",
        }
    }

    /// Output rows produced for a window of `win` frames of `rows` features.
    pub fn output_rows(&self, rows: usize, win: usize) -> usize {
        match self {
            AggregationMethod::Flatten => rows * win,
            AggregationMethod::Cov => rows * rows,
            _ => rows,
        }
    }
}

impl FromStr for AggregationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "flatten" => Ok(AggregationMethod::Flatten),
            "mean" => Ok(AggregationMethod::Mean),
            "std" => Ok(AggregationMethod::Std),
            "cov" => Ok(AggregationMethod::Cov),
            "kurtosis" => Ok(AggregationMethod::Kurtosis),
            "skew" => Ok(AggregationMethod::Skew),
            other => Err(Error::config(format!(
                "unknown aggregation method [{}]",
                other
            ))),
        }
    }
}

impl TryFrom<String> for AggregationMethod {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AggregationMethod> for String {
    fn from(method: AggregationMethod) -> Self {
        method.as_str().to_string()
    }
}

impl Display for AggregationMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_recipe() -> Vec<AggregationMethod> {
    vec![AggregationMethod::Flatten]
}

fn default_true() -> bool {
    true
}

/// Sliding-window aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregatorParams {
    #[serde(default = "default_win")]
    pub win_length_frames: usize,
    #[serde(default = "default_hop")]
    pub hop_length_frames: usize,
    #[serde(default = "default_recipe")]
    pub recipe: Vec<AggregationMethod>,
    /// Window around the frame instead of starting at it
    #[serde(default = "default_true")]
    pub center: bool,
    /// Replicate edge frames instead of dropping incomplete windows
    #[serde(default = "default_true")]
    pub padding: bool,
}

fn default_win() -> usize {
    10
}

fn default_hop() -> usize {
    1
}

impl Default for AggregatorParams {
    fn default() -> Self {
        Self {
            win_length_frames: default_win(),
            hop_length_frames: default_hop(),
            recipe: default_recipe(),
            center: true,
            padding: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregator {
    params: AggregatorParams,
}

impl Aggregator {
    pub fn new(params: AggregatorParams) -> Result<Self> {
        if params.win_length_frames == 0 || params.hop_length_frames == 0 {
            return Err(Error::config(
                "aggregation window and hop must be positive",
            ));
        }
        if params.recipe.is_empty() {
            return Err(Error::config("aggregation recipe is empty"));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &AggregatorParams {
        &self.params
    }

    /// Frame ids covered by the window for frame `frame`, `None` when the window
    /// is incomplete and padding is off.
    fn window_ids(&self, frame: usize, length: usize) -> Option<Vec<usize>> {
        let win = self.params.win_length_frames as isize;
        let frame = frame as isize;
        let (start, stop) = if self.params.center {
            (frame - win / 2, frame + (win + 1) / 2)
        } else {
            (frame, frame + win)
        };
        let last = length as isize - 1;
        if !self.params.padding && (start < 0 || stop - 1 > last) {
            return None;
        }
        Some((start..stop).map(|id| id.clamp(0, last) as usize).collect())
    }

    pub fn aggregate(&self, data: &DataMatrix) -> Result<DataMatrix> {
        let focused = data.get_focused();
        let view = focused.view2()?;
        let (rows, length) = view.dim();
        if length == 0 {
            return Err(Error::shape("cannot aggregate an empty matrix"));
        }

        let out_rows: usize = self
            .params
            .recipe
            .iter()
            .map(|method| method.output_rows(rows, self.params.win_length_frames))
            .sum();

        let mut columns: Vec<Array1<f64>> = Vec::new();
        for frame in (0..length).step_by(self.params.hop_length_frames) {
            let Some(ids) = self.window_ids(frame, length) else {
                continue;
            };
            let window = view.select(Axis(1), &ids);
            let mut column = Vec::with_capacity(out_rows);
            for method in &self.params.recipe {
                column.extend(reduce(*method, window.view()));
            }
            columns.push(Array1::from_vec(column));
        }

        let mut output = Array2::zeros((out_rows, columns.len()));
        for (idx, column) in columns.iter().enumerate() {
            output.column_mut(idx).assign(column);
        }
        Ok(DataMatrix::from_2d(
            output,
            focused
                .time_resolution
                .map(|res| res * self.params.hop_length_frames as f64),
        ))
    }
}

fn reduce(method: AggregationMethod, window: ArrayView2<'_, f64>) -> Vec<f64> {
    let frames = window.ncols() as f64;
    let mean = window.sum_axis(Axis(1)) / frames;
    match method {
        AggregationMethod::Flatten => window.t().iter().copied().collect(),
        AggregationMethod::Mean => mean.to_vec(),
        AggregationMethod::Std => central_moment(window, &mean, 2)
            .iter()
            .map(|m2| m2.max(0.0).sqrt())
            .collect(),
        AggregationMethod::Cov => covariance(window, &mean).iter().copied().collect(),
        AggregationMethod::Kurtosis => {
            let m2 = central_moment(window, &mean, 2);
            let m4 = central_moment(window, &mean, 4);
            m2.iter()
                .zip(m4.iter())
                .map(|(m2, m4)| if *m2 < EPSILON { 0.0 } else { m4 / (m2 * m2) - 3.0 })
                .collect()
        }
        AggregationMethod::Skew => {
            let m2 = central_moment(window, &mean, 2);
            let m3 = central_moment(window, &mean, 3);
            m2.iter()
                .zip(m3.iter())
                .map(|(m2, m3)| if *m2 < EPSILON { 0.0 } else { m3 / m2.powf(1.5) })
                .collect()
        }
    }
}

fn central_moment(window: ArrayView2<'_, f64>, mean: &Array1<f64>, order: i32) -> Vec<f64> {
    window
        .axis_iter(Axis(0))
        .zip(mean.iter())
        .map(|(row, mu)| row.iter().map(|v| (v - mu).powi(order)).sum::<f64>() / row.len() as f64)
        .collect()
}

/// Sample covariance between rows, zeros for single-frame windows.
fn covariance(window: ArrayView2<'_, f64>, mean: &Array1<f64>) -> Array2<f64> {
    let (rows, frames) = window.dim();
    if frames < 2 {
        return Array2::zeros((rows, rows));
    }
    let centered = &window - &mean.view().insert_axis(Axis(1));
    centered.dot(&centered.t()) / (frames as f64 - 1.0)
}
