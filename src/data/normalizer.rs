use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::containers::{persist, DataMatrix, DataRepository};
use crate::error::{Error, Result};

/// Running per-row statistics and the normalization they yield.
///
/// `std` is the population deviation `sqrt(s2/n - mean^2)`, clamped at 0.
/// Not meant to be shared across threads; give each worker its own instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    n: usize,
    s1: Option<Array1<f64>>,
    s2: Option<Array1<f64>>,
    mean: Option<Array1<f64>>,
    std: Option<Array1<f64>>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer with known statistics and no accumulation history.
    pub fn from_stats(mean: Array1<f64>, std: Array1<f64>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(Error::shape(format!(
                "mean has {} rows, std has {}",
                mean.len(),
                std.len()
            )));
        }
        Ok(Self {
            mean: Some(mean),
            std: Some(std),
            ..Self::default()
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    pub fn std(&self) -> Option<&Array1<f64>> {
        self.std.as_ref()
    }

    pub fn reset(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    pub fn accumulate(&mut self, data: &DataMatrix) -> Result<&mut Self> {
        let stats = data.get_focused().stats();
        if let Some(s1) = &self.s1 {
            if s1.len() != stats.s1.len() {
                return Err(Error::shape(format!(
                    "accumulated {} rows, got data with {}",
                    s1.len(),
                    stats.s1.len()
                )));
            }
        }
        self.s1 = Some(match self.s1.take() {
            Some(s1) => s1 + &stats.s1,
            None => stats.s1,
        });
        self.s2 = Some(match self.s2.take() {
            Some(s2) => s2 + &stats.s2,
            None => stats.s2,
        });
        self.n += stats.n;
        Ok(self)
    }

    /// Turn accumulated sums into `mean` and `std`.
    pub fn finalize(&mut self) -> &mut Self {
        match (&self.s1, &self.s2) {
            (Some(s1), Some(s2)) if self.n > 0 => {
                let n = self.n as f64;
                let mean = s1 / n;
                let std = (s2 / n - &mean * &mean).mapv(|v: f64| v.max(0.0).sqrt());
                self.mean = Some(mean);
                self.std = Some(std);
            }
            _ => warn!("finalize called without accumulated data"),
        }
        self
    }

    /// `(data - mean) / std` per feature row; rows with zero std are only centered.
    pub fn normalize(&self, mut data: DataMatrix) -> Result<DataMatrix> {
        self.normalize_in_place(&mut data)?;
        Ok(data)
    }

    pub fn normalize_in_place(&self, data: &mut DataMatrix) -> Result<()> {
        let (Some(mean), Some(std)) = (&self.mean, &self.std) else {
            return Err(Error::config(
                "normalizer has no statistics, accumulate and finalize first",
            ));
        };
        if data.vector_length() != mean.len() {
            return Err(Error::shape(format!(
                "normalizer has {} rows, data has {}",
                mean.len(),
                data.vector_length()
            )));
        }
        for (mut row, (mu, sigma)) in data
            .data_mut()
            .axis_iter_mut(Axis(0))
            .zip(mean.iter().zip(std.iter()))
        {
            if *sigma > 0.0 {
                row.mapv_inplace(|v| (v - mu) / sigma);
            } else {
                row.mapv_inplace(|v| v - mu);
            }
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<&Self> {
        persist::save_json(self, path)?;
        Ok(self)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        persist::load_json(path)
    }
}

/// One independent [`Normalizer`] per stream label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryNormalizer {
    normalizers: BTreeMap<String, Normalizer>,
}

impl RepositoryNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_normalizers(normalizers: BTreeMap<String, Normalizer>) -> Self {
        Self { normalizers }
    }

    /// Load a saved normalizer per label.
    pub fn from_files(filenames: &BTreeMap<String, PathBuf>) -> Result<Self> {
        let mut normalizers = BTreeMap::new();
        for (label, path) in filenames {
            normalizers.insert(label.clone(), Normalizer::load(path)?);
        }
        Ok(Self { normalizers })
    }

    pub fn labels(&self) -> Vec<&str> {
        self.normalizers.keys().map(String::as_str).collect()
    }

    pub fn get(&self, label: &str) -> Option<&Normalizer> {
        self.normalizers.get(label)
    }

    pub fn insert(&mut self, label: impl Into<String>, normalizer: Normalizer) {
        self.normalizers.insert(label.into(), normalizer);
    }

    /// Take over every label of `other`, replacing existing ones.
    pub fn extend(&mut self, other: RepositoryNormalizer) {
        self.normalizers.extend(other.normalizers);
    }

    pub fn len(&self) -> usize {
        self.normalizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalizers.is_empty()
    }

    /// Accumulate every stream of every label.
    pub fn accumulate(&mut self, repository: &DataRepository) -> Result<&mut Self> {
        for (label, _, matrix) in repository.iter() {
            self.normalizers
                .entry(label.to_string())
                .or_default()
                .accumulate(matrix)?;
        }
        Ok(self)
    }

    pub fn finalize(&mut self) -> &mut Self {
        for normalizer in self.normalizers.values_mut() {
            normalizer.finalize();
        }
        self
    }

    /// Labels without a normalizer pass through untouched.
    pub fn normalize(&self, mut repository: DataRepository) -> Result<DataRepository> {
        for (label, stream, matrix) in repository.iter_mut() {
            let Some(normalizer) = self.normalizers.get(label) else {
                debug!(label, "no normalizer for stream, left as is");
                continue;
            };
            normalizer
                .normalize_in_place(matrix)
                .map_err(|err| match err {
                    Error::Shape(msg) => Error::Shape(format!("[{}::{}] {}", label, stream, msg)),
                    other => other,
                })?;
        }
        Ok(repository)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<&Self> {
        persist::save_json(self, path)?;
        Ok(self)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        persist::load_json(path)
    }
}
