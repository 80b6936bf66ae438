use ndarray::{concatenate, Array2, Axis, Slice};
use tracing::debug;

use crate::containers::{DataMatrix, DataRepository};
use crate::error::{Error, Result};
use crate::recipe::{IntoRecipe, Recipe};

/// Builds one matrix from selected repository streams, in recipe order.
#[derive(Debug, Clone, PartialEq)]
pub struct Stacker {
    recipe: Recipe,
    hop: usize,
}

impl Stacker {
    pub fn new(recipe: impl IntoRecipe) -> Result<Self> {
        Self::with_hop(recipe, 1)
    }

    pub fn with_hop(recipe: impl IntoRecipe, hop: usize) -> Result<Self> {
        if hop == 0 {
            return Err(Error::config("stacking hop must be positive"));
        }
        Ok(Self {
            recipe: recipe.into_recipe()?,
            hop,
        })
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Rows are concatenated along the feature axis; time order is untouched.
    pub fn stack(&self, repository: &DataRepository) -> Result<DataMatrix> {
        if self.recipe.is_empty() {
            return Err(Error::config("cannot stack with an empty recipe"));
        }

        let mut blocks: Vec<Array2<f64>> = Vec::with_capacity(self.recipe.len());
        let mut length: Option<(usize, String)> = None;
        let mut time_resolution: Option<f64> = None;

        for selector in self.recipe.iter() {
            let stream = selector.stream_or(repository.default_stream_id());
            let matrix = repository.require(&selector.label, stream)?;
            let focused = matrix.get_focused();
            let view = focused.view2()?;

            if let Some((expected, first)) = &length {
                if view.ncols() != *expected {
                    return Err(Error::shape(format!(
                        "stream [{}] has length {}, [{}] has {}",
                        selector, view.ncols(), first, expected
                    )));
                }
            } else {
                length = Some((view.ncols(), selector.to_string()));
            }

            match (time_resolution, focused.time_resolution) {
                (Some(expected), Some(actual)) if (expected - actual).abs() > f64::EPSILON => {
                    return Err(Error::shape(format!(
                        "stream [{}] has time resolution {}, expected {}",
                        selector, actual, expected
                    )));
                }
                (None, Some(actual)) => time_resolution = Some(actual),
                _ => {}
            }

            let rows = selector.selection.indices(view.nrows())?;
            let block = view
                .select(Axis(0), &rows)
                .slice_axis(Axis(1), Slice::new(0, None, self.hop as isize))
                .to_owned();
            blocks.push(block);
        }

        let views: Vec<_> = blocks.iter().map(|block| block.view()).collect();
        let stacked = concatenate(Axis(0), &views)?;
        debug!(
            recipe = %self.recipe,
            shape = ?stacked.shape(),
            "stacked repository"
        );
        Ok(DataMatrix::from_2d(
            stacked,
            time_resolution.map(|res| res * self.hop as f64),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository(length: usize) -> DataRepository {
        let mut repo = DataRepository::new();
        let mel = Array2::from_shape_fn((40, length), |(r, c)| (r * 1000 + c) as f64);
        let mfcc = Array2::from_shape_fn((20, length), |(r, c)| -((r * 1000 + c) as f64));
        repo.set_container(DataMatrix::from_2d(mel, Some(0.02)), "mel", 0);
        repo.set_container(DataMatrix::from_2d(mfcc, Some(0.02)), "mfcc", 0);
        repo
    }

    #[test]
    fn stacks_selected_rows_in_recipe_order() {
        let stacked = Stacker::new("mel;mfcc=1-19")
            .unwrap()
            .stack(&repository(501))
            .unwrap();
        assert_eq!(stacked.shape(), &[59, 501]);
        assert_eq!(stacked.data()[[0, 3]], 3.0);
        // first mfcc row taken is row 1
        assert_eq!(stacked.data()[[40, 0]], -1000.0);
        assert_eq!(stacked.time_resolution, Some(0.02));
    }

    #[test]
    fn reordered_recipe_reorders_rows() {
        let stacked = Stacker::new("mfcc=0,2;mel=5")
            .unwrap()
            .stack(&repository(10));
        // `mel=5` asks for stream 5, which does not exist
        assert!(matches!(stacked, Err(Error::Config(_))));

        let stacked = Stacker::new("mfcc=0:0,2;mel=0:5")
            .unwrap()
            .stack(&repository(10))
            .unwrap();
        assert_eq!(stacked.vector_length(), 3);
        assert_eq!(stacked.data()[[1, 0]], -2000.0);
        assert_eq!(stacked.data()[[2, 0]], 5000.0);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let mut repo = repository(10);
        repo.set_container(DataMatrix::from_2d(Array2::zeros((3, 11)), Some(0.02)), "zcr", 0);
        let err = Stacker::new("mel;zcr").unwrap().stack(&repo).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn missing_label_is_configuration_error() {
        let err = Stacker::new("chroma").unwrap().stack(&repository(4)).unwrap_err();
        assert!(err.to_string().contains("chroma"));
    }

    #[test]
    fn hop_thins_time_axis() {
        let stacked = Stacker::with_hop("mel", 2)
            .unwrap()
            .stack(&repository(10))
            .unwrap();
        assert_eq!(stacked.shape(), &[40, 5]);
        assert_eq!(stacked.data()[[0, 1]], 2.0);
        assert_eq!(stacked.time_resolution, Some(0.04));
    }
}
