use tracing::debug;

use crate::containers::{DataMatrix, DataRepository};
use crate::error::{Error, Result};
use crate::types::MetaData;

/// Frames touched by any event: onset rounds down, offset rounds up.
fn covered_frames(matrix: &DataMatrix, events: &MetaData) -> Result<Vec<bool>> {
    let resolution = matrix
        .time_resolution
        .filter(|res| *res > 0.0)
        .ok_or_else(|| Error::config("time resolution not set, cannot place events"))?;
    let length = matrix.length();
    let mut covered = vec![false; length];
    for event in &events.items {
        let (Some(onset), Some(offset)) = (event.onset, event.offset) else {
            return Err(Error::config("masking event needs both onset and offset"));
        };
        let start = ((onset / resolution).floor().max(0.0) as usize).min(length);
        let stop = ((offset / resolution).ceil().max(0.0) as usize).min(length);
        if start < stop {
            covered[start..stop].fill(true);
        }
    }
    Ok(covered)
}

/// Keep the frames whose coverage equals `keep`, in every stream.
fn retain_frames(repository: &mut DataRepository, events: &MetaData, keep: bool) -> Result<()> {
    for (label, stream, matrix) in repository.iter_mut() {
        let frame_ids: Vec<usize> = covered_frames(matrix, events)?
            .into_iter()
            .enumerate()
            .filter(|(_, covered)| *covered == keep)
            .map(|(frame, _)| frame)
            .collect();
        let before = matrix.length();
        let data = matrix.get_frames(Some(&frame_ids), None, 1)?;
        matrix.set_data(data)?;
        debug!(label, stream, before, after = frame_ids.len(), "frames retained");
    }
    Ok(())
}

/// Drops the frames covered by mask events from every repository stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Masker {
    mask_events: MetaData,
}

impl Masker {
    pub fn new(mask_events: MetaData) -> Self {
        Self { mask_events }
    }

    pub fn set_mask(&mut self, mask_events: MetaData) -> &mut Self {
        self.mask_events = mask_events;
        self
    }

    pub fn mask_events(&self) -> &MetaData {
        &self.mask_events
    }

    /// Mask with `events`, or with the stored mask when none are given.
    pub fn mask(&self, mut repository: DataRepository, events: Option<&MetaData>) -> Result<DataRepository> {
        retain_frames(&mut repository, events.unwrap_or(&self.mask_events), false)?;
        Ok(repository)
    }
}

/// Keeps only the frames covered by selection events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    selection_events: MetaData,
}

impl Selector {
    pub fn new(selection_events: MetaData) -> Self {
        Self { selection_events }
    }

    pub fn set_mask(&mut self, selection_events: MetaData) -> &mut Self {
        self.selection_events = selection_events;
        self
    }

    pub fn select(&self, mut repository: DataRepository, events: Option<&MetaData>) -> Result<DataRepository> {
        retain_frames(&mut repository, events.unwrap_or(&self.selection_events), true)?;
        Ok(repository)
    }
}
