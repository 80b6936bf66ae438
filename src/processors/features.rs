use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::registry::ProcessorRegistry;
use super::{parse_params, wrong_input, ChainData, ItemType, ProcessArgs, Processor};
use crate::containers::{DataMatrix, DataRepository};
use crate::error::{Error, Result};
use crate::features::{
    check_sample_rate, extractor_for_label, ExtractorParams, FeatureExtractor, MelExtractor,
    MfccAccelerationExtractor, MfccDeltaExtractor, MfccStaticExtractor, RmsEnergyExtractor,
    SpectralCentroidExtractor, ZeroCrossingRateExtractor,
};

/// Audio in, one feature matrix out.
pub struct ExtractorProcessor {
    name: &'static str,
    extractor: Box<dyn FeatureExtractor>,
}

impl ExtractorProcessor {
    pub fn new(name: &'static str, extractor: Box<dyn FeatureExtractor>) -> Self {
        Self { name, extractor }
    }

    pub fn extractor(&self) -> &dyn FeatureExtractor {
        self.extractor.as_ref()
    }
}

impl Processor for ExtractorProcessor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn input_type(&self) -> ItemType {
        ItemType::Audio
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn process(&mut self, data: ChainData, _args: &ProcessArgs) -> Result<ChainData> {
        let ChainData::Audio(audio) = &data else {
            return Err(wrong_input(self.name, ItemType::Audio, &data));
        };
        let container = self.extractor.extract_container(audio)?;
        debug!(
            processor = self.name,
            shape = ?container.shape(),
            "extracted features"
        );
        Ok(ChainData::Matrix(container))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryExtractorParams {
    /// Stream label (`mel`, `mfcc`, ...) to extractor settings
    pub parameters: BTreeMap<String, ExtractorParams>,
}

/// Audio in, one stream per label and per channel out.
pub struct RepositoryFeatureExtractorProcessor {
    extractors: Vec<(String, Box<dyn FeatureExtractor>)>,
}

impl RepositoryFeatureExtractorProcessor {
    pub fn new(params: RepositoryExtractorParams) -> Result<Self> {
        if params.parameters.is_empty() {
            return Err(Error::config(
                "RepositoryFeatureExtractorProcessor: no stream labels given",
            ));
        }
        let extractors = params
            .parameters
            .into_iter()
            .map(|(label, settings)| {
                let extractor = extractor_for_label(&label, settings)?;
                Ok((label, extractor))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { extractors })
    }
}

impl Processor for RepositoryFeatureExtractorProcessor {
    fn name(&self) -> &'static str {
        "RepositoryFeatureExtractorProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::Audio
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataRepository
    }

    fn process(&mut self, data: ChainData, _args: &ProcessArgs) -> Result<ChainData> {
        let ChainData::Audio(audio) = &data else {
            return Err(wrong_input(self.name(), ItemType::Audio, &data));
        };
        let mut repository = DataRepository::new();
        for (label, extractor) in &self.extractors {
            check_sample_rate(extractor.params(), audio)?;
            for (stream, samples) in audio.channels.iter().enumerate() {
                let matrix = DataMatrix::from_2d(
                    extractor.extract(samples)?,
                    Some(extractor.params().time_resolution()),
                );
                repository.set_container(matrix, label, stream);
            }
        }
        Ok(ChainData::Repository(repository))
    }
}

fn boxed<E: FeatureExtractor + 'static>(
    name: &'static str,
    extractor: E,
) -> Box<dyn Processor> {
    Box::new(ExtractorProcessor::new(name, Box::new(extractor)))
}

pub(crate) fn register(registry: &mut ProcessorRegistry) {
    registry.register("MelExtractorProcessor", |params: Value| {
        let params = parse_params("MelExtractorProcessor", params)?;
        Ok(boxed("MelExtractorProcessor", MelExtractor::new(params)?))
    });
    registry.register("MfccStaticExtractorProcessor", |params: Value| {
        let params = parse_params("MfccStaticExtractorProcessor", params)?;
        Ok(boxed(
            "MfccStaticExtractorProcessor",
            MfccStaticExtractor::new(params)?,
        ))
    });
    registry.register("MfccDeltaExtractorProcessor", |params: Value| {
        let params = parse_params("MfccDeltaExtractorProcessor", params)?;
        Ok(boxed(
            "MfccDeltaExtractorProcessor",
            MfccDeltaExtractor::new(params)?,
        ))
    });
    registry.register("MfccAccelerationExtractorProcessor", |params: Value| {
        let params = parse_params("MfccAccelerationExtractorProcessor", params)?;
        Ok(boxed(
            "MfccAccelerationExtractorProcessor",
            MfccAccelerationExtractor::new(params)?,
        ))
    });
    registry.register("ZeroCrossingRateExtractorProcessor", |params: Value| {
        let params = parse_params("ZeroCrossingRateExtractorProcessor", params)?;
        Ok(boxed(
            "ZeroCrossingRateExtractorProcessor",
            ZeroCrossingRateExtractor::new(params)?,
        ))
    });
    registry.register("RMSEnergyExtractorProcessor", |params: Value| {
        let params = parse_params("RMSEnergyExtractorProcessor", params)?;
        Ok(boxed(
            "RMSEnergyExtractorProcessor",
            RmsEnergyExtractor::new(params)?,
        ))
    });
    registry.register("SpectralCentroidExtractorProcessor", |params: Value| {
        let params = parse_params("SpectralCentroidExtractorProcessor", params)?;
        Ok(boxed(
            "SpectralCentroidExtractorProcessor",
            SpectralCentroidExtractor::new(params)?,
        ))
    });
    registry.register("RepositoryFeatureExtractorProcessor", |params: Value| {
        let params = parse_params("RepositoryFeatureExtractorProcessor", params)?;
        Ok(Box::new(RepositoryFeatureExtractorProcessor::new(params)?) as Box<dyn Processor>)
    });
}
