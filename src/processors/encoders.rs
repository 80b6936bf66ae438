use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::registry::ProcessorRegistry;
use super::{parse_params, wrong_input, ChainData, ItemType, ProcessArgs, Processor};
use crate::data::{EncodeLength, EventRollEncoder, ManyHotEncoder, OneHotEncoder};
use crate::error::{Error, Result};
use crate::types::MetaData;

fn default_resolution() -> f64 {
    1.0
}

fn default_scene_field() -> String {
    "scene_label".to_string()
}

fn default_tag_field() -> String {
    "tags".to_string()
}

fn default_event_field() -> String {
    "event_label".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelEncodingParams {
    pub label_list: Vec<String>,
    #[serde(default = "default_resolution")]
    pub time_resolution: f64,
    #[serde(default)]
    pub length_frames: Option<usize>,
    #[serde(default)]
    pub length_seconds: Option<f64>,
    /// Metadata field holding the label(s); `tags` reads the tag list
    #[serde(default)]
    pub label_field: Option<String>,
}

/// Length override from call arguments, seconds taking precedence like the init parameters.
fn call_length(args: &ProcessArgs) -> Result<Option<EncodeLength>> {
    if let Some(seconds) = args.get_f64("length_seconds")? {
        return Ok(Some(EncodeLength::Seconds(seconds)));
    }
    Ok(args.get_usize("length_frames")?.map(EncodeLength::Frames))
}

fn init_length(params: &LabelEncodingParams) -> EncodeLength {
    match (params.length_seconds, params.length_frames) {
        (Some(seconds), _) => EncodeLength::Seconds(seconds),
        (None, Some(frames)) => EncodeLength::Frames(frames),
        (None, None) => EncodeLength::Frames(1),
    }
}

fn metadata_input<'a>(processor: &str, data: &'a ChainData) -> Result<&'a MetaData> {
    match data {
        ChainData::Metadata(metadata) => Ok(metadata),
        other => Err(wrong_input(processor, ItemType::MetaData, other)),
    }
}

/// Scene label of a clip to a one-hot target matrix.
pub struct OneHotEncodingProcessor {
    encoder: OneHotEncoder,
    label_field: String,
}

impl Processor for OneHotEncodingProcessor {
    fn name(&self) -> &'static str {
        "OneHotEncodingProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::MetaData
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn accepted_keywords(&self) -> &'static [&'static str] {
        &["label", "length_frames", "length_seconds"]
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        let metadata = metadata_input(self.name(), &data)?;
        let label = match args.get_str("label")? {
            Some(label) => label,
            None => metadata
                .items
                .iter()
                .find_map(|item| item.field(&self.label_field))
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::config(format!("no [{}] found in metadata", self.label_field))
                })?,
        };
        let matrix = self.encoder.encode(&label, call_length(args)?)?;
        Ok(ChainData::Matrix(matrix))
    }
}

/// A label given directly, or the first item's label field, to a one-hot matrix.
///
/// Runs without any input data when `label` is passed as a call argument.
pub struct OneHotLabelEncodingProcessor {
    encoder: OneHotEncoder,
    label_field: String,
}

impl Processor for OneHotLabelEncodingProcessor {
    fn name(&self) -> &'static str {
        "OneHotLabelEncodingProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::MetaData
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn accepted_keywords(&self) -> &'static [&'static str] {
        &["label", "label_field", "length_frames", "length_seconds"]
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        let metadata = match &data {
            ChainData::None => None,
            ChainData::Metadata(metadata) => Some(metadata),
            other => return Err(wrong_input(self.name(), ItemType::MetaData, other)),
        };
        let label = match args.get_str("label")? {
            Some(label) => label,
            None => {
                let field = args
                    .get_str("label_field")?
                    .unwrap_or_else(|| self.label_field.clone());
                metadata
                    .and_then(|metadata| metadata.items.first())
                    .and_then(|item| item.field(&field))
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::config(format!(
                            "{}: give a label or metadata with [{}]",
                            self.name(),
                            field
                        ))
                    })?
            }
        };
        let matrix = self.encoder.encode(&label, call_length(args)?)?;
        Ok(ChainData::Matrix(matrix))
    }
}

/// Clip tags to a many-hot target matrix.
pub struct ManyHotEncodingProcessor {
    encoder: ManyHotEncoder,
    label_field: String,
}

impl ManyHotEncodingProcessor {
    fn labels_from(&self, metadata: &MetaData) -> Vec<String> {
        if self.label_field == "tags" {
            let mut labels: Vec<String> = Vec::new();
            for tag in metadata.items.iter().flat_map(|item| item.tags.iter()) {
                if !labels.contains(tag) {
                    labels.push(tag.clone());
                }
            }
            labels
        } else {
            metadata.unique_values(&self.label_field)
        }
    }
}

impl Processor for ManyHotEncodingProcessor {
    fn name(&self) -> &'static str {
        "ManyHotEncodingProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::MetaData
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn accepted_keywords(&self) -> &'static [&'static str] {
        &["label_list", "length_frames", "length_seconds"]
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        let metadata = metadata_input(self.name(), &data)?;
        let labels = match args.get_as::<Vec<String>>("label_list")? {
            Some(labels) => labels,
            None => self.labels_from(metadata),
        };
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        let matrix = self.encoder.encode(&labels, call_length(args)?)?;
        Ok(ChainData::Matrix(matrix))
    }
}

/// Timed events to a frame-level event roll.
pub struct EventRollEncodingProcessor {
    encoder: EventRollEncoder,
    length: Option<EncodeLength>,
}

impl Processor for EventRollEncodingProcessor {
    fn name(&self) -> &'static str {
        "EventRollEncodingProcessor"
    }

    fn input_type(&self) -> ItemType {
        ItemType::MetaData
    }

    fn output_type(&self) -> ItemType {
        ItemType::DataMatrix
    }

    fn accepted_keywords(&self) -> &'static [&'static str] {
        &["length_frames", "length_seconds"]
    }

    fn process(&mut self, data: ChainData, args: &ProcessArgs) -> Result<ChainData> {
        let metadata = metadata_input(self.name(), &data)?;
        let length = call_length(args)?.or(self.length);
        Ok(ChainData::Matrix(self.encoder.encode(metadata, length)?))
    }
}

pub(crate) fn register(registry: &mut ProcessorRegistry) {
    registry.register("OneHotEncodingProcessor", |params: Value| {
        let params: LabelEncodingParams = parse_params("OneHotEncodingProcessor", params)?;
        let length = init_length(&params);
        Ok(Box::new(OneHotEncodingProcessor {
            label_field: params.label_field.unwrap_or_else(default_scene_field),
            encoder: OneHotEncoder::new(params.label_list, params.time_resolution, length)?,
        }) as Box<dyn Processor>)
    });
    registry.register("OneHotLabelEncodingProcessor", |params: Value| {
        let params: LabelEncodingParams = parse_params("OneHotLabelEncodingProcessor", params)?;
        let length = init_length(&params);
        Ok(Box::new(OneHotLabelEncodingProcessor {
            label_field: params.label_field.unwrap_or_else(default_scene_field),
            encoder: OneHotEncoder::new(params.label_list, params.time_resolution, length)?,
        }) as Box<dyn Processor>)
    });
    registry.register("ManyHotEncodingProcessor", |params: Value| {
        let params: LabelEncodingParams = parse_params("ManyHotEncodingProcessor", params)?;
        let length = init_length(&params);
        Ok(Box::new(ManyHotEncodingProcessor {
            label_field: params.label_field.unwrap_or_else(default_tag_field),
            encoder: ManyHotEncoder::new(params.label_list, params.time_resolution, length)?,
        }) as Box<dyn Processor>)
    });
    registry.register("EventRollEncodingProcessor", |params: Value| {
        let params: LabelEncodingParams = parse_params("EventRollEncodingProcessor", params)?;
        let length = match (params.length_seconds, params.length_frames) {
            (None, None) => None,
            _ => Some(init_length(&params)),
        };
        let encoder = EventRollEncoder::new(params.label_list, params.time_resolution)?
            .with_label_field(params.label_field.unwrap_or_else(default_event_field));
        Ok(Box::new(EventRollEncodingProcessor { encoder, length }) as Box<dyn Processor>)
    });
}
