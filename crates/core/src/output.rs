//! Node output objects and their classification.
//!
//! A successful node writes a map of named [`OutputObject`]s. Each kind
//! knows how it is rendered ([`OutputType`]) and, for sliceable data, how
//! many slices it has.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::experiment::OutputType;

/// Frames kept in the JSON preview of an image stack.
pub const IMAGE_PREVIEW_FRAMES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xlabel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ylabel: Option<String>,
}

/// Pixel data: one frame or a stack of frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageFrames {
    Stack(Vec<Vec<Vec<f64>>>),
    Frame(Vec<Vec<f64>>),
}

impl ImageFrames {
    pub fn frame_count(&self) -> usize {
        match self {
            ImageFrames::Stack(frames) => frames.len(),
            ImageFrames::Frame(_) => 1,
        }
    }

    /// At most [`IMAGE_PREVIEW_FRAMES`] leading frames.
    pub fn preview(&self) -> ImageFrames {
        match self {
            ImageFrames::Stack(frames) => ImageFrames::Stack(
                frames.iter().take(IMAGE_PREVIEW_FRAMES).cloned().collect(),
            ),
            ImageFrames::Frame(frame) => ImageFrames::Frame(frame.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOutput {
    pub data: ImageFrames,
    /// Source files backing the stack, if the node produced any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(default)]
    pub meta: Option<PlotMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesOutput {
    /// One row per series. Gaps are `null`.
    pub data: Vec<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<Vec<Vec<Option<f64>>>>,
    #[serde(default)]
    pub meta: Option<PlotMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapOutput {
    pub data: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub meta: Option<PlotMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiOutput {
    /// Label image; background pixels are `null`.
    pub data: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    pub meta: Option<PlotMeta>,
}

/// Scatter and bar payloads are passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOutput {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<Vec<String>>,
    #[serde(default)]
    pub meta: Option<PlotMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlOutput {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutputObject {
    Image(ImageOutput),
    Timeseries(TimeseriesOutput),
    Heatmap(HeatmapOutput),
    Roi(RoiOutput),
    Scatter(ChartOutput),
    Bar(ChartOutput),
    Html(HtmlOutput),
    /// A kind this server does not know how to render.
    #[serde(other)]
    Unknown,
}

impl OutputObject {
    /// Rendering type, `None` for unknown kinds.
    pub fn output_type(&self) -> Option<OutputType> {
        Some(match self {
            OutputObject::Image(_) => OutputType::Images,
            OutputObject::Timeseries(_) => OutputType::Timeseries,
            OutputObject::Heatmap(_) => OutputType::Heatmap,
            OutputObject::Roi(_) => OutputType::Roi,
            OutputObject::Scatter(_) => OutputType::Scatter,
            OutputObject::Bar(_) => OutputType::Bar,
            OutputObject::Html(_) => OutputType::Html,
            OutputObject::Unknown => return None,
        })
    }

    /// Slice count for sliceable outputs.
    pub fn max_index(&self) -> Option<u64> {
        match self {
            OutputObject::Image(image) => Some(image.data.frame_count() as u64),
            OutputObject::Timeseries(series) => Some(series.data.len() as u64),
            _ => None,
        }
    }

    pub fn meta(&self) -> Option<&PlotMeta> {
        match self {
            OutputObject::Image(o) => o.meta.as_ref(),
            OutputObject::Timeseries(o) => o.meta.as_ref(),
            OutputObject::Heatmap(o) => o.meta.as_ref(),
            OutputObject::Roi(o) => o.meta.as_ref(),
            OutputObject::Scatter(o) | OutputObject::Bar(o) => o.meta.as_ref(),
            OutputObject::Html(_) | OutputObject::Unknown => None,
        }
    }
}

/// What a node's result artifact holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeResult {
    /// The node failed; the string is its error text.
    Failure(String),
    /// The node failed with several lines of error text.
    FailureLines(Vec<String>),
    /// Named entries, only some of which are renderable outputs.
    Outputs(IndexMap<String, Value>),
}

impl NodeResult {
    /// Error text for failures, lines joined with newlines.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            NodeResult::Failure(message) => Some(message.clone()),
            NodeResult::FailureLines(lines) => Some(lines.join("\n")),
            NodeResult::Outputs(_) => None,
        }
    }

    /// Entries that parse as [`OutputObject`]s, in artifact order.
    ///
    /// Nodes return other values next to their outputs (NWB fragments, raw
    /// arrays); those are skipped.
    pub fn output_objects(&self) -> IndexMap<String, OutputObject> {
        let NodeResult::Outputs(entries) = self else {
            return IndexMap::new();
        };
        entries
            .iter()
            .filter_map(|(name, value)| match OutputObject::deserialize(value) {
                Ok(object) => Some((name.clone(), object)),
                Err(e) => {
                    tracing::debug!(name, error = %e, "Skipping non-output entry");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn parse(value: Value) -> OutputObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn three_frame_stack_has_max_index_three() {
        let obj = parse(json!({
            "kind": "image",
            "data": [[[0.0, 1.0], [1.0, 0.0]], [[0.0, 1.0], [1.0, 0.0]], [[0.0, 1.0], [1.0, 0.0]]]
        }));
        assert_eq!(obj.output_type(), Some(OutputType::Images));
        assert_eq!(obj.max_index(), Some(3));
    }

    #[test]
    fn single_frame_has_max_index_one() {
        let obj = parse(json!({"kind": "image", "data": [[0.0, 1.0], [1.0, 0.0]]}));
        assert_matches!(&obj, OutputObject::Image(ImageOutput { data: ImageFrames::Frame(_), .. }));
        assert_eq!(obj.max_index(), Some(1));
    }

    #[test]
    fn timeseries_max_index_is_series_count() {
        let obj = parse(json!({"kind": "timeseries", "data": [[1.0, 2.0], [3.0, null]]}));
        assert_eq!(obj.output_type(), Some(OutputType::Timeseries));
        assert_eq!(obj.max_index(), Some(2));
    }

    #[test]
    fn unknown_kind_is_skipped_not_rejected() {
        let obj = parse(json!({"kind": "volume3d", "data": [1, 2, 3]}));
        assert_eq!(obj, OutputObject::Unknown);
        assert_eq!(obj.output_type(), None);
    }

    #[test]
    fn preview_keeps_ten_frames() {
        let frames = ImageFrames::Stack(vec![vec![vec![0.0]]; 25]);
        assert_eq!(frames.preview().frame_count(), IMAGE_PREVIEW_FRAMES);
    }

    #[test]
    fn node_result_shapes() {
        let failure: NodeResult = serde_json::from_value(json!("boom")).unwrap();
        assert_eq!(failure.failure_message().as_deref(), Some("boom"));

        let lines: NodeResult = serde_json::from_value(json!(["line 1", "line 2"])).unwrap();
        assert_eq!(lines.failure_message().as_deref(), Some("line 1\nline 2"));

        let outputs: NodeResult = serde_json::from_value(json!({
            "report": {"kind": "html", "data": "<p>ok</p>"},
            "bars": {"kind": "bar", "data": [1, 2], "meta": {"title": "weights"}}
        }))
        .unwrap();
        let map = outputs.output_objects();
        assert_eq!(map.len(), 2);
        assert_eq!(map["bars"].meta().and_then(|m| m.title.as_deref()), Some("weights"));
    }

    #[test]
    fn untagged_entries_are_not_outputs() {
        let result: NodeResult = serde_json::from_value(json!({
            "fluorescence": {"kind": "timeseries", "data": [[1.0, 2.0]]},
            "iscell": [1, 0, 1],
            "nwbfile": {"device": "scope"}
        }))
        .unwrap();

        assert_eq!(result.failure_message(), None);
        let outputs = result.output_objects();
        assert_eq!(outputs.keys().collect::<Vec<_>>(), ["fluorescence"]);
        assert_matches!(outputs["fluorescence"], OutputObject::Timeseries(_));
    }
}
