//! Writing output objects next to their node for the frontend to fetch.

use std::path::Path;

use serde::Serialize;
use studio_core::experiment::OutputPath;
use studio_core::output::{ImageFrames, OutputObject, PlotMeta};

use crate::error::PipelineError;
use crate::layout::path_segment;
use crate::store::write_atomic;

pub const PLOT_META_SUFFIX: &str = ".plot-meta.json";

/// Export one named output into `node_dir` and describe it.
///
/// Writes `<name>.json` (`<name>.html` for HTML) plus `<name>.plot-meta.json`
/// when the object carries plot metadata. Unknown kinds are not exported
/// and yield `None`.
pub async fn export(
    name: &str,
    object: &OutputObject,
    node_dir: &Path,
) -> Result<Option<OutputPath>, PipelineError> {
    let Some(output_type) = object.output_type() else {
        tracing::debug!(output = name, "Skipping output of unknown kind");
        return Ok(None);
    };
    if let Err(e) = path_segment("output name", name) {
        tracing::warn!(output = name, error = %e, "Skipping output with unsafe name");
        return Ok(None);
    }

    let path = match object {
        OutputObject::Html(html) => {
            let path = node_dir.join(format!("{name}.html"));
            write_atomic(&path, html.data.as_bytes()).await?;
            display_path(&path)
        }
        OutputObject::Image(image) => {
            let json_path = node_dir.join(format!("{name}.json"));
            write_json(&json_path, &PreviewDoc { data: image.data.preview() }).await?;
            match (&image.data, image.paths.first()) {
                (ImageFrames::Stack(_), Some(source)) => source.clone(),
                _ => display_path(&json_path),
            }
        }
        other => {
            let json_path = node_dir.join(format!("{name}.json"));
            write_json(&json_path, other).await?;
            display_path(&json_path)
        }
    };

    if let Some(meta) = object.meta() {
        write_plot_meta(name, meta, node_dir).await?;
    }

    Ok(Some(OutputPath {
        path,
        output_type,
        max_index: object.max_index(),
    }))
}

#[derive(Serialize)]
struct PreviewDoc {
    data: ImageFrames,
}

async fn write_plot_meta(name: &str, meta: &PlotMeta, node_dir: &Path) -> Result<(), PipelineError> {
    let path = node_dir.join(format!("{name}{PLOT_META_SUFFIX}"));
    write_json(&path, meta).await
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let raw = serde_json::to_vec(value).map_err(PipelineError::json(path))?;
    write_atomic(path, &raw).await
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
