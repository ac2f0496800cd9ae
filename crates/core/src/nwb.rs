//! NWB export settings.

use crate::params::{DataType, ParamDecl};

/// Reserved parameter-tree name for the NWB export settings.
pub const NWB_PARAMS_NAME: &str = "nwb";

/// File extension of NWB exports, looked for by the result collator.
pub const NWB_EXTENSION: &str = "nwb";

pub fn param_decls() -> Vec<ParamDecl> {
    vec![
        ParamDecl::str("session_description", "optinist"),
        ParamDecl::str("identifier", "optinist"),
        ParamDecl::none("experiment_description", DataType::Str),
        ParamDecl::str("name", "Microscope device").section("device"),
        ParamDecl::str("description", "Microscope Information").section("device"),
        ParamDecl::str("manufacturer", "Microscope Manufacture").section("device"),
        ParamDecl::str("name", "OpticalChannel").section("optical_channel"),
        ParamDecl::str("description", "optical channel").section("optical_channel"),
        ParamDecl::float("emission_lambda", 500.0).section("optical_channel"),
        ParamDecl::str("name", "ImagingPlane").section("imaging_plane"),
        ParamDecl::str("description", "standard").section("imaging_plane"),
        ParamDecl::float("imaging_rate", 30.0).section("imaging_plane"),
        ParamDecl::float("excitation_lambda", 900.0).section("imaging_plane"),
        ParamDecl::str("indicator", "GCaMP").section("imaging_plane"),
        ParamDecl::str("location", "V1").section("imaging_plane"),
        ParamDecl::int("starting_time", 0).section("image_series"),
        ParamDecl::list("starting_frame", serde_json::json!([0])).section("image_series"),
        ParamDecl::str("name", "PlaneSegmentation").section("ophys/plane_segmentation"),
        ParamDecl::str("description", "").section("ophys/plane_segmentation"),
    ]
}
