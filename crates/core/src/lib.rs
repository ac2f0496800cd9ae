pub mod error;
pub mod experiment;
pub mod nwb;
pub mod output;
pub mod params;
pub mod registry;
pub mod roles;
pub mod snakemake;
pub mod types;
pub mod workflow;
