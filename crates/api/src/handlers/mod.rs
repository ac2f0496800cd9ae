pub mod experiments;
pub mod files;
pub mod params;
pub mod run;
