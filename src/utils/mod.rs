//! Utility modules

pub mod data_dir;
pub mod path;
