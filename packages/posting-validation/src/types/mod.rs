//! Data types shared by the pipeline stages.

pub mod audit;
pub mod candidate;
pub mod classification;
pub mod config;
pub mod content;
pub mod outcome;
pub mod quality;
