//! On-disk corpus layout: naming, compression, reading, writing and merging.

pub mod compression;
pub mod glob;
pub mod lines;
pub mod merge;
pub mod naming;
pub mod reader;
pub mod writer;
