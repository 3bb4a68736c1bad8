//! Build weighted word cooccurrence graphs from a directory of documents
//!
//! The work is split into phases that communicate only through files under one output
//! directory: a vocabulary build per worker, a merge into one global dictionary, a windowed pair
//! count per worker, and an aggregation of the pair counts into one edge list per window size.
//! `pipeline::Pipeline` runs them in order; the binaries are thin wrappers around it.


#[macro_use] extern crate log;
pub mod errors;
pub mod farm;
pub mod language;
pub mod preprocess;
pub mod source;
pub mod codec;
pub mod layout;
pub mod config;
pub mod builder;
pub mod merger;
pub mod window;
pub mod aggregate;
pub mod unique;
pub mod pipeline;
