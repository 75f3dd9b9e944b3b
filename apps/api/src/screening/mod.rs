//! Resume screening: normalize → extract → score → gate → report.

pub mod documents;
pub mod extraction;
pub mod handlers;
pub mod heuristics;
pub mod job;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod scoring;
pub mod store;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;
