//! folio: a static content pipeline.
//!
//! Content flows through a fixed sequence of stages (see
//! [`build::pipeline::Stage`]); plugins attach to stages with a priority, and
//! feeds are selected from the item store with a small boolean filter
//! language ([`filter::Expression`]).

pub mod build;
pub mod config;
pub mod filter;
pub mod util;
