//! Generate Hivemall SQL queries and a digdag workflow from a YAML pipeline
//! definition.
//!
//! The query generators ([`preprocessing`], [`stats`], [`model`],
//! [`evaluation`]) are plain functions returning SQL text. [`Pipeline`] wires
//! them together from a [`PipelineConfig`] and writes the query files plus a
//! `.dig` workflow.

pub mod cli;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod pipeline;
pub mod preprocessing;
pub mod query;
pub mod stats;
pub mod value;
pub mod workflow;

pub use config::PipelineConfig;
pub use error::{GenError, Result};
pub use pipeline::{ColumnPlan, Pipeline};
pub use query::{QueryBuilder, WithClauses, build_query};
pub use value::Value;
