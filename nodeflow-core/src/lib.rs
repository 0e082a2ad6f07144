//! # NodeFlow Core
//!
//! Fluent builder and executor for step graphs with branches, labeled jumps,
//! shared error handlers and cleanup callbacks.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
mod executor;
mod flow;
mod graph;
mod step;
mod value;


pub use config::RunConfig;
pub use error::{FlowError, Result};
pub use executor::RunHandle;
pub use flow::Flow;
pub use graph::{LineageId, NodeId};
pub use step::{CleanupHandler, Completion, ErrorHandler, Link, Step};
pub use value::Truthy;

/// Prelude module for core functionality
pub mod prelude {
    pub use crate::{
        Completion, Flow, FlowError, Link, RunConfig, RunHandle, Step, Truthy,
    };
}
