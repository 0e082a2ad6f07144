//! # NodeFlow - Fluent step graphs
//!
//! NodeFlow chains sync and async steps with conditional branches, labeled
//! jumps, shared error handlers and cleanup callbacks, without nesting
//! continuations by hand.
//!
//! ## Features
//!
//! - `logger` (default): tracing setup and ready-made logging handlers
//!
//! ## Quick Start
//!
//! ```rust
//! use nodeflow::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let flow = nodeflow::flow::<i64, FlowContext>()
//!         .label("loop")
//!         .then(|v, _| Ok(v + 1))
//!         .check(|v, _| Ok(if v < 3 { v } else { 0 }))
//!         .on_true(nodeflow::flow::<i64, FlowContext>().goto("loop"))
//!         .then(|v, _| Ok(v + 100))
//!         .on_error(|err, _| eprintln!("error: {err}"));
//!
//!     let result = flow.run(0, FlowContext::default()).join().await?;
//!     assert_eq!(result, Some(100));
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use anyhow;
pub use nodeflow_context as context;
pub use nodeflow_core::*;

#[cfg(feature = "logger")]
#[cfg_attr(docsrs, doc(cfg(feature = "logger")))]
pub use nodeflow_logger as logger;

/// Creates a lineage whose first node runs `link`.
///
/// A `Some` context becomes the default for [`Flow::run_bound`].
pub fn create<V, C>(link: impl Into<Link<V, C>>, context: Option<C>) -> Flow<V, C>
where
    V: Truthy + Send + 'static,
    C: Clone + Send + Sync + 'static,
{
    let flow = Flow::new();
    if let Some(context) = context {
        flow.bind(context);
    }
    tracing::trace!(entry = %flow.node_id(), "created flow");
    flow.chain_step(link)
}

/// Creates an empty lineage.
pub fn flow<V, C>() -> Flow<V, C>
where
    V: Truthy + Send + 'static,
    C: Clone + Send + Sync + 'static,
{
    Flow::new()
}

/// Prelude module for easy imports
pub mod prelude {
    pub use nodeflow_context::FlowContext;
    pub use nodeflow_core::prelude::*;

    #[cfg(feature = "logger")]
    #[cfg_attr(docsrs, doc(cfg(feature = "logger")))]
    pub use nodeflow_logger::Logger;
}
