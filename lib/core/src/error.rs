//! Error handling foundation for agentflow.
//!
//! Only the `Result` alias lives here. Each crate defines its own domain
//! error enums in its `error` module and returns them wrapped in a
//! rootcause [`Report`], adding context with `.context()` as errors cross
//! layers.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
