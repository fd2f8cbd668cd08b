//! Generative oracle interface.
//!
//! The oracle is consumed as a black box: it receives a prompt plus a single
//! tool whose input schema is the only acceptable output shape, and returns
//! the tool input or fails.
//!
//! ```text
//! GenerationClient --invoke(request)--> &dyn Oracle
//!                                          |
//!                                          +--> HttpOracle  (Messages API)
//!                                          +--> test fakes
//! ```

pub mod http;
pub mod trait_def;
pub mod types;

pub use http::{HttpOracle, OracleConfig};
pub use trait_def::Oracle;
pub use types::{OracleError, OracleReply, OracleRequest, StopReason, ToolSpec};
