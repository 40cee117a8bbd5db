//! Query lifecycle and result assembly.

pub mod execution;
pub mod results;

pub use execution::{QueryExecution, QueryState};
pub use results::{QueryResults, ResultTable};
