pub mod aggregate;
pub mod config;
pub mod cycle;
pub mod error;
pub mod io;
pub mod membership;
pub mod model;
pub mod parse;
pub mod plan;

pub use error::{ParseRejection, Result, ToolError};
