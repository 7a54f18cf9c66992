pub mod config;
pub mod error;
pub mod extract;
pub mod free_space;
pub mod render;
pub mod solver;
pub mod types;

pub use config::PackConfig;
pub use error::{Error, Result};
pub use solver::{Solver, pack};
