mod config;
mod error;
mod filter;
mod grid;
mod types;

pub use config::GmsConfig;
pub use error::{GmsError, GmsResult};
pub use filter::GmsFilter;
pub use grid::{Grid, GridOffset};
