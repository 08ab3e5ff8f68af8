pub mod config;
pub mod error;
pub mod reading;
pub mod thresholds;

pub use config::Config;
pub use error::*;
pub use reading::*;
pub use thresholds::*;
