pub mod canvas;
pub mod config;
pub mod error;
pub mod mnist;
pub mod network;
pub mod optimizer;
pub mod train;
pub mod ui;

pub use error::{Error, Result};
