//! Core library: scanning, thumbnail cache, encoder command building and orchestration.

pub mod command;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod scanner;
pub mod thumbnails;
pub mod upload;

pub use error::{Result, SlicerError};
