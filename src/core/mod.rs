//! Core translation engine: inputs, settings, dispatch and normalization

pub mod backend;
pub mod cost;
pub mod dispatch;
pub mod errors;
pub mod input;
pub mod logs;
pub mod response;
pub mod retry;
pub mod settings;
