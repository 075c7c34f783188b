//! Workspace core of a browser playground: a project tree, editor buffers
//! with unsaved-change tracking, and one-way sync of both into a sandbox
//! runtime and a persistence backend.

pub mod app;
pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod keymap;
pub mod logging;
pub mod sync;
pub mod tree;
pub mod ui;
pub mod workspace;

pub use error::{AppError, Result};
pub use workspace::{SaveAllReport, SaveFailure, Workspace};
