//! Library half of `licitactl`: service wiring and text rendering.

#![warn(clippy::all)]

pub mod app;
pub mod render;

pub use app::{read_form, App};
