//! HTTP handlers.

pub mod requests;
pub mod views;
