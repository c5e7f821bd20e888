//! Media Store Module
//!
//! Durable storage for photos, analyses, suggestions, and processed media,
//! with cascade-delete ownership and one-shot status transitions.

mod db;
mod entities;

pub use db::*;
pub use entities::*;
