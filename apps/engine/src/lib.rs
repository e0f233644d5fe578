//! Layout analysis and reconstruction for translated documents.
//!
//! Takes an extracted `DocumentStructure` plus a translation per text region, fits each
//! translation into its region's geometry, resolves the overlaps that fitting introduces,
//! and returns the finalized document with a `LayoutReport`.

pub mod collaborators;
pub mod config;
pub mod errors;
pub mod layout;
pub mod models;
pub mod reconstruction;
pub mod routes;
pub mod state;
