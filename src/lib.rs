//! Chart reconciliation library: resolves the tracks of yearly chart listings
//! to one canonical identity across artist and title spelling variants.

pub mod collision;
pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod manifest;
pub mod models;
pub mod normalize;
pub mod output;
pub mod progress;
pub mod readers;
pub mod safety;
