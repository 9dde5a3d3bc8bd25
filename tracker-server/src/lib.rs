//! Live train tracker for the CP (Comboios de Portugal) network.
//!
//! Polls the public CP station boards, enriches every train seen there with
//! its live position and stops, and publishes the in-bounds trains as an
//! atomically swapped snapshot that a map dashboard reads over HTTP.

pub mod cache;
pub mod config;
pub mod cp;
pub mod domain;
pub mod enrich;
pub mod pipeline;
pub mod service;
pub mod snapshot;
pub mod stations;
pub mod web;
