//! Mindscope - Mental-health prevalence dashboard pipeline
//!
//! Loads prevalence, DALY, treatment-gap and forecast tables, filters and
//! reshapes them, and produces backend-agnostic chart payloads.

pub mod catalog;
pub mod charts;
pub mod config;
pub mod dashboard;
pub mod data;
