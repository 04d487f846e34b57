//! Karpenter status dashboard
//!
//! Serves the multi-cluster status aggregation over HTTP together with health
//! and Prometheus endpoints.

pub mod api;
pub mod config;
