//! Client-side claim reconciliation and enrichment for the expense claims
//! service.

pub mod config;
pub mod domain;
pub mod outbound;
