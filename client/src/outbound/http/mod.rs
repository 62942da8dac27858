//! Claims service outbound adapters.
//!
//! This module provides a thin HTTP implementation of the `ClaimsGateway`
//! and `UserDirectory` ports.

mod dto;
mod gateway;

pub use gateway::{HttpGateway, HttpIdentity};
