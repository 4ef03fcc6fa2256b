//! AgriBoundary Core - Domain models, errors, configuration and service ports
//!
//! This crate contains the request-scoped data model shared by every pipeline stage,
//! the capability traits the imagery and segmentation backends implement, and the
//! readers for the vector formats an area of interest can be uploaded in.

pub mod auth;
pub mod config;
pub mod error;
pub mod formats;
pub mod models;
pub mod ports;

pub use error::{BoundaryError, Result, Stage};
