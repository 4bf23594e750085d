//! HTTP access to the package mirror

pub mod client;
