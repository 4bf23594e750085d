//! gemix Library
//!
//! Core modules for deploying and operating openGemini clusters.

pub mod app;
pub mod config;
pub mod errors;
pub mod executor;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod operation;
pub mod storage;
pub mod task;
pub mod topology;
pub mod utils;

