//! Graph synchronization engine for the butterfly market dashboard.
//!
//! Turns analytics-service responses into a laid-out relationship graph around
//! a focal instrument, plus the sidebar state that depends on it.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod layout;
pub mod logging;
pub mod model;
pub mod service;
pub mod storage;
pub mod view;
