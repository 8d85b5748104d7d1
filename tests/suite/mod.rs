//! Integration test modules

mod reading_flow;
mod service;
