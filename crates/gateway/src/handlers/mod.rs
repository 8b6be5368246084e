//! HTTP request handlers

pub mod analyses;
pub mod health;
pub mod papers;
pub mod sessions;
