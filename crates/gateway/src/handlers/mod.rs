//! API handlers module

pub mod files;
pub mod health;
pub mod papers;
pub mod search;
pub mod upload;
