//! Upload review service: users submit images and PDFs with metadata,
//! admins accept or reject them, and both sides see changes as they happen.

pub mod backend;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod testing;
