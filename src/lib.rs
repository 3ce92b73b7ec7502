pub mod analysis;
pub mod config;
pub mod import_error;
pub mod importers;
pub mod models;
pub mod scoring;
pub mod services;
