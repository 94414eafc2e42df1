pub mod config;
pub mod models;
pub mod realtime;
pub mod repositories;
pub mod services;
