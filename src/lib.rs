pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod output;
pub mod position;
pub mod server;
