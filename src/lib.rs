pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod resolve;
