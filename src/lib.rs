pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod response;
pub mod routes;
pub mod schema;
pub mod services;
pub mod state;
pub mod utils;
