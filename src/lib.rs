pub mod api;
pub mod app;
pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod model;
pub mod session;
pub mod upload;
