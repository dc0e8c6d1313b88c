pub mod app;
pub mod boundary;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod output;
pub mod prices;
pub mod table;
