pub mod commands;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod facts;
pub mod heatmap;
pub mod http;
pub mod logging;
pub mod resource;
pub mod structs;
pub mod subscription;
pub mod tasks;
