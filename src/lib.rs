pub mod assistant;
pub mod commands;
pub mod config;
pub mod logging;
pub mod providers;
pub mod render;
pub mod runner;
