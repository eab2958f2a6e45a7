//! Cart API on AWS Lambda, built once per execution environment.

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod database;
pub mod error;
pub mod event_handler;
pub mod middleware;
pub mod secrets;
