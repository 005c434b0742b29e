//! Image labeling task queue
//!
//! Callers submit batches of images with a callback URL over HTTP. Tasks are
//! queued in a [`store::TaskStore`], a [`services::worker::Worker`] labels
//! them one at a time with a pluggable [`services::labeler::LabelComputer`]
//! and the result is POSTed back to the caller.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
