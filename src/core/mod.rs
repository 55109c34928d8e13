//! Core application: snapshot model, sampling engine and the dashboard loop

pub mod app;
pub mod engine;
pub mod events;
pub mod runtime;
pub mod snapshot;
pub mod state;
pub mod view;
