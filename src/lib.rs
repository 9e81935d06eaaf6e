//! Cycle phase prediction and calendar annotation for Cycle Charm.
//!
//! [`prediction`] holds the pure date arithmetic; [`service`] wires it to the
//! stores, reminders and settings the app screens use.

pub mod config;
pub mod context;
pub mod crypto;
pub mod insights;
pub mod models;
pub mod prediction;
pub mod reminders;
pub mod service;
pub mod storage;
pub mod store;
