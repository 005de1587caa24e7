//! Expense splitting for groups of people ("pools").
//!
//! The engine modules ([`balance`], [`exchange`], [`split`], [`transaction`])
//! are pure and synchronous. [`service::PoolService`] wires them to storage,
//! the summary cache and notifications, and [`handlers`] exposes it over HTTP.

pub mod auth;
pub mod balance;
pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;
pub mod handlers;
pub mod money;
pub mod notify;
pub mod schemas;
pub mod service;
pub mod split;
pub mod store;
pub mod transaction;
pub mod upi;

pub use error::{Error, Result};
pub use service::PoolService;
