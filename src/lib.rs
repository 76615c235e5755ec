//! Larder: a pantry and cookbook cache that reconciles identities at login
//! and mirrors owner-scoped collections to a cloud document store.

pub mod account;
pub mod app;
pub mod cloud;
pub mod config;
pub mod credentials;
pub mod db;
pub mod models;
pub mod server;
pub mod session;
pub mod store;
pub mod sync;
