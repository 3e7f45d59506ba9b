//! Marketing site console.
//!
//! The library holds the lead-capture chat flow and its delivery queue,
//! the JSON client and CMS repositories used by the admin screens, and a
//! small actix-web backend that speaks the same REST contract.

pub mod api;
pub mod chat;
pub mod cli;
pub mod client;
pub mod cms;
pub mod config;
pub mod db;
