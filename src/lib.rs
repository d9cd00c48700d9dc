pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod odoo;
pub mod server;
