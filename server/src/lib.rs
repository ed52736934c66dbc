pub extern crate actix_web;

pub mod canvas_store;
pub mod config;
pub mod connection;
mod connection_tx_storage;
pub mod handlers;
pub mod presence;
pub mod room_directory;
pub mod room_file;
pub mod server;
mod server_state;
