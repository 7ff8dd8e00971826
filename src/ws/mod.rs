pub mod client;
pub mod event;
pub mod handler;
pub mod hub;
