#[macro_use]
extern crate lazy_static;

pub mod auth;
pub mod client;
pub mod cookies;
pub mod crypto;
pub mod download;
pub mod error;
pub mod html;
pub mod models;
