//! Volcengine Ark integration: chat completions, Seedream images and
//! Seedance video tasks.

mod client;
mod dto;

pub use client::ArkClient;
