// src/edgar/mod.rs
pub mod client;
pub mod index;
pub mod models;
pub mod retry;

pub use client::{EdgarClient, EdgarConfig};
