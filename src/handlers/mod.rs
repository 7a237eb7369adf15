// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod level;
pub mod progress;
pub mod quiz;
