// src/handlers/mod.rs

pub mod access;
pub mod auth;
pub mod session;
