// src/models/mod.rs

pub mod question;
pub mod role;
pub mod session;
pub mod survey;
pub mod user;
