//! GreenWeb: website carbon estimation, sustainability badges and a
//! sustainability assistant, served as a JSON API.

pub mod auth;
pub mod carbon;
pub mod chatbot;
pub mod config;
pub mod error;
pub mod gamification;
pub mod llm;
pub mod logger;
pub mod models;
pub mod server;
pub mod storage;
