// Chat backend contract and pass-throughs.

pub mod chat_models;
pub mod chat_service;

#[cfg(test)]
pub mod mock;

pub use chat_models::*;
pub use chat_service::*;
