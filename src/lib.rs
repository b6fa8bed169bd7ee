//! Renderty: API REST per il rendering asincrono di video quiz
//!
//! I job vengono accettati subito, eseguiti uno alla volta in ordine di
//! arrivo e i video completati vengono inviati best-effort su Telegram.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
