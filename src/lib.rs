//! Kitchen order lifecycle service.
//!
//! Receives create/update commands for kitchen preparation orders over a
//! message broker (RabbitMQ or SQS), applies domain validation, persists
//! state through abstract data-source contracts, and exposes read use cases
//! for query adapters.

pub mod config;
pub mod consumer;
pub mod domain;
pub mod gateway;
pub mod messaging;
pub mod usecase;
