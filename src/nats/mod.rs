//! NATS messaging

pub mod client;

pub use client::NatsClient;
