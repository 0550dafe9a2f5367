//! Outbound HTTP plumbing shared by every publisher.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
