//! Tollgate - Expiring Cache and Rate Limiting Middleware
//!
//! This crate implements an in-process, TTL-based key/value cache with a
//! self-throttling background sweeper, and a fixed-window rate limiter built
//! on top of it. The limiter plugs into any tower/axum stack as a layer.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
