//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and transport policy.

pub mod issuer;
pub mod paint;
pub mod persistence;
pub mod ticker;
pub mod tokens;
