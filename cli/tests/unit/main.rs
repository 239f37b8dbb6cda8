//! Integration tests for the gce-backend reconciler library.
//!
//! These drive the services through the public API with an in-memory or
//! file-backed store and a canned compute API; no network access.

mod architecture;
mod helpers;
mod lifecycle;
mod property_tests;
