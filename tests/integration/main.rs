//! Integration tests
//!
//! `reservation_tests` and `catalog_tests` drive the services against the
//! in-memory store; `router_tests` go through the HTTP router in-process.
//! `api_tests` talk to a running server and are ignored by default.

mod api_tests;
mod catalog_tests;
mod common;
mod reservation_tests;
mod router_tests;
