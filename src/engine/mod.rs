//! Pure reservation and pricing rules
//!
//! Nothing in here performs I/O or reads the clock. Services load state from
//! the store, hand it to these functions together with a
//! [`RequestContext`](crate::models::RequestContext), and persist the result.

pub mod availability;
pub mod hours;
pub mod lifecycle;
pub mod penalty;
pub mod promotions;
pub mod quote;

pub use availability::{Holding, StockDemand, TimeWindow};
pub use lifecycle::{Command, LifecyclePolicy, Operation};
pub use quote::QuoteSettings;
