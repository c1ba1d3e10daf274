//! Allocation and yield aggregation engine

pub mod allocation;
pub mod asset;
pub mod catalog;
pub mod config;
pub mod error;
pub mod holdings;
pub mod log;
pub mod projection;
pub mod quote;
pub mod simulator;

// Re-export main types for cleaner imports
pub use allocation::{AllocationMatrix, AllocationModel};
pub use asset::Asset;
pub use catalog::{Scope, Strategy, StrategyCatalog};
pub use error::{CoreError, CoreResult};
pub use holdings::{
    AggregatedHoldings, HoldingsProvider, HoldingsSnapshot, ReserveData, aggregate_holdings,
};
pub use projection::{ProjectionResult, ProjectionRow, UnquotedEntry, project};
pub use quote::{QuoteProvider, QuoteSet, Venue, VenueQuoteKey, YieldQuote};
pub use simulator::YieldSimulator;
