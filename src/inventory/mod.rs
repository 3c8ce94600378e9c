pub mod client;
pub mod models;

pub use client::{ConnectionReport, EndpointCandidate, InventoryClient, PageRequest, ParamShape};
pub use models::{total_quantity, InventoryRecord};
