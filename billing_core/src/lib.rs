pub mod client;
pub mod cost;
pub mod credentials;
pub mod error;
pub mod provider;
pub mod signing;
pub mod source;
pub mod window;

pub use client::{CostExplorerClient, CostExplorerConfig};
pub use cost::{CostLineItem, CostQuery, CostReport, Granularity, ResultByTime};
pub use credentials::Credentials;
pub use error::{BillingError, Result};
pub use provider::{CredentialChain, CredentialProvider, DynCredentialProvider};
pub use source::{CostSource, DynCostSource};
pub use window::QueryWindow;

// Re-export commonly used types
pub use async_trait::async_trait;
