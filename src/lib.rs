pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod investigate;
pub mod mcp;
pub mod resolver;
pub mod store;
pub mod traversal;

#[cfg(test)]
mod testutil;

pub use config::Config;
pub use error::{GraphscopeError, Result};
pub use graph::{Connection, Depth, Direction, Edge, Entity, RelationshipFilter};
pub use investigate::{
    InvestigationMetadata, InvestigationRequest, InvestigationResult, InvestigationSettings,
    InvestigationStatus, Investigator, StartPolicy,
};
pub use store::{EntityStore, MemoryStore, SqliteStore};
