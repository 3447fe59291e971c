//! Remote n8n API access: wire types and the paginated HTTP client.

pub mod client;
pub mod types;

pub use client::N8nClient;
pub use types::{
    ExecutionStatus, Page, RemoteExecution, RemoteNode, RemoteTag, RemoteUser, RemoteVariable,
    RemoteWorkflow,
};
