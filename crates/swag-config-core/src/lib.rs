//! Orchestrates validation, templating, backups, and health probing into
//! the operation set a managing application (the CLI, or any other
//! embedder) drives the configuration directory through.

pub mod cancellation;
pub mod error;
pub mod mcp;
pub mod model;
pub mod operations;
pub mod orchestrator;
pub mod resource;
pub mod updaters;
pub mod validation;

pub use cancellation::CancellationToken;
pub use error::OrchestratorError;
pub use mcp::MCPOperations;
pub use operations::ConfigOperations;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use resource::ResourceManager;
pub use updaters::ConfigFieldUpdaters;
