//! taskpilot-tools - Tool registry and prompt rendering
//!
//! Tools are named, schema-described external capabilities. The engine
//! never executes one itself; it forwards `tool_execution` steps here
//! through [`ToolRegistry::invoke`]. Registries are constructed and
//! injected explicitly, never reached through ambient globals, so the
//! engine stays testable with fake capabilities.

pub mod prompt;
pub mod registry;
pub mod schema;

pub use prompt::{format_catalog, format_tool};
pub use registry::{RegistryError, SharedTool, Tool, ToolError, ToolRegistry};
pub use schema::ToolSchema;
