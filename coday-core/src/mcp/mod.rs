//! MCP server instance keying (§4.6) and the process-global cache that
//! shares a backing process across sessions with identical configs (§5).

mod instance_cache;
mod instance_key;

pub use instance_cache::McpInstanceCache;
pub use instance_key::instance_key;
