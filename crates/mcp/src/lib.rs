// MCP (Model Context Protocol) plumbing for the tool gateway:
// upstream provider transports and a server republishing the catalog

pub mod config;
pub mod protocol;
pub mod server;
pub mod upstream;

pub use config::BridgeConfig;
pub use server::McpServer;
