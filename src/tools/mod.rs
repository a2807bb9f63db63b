//! Tools: everything the front-end can call.
//!
//! - `types`: descriptors, parameter schemas, tool-call errors
//! - `registry`: the shared name → handler map
//! - `discovery`: fetching the target's catalog
//! - `proxy`: handlers that forward calls to the target

pub mod discovery;
pub mod errors;
pub mod proxy;
pub mod registry;
pub mod types;

pub use discovery::{parse_catalog, DiscoveryService, DEFAULT_DISCOVERY_TIMEOUT, LIST_TOOLS_METHOD};
pub use errors::DiscoveryError;
pub use proxy::{map_channel_error, ProxyRegistrar, ProxyTool, DEFAULT_CALL_TIMEOUT};
pub use registry::{RegistryEntry, ToolHandler, ToolOrigin, ToolRegistry};
pub use types::{error_codes, ParameterField, ParameterSchema, ToolCallError, ToolDescriptor, ToolOutcome};
