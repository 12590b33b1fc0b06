//! MCP Tools implementation
//!
//! - `ToolDispatcher`: name → handler registry with schema validation
//! - `HelloTool`: liveness check
//! - `ContactEnrichTool`: forwards to the external enrichment API

mod dispatcher;
mod enrich;
mod hello;

use std::sync::Arc;

use crate::collaborator::ExternalService;
use crate::protocol::ServerInfo;

pub use dispatcher::{DispatchError, ToolDispatcher};
pub use enrich::ContactEnrichTool;
pub use hello::HelloTool;

/// Register the built-in tools with the dispatcher
pub fn register_all_tools(
    dispatcher: &mut ToolDispatcher,
    server: &ServerInfo,
    service: Arc<dyn ExternalService>,
) -> Result<(), DispatchError> {
    dispatcher
        .register(Arc::new(ContactEnrichTool::new(service)))?
        .register(Arc::new(HelloTool::new(server)))?;
    Ok(())
}
