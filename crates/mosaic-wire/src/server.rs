use std::sync::Arc;

use mosaic_shader::{CompilationInfo, ShaderModule};
use tracing::debug;

use crate::client::CompilationInfoRequestStatus;
use crate::command::{WireCommand, WireError};

/// Server answer to a `GetCompilationInfo` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationInfoReply {
    pub request_serial: u64,
    pub status: CompilationInfoRequestStatus,
    pub info: Option<CompilationInfo>,
}

/// Error modules answer `Error`; valid modules send their creation diagnostics.
pub fn handle_get_compilation_info(module: &ShaderModule, request_serial: u64) -> CompilationInfoReply {
    if module.is_error() {
        return CompilationInfoReply {
            request_serial,
            status: CompilationInfoRequestStatus::Error,
            info: None,
        };
    }
    CompilationInfoReply {
        request_serial,
        status: CompilationInfoRequestStatus::Success,
        info: Some(module.compilation_info().clone()),
    }
}

/// Executes one decoded command against the server's object table.
pub fn handle_command(
    command: &WireCommand,
    lookup: impl Fn(u32) -> Option<Arc<ShaderModule>>,
) -> Result<CompilationInfoReply, WireError> {
    match *command {
        WireCommand::GetCompilationInfo {
            shader_module_id,
            request_serial,
        } => {
            let module =
                lookup(shader_module_id).ok_or(WireError::UnknownObject(shader_module_id))?;
            let reply = handle_get_compilation_info(&module, request_serial);
            debug!(shader_module_id, request_serial, status = ?reply.status, "answered compilation info");
            Ok(reply)
        }
    }
}
