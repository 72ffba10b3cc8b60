//! Client/server split for shader module compilation-info requests.
//!
//! The client keeps a table of pending requests keyed by a per-module serial and serializes a
//! [`WireCommand::GetCompilationInfo`] for each one. The server answers with a
//! [`CompilationInfoReply`], which the client routes back to exactly one callback.

mod client;
mod command;
mod server;

pub use client::{ClientShaderModule, CompilationInfoCallback, CompilationInfoRequestStatus};
pub use command::{
    CommandBuffer, CommandSerializer, WireCommand, WireError, GET_COMPILATION_INFO_COMMAND_LEN,
};
pub use server::{handle_command, handle_get_compilation_info, CompilationInfoReply};
