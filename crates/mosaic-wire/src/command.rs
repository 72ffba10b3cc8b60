//! Client-to-server command encoding.
//!
//! Wire format (all integer fields little-endian):
//!
//! ```text
//! 0          4                 8                      16
//! +----------+-----------------+----------------------+
//! | cmd (u32)| module id (u32) | request serial (u64) |
//! +----------+-----------------+----------------------+
//! ```

use thiserror::Error;

const CMD_GET_COMPILATION_INFO: u32 = 1;

pub const GET_COMPILATION_INFO_COMMAND_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireCommand {
    GetCompilationInfo {
        shader_module_id: u32,
        request_serial: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("command truncated: need {expected} bytes, have {got}")]
    Truncated { expected: usize, got: usize },
    #[error("unknown command id {0}")]
    UnknownCommand(u32),
    #[error("shader module {0} does not exist on the server")]
    UnknownObject(u32),
}

impl WireCommand {
    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            WireCommand::GetCompilationInfo {
                shader_module_id,
                request_serial,
            } => {
                out.extend_from_slice(&CMD_GET_COMPILATION_INFO.to_le_bytes());
                out.extend_from_slice(&shader_module_id.to_le_bytes());
                out.extend_from_slice(&request_serial.to_le_bytes());
            }
        }
    }

    /// Decodes one command from the front of `buf`, returning it with the bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(WireCommand, usize), WireError> {
        let cmd = read_u32(buf, 0)?;
        match cmd {
            CMD_GET_COMPILATION_INFO => {
                if buf.len() < GET_COMPILATION_INFO_COMMAND_LEN {
                    return Err(WireError::Truncated {
                        expected: GET_COMPILATION_INFO_COMMAND_LEN,
                        got: buf.len(),
                    });
                }
                let shader_module_id = read_u32(buf, 4)?;
                let low = u64::from(read_u32(buf, 8)?);
                let high = u64::from(read_u32(buf, 12)?);
                Ok((
                    WireCommand::GetCompilationInfo {
                        shader_module_id,
                        request_serial: low | (high << 32),
                    },
                    GET_COMPILATION_INFO_COMMAND_LEN,
                ))
            }
            other => Err(WireError::UnknownCommand(other)),
        }
    }
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, WireError> {
    let end = offset + 4;
    let bytes = buf.get(offset..end).ok_or(WireError::Truncated {
        expected: end,
        got: buf.len(),
    })?;
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(word))
}

/// Sink for client commands.
pub trait CommandSerializer {
    fn serialize_command(&mut self, command: &WireCommand);
}

/// In-memory command stream, flushed to the server by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBuffer {
    bytes: Vec<u8>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes and drains every buffered command.
    pub fn take_commands(&mut self) -> Result<Vec<WireCommand>, WireError> {
        let bytes = std::mem::take(&mut self.bytes);
        let mut commands = Vec::new();
        let mut rest = bytes.as_slice();
        while !rest.is_empty() {
            let (command, used) = WireCommand::decode(rest)?;
            commands.push(command);
            rest = &rest[used..];
        }
        Ok(commands)
    }
}

impl CommandSerializer for CommandBuffer {
    fn serialize_command(&mut self, command: &WireCommand) {
        command.encode(&mut self.bytes);
    }
}
