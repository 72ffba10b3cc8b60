use std::collections::BTreeMap;
use std::fmt;

use mosaic_shader::CompilationInfo;
use tracing::{debug, warn};

use crate::command::{CommandSerializer, WireCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilationInfoRequestStatus {
    Success,
    Error,
    DeviceLost,
    /// The request was abandoned, e.g. because the module was destroyed.
    Unknown,
}

/// Receives the outcome of one compilation-info request. `info` is only present on success.
pub type CompilationInfoCallback =
    Box<dyn FnOnce(CompilationInfoRequestStatus, Option<&CompilationInfo>) + Send>;

/// Client-side proxy of a shader module living on the server.
///
/// Every callback registered through [`ClientShaderModule::get_compilation_info`] fires exactly
/// once: on the matching reply, on disconnect, or when the proxy is dropped.
pub struct ClientShaderModule {
    id: u32,
    next_serial: u64,
    requests: BTreeMap<u64, CompilationInfoCallback>,
    disconnected: bool,
}

impl fmt::Debug for ClientShaderModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientShaderModule")
            .field("id", &self.id)
            .field("next_serial", &self.next_serial)
            .field("pending", &self.requests.len())
            .field("disconnected", &self.disconnected)
            .finish()
    }
}

impl ClientShaderModule {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            next_serial: 0,
            requests: BTreeMap::new(),
            disconnected: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn get_compilation_info(
        &mut self,
        callback: CompilationInfoCallback,
        serializer: &mut impl CommandSerializer,
    ) {
        if self.disconnected {
            callback(CompilationInfoRequestStatus::DeviceLost, None);
            return;
        }

        let request_serial = self.next_serial;
        self.next_serial += 1;
        self.requests.insert(request_serial, callback);
        serializer.serialize_command(&WireCommand::GetCompilationInfo {
            shader_module_id: self.id,
            request_serial,
        });
        debug!(module = self.id, request_serial, "requested compilation info");
    }

    /// Routes a server reply to its callback. Returns `false` for a serial with no pending
    /// request, which is a protocol error on the server side.
    pub fn handle_compilation_info_reply(
        &mut self,
        request_serial: u64,
        status: CompilationInfoRequestStatus,
        info: Option<&CompilationInfo>,
    ) -> bool {
        let Some(callback) = self.requests.remove(&request_serial) else {
            warn!(module = self.id, request_serial, "compilation info reply for unknown request");
            return false;
        };
        let info = match status {
            CompilationInfoRequestStatus::Success => info,
            _ => None,
        };
        callback(status, info);
        true
    }

    /// Fails every pending request with `DeviceLost`; later requests fail immediately.
    pub fn cancel_callbacks_for_disconnect(&mut self) {
        self.disconnected = true;
        self.fire_all(CompilationInfoRequestStatus::DeviceLost);
    }

    fn fire_all(&mut self, status: CompilationInfoRequestStatus) {
        let requests = std::mem::take(&mut self.requests);
        if !requests.is_empty() {
            debug!(module = self.id, count = requests.len(), ?status, "cancelling compilation info requests");
        }
        for (_, callback) in requests {
            callback(status, None);
        }
    }
}

impl Drop for ClientShaderModule {
    fn drop(&mut self) {
        self.fire_all(CompilationInfoRequestStatus::Unknown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandBuffer;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(u64, CompilationInfoRequestStatus)>>>;

    fn recorder(log: &Log, tag: u64) -> CompilationInfoCallback {
        let log = Arc::clone(log);
        Box::new(
            move |status: CompilationInfoRequestStatus, _: Option<&CompilationInfo>| {
                log.lock().unwrap().push((tag, status))
            },
        )
    }

    #[test]
    fn serials_increase_per_request() {
        let log = Log::default();
        let mut module = ClientShaderModule::new(5);
        let mut buffer = CommandBuffer::new();
        module.get_compilation_info(recorder(&log, 0), &mut buffer);
        module.get_compilation_info(recorder(&log, 1), &mut buffer);

        assert_eq!(
            buffer.take_commands().unwrap(),
            vec![
                WireCommand::GetCompilationInfo {
                    shader_module_id: 5,
                    request_serial: 0
                },
                WireCommand::GetCompilationInfo {
                    shader_module_id: 5,
                    request_serial: 1
                },
            ]
        );
        assert_eq!(module.pending_requests(), 2);
    }

    #[test]
    fn reply_fires_once_and_unknown_serial_is_rejected() {
        let log = Log::default();
        let mut module = ClientShaderModule::new(1);
        let mut buffer = CommandBuffer::new();
        module.get_compilation_info(recorder(&log, 0), &mut buffer);

        let info = CompilationInfo::default();
        assert!(module.handle_compilation_info_reply(
            0,
            CompilationInfoRequestStatus::Success,
            Some(&info)
        ));
        assert!(!module.handle_compilation_info_reply(
            0,
            CompilationInfoRequestStatus::Success,
            Some(&info)
        ));
        assert!(!module.handle_compilation_info_reply(
            17,
            CompilationInfoRequestStatus::Error,
            None
        ));
        assert_eq!(
            *log.lock().unwrap(),
            vec![(0, CompilationInfoRequestStatus::Success)]
        );
    }

    #[test]
    fn disconnect_then_drop() {
        let log = Log::default();
        let mut buffer = CommandBuffer::new();
        {
            let mut module = ClientShaderModule::new(1);
            module.get_compilation_info(recorder(&log, 0), &mut buffer);
            module.get_compilation_info(recorder(&log, 1), &mut buffer);
            module.cancel_callbacks_for_disconnect();
            module.get_compilation_info(recorder(&log, 2), &mut buffer);
            assert_eq!(module.pending_requests(), 0);
        }
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (0, CompilationInfoRequestStatus::DeviceLost),
                (1, CompilationInfoRequestStatus::DeviceLost),
                (2, CompilationInfoRequestStatus::DeviceLost),
            ]
        );
        // Only the two requests made while connected reached the wire.
        assert_eq!(buffer.take_commands().unwrap().len(), 2);
    }

    #[test]
    fn drop_fires_unknown() {
        let log = Log::default();
        let mut buffer = CommandBuffer::new();
        let mut module = ClientShaderModule::new(1);
        module.get_compilation_info(recorder(&log, 0), &mut buffer);
        drop(module);
        assert_eq!(
            *log.lock().unwrap(),
            vec![(0, CompilationInfoRequestStatus::Unknown)]
        );
    }
}
