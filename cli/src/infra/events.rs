//! `EventSink` that reports machine lifecycle events through `tracing`.

use gce_backend_common::MachineEvent;

use crate::application::ports::EventSink;

/// Logs every machine event at info level under the `machine_event` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn send_event(&self, event: MachineEvent, hostname: &str) {
        tracing::info!(target: "machine_event", event = %event, hostname, "machine event");
    }
}
