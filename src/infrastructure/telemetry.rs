use serde_json::Value;

/// Fire-and-forget analytics sink. Implementations must never block or fail
/// the caller; the provisioning pipeline emits through this and moves on.
pub trait Telemetry: Send + Sync {
    fn emit(&self, event: &str, properties: Value);
}

/// Default sink that writes events to the log. The desktop shell swaps in a
/// real uploader.
#[derive(Default)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn emit(&self, event: &str, properties: Value) {
        log::info!("telemetry event '{event}': {properties}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn log_sink_accepts_any_payload() {
        let sink = LogTelemetry;
        sink.emit("workspace_initialized", json!({ "workspace_id": "ws-1" }));
    }
}
