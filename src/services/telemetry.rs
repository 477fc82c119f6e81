// Best-effort, asynchronous telemetry fan-out. A missing/erroring collector
// must never affect the caller's result.

use std::sync::Arc;

use crate::repositories::traits::TelemetryEmitter;

#[derive(Clone)]
pub struct Telemetry {
    emitter: Arc<dyn TelemetryEmitter>,
}

impl Telemetry {
    pub fn new(emitter: Arc<dyn TelemetryEmitter>) -> Self {
        Self { emitter }
    }

    pub fn emit(&self, event: &str, metadata: serde_json::Value) {
        let emitter = self.emitter.clone();
        let event = event.to_string();
        tokio::spawn(async move {
            emitter.emit(&event, metadata).await;
        });
    }
}

pub struct NoopTelemetryEmitter;

#[async_trait::async_trait]
impl TelemetryEmitter for NoopTelemetryEmitter {
    async fn emit(&self, _event: &str, _metadata: serde_json::Value) {}
}
