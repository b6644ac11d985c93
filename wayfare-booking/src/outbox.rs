use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use wayfare_core::events::{EventKind, LifecycleEvent, NotificationSink, NotifyError};

/// Buffer of lifecycle events accumulated during a booking operation.
///
/// Events are appended while the transaction is open and drained to the sink
/// strictly after commit, so the boundary between "transactionally
/// guaranteed" and "best-effort" is structural, not a try/catch convention.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<LifecycleEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(
        &mut self,
        kind: EventKind,
        recipient: Uuid,
        trip_id: Uuid,
        request_id: Option<Uuid>,
        occurred_at: DateTime<Utc>,
    ) {
        self.events.push(LifecycleEvent {
            kind,
            recipient,
            trip_id,
            request_id,
            occurred_at,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Deliver every buffered event. Failures are logged and counted, never
    /// propagated: the committed transition already happened. Returns the
    /// number of failed deliveries.
    pub async fn drain(self, sink: &dyn NotificationSink) -> u64 {
        let mut failures = 0;
        for event in self.events {
            if let Err(err) = sink.notify(&event).await {
                failures += 1;
                warn!(
                    kind = ?event.kind,
                    recipient = %event.recipient,
                    trip_id = %event.trip_id,
                    "notification delivery failed: {err}"
                );
            }
        }
        failures
    }
}

/// Default sink: writes events to the log. Stands in for the external
/// notification service in local runs and tests.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, event: &LifecycleEvent) -> Result<(), NotifyError> {
        info!(
            kind = ?event.kind,
            recipient = %event.recipient,
            trip_id = %event.trip_id,
            request_id = ?event.request_id,
            "lifecycle event"
        );
        Ok(())
    }
}
