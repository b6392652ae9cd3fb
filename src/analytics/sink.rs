//! Event delivery to host-registered observers.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::analytics::event::{AnalyticsEvent, EventKind};
use crate::Result;

/// Destination for analytics events. Sinks observe; they never influence
/// cache behavior, and a failing sink is ignored by the caller.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: &AnalyticsEvent) -> Result<()>;
    async fn record_batch(&self, events: &[AnalyticsEvent]) -> Result<()> {
        for event in events {
            self.record(event).await?;
        }
        Ok(())
    }
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Discards everything.
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn record(&self, _: &AnalyticsEvent) -> Result<()> {
        Ok(())
    }
}

/// Returns a no-op sink.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoopEventSink)
}

/// In-memory sink for testing.
pub struct InMemoryEventSink {
    events: Arc<RwLock<Vec<AnalyticsEvent>>>,
    max_events: usize,
}

impl InMemoryEventSink {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<AnalyticsEvent>> {
        match self.events.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.read().clone()
    }

    pub fn events_of_kind(&self, kind: EventKind) -> Vec<AnalyticsEvent> {
        self.read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.events.write() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl Default for InMemoryEventSink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn record(&self, event: &AnalyticsEvent) -> Result<()> {
        let mut events = match self.events.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
        if events.len() > self.max_events {
            events.remove(0);
        }
        Ok(())
    }
}

/// Logs every event through `tracing` at debug level.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn record(&self, event: &AnalyticsEvent) -> Result<()> {
        tracing::debug!(
            kind = event.kind.as_str(),
            key = event.cache_key.as_deref(),
            duration_ms = event.duration_ms,
            similarity = event.similarity,
            size_bytes = event.size_bytes,
            "cache event"
        );
        Ok(())
    }
}
