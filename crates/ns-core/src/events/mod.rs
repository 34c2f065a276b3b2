use std::any::{Any, TypeId};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

/// Typed publish/subscribe bus for explorer events
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<TypeId, Vec<Box<dyn EventHandler>>>>>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &dyn Event);
}

/// Events published by the explorer
pub mod events {
    use super::Event;
    use crate::error::ErrorNotice;
    use crate::fetch::{Channel, RequestId};
    use crate::geometry::GeometryKey;
    use crate::layout::{Breakpoint, LayoutPlan};

    /// The query state changed
    #[derive(Debug, Clone)]
    pub struct QueryChanged {
        pub intent: &'static str,
        pub revision: u64,
    }

    /// A results response was applied
    #[derive(Debug, Clone)]
    pub struct ResultsApplied {
        pub request_id: RequestId,
        pub raw_count: usize,
        pub visible_count: usize,
    }

    /// A channel's current request failed
    #[derive(Debug, Clone)]
    pub struct ChannelFailed {
        pub notice: ErrorNotice,
    }

    /// A response arrived for a superseded, cancelled or cleared request
    #[derive(Debug, Clone)]
    pub struct StaleResponseDiscarded {
        pub channel: Channel,
        pub request_id: RequestId,
    }

    /// Geometry for `key` is ready in the cache
    #[derive(Debug, Clone)]
    pub struct GeometryReady {
        pub key: GeometryKey,
    }

    /// The breakpoint moved and the layout plan changed
    #[derive(Debug, Clone)]
    pub struct LayoutChanged {
        pub breakpoint: Breakpoint,
        pub plan: LayoutPlan,
    }

    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        QueryChanged,
        ResultsApplied,
        ChannelFailed,
        StaleResponseDiscarded,
        GeometryReady,
        LayoutChanged
    );
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) {
        let type_id = TypeId::of::<E>();
        let mut handlers = self.handlers.lock();
        handlers.entry(type_id).or_default().push(handler);
    }

    /// Publish an event
    pub fn publish<E: Event>(&self, event: E) {
        let type_id = TypeId::of::<E>();
        let mut handlers = self.handlers.lock();

        if let Some(event_handlers) = handlers.get_mut(&type_id) {
            for handler in event_handlers.iter_mut() {
                handler.handle(&event);
            }
        }
    }

    /// Drop every handler
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapts a closure to [`EventHandler`]
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&dyn Event) + Send + Sync,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}

/// Create a handler that only sees events of type `E`
pub fn typed_handler<E, F>(mut f: F) -> Box<dyn EventHandler>
where
    E: Event,
    F: FnMut(&E) + Send + Sync + 'static,
{
    handler_from_fn(move |event| {
        if let Some(event) = event.as_any().downcast_ref::<E>() {
            f(event);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::events::*;
    use super::*;
    use crate::geometry::GeometryKey;

    #[test]
    fn test_publish_reaches_only_matching_type() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        bus.subscribe::<GeometryReady>(typed_handler(move |event: &GeometryReady| {
            sink.lock().push(event.key);
        }));

        bus.publish(GeometryReady { key: GeometryKey(3) });
        bus.publish(QueryChanged {
            intent: "updateQuery",
            revision: 1,
        });

        assert_eq!(*seen.lock(), vec![GeometryKey(3)]);
    }

    #[test]
    fn test_clear_drops_handlers() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        bus.subscribe::<GeometryReady>(handler_from_fn(move |_| *sink.lock() += 1));

        bus.clear();
        bus.publish(GeometryReady { key: GeometryKey(1) });
        assert_eq!(*count.lock(), 0);
    }
}
