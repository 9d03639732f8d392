//! Pre-load command queue.
//!
//! A page can issue segment commands before the engine is ready. They are
//! held in an explicit pending list and replayed in arrival order when an
//! engine is attached; afterwards commands dispatch immediately.

use std::sync::Arc;

use segmab_core::{ConfigError, SegmentConfig, SegmentId, SegmentResult};
use serde_json::Value;
use tracing::{debug, info};

use crate::engine::SegmentationEngine;

type Callback = Box<dyn FnOnce(&SegmentId) + Send>;

/// Configuration as supplied by the caller.
#[derive(Debug, Clone)]
pub enum CommandConfig {
    Typed(SegmentConfig),
    /// Untyped configuration object, validated on dispatch.
    Raw(Value),
}

/// One queued call: its own complete configuration and an optional callback.
#[derive(Default)]
pub struct SegmentCommand {
    config: Option<CommandConfig>,
    callback: Option<Callback>,
}

impl SegmentCommand {
    pub fn new(config: SegmentConfig) -> Self {
        Self {
            config: Some(CommandConfig::Typed(config)),
            callback: None,
        }
    }

    pub fn raw(config: Value) -> Self {
        Self {
            config: Some(CommandConfig::Raw(config)),
            callback: None,
        }
    }

    /// Build a command from page call arguments. Nested argument arrays are
    /// flattened and the first remaining argument is the configuration; an
    /// empty argument list yields an empty command, which is ignored.
    pub fn from_args(args: &[Value]) -> Self {
        let mut flat = Vec::new();
        flatten_into(args, &mut flat);
        match flat.into_iter().next() {
            Some(Value::Null) | None => Self::default(),
            Some(config) => Self::raw(config),
        }
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&SegmentId) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_none()
    }

    fn dispatch(self, engine: &SegmentationEngine) -> Option<SegmentResult<SegmentId>> {
        let config = match self.config? {
            CommandConfig::Typed(config) => Ok(config),
            CommandConfig::Raw(value) => SegmentConfig::from_value(&value),
        };
        let result = config.and_then(|config| match self.callback {
            Some(callback) => engine.get_segment_with(&config, callback),
            None => engine.get_segment(&config),
        });
        Some(result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Held until an engine is attached.
    Buffered,
    /// Empty command, nothing to do.
    Ignored,
    Resolved(SegmentResult<SegmentId>),
}

impl QueueOutcome {
    pub fn segment(&self) -> Option<&SegmentId> {
        match self {
            QueueOutcome::Resolved(Ok(segment)) => Some(segment),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ConfigError> {
        match self {
            QueueOutcome::Resolved(Err(err)) => Some(err),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct CommandQueue {
    pending: Vec<SegmentCommand>,
    engine: Option<Arc<SegmentationEngine>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn push(&mut self, command: SegmentCommand) -> QueueOutcome {
        match &self.engine {
            Some(engine) => run(engine, command),
            None if command.is_empty() => QueueOutcome::Ignored,
            None => {
                self.pending.push(command);
                debug!(pending = self.pending.len(), "segment command buffered");
                QueueOutcome::Buffered
            }
        }
    }

    /// Attach the engine and replay buffered commands in arrival order.
    /// Returns one outcome per replayed command.
    pub fn attach(&mut self, engine: Arc<SegmentationEngine>) -> Vec<QueueOutcome> {
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            info!(count = pending.len(), "replaying queued segment commands");
        }
        let outcomes = pending
            .into_iter()
            .map(|command| run(&engine, command))
            .collect();
        self.engine = Some(engine);
        outcomes
    }
}

fn run(engine: &SegmentationEngine, command: SegmentCommand) -> QueueOutcome {
    match command.dispatch(engine) {
        Some(result) => QueueOutcome::Resolved(result),
        None => QueueOutcome::Ignored,
    }
}

fn flatten_into(values: &[Value], out: &mut Vec<Value>) {
    for value in values {
        match value {
            Value::Array(items) => flatten_into(items, out),
            other => out.push(other.clone()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use segmab_core::clock::manual_clock;
    use segmab_store::{InstrumentedStore, MemoryStore};
    use serde_json::json;

    fn engine() -> (Arc<SegmentationEngine>, Arc<InstrumentedStore<MemoryStore>>) {
        let clock = manual_clock(1_700_000_000_000);
        let store = Arc::new(InstrumentedStore::new(MemoryStore::new(clock.clone())));
        (Arc::new(SegmentationEngine::new(store.clone(), clock)), store)
    }

    #[test]
    fn test_buffers_until_attached_then_replays_in_order() {
        let (engine, store) = engine();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut queue = CommandQueue::new();

        for prefix in ["first", "second"] {
            let order = order.clone();
            let command = SegmentCommand::new(SegmentConfig::new(prefix, 2, 7))
                .with_callback(move |_| order.lock().push(prefix));
            assert_eq!(queue.push(command), QueueOutcome::Buffered);
        }
        assert!(!queue.is_ready());
        assert_eq!(queue.pending_len(), 2);
        assert_eq!(store.counters().reads, 0);

        let outcomes = queue.attach(engine);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.segment().is_some()));
        assert_eq!(*order.lock(), vec!["first", "second"]);
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn test_dispatches_immediately_once_ready() {
        let (engine, _store) = engine();
        let mut queue = CommandQueue::new();
        assert!(queue.attach(engine).is_empty());

        let outcome = queue.push(SegmentCommand::raw(
            json!({"prefix": "ab", "segments_number": 2, "days": 30}),
        ));
        let segment = outcome.segment().unwrap();
        assert!(segment == &"A" || segment == &"B");
    }

    #[test]
    fn test_invalid_command_reports_error_without_blocking_others() {
        let (engine, _store) = engine();
        let mut queue = CommandQueue::new();
        queue.push(SegmentCommand::raw(json!({"prefix": "", "segments_number": 2, "days": 1})));
        queue.push(SegmentCommand::raw(json!({"prefix": "ok", "segments_number": 2, "days": 1})));

        let outcomes = queue.attach(engine);
        assert_eq!(outcomes[0].error(), Some(&ConfigError::EmptyPrefix));
        assert!(outcomes[1].segment().is_some());
    }

    #[test]
    fn test_empty_commands_are_ignored() {
        let (engine, _store) = engine();
        let mut queue = CommandQueue::new();
        assert_eq!(queue.push(SegmentCommand::from_args(&[])), QueueOutcome::Ignored);
        assert_eq!(queue.pending_len(), 0);

        queue.attach(engine);
        assert_eq!(
            queue.push(SegmentCommand::from_args(&[json!([])])),
            QueueOutcome::Ignored
        );
    }

    #[test]
    fn test_from_args_flattens_nested_arguments() {
        let (engine, _store) = engine();
        let mut queue = CommandQueue::new();
        queue.attach(engine);

        let args = [json!([[{"prefix": "n", "segments_number": 3, "days": 2}]])];
        let outcome = queue.push(SegmentCommand::from_args(&args));
        assert!(outcome.segment().is_some());
    }

    #[test]
    fn test_non_object_config_is_malformed() {
        let (engine, _store) = engine();
        let mut queue = CommandQueue::new();
        queue.attach(engine);

        let outcome = queue.push(SegmentCommand::from_args(&[json!("prefix")]));
        assert!(matches!(
            outcome.error(),
            Some(ConfigError::MalformedCommand(_))
        ));
    }
}
