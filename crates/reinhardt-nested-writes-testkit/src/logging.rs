//! Log capture for tests

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Level;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::{Context, SubscriberExt as _};
use tracing_subscriber::util::SubscriberInitExt as _;

/// One recorded event
#[derive(Debug, Clone)]
pub struct CapturedEvent {
	pub level: Level,
	pub message: String,
	pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
	pub fn field(&self, name: &str) -> Option<&str> {
		self.fields
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}
}

/// A tracing layer that records every event it sees
///
/// # Examples
///
/// ```
/// use reinhardt_nested_writes_testkit::LogCapture;
///
/// let capture = LogCapture::new();
/// let _guard = capture.install();
/// tracing::warn!(field = "books", "store rejected nested write");
///
/// let events = capture.events_at(tracing::Level::WARN);
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].field("field"), Some("books"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
	events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
	pub fn new() -> Self {
		Self::default()
	}

	/// Install as the thread's default subscriber until the guard drops
	pub fn install(&self) -> DefaultGuard {
		tracing_subscriber::registry()
			.with(self.clone())
			.set_default()
	}

	pub fn events(&self) -> Vec<CapturedEvent> {
		self.events.lock().clone()
	}

	pub fn events_at(&self, level: Level) -> Vec<CapturedEvent> {
		self.events
			.lock()
			.iter()
			.filter(|event| event.level == level)
			.cloned()
			.collect()
	}

	/// Whether any event's message contains `needle`
	pub fn contains(&self, needle: &str) -> bool {
		self.events
			.lock()
			.iter()
			.any(|event| event.message.contains(needle))
	}
}

#[derive(Default)]
struct EventVisitor {
	message: String,
	fields: Vec<(String, String)>,
}

impl Visit for EventVisitor {
	fn record_str(&mut self, field: &Field, value: &str) {
		self.record(field, value.to_string());
	}

	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		self.record(field, format!("{:?}", value));
	}
}

impl EventVisitor {
	fn record(&mut self, field: &Field, value: String) {
		if field.name() == "message" {
			self.message = value;
		} else {
			self.fields.push((field.name().to_string(), value));
		}
	}
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LogCapture {
	fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
		let mut visitor = EventVisitor::default();
		event.record(&mut visitor);
		self.events.lock().push(CapturedEvent {
			level: *event.metadata().level(),
			message: visitor.message,
			fields: visitor.fields,
		});
	}
}
