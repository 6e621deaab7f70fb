//! Logging setup.
//!
//! Structured logs go to stderr (the terminal UI owns stdout). With
//! `--remote-log-port` an extra layer serves the same formatted lines to
//! TCP clients, one line per event, so a second terminal can tail a
//! running session.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::Mutex;

use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. `DYAD_LOG` controls the filter, e.g.
/// `DYAD_LOG=dyad_ops=debug`.
pub fn init(remote_port: Option<u16>) -> anyhow::Result<()> {
	let filter = EnvFilter::try_from_env("DYAD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

	let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true).compact();

	let remote_layer = match remote_port {
		Some(port) => Some(RemoteLogLayer::bind(port)?),
		None => None,
	};

	tracing_subscriber::registry()
		.with(filter)
		.with(stderr_layer)
		.with(remote_layer)
		.init();
	Ok(())
}

/// Broadcasts formatted log lines to connected TCP clients.
///
/// Clients are best-effort: a write failure drops the client silently.
pub struct RemoteLogLayer {
	clients: Arc<Mutex<Vec<TcpStream>>>,
}

impl RemoteLogLayer {
	/// Binds the listener and starts the accept thread.
	pub fn bind(port: u16) -> anyhow::Result<Self> {
		let listener = TcpListener::bind(("127.0.0.1", port))?;
		let clients: Arc<Mutex<Vec<TcpStream>>> = Arc::new(Mutex::new(Vec::new()));

		let accept_clients = Arc::clone(&clients);
		std::thread::Builder::new().name("dyad-log-accept".to_string()).spawn(move || {
			for stream in listener.incoming().flatten() {
				if let Ok(mut guard) = accept_clients.lock() {
					guard.push(stream);
				}
			}
		})?;

		tracing::info!(port, "remote log listener started");
		Ok(Self { clients })
	}

	fn broadcast(&self, line: &str) {
		let Ok(mut clients) = self.clients.lock() else {
			return;
		};
		clients.retain_mut(|client| client.write_all(line.as_bytes()).and_then(|()| client.write_all(b"\n")).is_ok());
	}
}

impl<S: tracing::Subscriber> Layer<S> for RemoteLogLayer {
	fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
		let mut visitor = LineVisitor::default();
		event.record(&mut visitor);
		let meta = event.metadata();
		let timestamp = std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.map(|d| d.as_secs())
			.unwrap_or(0);
		self.broadcast(&format!("{timestamp} {} {} {}", meta.level(), meta.target(), visitor.line));
	}
}

/// Flattens event fields into one display line, message first.
#[derive(Default)]
struct LineVisitor {
	line: String,
}

impl tracing::field::Visit for LineVisitor {
	fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
		if field.name() == "message" {
			if self.line.is_empty() {
				self.line = format!("{value:?}");
			} else {
				self.line = format!("{value:?} {}", self.line);
			}
		} else {
			if !self.line.is_empty() {
				self.line.push(' ');
			}
			self.line.push_str(&format!("{}={value:?}", field.name()));
		}
	}
}

#[cfg(test)]
mod tests {
	use std::io::{BufRead, BufReader};

	use super::*;

	#[test]
	fn remote_layer_serves_connected_clients() {
		let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);

		let layer = RemoteLogLayer::bind(port).unwrap();
		let client = TcpStream::connect(("127.0.0.1", port)).unwrap();
		// Give the accept thread a beat to register the client.
		std::thread::sleep(std::time::Duration::from_millis(50));

		layer.broadcast("hello from dyad");

		let mut reader = BufReader::new(client);
		let mut line = String::new();
		reader.read_line(&mut line).unwrap();
		assert_eq!(line.trim_end(), "hello from dyad");
	}

	#[test]
	fn disconnected_clients_are_dropped() {
		let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);

		let layer = RemoteLogLayer::bind(port).unwrap();
		let client = TcpStream::connect(("127.0.0.1", port)).unwrap();
		std::thread::sleep(std::time::Duration::from_millis(50));
		drop(client);

		// The first write after the peer vanishes may still land in the
		// kernel buffer; keep broadcasting until the failure surfaces.
		for _ in 0..20 {
			layer.broadcast("ping");
			if layer.clients.lock().unwrap().is_empty() {
				break;
			}
			std::thread::sleep(std::time::Duration::from_millis(10));
		}
		assert!(layer.clients.lock().unwrap().is_empty());
	}
}
