//! Chrome DevTools Protocol driver.
//!
//! Attaches to a running browser over its DevTools HTTP endpoint: each new
//! session gets its own tab, driven through that tab's debugger WebSocket.
//! Commands are correlated to responses by ID through a pending map; protocol
//! events are pumped into the session's page-event channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cobrowse::driver::{BrowserDriver, PageDriver, PageEvent};
use cobrowse::error::{CoreError, Result};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<std::result::Result<Value, String>>>>>;

pub struct CdpBrowser {
	endpoint: String,
	http: reqwest::Client,
}

impl CdpBrowser {
	pub fn new(endpoint: &str) -> Self {
		Self {
			endpoint: endpoint.trim_end_matches('/').to_string(),
			http: reqwest::Client::new(),
		}
	}
}

#[async_trait]
impl BrowserDriver for CdpBrowser {
	async fn open_page(&self) -> Result<Box<dyn PageDriver>> {
		// DevTools: PUT /json/new opens a tab and describes its debugger URL.
		let target: Value = self
			.http
			.put(format!("{}/json/new?url=about:blank", self.endpoint))
			.send()
			.await
			.map_err(driver_err)?
			.error_for_status()
			.map_err(driver_err)?
			.json()
			.await
			.map_err(driver_err)?;

		let ws_url = target
			.get("webSocketDebuggerUrl")
			.and_then(Value::as_str)
			.ok_or_else(|| CoreError::Driver("target missing webSocketDebuggerUrl".to_string()))?;
		debug!(target = "cobrowse.driver", url = ws_url, "attaching to new tab");

		let page = CdpPage::connect(ws_url).await?;
		Ok(Box::new(page))
	}
}

pub struct CdpPage {
	sink: WsSink,
	pending: PendingMap,
	next_id: u64,
	events: Option<mpsc::UnboundedReceiver<PageEvent>>,
	pump: JoinHandle<()>,
}

impl CdpPage {
	async fn connect(url: &str) -> Result<Self> {
		let (stream, _) = connect_async(url).await.map_err(driver_err)?;
		let (sink, mut ws_rx) = stream.split();

		let pending: PendingMap = Arc::default();
		let (event_tx, event_rx) = mpsc::unbounded_channel();

		let pump_pending = Arc::clone(&pending);
		let pump = tokio::spawn(async move {
			while let Some(msg) = ws_rx.next().await {
				let text = match msg {
					Ok(Message::Text(text)) => text,
					Ok(Message::Close(_)) | Err(_) => break,
					Ok(_) => continue,
				};
				let Ok(value) = serde_json::from_str::<Value>(&text) else {
					continue;
				};
				route(&pump_pending, &event_tx, value).await;
			}
			// Connection gone; fail whatever is still waiting.
			for (_, reply) in pump_pending.lock().await.drain() {
				let _ = reply.send(Err("devtools connection closed".to_string()));
			}
		});

		let mut page = Self {
			sink,
			pending,
			next_id: 0,
			events: Some(event_rx),
			pump,
		};
		for method in ["Page.enable", "Runtime.enable", "Network.enable"] {
			page.call(method, json!({})).await?;
		}
		Ok(page)
	}

	async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
		self.next_id += 1;
		let id = self.next_id;
		let (reply_tx, reply_rx) = oneshot::channel();
		self.pending.lock().await.insert(id, reply_tx);

		let request = json!({"id": id, "method": method, "params": params});
		self.sink
			.send(Message::Text(request.to_string().into()))
			.await
			.map_err(|_| CoreError::Driver("devtools connection closed".to_string()))?;

		let reply = tokio::time::timeout(COMMAND_TIMEOUT, reply_rx)
			.await
			.map_err(|_| CoreError::Driver(format!("{method} timed out")))?;
		match reply {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(message)) => Err(CoreError::Driver(format!("{method}: {message}"))),
			Err(_) => Err(CoreError::Driver("devtools connection closed".to_string())),
		}
	}

	/// Runs an expression in the page, surfacing thrown exceptions as driver
	/// errors.
	async fn eval(&mut self, expression: String) -> Result<Value> {
		let result = self
			.call(
				"Runtime.evaluate",
				json!({
					"expression": expression,
					"returnByValue": true,
					"awaitPromise": true,
				}),
			)
			.await?;

		if let Some(details) = result.get("exceptionDetails") {
			let text = details
				.pointer("/exception/description")
				.and_then(Value::as_str)
				.or_else(|| details.get("text").and_then(Value::as_str))
				.unwrap_or("script threw");
			return Err(CoreError::Driver(text.to_string()));
		}
		Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
	}
}

#[async_trait]
impl PageDriver for CdpPage {
	async fn goto(&mut self, url: &str) -> Result<()> {
		let result = self.call("Page.navigate", json!({"url": url})).await?;
		if let Some(error) = result.get("errorText").and_then(Value::as_str) {
			return Err(CoreError::Driver(format!("navigation failed: {error}")));
		}
		Ok(())
	}

	async fn click(&mut self, selector: &str) -> Result<()> {
		let sel = Value::from(selector).to_string();
		self.eval(format!(
			"(() => {{ const el = document.querySelector({sel}); \
			 if (!el) throw new Error('no element matches ' + {sel}); \
			 el.click(); }})()"
		))
		.await?;
		Ok(())
	}

	async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
		let sel = Value::from(selector).to_string();
		let val = Value::from(value).to_string();
		self.eval(format!(
			"(() => {{ const el = document.querySelector({sel}); \
			 if (!el) throw new Error('no element matches ' + {sel}); \
			 el.focus(); el.value = {val}; \
			 el.dispatchEvent(new Event('input', {{bubbles: true}})); \
			 el.dispatchEvent(new Event('change', {{bubbles: true}})); }})()"
		))
		.await?;
		Ok(())
	}

	async fn select_option(&mut self, selector: &str, value: &str) -> Result<()> {
		let sel = Value::from(selector).to_string();
		let val = Value::from(value).to_string();
		self.eval(format!(
			"(() => {{ const el = document.querySelector({sel}); \
			 if (!el) throw new Error('no element matches ' + {sel}); \
			 el.value = {val}; \
			 el.dispatchEvent(new Event('change', {{bubbles: true}})); }})()"
		))
		.await?;
		Ok(())
	}

	async fn screenshot(&mut self) -> Result<Vec<u8>> {
		let result = self
			.call("Page.captureScreenshot", json!({"format": "png"}))
			.await?;
		let data = result
			.get("data")
			.and_then(Value::as_str)
			.ok_or_else(|| CoreError::Driver("screenshot response missing data".to_string()))?;
		cobrowse_protocol::decode_screenshot(data)
			.map_err(|err| CoreError::Driver(format!("screenshot decode failed: {err}")))
	}

	async fn evaluate(&mut self, script: &str) -> Result<Value> {
		self.eval(script.to_string()).await
	}

	fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PageEvent>> {
		self.events.take()
	}

	async fn close(&mut self) {
		let _ = self.sink.send(Message::Close(None)).await;
		self.pump.abort();
	}
}

/// Splits debugger traffic into command replies and page events.
async fn route(pending: &PendingMap, events: &mpsc::UnboundedSender<PageEvent>, value: Value) {
	if let Some(id) = value.get("id").and_then(Value::as_u64) {
		let reply = pending.lock().await.remove(&id);
		let Some(reply) = reply else {
			warn!(target = "cobrowse.driver", id, "response with unknown id");
			return;
		};
		let result = match value.get("error") {
			Some(error) => Err(error
				.get("message")
				.and_then(Value::as_str)
				.unwrap_or("unknown devtools error")
				.to_string()),
			None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
		};
		let _ = reply.send(result);
		return;
	}

	let Some(method) = value.get("method").and_then(Value::as_str) else {
		return;
	};
	let params = value.get("params").cloned().unwrap_or(Value::Null);
	let event = match method {
		"Runtime.consoleAPICalled" => PageEvent::Console(params),
		"Network.responseReceived" => PageEvent::Network(params),
		"Runtime.exceptionThrown" => PageEvent::PageError(params),
		_ => return,
	};
	let _ = events.send(event);
}

fn driver_err(err: impl std::fmt::Display) -> CoreError {
	CoreError::Driver(err.to_string())
}
