//! Shared fixtures: a scripted browser driver, an in-memory export sink,
//! and a canned issue analyzer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use cobrowse::analysis::IssueAnalyzer;
use cobrowse::driver::{BrowserDriver, PageDriver, PageEvent};
use cobrowse::error::{CoreError, Result};
use cobrowse::export::ExportSink;
use cobrowse::protocol::{ExportDocument, IssueAnalysis};
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Handle into the most recently opened mock page, for assertions and for
/// injecting page events.
#[derive(Clone, Default)]
pub struct PageProbe {
	inner: Arc<Mutex<ProbeInner>>,
}

#[derive(Default)]
struct ProbeInner {
	calls: Vec<String>,
	events: Option<mpsc::UnboundedSender<PageEvent>>,
	closed: bool,
	in_flight: usize,
	overlapped: bool,
}

impl PageProbe {
	pub fn calls(&self) -> Vec<String> {
		self.inner.lock().unwrap().calls.clone()
	}

	pub fn closed(&self) -> bool {
		self.inner.lock().unwrap().closed
	}

	/// True when two page operations ever ran at the same time.
	pub fn overlapped(&self) -> bool {
		self.inner.lock().unwrap().overlapped
	}

	pub fn emit(&self, event: PageEvent) {
		let sender = self.inner.lock().unwrap().events.clone();
		if let Some(tx) = sender {
			let _ = tx.send(event);
		}
	}

	fn begin(&self) {
		let mut inner = self.inner.lock().unwrap();
		inner.in_flight += 1;
		if inner.in_flight > 1 {
			inner.overlapped = true;
		}
	}

	fn finish(&self, call: String) {
		let mut inner = self.inner.lock().unwrap();
		inner.in_flight -= 1;
		inner.calls.push(call);
	}
}

pub struct MockBrowser {
	pub probe: PageProbe,
	/// When set, the next element interaction fails with a driver error.
	pub fail_next: Arc<AtomicBool>,
}

impl MockBrowser {
	pub fn new() -> Self {
		Self {
			probe: PageProbe::default(),
			fail_next: Arc::new(AtomicBool::new(false)),
		}
	}
}

#[async_trait]
impl BrowserDriver for MockBrowser {
	async fn open_page(&self) -> Result<Box<dyn PageDriver>> {
		let (tx, rx) = mpsc::unbounded_channel();
		{
			let mut inner = self.probe.inner.lock().unwrap();
			inner.events = Some(tx);
			inner.calls.clear();
			inner.closed = false;
			inner.in_flight = 0;
			inner.overlapped = false;
		}
		Ok(Box::new(MockPage {
			probe: self.probe.clone(),
			fail_next: Arc::clone(&self.fail_next),
			events: Some(rx),
			shots: AtomicU64::new(0),
		}))
	}
}

pub struct MockPage {
	probe: PageProbe,
	fail_next: Arc<AtomicBool>,
	events: Option<mpsc::UnboundedReceiver<PageEvent>>,
	shots: AtomicU64,
}

impl MockPage {
	fn check_failure(&self, op: &str) -> Result<()> {
		if self.fail_next.swap(false, Ordering::SeqCst) {
			Err(CoreError::Driver(format!("{op} failed")))
		} else {
			Ok(())
		}
	}

	/// Simulates a page operation with a yield in the middle, so a second
	/// operation started while this one is pending would be detected as an
	/// overlap.
	async fn run(&self, call: String) {
		self.probe.begin();
		tokio::task::yield_now().await;
		self.probe.finish(call);
	}
}

#[async_trait]
impl PageDriver for MockPage {
	async fn goto(&mut self, url: &str) -> Result<()> {
		self.check_failure("goto")?;
		self.run(format!("goto {url}")).await;
		Ok(())
	}

	async fn click(&mut self, selector: &str) -> Result<()> {
		self.check_failure("click")?;
		self.run(format!("click {selector}")).await;
		Ok(())
	}

	async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
		self.check_failure("fill")?;
		self.run(format!("fill {selector}={value}")).await;
		Ok(())
	}

	async fn select_option(&mut self, selector: &str, value: &str) -> Result<()> {
		self.check_failure("select")?;
		self.run(format!("select {selector}={value}")).await;
		Ok(())
	}

	async fn screenshot(&mut self) -> Result<Vec<u8>> {
		let n = self.shots.fetch_add(1, Ordering::SeqCst);
		Ok(format!("shot-{n}").into_bytes())
	}

	async fn evaluate(&mut self, script: &str) -> Result<Value> {
		self.run(format!("evaluate {script}")).await;
		Ok(Value::Null)
	}

	fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PageEvent>> {
		self.events.take()
	}

	async fn close(&mut self) {
		self.probe.inner.lock().unwrap().closed = true;
	}
}

/// Export sink that remembers every document it was handed.
#[derive(Clone, Default)]
pub struct MemoryExport {
	documents: Arc<Mutex<Vec<(String, ExportDocument)>>>,
}

impl MemoryExport {
	pub fn documents(&self) -> Vec<(String, ExportDocument)> {
		self.documents.lock().unwrap().clone()
	}
}

#[async_trait]
impl ExportSink for MemoryExport {
	async fn write(&self, session_id: &str, document: &ExportDocument) -> Result<()> {
		self.documents
			.lock()
			.unwrap()
			.push((session_id.to_string(), document.clone()));
		Ok(())
	}
}

/// Analyzer returning a canned verdict, or failing when `fail` is set.
#[derive(Clone)]
pub struct CannedAnalyzer {
	pub verdict: Option<IssueAnalysis>,
	pub fail: bool,
	pub requests: Arc<Mutex<Vec<String>>>,
}

impl CannedAnalyzer {
	pub fn bug(analysis: &str) -> Self {
		Self {
			verdict: Some(IssueAnalysis {
				is_bug: true,
				analysis: analysis.to_string(),
				suggested_test_case: None,
			}),
			fail: false,
			requests: Arc::default(),
		}
	}

	pub fn silent() -> Self {
		Self {
			verdict: None,
			fail: false,
			requests: Arc::default(),
		}
	}

	pub fn unavailable() -> Self {
		Self {
			verdict: None,
			fail: true,
			requests: Arc::default(),
		}
	}
}

#[async_trait]
impl IssueAnalyzer for CannedAnalyzer {
	async fn analyze(
		&self,
		text: &str,
		_screenshot: Option<&str>,
		_session_id: &str,
	) -> Result<IssueAnalysis> {
		self.requests.lock().unwrap().push(text.to_string());
		if self.fail {
			return Err(CoreError::AnalysisUnavailable("connection refused".into()));
		}
		Ok(self.verdict.clone().unwrap_or(IssueAnalysis {
			is_bug: false,
			analysis: "not a bug".into(),
			suggested_test_case: None,
		}))
	}
}
