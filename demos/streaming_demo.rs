//! Streaming Demo: Replays a canned response through the full pipeline.
//!
//! A fake push connection drips SSE events with a small delay, the way a
//! model streams tokens. The engine coalesces them into frames and the
//! final document is printed.
//!
//! Pass a URL to stream from a real endpoint instead:
//!
//! ```text
//! cargo run --example streaming_demo -- http://localhost:8000/stream
//! ```

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use streamark::transport::Connector;
use streamark::{
    telemetry, ChunkTransport, Engine, EngineConfig, NoopEffects, PulldownSanitizer,
    SessionConfig, SessionTargets, StreamSession, TransportConfig, TransportError,
};

/// Sample response, already split into chunks.
const SAMPLE_CHUNKS: &[&str] = &[
    "Here is how ",
    "incremental rendering works:",
    "[newline][newline]## Steps[newline][newline]",
    "1. Render the **full** text",
    "[newline]2. Keep the shared prefix",
    "[newline]3. Replace the tail[newline][newline]",
    "```rust[newline]let html = sanitizer.render(&text);[newline]",
    "renderer.update(&mut doc, &html);[newline]```[newline]",
    "[newline]Done.",
];

/// Serves one SSE event per read, pausing between them.
struct DripReader {
    events: Vec<Vec<u8>>,
    delay: Duration,
}

impl Read for DripReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(event) = self.events.first_mut() else {
            return Ok(0);
        };
        std::thread::sleep(self.delay);
        let n = event.len().min(buf.len());
        buf[..n].copy_from_slice(&event[..n]);
        event.drain(..n);
        if event.is_empty() {
            self.events.remove(0);
        }
        Ok(n)
    }
}

struct ReplayConnector;

impl Connector for ReplayConnector {
    fn open(&self, _url: &str) -> Result<Box<dyn Read + Send>, TransportError> {
        let mut events: Vec<Vec<u8>> = SAMPLE_CHUNKS
            .iter()
            .map(|chunk| format!("event: message\ndata: {chunk}\n\n").into_bytes())
            .collect();
        events.push(b"event: done\ndata: {\"id\":\"demo-1\"}\n\n".to_vec());
        Ok(Box::new(DripReader {
            events,
            delay: Duration::from_millis(30),
        }))
    }
}

fn main() -> Result<(), TransportError> {
    telemetry::init("streamark=info");

    let url = std::env::args().nth(1);
    let transport = match &url {
        Some(url) => ChunkTransport::http(TransportConfig {
            url: Some(url.clone()),
            ..TransportConfig::default()
        })?,
        None => ChunkTransport::new(
            TransportConfig {
                url: Some("replay://demo".into()),
                ..TransportConfig::default()
            },
            Arc::new(ReplayConnector),
        ),
    };

    let mut engine = Engine::with_config(EngineConfig {
        target_fps: 30,
        ..EngineConfig::default()
    });
    let doc = engine.document_mut();
    let root = doc.root();
    let container = doc.create_element_with("div", [("class", "markdown")]);
    doc.append_child(root, container);

    let mut session = StreamSession::new(
        SessionConfig::default(),
        SessionTargets::container(container),
        transport,
        Arc::new(PulldownSanitizer::new()),
        Box::new(NoopEffects),
    );
    let report = engine.drive(&mut session);
    let stats = session.renderer().stats();

    println!("status:          {}", session.status());
    println!("chunks received: {} bytes", session.accumulated_text().len());
    println!("frames rendered: {} of {} ticks", report.frames_rendered, report.ticks);
    println!(
        "nodes:           {} appended, {} removed",
        stats.nodes_appended, stats.nodes_removed
    );
    println!();
    println!("{}", engine.document().inner_html(container));
    Ok(())
}
