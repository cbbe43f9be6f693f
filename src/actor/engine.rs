//! Engine: The host event loop that drives sessions.
//!
//! The engine owns the document and the frame ticker. Transport events,
//! frame ticks and effect results all arrive over channels and are
//! applied here, on one thread, so the document needs no locking.

use super::messages::EngineMessage;
use super::ticker::FrameTicker;
use crate::dom::Document;
use crate::error::TransportError;
use crate::session::{EffectSender, HttpEffects, HttpEffectsConfig, StreamSession};
use crate::transport::TransportEvent;
use crossbeam_channel::{never, select, Receiver};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Configuration for the Engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Display frames per second.
    pub target_fps: u32,
    /// Longest the loop blocks before re-checking its exit condition.
    pub idle_poll: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            idle_poll: Duration::from_millis(50),
        }
    }
}

/// What happened while driving one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriveReport {
    /// Frame ticks observed.
    pub ticks: u64,
    /// Frames that ran a render pass.
    pub frames_rendered: u64,
    /// Fragments swapped into the document.
    pub fragments_applied: u64,
    /// Scroll-to-bottom requests.
    pub scroll_requests: u64,
    /// Meta payloads received, in order.
    pub meta: Vec<Value>,
}

/// The streamark engine.
pub struct Engine {
    config: EngineConfig,
    document: Document,
    ticker: FrameTicker,
    effects: EffectSender,
    effects_rx: Receiver<EngineMessage>,
    frame_count: u64,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create a new engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a new engine with custom configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let ticker = FrameTicker::with_fps(config.target_fps);
        let (effects, effects_rx) = EffectSender::channel();
        Self {
            config,
            document: Document::new(),
            ticker,
            effects,
            effects_rx,
            frame_count: 0,
        }
    }

    /// The live document.
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access to the live document, for building targets.
    pub const fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Sender for effect workers reporting to this engine.
    ///
    /// Also the way to stop a response from another thread: post
    /// [`EngineMessage::Stop`] with the session's id.
    pub fn effect_sender(&self) -> EffectSender {
        self.effects.clone()
    }

    /// HTTP effects wired to this engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn http_effects(&self, config: HttpEffectsConfig) -> Result<HttpEffects, TransportError> {
        HttpEffects::new(config, self.effect_sender())
    }

    /// Frame ticks handled so far.
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Run `session` until it is settled and every effect reply is in.
    ///
    /// Starts the session if it is idle.
    pub fn drive(&mut self, session: &mut StreamSession) -> DriveReport {
        let mut report = DriveReport::default();
        let ticks = self.ticker.receiver().clone();
        let effects_rx = self.effects_rx.clone();
        session.start(&mut self.document);

        loop {
            if session.is_settled() && self.effects.outstanding() == 0 {
                break;
            }
            let events = session.transport_events().unwrap_or_else(never);

            select! {
                recv(events) -> event => match event {
                    Ok(event) => session.handle_event(&mut self.document, event),
                    Err(_) => {
                        // Reader exited without a terminal event.
                        session.handle_event(
                            &mut self.document,
                            TransportEvent::Failed(TransportError::Dropped),
                        );
                    }
                },
                recv(ticks) -> tick => {
                    if let Ok(tick) = tick {
                        trace!(frame = tick.frame, "tick");
                        self.on_tick(session, &mut report);
                    }
                },
                recv(effects_rx) -> message => {
                    if let Ok(message) = message {
                        self.apply(session, message, &mut report);
                    }
                },
                default(self.config.idle_poll) => {
                    session.poll_timers(&mut self.document, Instant::now());
                },
            }
        }

        // Late notifications that need no reply.
        while let Ok(message) = self.effects_rx.try_recv() {
            self.apply(session, message, &mut report);
        }
        debug!(session = %session.id(), ?report, "session settled");
        report
    }

    fn on_tick(&mut self, session: &mut StreamSession, report: &mut DriveReport) {
        self.frame_count += 1;
        report.ticks += 1;
        if let Some(handle) = session.take_due_frame() {
            if session.on_frame(&mut self.document, handle) {
                report.frames_rendered += 1;
            }
        }
        session.poll_timers(&mut self.document, Instant::now());
    }

    fn apply(
        &mut self,
        session: &mut StreamSession,
        message: EngineMessage,
        report: &mut DriveReport,
    ) {
        if message.is_reply() {
            self.effects.finish_request();
        }
        match message {
            EngineMessage::Begin { session } => debug!(%session, "begin"),
            EngineMessage::Meta { payload, .. } => report.meta.push(payload),
            EngineMessage::FragmentLoaded {
                session,
                target,
                html,
            } => {
                if self.document.replace_with_html(target, &html) {
                    report.fragments_applied += 1;
                } else {
                    debug!(%session, "fragment target missing");
                }
            }
            EngineMessage::FragmentFailed { session, error } => {
                warn!(%session, %error, "fragment not applied");
            }
            EngineMessage::ScrollToBottom { .. } => report.scroll_requests += 1,
            EngineMessage::Stop { session: id } => {
                if id == session.id() {
                    session.abort(&mut self.document);
                } else {
                    debug!(session = %id, "stop for another session");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::PulldownSanitizer;
    use crate::session::{
        FragmentRequest, SessionConfig, SessionEffects, SessionId, SessionStatus, SessionTargets,
    };
    use crate::transport::{ChunkTransport, Connector, TransportConfig};
    use std::io::{Cursor, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Canned(&'static str);

    impl Connector for Canned {
        fn open(&self, _url: &str) -> Result<Box<dyn Read + Send>, TransportError> {
            Ok(Box::new(Cursor::new(self.0.as_bytes().to_vec())))
        }
    }

    /// Answers fragment requests from a worker thread, like `HttpEffects`.
    struct FakeFragments(EffectSender);

    impl SessionEffects for FakeFragments {
        fn fetch_fragment(&mut self, request: FragmentRequest) {
            let sender = self.0.clone();
            sender.begin_request();
            std::thread::spawn(move || {
                sender.reply(EngineMessage::FragmentLoaded {
                    session: request.session,
                    target: request.target,
                    html: format!("<ul class=\"chips\"><li>{}</li></ul>", request.response_id),
                });
            });
        }

        fn on_meta(&mut self, session: SessionId, payload: &Value) {
            self.0.post(EngineMessage::Meta {
                session,
                payload: payload.clone(),
            });
        }

        fn scroll_to_bottom(&mut self, session: SessionId) {
            self.0.post(EngineMessage::ScrollToBottom { session });
        }
    }

    /// Serves one SSE event per read, pausing before each.
    struct Drip {
        events: Vec<String>,
        delay: Duration,
    }

    impl Read for Drip {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.events.is_empty() {
                return Ok(0);
            }
            std::thread::sleep(self.delay);
            let event = self.events.remove(0);
            let n = event.len().min(buf.len());
            buf[..n].copy_from_slice(&event.as_bytes()[..n]);
            if n < event.len() {
                self.events.insert(0, event[n..].to_owned());
            }
            Ok(n)
        }
    }

    struct DripConnector;

    impl Connector for DripConnector {
        fn open(&self, _url: &str) -> Result<Box<dyn Read + Send>, TransportError> {
            let mut events: Vec<String> = (0..40)
                .map(|i| format!("event: message\ndata: word{i} \n\n"))
                .collect();
            events.push("event: done\ndata: {\"id\":\"7\"}\n\n".to_owned());
            Ok(Box::new(Drip {
                events,
                delay: Duration::from_millis(10),
            }))
        }
    }

    /// Presses stop as soon as the response begins, from another thread.
    struct StopOnBegin {
        sender: EffectSender,
        stops: Arc<AtomicUsize>,
    }

    impl SessionEffects for StopOnBegin {
        fn on_begin(&mut self, session: SessionId) {
            let sender = self.sender.clone();
            std::thread::spawn(move || {
                sender.post(EngineMessage::Stop { session });
            });
        }

        fn notify_stop(&mut self, _session: SessionId) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_engine() -> Engine {
        Engine::with_config(EngineConfig {
            target_fps: 200,
            idle_poll: Duration::from_millis(5),
        })
    }

    fn run(body: &'static str) -> (Engine, StreamSession, DriveReport) {
        let mut engine = test_engine();
        let doc = engine.document_mut();
        let root = doc.root();
        let container = doc.create_element("div");
        let placeholder = doc.create_element_with("div", [("id", "chips")]);
        doc.append_child(root, container);
        doc.append_child(root, placeholder);

        let transport = ChunkTransport::new(
            TransportConfig {
                url: Some("http://test/stream".into()),
                ..TransportConfig::default()
            },
            Arc::new(Canned(body)),
        );
        let effects = FakeFragments(engine.effect_sender());
        let mut session = StreamSession::new(
            SessionConfig::default(),
            SessionTargets {
                container,
                sink: None,
                meta_placeholder: Some(placeholder),
            },
            transport,
            Arc::new(PulldownSanitizer::new()),
            Box::new(effects),
        );
        let report = engine.drive(&mut session);
        (engine, session, report)
    }

    #[test]
    fn test_drive_to_completion_with_fragment() {
        let (engine, session, report) = run(
            "event: message\ndata: Hel\n\n\
             event: meta\ndata: {\"model\":\"m\"}\n\n\
             event: message\ndata: lo\n\n\
             event: done\ndata: {\"id\":\"42\"}\n\n",
        );
        assert_eq!(session.status(), SessionStatus::Completed);
        let container = session.targets().container;
        assert_eq!(engine.document().inner_html(container).trim(), "<p>Hello</p>");
        assert_eq!(report.fragments_applied, 1);
        assert_eq!(report.scroll_requests, 1);
        assert_eq!(report.meta, vec![serde_json::json!({"model": "m"})]);

        let body = engine.document().root();
        assert!(engine
            .document()
            .inner_html(body)
            .contains("<ul class=\"chips\"><li>42</li></ul>"));
        assert!(engine.document().get_element_by_id("chips").is_none());
    }

    #[test]
    fn test_drive_dropped_connection() {
        let (engine, session, report) = run("event: message\ndata: Par\n\n");
        assert_eq!(session.status(), SessionStatus::Errored);
        let text = engine.document().text_content(session.targets().container);
        assert!(text.contains("Par"));
        assert!(text.contains("Connection lost"));
        assert_eq!(report.fragments_applied, 0);
    }

    #[test]
    fn test_drive_stop_mid_stream() {
        let mut engine = test_engine();
        let doc = engine.document_mut();
        let root = doc.root();
        let container = doc.create_element("div");
        doc.append_child(root, container);

        let transport = ChunkTransport::new(
            TransportConfig {
                url: Some("http://test/stream".into()),
                ..TransportConfig::default()
            },
            Arc::new(DripConnector),
        );
        let stops = Arc::new(AtomicUsize::new(0));
        let effects = StopOnBegin {
            sender: engine.effect_sender(),
            stops: stops.clone(),
        };
        let mut session = StreamSession::new(
            SessionConfig {
                stop_linger: Duration::from_millis(20),
                ..SessionConfig::default()
            },
            SessionTargets::container(container),
            transport,
            Arc::new(PulldownSanitizer::new()),
            Box::new(effects),
        );

        engine.drive(&mut session);
        assert_eq!(session.status(), SessionStatus::Aborted);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(session.cursor_node().is_none());
        assert!(!session.accumulated_text().contains("word39"));

        let renders = session.render_count();
        let mutations = engine.document().mutation_count();
        std::thread::sleep(Duration::from_millis(100));
        let report = engine.drive(&mut session);
        assert_eq!(report.frames_rendered, 0);
        assert_eq!(session.render_count(), renders);
        assert_eq!(engine.document().mutation_count(), mutations);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
