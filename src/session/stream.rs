//! Stream Session: One response's lifecycle, end to end.
//!
//! The session opens the transport, accumulates text, coalesces renders
//! to one per display frame and finalizes exactly once on done, error,
//! abort or disposal. It is driven from a single thread: the owner feeds
//! it transport events, frame callbacks and timer polls.
//!
//! Every entry point re-checks the status, so events and frame callbacks
//! that arrive after a terminal state are ignored.

use super::effects::{FragmentRequest, SessionEffects};
use super::frame::{FrameHandle, FrameQueue};
use super::status::{SessionId, SessionStatus};
use crate::dom::html::escape_attr;
use crate::dom::{Document, NodeId};
use crate::error::{StreamError, TransportError};
use crate::markdown::MarkdownSanitizer;
use crate::render::{ReconcilingRenderer, TypingCursor};
use crate::transport::{ChunkEvent, ChunkTransport, TransportEvent};
use crossbeam_channel::Receiver;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a stopped cursor stays visible before removal.
    pub stop_linger: Duration,
    /// Class of the typing cursor element.
    pub cursor_class: String,
    /// Class added to the cursor when the user stops the response.
    pub stopped_class: String,
    /// Class of the error block appended on error finalization.
    pub error_class: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stop_linger: Duration::from_millis(600),
            cursor_class: "typing-cursor".to_string(),
            stopped_class: "stopped".to_string(),
            error_class: "stream-error".to_string(),
        }
    }
}

/// Document nodes a session writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTargets {
    /// Element whose children hold the rendered markdown.
    pub container: NodeId,
    /// Element holding the raw accumulated text.
    pub sink: Option<NodeId>,
    /// Placeholder replaced by the meta fragment on completion.
    pub meta_placeholder: Option<NodeId>,
}

impl SessionTargets {
    /// Targets with only a render container.
    pub const fn container(container: NodeId) -> Self {
        Self {
            container,
            sink: None,
            meta_placeholder: None,
        }
    }
}

/// How a session is finishing.
enum Finish<'a> {
    Done(&'a Value),
    Error(&'a str),
}

/// A streaming response bound to a container.
pub struct StreamSession {
    id: SessionId,
    config: SessionConfig,
    targets: SessionTargets,
    transport: ChunkTransport,
    sanitizer: Arc<dyn MarkdownSanitizer>,
    effects: Box<dyn SessionEffects>,
    renderer: ReconcilingRenderer,
    frames: FrameQueue,
    status: SessionStatus,
    accumulated: String,
    cursor: Option<TypingCursor>,
    cursor_deadline: Option<Instant>,
    began: bool,
    renders: u64,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("targets", &self.targets)
            .field("accumulated", &self.accumulated.len())
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    /// Create an idle session.
    pub fn new(
        config: SessionConfig,
        targets: SessionTargets,
        transport: ChunkTransport,
        sanitizer: Arc<dyn MarkdownSanitizer>,
        effects: Box<dyn SessionEffects>,
    ) -> Self {
        Self {
            id: SessionId::next(),
            config,
            renderer: ReconcilingRenderer::new(targets.container),
            targets,
            transport,
            sanitizer,
            effects,
            frames: FrameQueue::new(),
            status: SessionStatus::Idle,
            accumulated: String::new(),
            cursor: None,
            cursor_deadline: None,
            began: false,
            renders: 0,
        }
    }

    /// Session identifier.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Current status.
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Text received so far.
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    /// Targets this session writes to.
    pub const fn targets(&self) -> &SessionTargets {
        &self.targets
    }

    /// Renderer managing the container.
    pub const fn renderer(&self) -> &ReconcilingRenderer {
        &self.renderer
    }

    /// Render passes committed from frame callbacks or finalization.
    pub const fn render_count(&self) -> u64 {
        self.renders
    }

    /// Typing cursor node while it exists.
    pub fn cursor_node(&self) -> Option<NodeId> {
        self.cursor.as_ref().map(TypingCursor::node)
    }

    /// Transport events, while the connection is open.
    pub fn transport_events(&self) -> Option<Receiver<TransportEvent>> {
        self.transport.receiver().cloned()
    }

    /// Whether a frame is waiting to fire.
    pub const fn has_scheduled_frame(&self) -> bool {
        self.frames.is_scheduled()
    }

    /// Whether a deferred cursor removal is pending.
    pub const fn has_pending_timers(&self) -> bool {
        self.cursor_deadline.is_some()
    }

    /// Terminal with nothing left to do.
    pub const fn is_settled(&self) -> bool {
        self.status.is_terminal() && !self.has_pending_timers()
    }

    /// Open the transport and show the typing cursor.
    ///
    /// Only an idle session can start. If the transport cannot open at
    /// all, the session finalizes as errored.
    pub fn start(&mut self, doc: &mut Document) -> bool {
        if self.status != SessionStatus::Idle {
            debug!(session = %self.id, status = %self.status, "start ignored");
            return false;
        }
        self.status = SessionStatus::Connecting;
        info!(session = %self.id, "connecting");

        if doc.is_connected(self.targets.container) {
            let cursor = TypingCursor::create(
                doc,
                &self.config.cursor_class,
                &self.config.stopped_class,
            );
            doc.append_child(self.targets.container, cursor.node());
            self.cursor = Some(cursor);
        } else {
            debug!(session = %self.id, "container missing; streaming without cursor");
        }

        self.transport.start();
        if !self.transport.is_active() {
            let err = TransportError::Connect("no push url configured".to_string());
            warn!(session = %self.id, error = %err, "transport did not start");
            self.finish(doc, &Finish::Error(err.user_message()));
        }
        true
    }

    /// Apply one transport event.
    pub fn handle_event(&mut self, doc: &mut Document, event: TransportEvent) {
        if !self.status.is_active() {
            debug!(session = %self.id, status = %self.status, "late transport event ignored");
            return;
        }
        match event {
            TransportEvent::Chunk(ChunkEvent::Message { text }) => self.on_message(&text),
            TransportEvent::Chunk(ChunkEvent::Meta { payload }) => {
                self.effects.on_meta(self.id, &payload);
            }
            TransportEvent::Chunk(ChunkEvent::Done { payload }) => {
                self.finish(doc, &Finish::Done(&payload));
            }
            TransportEvent::Chunk(ChunkEvent::Error { text }) => {
                warn!(session = %self.id, error = %text, "server reported error");
                self.finish(doc, &Finish::Error(&text));
            }
            TransportEvent::Failed(err) => {
                warn!(session = %self.id, error = %StreamError::from(err.clone()), "stream failed");
                self.finish(doc, &Finish::Error(err.user_message()));
            }
        }
    }

    fn on_message(&mut self, text: &str) {
        if !self.began {
            self.began = true;
            self.status = SessionStatus::Streaming;
            info!(session = %self.id, "streaming");
            self.effects.on_begin(self.id);
        }
        self.accumulated.push_str(text);
        self.frames.schedule();
    }

    /// Take the scheduled frame, if any, for firing.
    ///
    /// The owner calls this at a display-frame boundary and then passes the
    /// handle to [`on_frame`](Self::on_frame).
    pub fn take_due_frame(&mut self) -> Option<FrameHandle> {
        self.frames.take_due()
    }

    /// Frame callback: render the latest accumulated text.
    ///
    /// Returns whether a render pass ran. Stale handles and callbacks that
    /// fire after finalization do nothing.
    pub fn on_frame(&mut self, doc: &mut Document, handle: FrameHandle) -> bool {
        if !self.frames.complete(handle) || self.status != SessionStatus::Streaming {
            debug!(session = %self.id, "stale frame ignored");
            return false;
        }
        self.render(doc);
        true
    }

    /// Render the accumulated text and keep the cursor trailing.
    fn render(&mut self, doc: &mut Document) {
        let html = self.sanitizer.render(&self.accumulated);
        self.commit(doc, &html);
    }

    fn commit(&mut self, doc: &mut Document, html: &str) {
        let anchor = self.cursor_node();
        self.renderer.set_anchor(anchor);
        let changed = self.renderer.update(doc, html);
        self.renders += 1;
        self.sync_sink(doc);
        if changed {
            if let Some(cursor) = &self.cursor {
                cursor.place(doc, self.targets.container);
            }
        }
    }

    fn sync_sink(&self, doc: &mut Document) {
        if let Some(sink) = self.targets.sink.filter(|&s| doc.is_connected(s)) {
            doc.set_text_content(sink, &self.accumulated);
        }
    }

    /// Common finalization for done and error.
    fn finish(&mut self, doc: &mut Document, finish: &Finish<'_>) {
        self.status = SessionStatus::Finalizing;
        self.frames.cancel();
        self.transport.close();

        match finish {
            Finish::Done(_) => self.render(doc),
            Finish::Error(message) => self.render_error(doc, message),
        }
        self.settle_cursor(doc, Instant::now());

        match finish {
            Finish::Done(payload) => {
                self.status = SessionStatus::Completed;
                info!(session = %self.id, "completed");
                self.request_fragment(doc, payload);
            }
            Finish::Error(_) => {
                self.status = SessionStatus::Errored;
                info!(session = %self.id, "errored");
                if let Some(placeholder) = self.targets.meta_placeholder {
                    doc.remove(placeholder);
                }
            }
        }
        self.effects.scroll_to_bottom(self.id);
    }

    /// Final render with the error block appended.
    fn render_error(&mut self, doc: &mut Document, message: &str) {
        if self.accumulated.is_empty() {
            self.renderer.reset(doc);
        }
        let mut html = if self.accumulated.is_empty() {
            String::new()
        } else {
            self.sanitizer.render(&self.accumulated)
        };
        html.push_str("<div class=\"");
        escape_attr(&self.config.error_class, &mut html);
        html.push_str("\">");
        html.push_str(&self.sanitizer.render(message));
        html.push_str("</div>");
        self.commit(doc, &html);
    }

    /// Remove the cursor, or schedule removal if it was frozen by a stop.
    fn settle_cursor(&mut self, doc: &mut Document, now: Instant) {
        let Some(cursor) = self.cursor.take() else {
            return;
        };
        if cursor.is_stopped() {
            self.cursor_deadline = Some(now + self.config.stop_linger);
            self.cursor = Some(cursor);
        } else {
            cursor.remove(doc);
        }
    }

    fn request_fragment(&mut self, doc: &Document, payload: &Value) {
        let Some(target) = self.targets.meta_placeholder else {
            return;
        };
        if !doc.is_connected(target) {
            debug!(session = %self.id, "meta placeholder missing; skipping fetch");
            return;
        }
        let Some(response_id) = response_id(payload) else {
            warn!(session = %self.id, "done payload has no response id; skipping fetch");
            return;
        };
        self.effects.fetch_fragment(FragmentRequest {
            session: self.id,
            response_id,
            target,
        });
    }

    /// User stop.
    ///
    /// Cancels the pending render without rendering again, freezes the
    /// cursor, notifies the stop endpoint and ends as aborted. A no-op in
    /// any terminal state.
    pub fn abort(&mut self, doc: &mut Document) -> bool {
        self.abort_at(doc, Instant::now())
    }

    /// [`abort`](Self::abort) with an explicit clock.
    pub fn abort_at(&mut self, doc: &mut Document, now: Instant) -> bool {
        if self.status.is_terminal() {
            debug!(session = %self.id, status = %self.status, "abort ignored");
            return false;
        }
        let was_started = self.status != SessionStatus::Idle;
        self.frames.cancel();
        self.transport.close();

        if let Some(cursor) = &mut self.cursor {
            cursor.mark_stopped(doc);
        }
        self.settle_cursor(doc, now);

        if was_started {
            self.effects.notify_stop(self.id);
        }
        self.status = SessionStatus::Aborted;
        info!(session = %self.id, "aborted");
        true
    }

    /// Run deferred work that is due at `now`.
    pub fn poll_timers(&mut self, doc: &mut Document, now: Instant) {
        if self.cursor_deadline.is_some_and(|deadline| now >= deadline) {
            self.cursor_deadline = None;
            if let Some(cursor) = self.cursor.take() {
                cursor.remove(doc);
            }
        }
    }

    /// The host element went away: release everything now.
    ///
    /// A live session ends as aborted without notifying the stop endpoint.
    pub fn dispose(&mut self, doc: &mut Document) {
        self.frames.cancel();
        self.transport.close();
        self.cursor_deadline = None;
        if let Some(cursor) = self.cursor.take() {
            cursor.remove(doc);
        }
        if !self.status.is_terminal() {
            self.status = SessionStatus::Aborted;
            info!(session = %self.id, "disposed");
        }
    }
}

/// Response id from a `done` payload; strings and numbers are accepted.
fn response_id(payload: &Value) -> Option<String> {
    match payload.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
