//! Session Effects: Side effects a session triggers outside the document.
//!
//! [`SessionEffects`] is the seam; [`HttpEffects`] performs the requests
//! on short-lived worker threads and posts results back through an
//! [`EffectSender`], so the document is only ever touched by its owner.

use super::status::SessionId;
use crate::actor::EngineMessage;
use crate::dom::NodeId;
use crate::error::TransportError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Placeholder substituted with the response id in URL templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// A fetch-and-swap request for the meta fragment of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRequest {
    /// Requesting session.
    pub session: SessionId,
    /// Server-side response identifier.
    pub response_id: String,
    /// Placeholder element the fragment replaces.
    pub target: NodeId,
}

/// Hooks a session calls as it moves through its lifecycle.
///
/// Every hook defaults to doing nothing.
pub trait SessionEffects {
    /// The first message chunk arrived. Called exactly once per session.
    fn on_begin(&mut self, session: SessionId) {
        let _ = session;
    }

    /// A `meta` event arrived.
    fn on_meta(&mut self, session: SessionId, payload: &Value) {
        let _ = (session, payload);
    }

    /// Fetch the meta fragment and swap it into `request.target`.
    fn fetch_fragment(&mut self, request: FragmentRequest) {
        let _ = request;
    }

    /// The view should follow the finalized content.
    fn scroll_to_bottom(&mut self, session: SessionId) {
        let _ = session;
    }

    /// Tell the server the user stopped the response. Fire and forget.
    fn notify_stop(&mut self, session: SessionId) {
        let _ = session;
    }
}

/// Effects that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEffects;

impl SessionEffects for NoopEffects {}

/// Posts effect results to the engine and counts outstanding requests.
#[derive(Debug, Clone)]
pub struct EffectSender {
    tx: Sender<EngineMessage>,
    outstanding: Arc<AtomicUsize>,
}

impl EffectSender {
    /// Create a sender and the receiving end for the engine.
    pub fn channel() -> (Self, Receiver<EngineMessage>) {
        let (tx, rx) = unbounded();
        let sender = Self {
            tx,
            outstanding: Arc::new(AtomicUsize::new(0)),
        };
        (sender, rx)
    }

    /// Post a notification. Returns `false` if the engine is gone.
    pub fn post(&self, message: EngineMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    /// Record that a reply is expected.
    pub fn begin_request(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Deliver the reply to a request started with `begin_request`.
    pub fn reply(&self, message: EngineMessage) {
        if !self.post(message) {
            self.finish_request();
        }
    }

    /// Mark one expected reply as handled.
    pub fn finish_request(&self) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Replies still expected.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

/// Configuration for [`HttpEffects`].
#[derive(Debug, Clone)]
pub struct HttpEffectsConfig {
    /// Fragment URL; `{id}` is replaced with the response id.
    pub fragment_url_template: Option<String>,
    /// Stop endpoint, POSTed with an empty body.
    pub stop_url: Option<String>,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for HttpEffectsConfig {
    fn default() -> Self {
        Self {
            fragment_url_template: None,
            stop_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Substitute `id` into a URL template.
pub fn fragment_url(template: &str, id: &str) -> String {
    template.replace(ID_PLACEHOLDER, id)
}

/// HTTP-backed effects.
#[derive(Debug, Clone)]
pub struct HttpEffects {
    client: reqwest::blocking::Client,
    config: HttpEffectsConfig,
    sender: EffectSender,
}

impl HttpEffects {
    /// Create effects that report to `sender`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HttpEffectsConfig, sender: EffectSender) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            config,
            sender,
        })
    }

    fn get_text(client: &reqwest::blocking::Client, url: &str) -> Result<String, TransportError> {
        let response = client
            .get(url)
            .send()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response.text().map_err(|e| TransportError::Read(e.to_string()))
    }
}

impl SessionEffects for HttpEffects {
    fn on_begin(&mut self, session: SessionId) {
        self.sender.post(EngineMessage::Begin { session });
    }

    fn on_meta(&mut self, session: SessionId, payload: &Value) {
        self.sender.post(EngineMessage::Meta {
            session,
            payload: payload.clone(),
        });
    }

    fn fetch_fragment(&mut self, request: FragmentRequest) {
        let Some(template) = &self.config.fragment_url_template else {
            debug!(%request.session, "no fragment url configured");
            return;
        };
        let url = fragment_url(template, &request.response_id);
        let client = self.client.clone();
        let sender = self.sender.clone();
        self.sender.begin_request();

        let spawned = thread::Builder::new()
            .name("streamark-fetch".to_string())
            .spawn(move || {
                let message = match Self::get_text(&client, &url) {
                    Ok(html) => EngineMessage::FragmentLoaded {
                        session: request.session,
                        target: request.target,
                        html,
                    },
                    Err(err) => {
                        warn!(%url, error = %err, "fragment fetch failed");
                        EngineMessage::FragmentFailed {
                            session: request.session,
                            error: err.to_string(),
                        }
                    }
                };
                sender.reply(message);
            });
        if let Err(err) = spawned {
            warn!(error = %err, "could not spawn fragment fetch");
            self.sender.finish_request();
        }
    }

    fn scroll_to_bottom(&mut self, session: SessionId) {
        self.sender.post(EngineMessage::ScrollToBottom { session });
    }

    fn notify_stop(&mut self, session: SessionId) {
        let Some(url) = self.config.stop_url.clone() else {
            return;
        };
        let client = self.client.clone();
        let spawned = thread::Builder::new()
            .name("streamark-stop".to_string())
            .spawn(move || {
                if let Err(err) = client.post(&url).send() {
                    warn!(%session, %url, error = %err, "stop notification failed");
                }
            });
        if let Err(err) = spawned {
            warn!(error = %err, "could not spawn stop notification");
        }
    }
}
