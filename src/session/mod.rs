//! Session module: Coordinating one streamed response.
//!
//! - [`StreamSession`]: the lifecycle state machine
//! - [`FrameQueue`]: one-render-per-frame coalescing
//! - [`SessionEffects`]: fetch, scroll and stop side effects

mod effects;
mod frame;
mod status;
mod stream;

pub use effects::{
    fragment_url, EffectSender, FragmentRequest, HttpEffects, HttpEffectsConfig, NoopEffects,
    SessionEffects, ID_PLACEHOLDER,
};
pub use frame::{FrameHandle, FrameQueue};
pub use status::{SessionId, SessionStatus};
pub use stream::{SessionConfig, SessionTargets, StreamSession};
