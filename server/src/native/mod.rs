//! Boundary to the native speech engine.
//!
//! `NativeEngine` mirrors the engine's exported entry points one to one.
//! Every entry point reports a status code, zero meaning success, which is
//! surfaced here as `NativeResult`.
//!
//! The engine is not assumed to tolerate concurrent calls. `Gateway` is the
//! single owner of the engine and serialises every operation through one
//! `parking_lot::Mutex`, held for the whole operation (a batch push, a full
//! voice enumeration) so callers always observe a consistent snapshot.

pub mod record;
pub mod simulated;

#[cfg(feature = "dynamic-engine")]
pub mod dynamic;

#[cfg(not(target_pointer_width = "64"))]
compile_error!("wait durations travel as f64 bits in a pointer-sized slot, which needs a 64-bit target");

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::ApiError;

pub use record::NativeCommand;
pub use simulated::SimulatedEngine;

#[cfg(feature = "dynamic-engine")]
pub use dynamic::DynamicEngine;

/// Status code reported by a native entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(0);
    /// Generic failure, used where the engine gives no code of its own
    pub const FAILED: StatusCode = StatusCode(-1);

    pub fn into_result(self) -> NativeResult<()> {
        if self == Self::OK {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={}", self.0)
    }
}

pub type NativeResult<T> = Result<T, StatusCode>;

/// Read-only string properties of a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceField {
    Id,
    DisplayName,
    Language,
}

impl VoiceField {
    pub const ALL: [VoiceField; 3] = [VoiceField::Id, VoiceField::DisplayName, VoiceField::Language];

    /// Entry point reporting the string length
    pub fn length_symbol(self) -> &'static str {
        match self {
            VoiceField::Id => "GetVoiceIdLength",
            VoiceField::DisplayName => "GetVoiceDisplayNameLength",
            VoiceField::Language => "GetVoiceLanguageLength",
        }
    }

    /// Entry point filling a caller-provided buffer
    pub fn fill_symbol(self) -> &'static str {
        match self {
            VoiceField::Id => "GetVoiceId",
            VoiceField::DisplayName => "GetVoiceDisplayName",
            VoiceField::Language => "GetVoiceLanguage",
        }
    }
}

/// Numeric read/write properties of a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceParam {
    SpeakingRate,
    AudioPitch,
    AudioVolume,
}

impl VoiceParam {
    pub const ALL: [VoiceParam; 3] = [
        VoiceParam::SpeakingRate,
        VoiceParam::AudioPitch,
        VoiceParam::AudioVolume,
    ];

    /// Field name on the wire
    pub fn name(self) -> &'static str {
        match self {
            VoiceParam::SpeakingRate => "speakingRate",
            VoiceParam::AudioPitch => "audioPitch",
            VoiceParam::AudioVolume => "audioVolume",
        }
    }

    pub fn getter_symbol(self) -> &'static str {
        match self {
            VoiceParam::SpeakingRate => "GetSpeakingRate",
            VoiceParam::AudioPitch => "GetAudioPitch",
            VoiceParam::AudioVolume => "GetAudioVolume",
        }
    }

    pub fn setter_symbol(self) -> &'static str {
        match self {
            VoiceParam::SpeakingRate => "SetSpeakingRate",
            VoiceParam::AudioPitch => "SetAudioPitch",
            VoiceParam::AudioVolume => "SetAudioVolume",
        }
    }
}

/// Contract of the native engine's exported entry points.
pub trait NativeEngine: Send + 'static {
    fn setup(&mut self) -> NativeResult<()>;

    fn teardown(&mut self) -> NativeResult<()>;

    fn fade_in(&mut self) -> NativeResult<()>;

    fn fade_out(&mut self) -> NativeResult<()>;

    /// Queue a batch of commands, flushing pending playback first when
    /// `force` is set.
    ///
    /// # Safety
    /// Every entry of `commands` must point to a live `NativeCommand` whose
    /// text and SSML buffers stay valid and unmodified until this returns.
    unsafe fn push(&mut self, commands: &[*const NativeCommand], force: bool) -> NativeResult<()>;

    fn voice_count(&mut self) -> NativeResult<i32>;

    fn default_voice(&mut self) -> NativeResult<i32>;

    fn set_default_voice(&mut self, index: i32) -> NativeResult<()>;

    /// Length of a voice string in UTF-16 code units, terminator excluded.
    fn voice_string_len(&mut self, field: VoiceField, index: i32) -> NativeResult<i32>;

    /// Copy a voice string into `buf`, followed by a terminator when it fits.
    fn voice_string(&mut self, field: VoiceField, index: i32, buf: &mut [u16]) -> NativeResult<()>;

    /// Raw IEEE-754 bits of a numeric voice property.
    fn voice_param(&mut self, param: VoiceParam, index: i32) -> NativeResult<u64>;

    fn set_voice_param(&mut self, param: VoiceParam, index: i32, bits: u64) -> NativeResult<()>;
}

struct EngineSlot {
    engine: Box<dyn NativeEngine>,
    enabled: bool,
}

/// Process-wide owner of the native engine.
#[derive(Clone)]
pub struct Gateway {
    slot: Arc<Mutex<EngineSlot>>,
}

impl Gateway {
    pub fn new<E: NativeEngine>(engine: E) -> Self {
        Self::from_boxed(Box::new(engine))
    }

    pub fn from_boxed(engine: Box<dyn NativeEngine>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(EngineSlot {
                engine,
                enabled: false,
            })),
        }
    }

    /// Run `op` with exclusive access to the engine.
    ///
    /// Native calls block, so the operation runs on tokio's blocking pool.
    pub async fn call<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut dyn NativeEngine) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        self.with_slot(move |slot| op(slot.engine.as_mut())).await
    }

    async fn with_slot<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut EngineSlot) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        tokio::task::spawn_blocking(move || {
            let mut guard = slot.lock();
            op(&mut *guard)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("native call task failed: {}", e)))?
    }

    /// Start the engine.
    pub async fn enable(&self) -> Result<(), ApiError> {
        self.with_slot(|slot| {
            slot.engine
                .setup()
                .map_err(|code| ApiError::native("Setup", code))?;
            slot.enabled = true;
            info!("Native engine enabled");
            Ok(())
        })
        .await
    }

    /// Stop the engine.
    pub async fn disable(&self) -> Result<(), ApiError> {
        self.with_slot(|slot| {
            slot.engine
                .teardown()
                .map_err(|code| ApiError::native("Teardown", code))?;
            slot.enabled = false;
            info!("Native engine disabled");
            Ok(())
        })
        .await
    }

    /// Whether `enable` succeeded more recently than `disable`. Waits its
    /// turn behind any running native operation.
    pub async fn is_enabled(&self) -> Result<bool, ApiError> {
        self.with_slot(|slot| Ok(slot.enabled)).await
    }

    /// Tear the engine down if it is still running. Used on process exit.
    pub async fn shutdown(&self) {
        let result = self
            .with_slot(|slot| {
                if !slot.enabled {
                    debug!("Native engine was never enabled, nothing to tear down");
                    return Ok(());
                }
                slot.engine
                    .teardown()
                    .map_err(|code| ApiError::native("Teardown", code))?;
                slot.enabled = false;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => info!("Native engine shut down"),
            Err(e) => warn!("Failed to shut down native engine: {}", e),
        }
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}
