//! `SimulatedEngine`: in-process stand-in for the native engine.
//!
//! Used when no engine library is configured, and by the test suite. It
//! honours the same contract as the real engine: pushed records are decoded
//! by their tag, text buffers must be null-terminated, and every entry point
//! answers with a status code. Any symbol can be made to fail. With
//! `recording()` every call is also kept by its exported symbol name, along
//! with each accepted batch; without it nothing accumulates.

use std::collections::HashSet;
use std::sync::Arc;

use chorus_protocol::CommandKind;
use parking_lot::Mutex;
use tracing::debug;

use super::record::{read_utf16, NativeCommand};
use super::{NativeEngine, NativeResult, StatusCode, VoiceField, VoiceParam};

/// A voice known to the simulated engine
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedVoice {
    pub id: String,
    pub display_name: String,
    pub language: String,
    pub speaking_rate: f64,
    pub audio_pitch: f64,
    pub audio_volume: f64,
}

impl SimulatedVoice {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            language: language.into(),
            speaking_rate: 1.0,
            audio_pitch: 1.0,
            audio_volume: 1.0,
        }
    }

    fn string(&self, field: VoiceField) -> &str {
        match field {
            VoiceField::Id => &self.id,
            VoiceField::DisplayName => &self.display_name,
            VoiceField::Language => &self.language,
        }
    }

    fn param(&self, param: VoiceParam) -> f64 {
        match param {
            VoiceParam::SpeakingRate => self.speaking_rate,
            VoiceParam::AudioPitch => self.audio_pitch,
            VoiceParam::AudioVolume => self.audio_volume,
        }
    }

    fn param_mut(&mut self, param: VoiceParam) -> &mut f64 {
        match param {
            VoiceParam::SpeakingRate => &mut self.speaking_rate,
            VoiceParam::AudioPitch => &mut self.audio_pitch,
            VoiceParam::AudioVolume => &mut self.audio_volume,
        }
    }
}

/// A command as the engine decoded it from a pushed record
#[derive(Debug, Clone, PartialEq)]
pub enum PushedCommand {
    PlaySound(i16),
    Wait(f64),
    SpeakText(String),
    SpeakSsml(String),
}

/// One accepted `Push` call
#[derive(Debug, Clone, PartialEq)]
pub struct PushedBatch {
    pub force: bool,
    pub commands: Vec<PushedCommand>,
}

#[derive(Debug, Default)]
struct SimulatedState {
    voices: Vec<SimulatedVoice>,
    default_voice: i32,
    active: bool,
    faded_out: bool,
    recording: bool,
    calls: Vec<&'static str>,
    pushed: Vec<PushedBatch>,
    failing: HashSet<&'static str>,
}

impl SimulatedState {
    fn enter(&mut self, symbol: &'static str) -> NativeResult<()> {
        if self.recording {
            self.calls.push(symbol);
        }
        if self.failing.contains(symbol) {
            debug!(symbol, "Simulated engine failing call on request");
            return Err(StatusCode::FAILED);
        }
        Ok(())
    }

    fn require_active(&self) -> NativeResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(StatusCode::FAILED)
        }
    }

    fn voice(&self, index: i32) -> NativeResult<&SimulatedVoice> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.voices.get(i))
            .ok_or(StatusCode::FAILED)
    }

    fn voice_mut(&mut self, index: i32) -> NativeResult<&mut SimulatedVoice> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.voices.get_mut(i))
            .ok_or(StatusCode::FAILED)
    }
}

/// Cloneable handle; clones share the same engine state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedEngine {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedEngine {
    pub fn new(voices: Vec<SimulatedVoice>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState {
                voices,
                ..SimulatedState::default()
            })),
        }
    }

    /// Engine preloaded with a small set of voices
    pub fn with_sample_voices() -> Self {
        Self::new(vec![
            SimulatedVoice::new("sim-en-us-aria", "Aria (simulated)", "en-US"),
            SimulatedVoice::new("sim-ja-jp-haruka", "Haruka (simulated)", "ja-JP"),
        ])
    }

    /// Keep every call and accepted batch for later inspection
    pub fn recording(self) -> Self {
        self.state.lock().recording = true;
        self
    }

    pub fn with_default_voice(self, index: i32) -> Self {
        self.state.lock().default_voice = index;
        self
    }

    /// Make every future call to `symbol` report failure
    pub fn fail_on(&self, symbol: &'static str) {
        self.state.lock().failing.insert(symbol);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Exported symbols called so far, in order. Empty unless recording.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    /// Accepted batches, in order. Empty unless recording.
    pub fn pushed(&self) -> Vec<PushedBatch> {
        self.state.lock().pushed.clone()
    }

    pub fn voice(&self, index: usize) -> Option<SimulatedVoice> {
        self.state.lock().voices.get(index).cloned()
    }

    pub fn default_voice_index(&self) -> i32 {
        self.state.lock().default_voice
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn is_faded_out(&self) -> bool {
        self.state.lock().faded_out
    }
}

/// Decode one record by its tag.
///
/// # Safety
/// The record's text and SSML pointers must be null or valid for their
/// declared length plus the terminator.
unsafe fn decode(record: &NativeCommand) -> Option<PushedCommand> {
    let command = match record.command_kind()? {
        CommandKind::PlaySound => PushedCommand::PlaySound(record.sound_index),
        CommandKind::Wait => PushedCommand::Wait(record.wait_seconds()),
        CommandKind::SpeakText => {
            let units = read_utf16(record.text_ptr, record.text_len)?;
            PushedCommand::SpeakText(String::from_utf16(&units).ok()?)
        }
        CommandKind::SpeakSsml => {
            let units = read_utf16(record.ssml_ptr, record.ssml_len)?;
            PushedCommand::SpeakSsml(String::from_utf16(&units).ok()?)
        }
    };
    Some(command)
}

impl NativeEngine for SimulatedEngine {
    fn setup(&mut self) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.enter("Setup")?;
        if state.active {
            return Err(StatusCode::FAILED);
        }
        state.active = true;
        state.faded_out = false;
        Ok(())
    }

    fn teardown(&mut self) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.enter("Teardown")?;
        state.require_active()?;
        state.active = false;
        Ok(())
    }

    fn fade_in(&mut self) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.enter("FadeIn")?;
        state.require_active()?;
        state.faded_out = false;
        Ok(())
    }

    fn fade_out(&mut self) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.enter("FadeOut")?;
        state.require_active()?;
        state.faded_out = true;
        Ok(())
    }

    unsafe fn push(&mut self, commands: &[*const NativeCommand], force: bool) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.enter("Push")?;
        state.require_active()?;

        let mut decoded = Vec::with_capacity(commands.len());
        for &ptr in commands {
            let record = ptr.as_ref().ok_or(StatusCode::FAILED)?;
            decoded.push(decode(record).ok_or(StatusCode::FAILED)?);
        }

        debug!(count = decoded.len(), force, "Simulated engine accepted batch");
        if state.recording {
            state.pushed.push(PushedBatch {
                force,
                commands: decoded,
            });
        }
        Ok(())
    }

    fn voice_count(&mut self) -> NativeResult<i32> {
        let mut state = self.state.lock();
        state.enter("GetVoiceCount")?;
        i32::try_from(state.voices.len()).map_err(|_| StatusCode::FAILED)
    }

    fn default_voice(&mut self) -> NativeResult<i32> {
        let mut state = self.state.lock();
        state.enter("GetDefaultVoice")?;
        Ok(state.default_voice)
    }

    fn set_default_voice(&mut self, index: i32) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.enter("SetDefaultVoice")?;
        state.voice(index)?;
        state.default_voice = index;
        Ok(())
    }

    fn voice_string_len(&mut self, field: VoiceField, index: i32) -> NativeResult<i32> {
        let mut state = self.state.lock();
        state.enter(field.length_symbol())?;
        let len = state.voice(index)?.string(field).encode_utf16().count();
        i32::try_from(len).map_err(|_| StatusCode::FAILED)
    }

    fn voice_string(&mut self, field: VoiceField, index: i32, buf: &mut [u16]) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.enter(field.fill_symbol())?;
        let units: Vec<u16> = state.voice(index)?.string(field).encode_utf16().collect();
        if buf.len() < units.len() {
            return Err(StatusCode::FAILED);
        }
        buf[..units.len()].copy_from_slice(&units);
        if let Some(terminator) = buf.get_mut(units.len()) {
            *terminator = 0;
        }
        Ok(())
    }

    fn voice_param(&mut self, param: VoiceParam, index: i32) -> NativeResult<u64> {
        let mut state = self.state.lock();
        state.enter(param.getter_symbol())?;
        let value = state.voice(index)?.param(param);
        Ok(value.to_bits())
    }

    fn set_voice_param(&mut self, param: VoiceParam, index: i32, bits: u64) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.enter(param.setter_symbol())?;
        *state.voice_mut(index)?.param_mut(param) = f64::from_bits(bits);
        Ok(())
    }
}
