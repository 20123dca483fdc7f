//! Voice manager: enumerate voices and edit their properties.
//!
//! Nothing is cached here. The engine owns voice state and index
//! assignment, so every request rebuilds what it needs from native calls.

use tracing::{debug, info};

use chorus_protocol::{VoiceCollection, VoiceProperty, VoiceUpdate};

use crate::error::ApiError;
use crate::native::{NativeEngine, VoiceField, VoiceParam};

/// Read a voice string with the engine's length-then-fill pair of calls.
pub fn fetch_native_string(engine: &mut dyn NativeEngine, field: VoiceField, index: i32) -> Result<String, ApiError> {
    let len = engine
        .voice_string_len(field, index)
        .map_err(|code| ApiError::native(field.length_symbol(), code))?;
    let len = usize::try_from(len).map_err(|_| {
        ApiError::Internal(format!("{} reported length {} for voice {}", field.length_symbol(), len, index))
    })?;

    // One extra unit so an engine that writes the terminator stays in bounds.
    let mut buf = vec![0u16; len + 1];
    engine
        .voice_string(field, index, &mut buf)
        .map_err(|code| ApiError::native(field.fill_symbol(), code))?;

    let end = buf.iter().position(|&u| u == 0).unwrap_or(len);
    String::from_utf16(&buf[..end]).map_err(|e| {
        ApiError::Internal(format!("{} returned invalid UTF-16 for voice {}: {}", field.fill_symbol(), index, e))
    })
}

/// Read a numeric voice property, decoding the engine's f64 bit pattern.
pub fn read_param(engine: &mut dyn NativeEngine, param: VoiceParam, index: i32) -> Result<f64, ApiError> {
    engine
        .voice_param(param, index)
        .map(f64::from_bits)
        .map_err(|code| ApiError::native(param.getter_symbol(), code))
}

fn write_param(engine: &mut dyn NativeEngine, param: VoiceParam, index: i32, value: f64) -> Result<(), ApiError> {
    engine
        .set_voice_param(param, index, value.to_bits())
        .map_err(|code| ApiError::native(format!("{} (voice {})", param.setter_symbol(), index), code))
}

fn voice_count(engine: &mut dyn NativeEngine) -> Result<i32, ApiError> {
    let count = engine
        .voice_count()
        .map_err(|code| ApiError::native("GetVoiceCount", code))?;
    if count < 0 {
        return Err(ApiError::Internal(format!("GetVoiceCount reported {}", count)));
    }
    Ok(count)
}

fn default_voice(engine: &mut dyn NativeEngine) -> Result<i32, ApiError> {
    engine
        .default_voice()
        .map_err(|code| ApiError::native("GetDefaultVoice", code))
}

/// Fail unless `index` addresses one of the engine's voices.
fn check_index(engine: &mut dyn NativeEngine, index: i32) -> Result<(), ApiError> {
    let count = voice_count(engine)?;
    if index < 0 || index >= count {
        return Err(ApiError::InvalidParameter {
            name: "index",
            reason: format!("is out of range (voice count is {})", count),
        });
    }
    Ok(())
}

fn read_voice(engine: &mut dyn NativeEngine, index: i32) -> Result<VoiceProperty, ApiError> {
    Ok(VoiceProperty {
        id: fetch_native_string(engine, VoiceField::Id, index)?,
        display_name: fetch_native_string(engine, VoiceField::DisplayName, index)?,
        language: fetch_native_string(engine, VoiceField::Language, index)?,
        speaking_rate: read_param(engine, VoiceParam::SpeakingRate, index)?,
        audio_pitch: read_param(engine, VoiceParam::AudioPitch, index)?,
        audio_volume: read_param(engine, VoiceParam::AudioVolume, index)?,
    })
}

/// Enumerate every voice along with the default voice index.
///
/// Any failed native call aborts the whole enumeration.
pub fn enumerate(engine: &mut dyn NativeEngine) -> Result<VoiceCollection, ApiError> {
    let count = voice_count(engine)?;
    let default_voice_index = default_voice(engine)?;

    if count > 0 && !(0..count).contains(&default_voice_index) {
        return Err(ApiError::Internal(format!(
            "default voice index {} is outside 0..{}",
            default_voice_index, count
        )));
    }

    let mut voices = Vec::with_capacity(count as usize);
    for index in 0..count {
        voices.push(read_voice(engine, index)?);
    }

    debug!(count, default_voice_index, "Enumerated voices");
    Ok(VoiceCollection {
        default_voice_index,
        voices,
    })
}

/// Value of an update field that should be written, if any.
///
/// Absent and negative values leave the property alone. Zero is written.
pub fn supplied(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v >= 0.0)
}

/// Apply the supplied fields of `update` to the voice at `index`.
///
/// Fields are written one by one; a failure stops at that field and earlier
/// writes stay applied. Returns the properties that were written.
pub fn apply_update(engine: &mut dyn NativeEngine, index: i32, update: &VoiceUpdate) -> Result<Vec<VoiceParam>, ApiError> {
    check_index(engine, index)?;

    let edits = [
        (VoiceParam::SpeakingRate, update.speaking_rate),
        (VoiceParam::AudioPitch, update.audio_pitch),
        (VoiceParam::AudioVolume, update.audio_volume),
    ];

    let mut applied = Vec::new();
    for (param, value) in edits {
        let Some(value) = supplied(value) else {
            continue;
        };
        write_param(engine, param, index, value)?;
        info!(index, param = param.name(), value, "Voice property updated");
        applied.push(param);
    }
    Ok(applied)
}

/// Shift a property of the default voice by `diff`.
///
/// Returns the new value, or `None` when `diff` is zero and nothing was
/// touched.
pub fn adjust_default(engine: &mut dyn NativeEngine, param: VoiceParam, diff: f64) -> Result<Option<f64>, ApiError> {
    if diff == 0.0 {
        return Ok(None);
    }

    let index = default_voice(engine)?;
    let current = read_param(engine, param, index)?;
    let updated = current + diff;
    write_param(engine, param, index, updated)?;

    info!(index, param = param.name(), from = current, to = updated, "Default voice adjusted");
    Ok(Some(updated))
}

/// Make the voice at `index` the engine's default.
pub fn set_default(engine: &mut dyn NativeEngine, index: i32) -> Result<(), ApiError> {
    check_index(engine, index)?;
    engine
        .set_default_voice(index)
        .map_err(|code| ApiError::native("SetDefaultVoice", code))?;
    info!(index, "Default voice changed");
    Ok(())
}
