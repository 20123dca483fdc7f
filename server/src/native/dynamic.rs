//! Engine backed by the native library, loaded at runtime with `libloading`.
//!
//! Every exported entry point takes a pointer to an `i32` status slot as
//! its first argument. All symbols are resolved once at load time so a
//! missing export is reported at startup instead of on first use.

use std::path::{Path, PathBuf};

use libloading::Library;
use thiserror::Error;
use tracing::info;

use super::record::NativeCommand;
use super::{NativeEngine, NativeResult, StatusCode, VoiceField, VoiceParam};

type StatusFn = unsafe extern "system" fn(*mut i32);
type SetupFn = unsafe extern "system" fn(*mut i32, *const u16, i32);
type PushFn = unsafe extern "system" fn(*mut i32, *const *const NativeCommand, i32, i32);
type GetIndexFn = unsafe extern "system" fn(*mut i32, *mut i32);
type SetIndexFn = unsafe extern "system" fn(*mut i32, i32);
type LengthFn = unsafe extern "system" fn(*mut i32, i32, *mut i32);
type FillFn = unsafe extern "system" fn(*mut i32, i32, *mut u16);
type GetParamFn = unsafe extern "system" fn(*mut i32, i32, *mut u64);
type SetParamFn = unsafe extern "system" fn(*mut i32, i32, u64);

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot load native engine {path}: {source}")]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("native engine does not export {symbol}: {source}")]
    Symbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("engine log path contains a NUL character")]
    LogPath,
}

#[derive(Clone, Copy)]
struct StringProcs {
    length: LengthFn,
    fill: FillFn,
}

#[derive(Clone, Copy)]
struct ParamProcs {
    get: GetParamFn,
    set: SetParamFn,
}

/// Native engine library and its resolved entry points.
pub struct DynamicEngine {
    setup: SetupFn,
    teardown: StatusFn,
    fade_in: StatusFn,
    fade_out: StatusFn,
    push: PushFn,
    voice_count: GetIndexFn,
    default_voice: GetIndexFn,
    set_default_voice: SetIndexFn,
    strings: [StringProcs; 3],
    params: [ParamProcs; 3],
    log_path: Vec<u16>,
    log_level: i32,
    // Keeps the entry points above valid; dropped last.
    _library: Library,
}

/// Copy an exported function pointer out of the library.
///
/// # Safety
/// `T` must match the symbol's real signature.
unsafe fn resolve<T: Copy>(library: &Library, symbol: &'static str) -> Result<T, LoadError> {
    library
        .get::<T>(symbol.as_bytes())
        .map(|sym| *sym)
        .map_err(|source| LoadError::Symbol { symbol, source })
}

fn field_slot(field: VoiceField) -> usize {
    match field {
        VoiceField::Id => 0,
        VoiceField::DisplayName => 1,
        VoiceField::Language => 2,
    }
}

fn param_slot(param: VoiceParam) -> usize {
    match param {
        VoiceParam::SpeakingRate => 0,
        VoiceParam::AudioPitch => 1,
        VoiceParam::AudioVolume => 2,
    }
}

impl DynamicEngine {
    /// Load the engine library at `path`.
    ///
    /// `log_path` and `log_level` are handed to the engine's `Setup`.
    pub fn load(path: &Path, log_path: Option<&Path>, log_level: i32) -> Result<Self, LoadError> {
        let log_path = encode_log_path(log_path)?;

        // SAFETY: loading runs the library's initialisers; the engine library
        // is trusted configuration, and every signature below matches its
        // exported declarations.
        unsafe {
            let library = Library::new(path).map_err(|source| LoadError::Library {
                path: path.to_path_buf(),
                source,
            })?;

            let mut strings = Vec::with_capacity(VoiceField::ALL.len());
            for field in VoiceField::ALL {
                strings.push(StringProcs {
                    length: resolve(&library, field.length_symbol())?,
                    fill: resolve(&library, field.fill_symbol())?,
                });
            }
            let mut params = Vec::with_capacity(VoiceParam::ALL.len());
            for param in VoiceParam::ALL {
                params.push(ParamProcs {
                    get: resolve(&library, param.getter_symbol())?,
                    set: resolve(&library, param.setter_symbol())?,
                });
            }

            let engine = Self {
                setup: resolve(&library, "Setup")?,
                teardown: resolve(&library, "Teardown")?,
                fade_in: resolve(&library, "FadeIn")?,
                fade_out: resolve(&library, "FadeOut")?,
                push: resolve(&library, "Push")?,
                voice_count: resolve(&library, "GetVoiceCount")?,
                default_voice: resolve(&library, "GetDefaultVoice")?,
                set_default_voice: resolve(&library, "SetDefaultVoice")?,
                strings: [strings[0], strings[1], strings[2]],
                params: [params[0], params[1], params[2]],
                log_path,
                log_level,
                _library: library,
            };

            info!("Loaded native engine from {}", path.display());
            Ok(engine)
        }
    }

    fn status_call(&self, proc: StatusFn) -> NativeResult<()> {
        let mut code = 0;
        // SAFETY: `proc` was resolved from the loaded library with this signature.
        unsafe { proc(&mut code) };
        StatusCode(code).into_result()
    }

    fn index_query(&self, proc: GetIndexFn) -> NativeResult<i32> {
        let mut code = 0;
        let mut value = 0;
        // SAFETY: both out-pointers are live locals.
        unsafe { proc(&mut code, &mut value) };
        StatusCode(code).into_result().map(|()| value)
    }
}

/// Null-terminated UTF-16 copy of the engine log path, empty when unset.
fn encode_log_path(path: Option<&Path>) -> Result<Vec<u16>, LoadError> {
    let text = path.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
    if text.contains('\0') {
        return Err(LoadError::LogPath);
    }
    let mut units: Vec<u16> = text.encode_utf16().collect();
    units.push(0);
    Ok(units)
}

impl NativeEngine for DynamicEngine {
    fn setup(&mut self) -> NativeResult<()> {
        let mut code = 0;
        // SAFETY: `log_path` is null-terminated and outlives the call.
        unsafe { (self.setup)(&mut code, self.log_path.as_ptr(), self.log_level) };
        StatusCode(code).into_result()
    }

    fn teardown(&mut self) -> NativeResult<()> {
        self.status_call(self.teardown)
    }

    fn fade_in(&mut self) -> NativeResult<()> {
        self.status_call(self.fade_in)
    }

    fn fade_out(&mut self) -> NativeResult<()> {
        self.status_call(self.fade_out)
    }

    unsafe fn push(&mut self, commands: &[*const NativeCommand], force: bool) -> NativeResult<()> {
        let count = i32::try_from(commands.len()).map_err(|_| StatusCode::FAILED)?;
        let mut code = 0;
        (self.push)(&mut code, commands.as_ptr(), count, i32::from(force));
        StatusCode(code).into_result()
    }

    fn voice_count(&mut self) -> NativeResult<i32> {
        self.index_query(self.voice_count)
    }

    fn default_voice(&mut self) -> NativeResult<i32> {
        self.index_query(self.default_voice)
    }

    fn set_default_voice(&mut self, index: i32) -> NativeResult<()> {
        let mut code = 0;
        // SAFETY: the status slot is a live local.
        unsafe { (self.set_default_voice)(&mut code, index) };
        StatusCode(code).into_result()
    }

    fn voice_string_len(&mut self, field: VoiceField, index: i32) -> NativeResult<i32> {
        let procs = self.strings[field_slot(field)];
        let mut code = 0;
        let mut len = 0;
        // SAFETY: both out-pointers are live locals.
        unsafe { (procs.length)(&mut code, index, &mut len) };
        StatusCode(code).into_result().map(|()| len)
    }

    fn voice_string(&mut self, field: VoiceField, index: i32, buf: &mut [u16]) -> NativeResult<()> {
        if buf.is_empty() {
            return Err(StatusCode::FAILED);
        }
        let procs = self.strings[field_slot(field)];
        let mut code = 0;
        // SAFETY: the caller sized `buf` from the reported length plus the
        // terminator.
        unsafe { (procs.fill)(&mut code, index, buf.as_mut_ptr()) };
        StatusCode(code).into_result()
    }

    fn voice_param(&mut self, param: VoiceParam, index: i32) -> NativeResult<u64> {
        let procs = self.params[param_slot(param)];
        let mut code = 0;
        let mut bits = 0u64;
        // SAFETY: both out-pointers are live locals.
        unsafe { (procs.get)(&mut code, index, &mut bits) };
        StatusCode(code).into_result().map(|()| bits)
    }

    fn set_voice_param(&mut self, param: VoiceParam, index: i32, bits: u64) -> NativeResult<()> {
        let procs = self.params[param_slot(param)];
        let mut code = 0;
        // SAFETY: the status slot is a live local.
        unsafe { (procs.set)(&mut code, index, bits) };
        StatusCode(code).into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_reported() {
        let result = DynamicEngine::load(Path::new("/nonexistent/libchorus-engine.so"), None, 0);
        assert!(matches!(result, Err(LoadError::Library { .. })));
    }

    #[test]
    fn log_path_is_null_terminated() {
        let units = encode_log_path(Some(Path::new("engine.log"))).unwrap();
        assert_eq!(units.last(), Some(&0));
        assert_eq!(units.len(), "engine.log".len() + 1);

        assert_eq!(encode_log_path(None).unwrap(), vec![0]);
    }
}
