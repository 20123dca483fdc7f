//! Fixed-layout command record read by the native engine.

use std::ptr;

use chorus_protocol::CommandKind;

/// One queued command in the engine's calling convention.
///
/// The engine dispatches on `kind`; only the payload fields belonging to
/// that kind are populated, everything else is zero or null.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeCommand {
    pub kind: i16,
    pub sound_index: i16,
    /// IEEE-754 bits of the wait duration in seconds
    pub wait_bits: usize,
    pub text_ptr: *const u16,
    pub text_len: i32,
    pub ssml_ptr: *const u16,
    pub ssml_len: i32,
}

impl NativeCommand {
    /// Record with the given tag and every payload field cleared
    pub fn empty(kind: CommandKind) -> Self {
        Self {
            kind: kind.tag(),
            sound_index: 0,
            wait_bits: 0,
            text_ptr: ptr::null(),
            text_len: 0,
            ssml_ptr: ptr::null(),
            ssml_len: 0,
        }
    }

    pub fn command_kind(&self) -> Option<CommandKind> {
        CommandKind::from_tag(self.kind.into())
    }

    /// Wait duration stored in `wait_bits`, reinterpreted back to seconds
    pub fn wait_seconds(&self) -> f64 {
        f64::from_bits(self.wait_bits as u64)
    }
}

/// Read a null-terminated UTF-16 payload referenced by a record.
///
/// Returns `None` when the pointer is null, the length is negative, or the
/// unit after `len` is not the terminator.
///
/// # Safety
/// `ptr` must either be null or valid for reads of `len + 1` units.
pub unsafe fn read_utf16(ptr: *const u16, len: i32) -> Option<Vec<u16>> {
    if ptr.is_null() {
        return None;
    }
    let len = usize::try_from(len).ok()?;
    let units = std::slice::from_raw_parts(ptr, len + 1);
    if units[len] != 0 {
        return None;
    }
    Some(units[..len].to_vec())
}
