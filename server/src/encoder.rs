//! Command encoder: wire commands to native command records.
//!
//! Encoding happens in two stages:
//!
//! 1. `encode_batch` validates every command and transcodes text payloads.
//!    It touches no native state, so a rejected batch never reaches the
//!    engine.
//! 2. `CommandLayout` lays the encoded commands out as `NativeCommand`
//!    records in a single allocation and builds the table of record
//!    addresses the engine expects. The layout borrows the encoded commands,
//!    so their text buffers are guaranteed to outlive the push.

use std::marker::PhantomData;

use thiserror::Error;
use tracing::debug;

use chorus_protocol::{Command, CommandKind, CommandValue};

use crate::error::ApiError;
use crate::native::{NativeCommand, NativeEngine, NativeResult};

/// Transcoding failures for text payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeError {
    #[error("text contains a NUL character at UTF-16 offset {0}")]
    InteriorNul(usize),

    #[error("text is too long ({0} UTF-16 code units)")]
    TooLong(usize),
}

/// Null-terminated UTF-16 copy of a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utf16Text {
    units: Vec<u16>,
}

impl Utf16Text {
    pub fn encode(text: &str) -> Result<Self, TranscodeError> {
        let mut units: Vec<u16> = text.encode_utf16().collect();
        if let Some(offset) = units.iter().position(|&u| u == 0) {
            return Err(TranscodeError::InteriorNul(offset));
        }
        if i32::try_from(units.len()).is_err() {
            return Err(TranscodeError::TooLong(units.len()));
        }
        units.push(0);
        Ok(Self { units })
    }

    /// Length in code units, terminator excluded
    pub fn len(&self) -> i32 {
        // `encode` guarantees the length fits.
        (self.units.len() - 1) as i32
    }

    pub fn is_empty(&self) -> bool {
        self.units.len() == 1
    }

    /// Code units without the terminator
    pub fn units(&self) -> &[u16] {
        &self.units[..self.units.len() - 1]
    }

    /// Pointer to the first unit of the null-terminated buffer
    pub fn as_ptr(&self) -> *const u16 {
        self.units.as_ptr()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.units())
    }
}

/// Pack a wait duration into a pointer-sized slot by reinterpreting its
/// IEEE-754 bits.
pub fn wait_bits(seconds: f64) -> usize {
    seconds.to_bits() as usize
}

/// Inverse of [`wait_bits`].
pub fn wait_seconds(bits: usize) -> f64 {
    f64::from_bits(bits as u64)
}

/// A validated command, ready to be laid out as a native record
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedCommand {
    PlaySound(i16),
    Wait(f64),
    SpeakText(Utf16Text),
    SpeakSsml(Utf16Text),
}

impl EncodedCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            EncodedCommand::PlaySound(_) => CommandKind::PlaySound,
            EncodedCommand::Wait(_) => CommandKind::Wait,
            EncodedCommand::SpeakText(_) => CommandKind::SpeakText,
            EncodedCommand::SpeakSsml(_) => CommandKind::SpeakSsml,
        }
    }

    fn to_record(&self) -> NativeCommand {
        let mut record = NativeCommand::empty(self.kind());
        match self {
            EncodedCommand::PlaySound(index) => record.sound_index = *index,
            EncodedCommand::Wait(seconds) => record.wait_bits = wait_bits(*seconds),
            EncodedCommand::SpeakText(text) => {
                record.text_ptr = text.as_ptr();
                record.text_len = text.len();
            }
            EncodedCommand::SpeakSsml(ssml) => {
                record.ssml_ptr = ssml.as_ptr();
                record.ssml_len = ssml.len();
            }
        }
        record
    }
}

fn invalid(position: usize, reason: impl Into<String>) -> ApiError {
    ApiError::InvalidCommand {
        position,
        reason: reason.into(),
    }
}

fn expect_number(position: usize, kind: CommandKind, value: &CommandValue) -> Result<f64, ApiError> {
    value.as_f64().ok_or_else(|| {
        invalid(
            position,
            format!("{:?} expects a number, got {}", kind, value.type_name()),
        )
    })
}

fn expect_text(position: usize, kind: CommandKind, value: &CommandValue) -> Result<Utf16Text, ApiError> {
    let CommandValue::Text(text) = value else {
        return Err(invalid(
            position,
            format!("{:?} expects a string, got {}", kind, value.type_name()),
        ));
    };
    Utf16Text::encode(text).map_err(|e| ApiError::Encoding {
        position,
        reason: e.to_string(),
    })
}

/// Validate and encode the command at `position` of a batch.
pub fn encode_command(position: usize, command: &Command) -> Result<EncodedCommand, ApiError> {
    let kind = CommandKind::from_tag(command.kind)
        .ok_or_else(|| invalid(position, format!("unknown command type {}", command.kind)))?;

    let encoded = match kind {
        CommandKind::PlaySound => {
            let index = expect_number(position, kind, &command.value)?;
            if index.fract() != 0.0 || index < f64::from(i16::MIN) || index > f64::from(i16::MAX) {
                return Err(invalid(position, format!("sound index {} is not a 16-bit integer", index)));
            }
            EncodedCommand::PlaySound(index as i16)
        }
        CommandKind::Wait => {
            let seconds = expect_number(position, kind, &command.value)?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(invalid(position, format!("wait duration {} is not a non-negative number", seconds)));
            }
            EncodedCommand::Wait(seconds)
        }
        CommandKind::SpeakText => EncodedCommand::SpeakText(expect_text(position, kind, &command.value)?),
        CommandKind::SpeakSsml => EncodedCommand::SpeakSsml(expect_text(position, kind, &command.value)?),
    };
    Ok(encoded)
}

/// Validate and encode a whole batch. Fails on the first invalid command.
pub fn encode_batch(commands: &[Command]) -> Result<Vec<EncodedCommand>, ApiError> {
    commands
        .iter()
        .enumerate()
        .map(|(position, command)| encode_command(position, command))
        .collect()
}

/// Native records for a batch plus the table of their addresses.
///
/// Records live in one boxed slice allocated at its final size before any
/// address is taken, so the table stays valid for as long as the layout
/// exists, even if the layout value itself is moved.
pub struct CommandLayout<'a> {
    records: Box<[NativeCommand]>,
    table: Vec<*const NativeCommand>,
    _buffers: PhantomData<&'a [EncodedCommand]>,
}

impl<'a> CommandLayout<'a> {
    pub fn new(commands: &'a [EncodedCommand]) -> Self {
        let records: Box<[NativeCommand]> = commands.iter().map(EncodedCommand::to_record).collect();
        let table = records.iter().map(|record| record as *const NativeCommand).collect();
        Self {
            records,
            table,
            _buffers: PhantomData,
        }
    }

    pub fn records(&self) -> &[NativeCommand] {
        &self.records
    }

    /// Addresses of the records, in batch order
    pub fn table(&self) -> &[*const NativeCommand] {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand the batch to the engine.
    pub fn push(&self, engine: &mut dyn NativeEngine, force: bool) -> NativeResult<()> {
        // SAFETY: every table entry points into `self.records`, which is not
        // touched while `self` is borrowed; text pointers reference buffers
        // owned by the encoded commands, borrowed for `'a`.
        unsafe { engine.push(&self.table, force) }
    }
}

/// Push an encoded batch to the engine.
///
/// An empty batch is a no-op and makes no native call. The records and the
/// text buffers are released only after the engine returns.
pub fn submit(engine: &mut dyn NativeEngine, commands: &[EncodedCommand], force: bool) -> Result<(), ApiError> {
    if commands.is_empty() {
        debug!("Empty command batch, nothing to push");
        return Ok(());
    }

    let layout = CommandLayout::new(commands);
    layout
        .push(engine, force)
        .map_err(|code| ApiError::native("Push", code))?;
    debug!(count = layout.len(), force, "Pushed command batch");
    Ok(())
}
