use thiserror::Error;

/// Failure raised when no grammar rule matches the remaining input.
///
/// This is an internal-invariant violation, not a malformed-input error: the
/// rule tables are total over printable text, so hitting it means the grammar
/// itself is broken. Recursive lexing never catches it; only the top-level
/// `compile` call applies the silent fallback.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum CompileError {
    #[error("no grammar rule matched at offset {offset} (byte 0x{byte:02x})")]
    StructuralLex { offset: usize, byte: u8 },
}
