//! Wire text conventions.
//!
//! The wire format is UTF-8 text that is NUL-terminated or buffer-exhausted:
//! each read decodes whatever one OS-level receive returned, up to the first
//! NUL byte. There is no length prefix and no reassembly across reads.

/// Decode a receive window as UTF-8 text, truncating at the first NUL byte.
///
/// Invalid UTF-8 is replaced rather than rejected, so this never fails. A
/// window that starts with NUL (or is empty) decodes to the empty string.
pub fn decode_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
