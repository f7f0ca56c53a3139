//! Structural checks applied to a generated dork before it is shown or stored.

/// Literal the model returns for malicious, nonsensical or invalid requests.
pub const INVALID_SENTINEL: &str = "INVALID_DORK";

/// True iff `text` is longer than 3 UTF-16 code units and fits on one line.
pub fn is_valid(text: &str) -> bool {
    text.encode_utf16().count() > 3 && !text.contains('\n')
}

/// Sentinel check first, then [`is_valid`].
pub fn is_acceptable(text: &str) -> bool {
    text != INVALID_SENTINEL && is_valid(text)
}
