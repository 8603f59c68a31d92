use std::fmt::Write;

use rand::RngCore;

const SHARE_TOKEN_BYTES: usize = 32;

/// `<prefix>-<year>-<sequence>`, with the sequence zero-padded to at least four
/// digits. Past 9999 in one year the field widens (`-10000`) rather than
/// wrapping, so numbers stay unique and the counter never blocks a create.
pub fn format_quote_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}-{year}-{sequence:04}")
}

/// 32 random bytes rendered as 64 lowercase hex characters.
pub fn generate_share_token() -> String {
    let mut bytes = [0u8; SHARE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    bytes.iter().fold(String::with_capacity(SHARE_TOKEN_BYTES * 2), |mut token, byte| {
        let _ = write!(token, "{byte:02x}");
        token
    })
}

/// Short, log-safe prefix of a share token.
pub fn token_preview(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
