//! Content digests used for fingerprinting

/// MD5 hex digest of raw bytes, as used for favicon indicators
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Compare a computed digest against a configured one (hex case-insensitive)
pub fn digest_matches(computed: &str, expected: &str) -> bool {
    computed.eq_ignore_ascii_case(expected.trim())
}
