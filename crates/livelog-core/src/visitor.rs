/// Decode a hex visitor ID into the raw bytes stored in `idvisitor` columns.
///
/// Returns `None` for empty input or anything that is not valid hex. Callers
/// treat `None` as "no visitor filter", never as an error.
pub fn decode_visitor_id(hex_id: &str) -> Option<Vec<u8>> {
    let trimmed = hex_id.trim();
    if trimmed.is_empty() {
        return None;
    }
    hex::decode(trimmed).ok()
}

/// Lowercase hex form of a stored visitor ID.
pub fn encode_visitor_id(raw: &[u8]) -> String {
    hex::encode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visitor_id_round_trips_to_lowercase() {
        for id in ["0123456789abcdef", "0123456789ABCDEF", "Ab12Cd34Ef56aB78"] {
            let raw = decode_visitor_id(id).expect("valid hex");
            assert_eq!(raw.len(), 8);
            assert_eq!(encode_visitor_id(&raw), id.to_lowercase());
        }
    }

    #[test]
    fn malformed_hex_is_none() {
        assert_eq!(decode_visitor_id(""), None);
        assert_eq!(decode_visitor_id("   "), None);
        assert_eq!(decode_visitor_id("abc"), None);
        assert_eq!(decode_visitor_id("zz12"), None);
    }
}
