//! Hex and address formatting helpers

use crate::error::{DispatchError, DispatchResult};

use ethers::types::Address;

/// Returns true for an even-length string made only of hex digits
pub fn is_hex(s: &str) -> bool {
    s.len() % 2 == 0 && s.bytes().all(|c| c.is_ascii_hexdigit())
}

/// Parse a 20-byte hex address, with or without the 0x prefix
pub fn parse_address(s: &str) -> DispatchResult<Address> {
    let raw = strip_prefix(s.trim());
    if raw.len() != 40 || !is_hex(raw) {
        return Err(DispatchError::InvalidOptions(format!(
            "{:?} is not a hex address",
            s
        )));
    }

    let bytes = hex::decode(raw)
        .map_err(|e| DispatchError::InvalidOptions(format!("invalid address {:?}: {}", s, e)))?;
    Ok(Address::from_slice(&bytes))
}

/// Left-pad `bytes` with zeros up to `size`. Longer input is returned as is.
pub fn pad(bytes: &[u8], size: usize) -> Vec<u8> {
    if bytes.len() >= size {
        return bytes.to_vec();
    }
    let mut out = vec![0u8; size];
    out[size - bytes.len()..].copy_from_slice(bytes);
    out
}

/// Lowercase 32-byte hex word for an address, without the 0x prefix
pub fn address_to_bytes32(address: &str) -> DispatchResult<String> {
    let parsed = parse_address(address)?;
    Ok(hex::encode(pad(parsed.as_bytes(), 32)))
}

fn strip_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_hex() {
        assert!(is_hex(""));
        assert!(is_hex("deadBEEF"));
        assert!(!is_hex("abc"));
        assert!(!is_hex("zz"));
    }

    #[test]
    fn test_parse_address() {
        let addr = parse_address("0x00000000000000000000000000000000000000aA").unwrap();
        assert_eq!(addr, Address::from_low_u64_be(0xaa));
        assert_eq!(
            parse_address("00000000000000000000000000000000000000aa").unwrap(),
            addr
        );
        assert!(parse_address("").is_err());
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xg000000000000000000000000000000000000000").is_err());
    }

    #[test]
    fn test_pad() {
        assert_eq!(pad(&[1, 2], 4), vec![0, 0, 1, 2]);
        assert_eq!(pad(&[1, 2, 3], 2), vec![1, 2, 3]);
    }

    #[test]
    fn test_address_to_bytes32() {
        let word = address_to_bytes32("0xAbCdEf0000000000000000000000000000000001").unwrap();
        assert_eq!(word.len(), 64);
        assert_eq!(
            word,
            "000000000000000000000000abcdef0000000000000000000000000000000001"
        );
        assert!(address_to_bytes32("not an address").is_err());
    }
}
