/// Low-level byte helpers shared by the HCI decoder and the beacon extractor
use crate::error::{DecodeError, DecodeResult};

const ADDRESS_LEN: usize = 6;

/// Decode the first two bytes as a little-endian `u16`.
pub fn decode_le16(bytes: &[u8]) -> DecodeResult<u16> {
    match bytes {
        [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
        _ => Err(DecodeError::TruncatedInput {
            needed: 2,
            available: bytes.len(),
        }),
    }
}

/// Render a packed Bluetooth device address (wire order, least significant
/// byte first) as `aa:bb:cc:dd:ee:ff`.
pub fn decode_address(bytes: &[u8]) -> DecodeResult<String> {
    if bytes.len() != ADDRESS_LEN {
        return Err(DecodeError::InvalidLength(bytes.len()));
    }

    let groups: Vec<String> = bytes.iter().rev().map(|b| format!("{:02x}", b)).collect();
    Ok(groups.join(":"))
}

/// Pack an `aa:bb:cc:dd:ee:ff` address into wire order.
///
/// Only the form `decode_address` produces is accepted: six groups of exactly
/// two lowercase hex digits. Uppercase digits are `InvalidFormat`.
pub fn encode_address(address: &str) -> DecodeResult<[u8; ADDRESS_LEN]> {
    let invalid = || DecodeError::InvalidFormat(address.to_string());

    let groups: Vec<&str> = address.split(':').collect();
    if groups.len() != ADDRESS_LEN {
        return Err(invalid());
    }

    let mut packed = [0u8; ADDRESS_LEN];
    for (slot, group) in packed.iter_mut().zip(groups.iter().rev()) {
        if group.len() != 2 || !group.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(invalid());
        }
        *slot = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
    }

    Ok(packed)
}

/// Lowercase hex, two characters per byte, no separators.
pub fn to_hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Weighted byte sum used for beacon fields: the first byte counts 256,
/// every later byte counts 1. For a two-byte span this is big-endian.
pub fn to_uint(bytes: &[u8]) -> u32 {
    let mut multiple = 256;
    let mut value = 0u32;
    for b in bytes {
        value += u32::from(*b) * multiple;
        multiple = 1;
    }
    value
}
