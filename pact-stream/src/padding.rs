#![forbid(unsafe_code)]

use crate::{Error, Result};

/// PKCS#7 block length for handshake transport payloads. Wire constant:
/// both sides must use exactly 248.
pub const PADDING_BLOCK_LEN: usize = 248;

/// Pad to the next multiple of [`PADDING_BLOCK_LEN`]; an aligned input
/// gains a full extra block, so the pad byte is always in `1..=248`.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let fill = PADDING_BLOCK_LEN - (data.len() % PADDING_BLOCK_LEN);
    let mut out = Vec::with_capacity(data.len() + fill);
    out.extend_from_slice(data);
    out.resize(data.len() + fill, fill as u8);
    out
}

/// Strict PKCS#7 removal: the final byte names the pad length, and every
/// pad byte must repeat it.
pub fn unpad(data: &[u8]) -> Result<Vec<u8>> {
    let &last = data.last().ok_or(Error::InvalidPadding)?;
    let fill = last as usize;
    if fill == 0 || fill > PADDING_BLOCK_LEN || fill > data.len() {
        return Err(Error::InvalidPadding);
    }
    if data[data.len() - fill..].iter().any(|&b| b != last) {
        return Err(Error::InvalidPadding);
    }
    Ok(data[..data.len() - fill].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pads_to_block_multiples() {
        assert_eq!(pad(b"").len(), PADDING_BLOCK_LEN);
        assert_eq!(pad(&[0u8; 247]).len(), PADDING_BLOCK_LEN);
        // Aligned input gains one full block.
        assert_eq!(pad(&[0u8; 248]).len(), 2 * PADDING_BLOCK_LEN);
        assert_eq!(pad(&[0u8; 300]).len(), 2 * PADDING_BLOCK_LEN);
    }

    #[test]
    fn rejects_corrupted_padding() {
        let mut padded = pad(b"hello");
        // Damage the first pad byte; the final length byte stays intact.
        padded[5] ^= 0x01;
        assert!(matches!(unpad(&padded), Err(Error::InvalidPadding)));
    }

    #[test]
    fn rejects_out_of_range_pad_byte() {
        let mut padded = pad(b"hello");
        let n = padded.len();
        padded[n - 1] = 0;
        assert!(unpad(&padded).is_err());
        padded[n - 1] = 249;
        assert!(unpad(&padded).is_err());
        assert!(unpad(&[]).is_err());
    }

    proptest! {
        #[test]
        fn roundtrip(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
            let padded = pad(&data);
            prop_assert_eq!(padded.len() % PADDING_BLOCK_LEN, 0);
            prop_assert_eq!(unpad(&padded)?, data);
        }
    }
}
