//! Unsigned varints: 7 payload bits per byte, least-significant group first,
//! high bit set on every byte except the last.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Number of bytes `encode(n)` produces.
pub fn encoded_len(n: u64) -> usize {
    let bits = 64 - n.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Append the encoding of `n` to `dst`.
pub fn encode_into(mut n: u64, dst: &mut impl BufMut) {
    loop {
        let mut byte = (n & 0x7F) as u8;
        n >>= 7;
        if n > 0 {
            byte |= 0x80;
        }
        dst.put_u8(byte);
        if n == 0 {
            break;
        }
    }
}

/// Encode `n` into a fresh buffer.
pub fn encode(n: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(n));
    encode_into(n, &mut buf);
    buf.freeze()
}

/// Decode a varint from the front of `bytes`, returning the value and the
/// unconsumed remainder.
///
/// Input that ends before a terminating byte is `IncompleteNumber`, however
/// long it is. A terminated value wider than 64 bits is `NumberOverflow`.
pub fn decode(bytes: &[u8]) -> Result<(u64, &[u8])> {
    let mut n: u64 = 0;
    let mut overflow = false;
    for (i, &byte) in bytes.iter().enumerate() {
        let shift = 7 * i as u64;
        let group = u64::from(byte & 0x7F);
        if shift >= 64 || (shift == 63 && group > 1) {
            overflow = true;
        } else {
            n |= group << shift;
        }
        if byte & 0x80 == 0 {
            if overflow {
                return Err(FrameError::NumberOverflow);
            }
            return Ok((n, &bytes[i + 1..]));
        }
    }
    Err(FrameError::IncompleteNumber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_a_single_zero_byte() {
        assert_eq!(encode(0).as_ref(), &[0x00]);
        assert_eq!(decode(&[0x00]).unwrap(), (0, &[][..]));
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode(1).as_ref(), &[0x01]);
        assert_eq!(encode(127).as_ref(), &[0x7F]);
        assert_eq!(encode(128).as_ref(), &[0x80, 0x01]);
        assert_eq!(encode(300).as_ref(), &[0xAC, 0x02]);
        assert_eq!(encode(16_384).as_ref(), &[0x80, 0x80, 0x01]);
    }

    #[test]
    fn values_survive_encode_then_decode() {
        let samples = [
            0u64,
            1,
            7,
            127,
            128,
            255,
            16_383,
            16_384,
            u32::MAX as u64,
            u32::MAX as u64 + 1,
            u64::MAX - 1,
            u64::MAX,
        ];
        for n in samples {
            let wire = encode(n);
            assert_eq!(wire.len(), encoded_len(n), "length for {n}");
            let (decoded, rest) = decode(&wire).unwrap();
            assert_eq!(decoded, n);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn u64_max_uses_ten_bytes() {
        assert_eq!(encode(u64::MAX).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn decode_returns_remainder() {
        let (n, rest) = decode(&[0x07, b'h', b'i']).unwrap();
        assert_eq!(n, 7);
        assert_eq!(rest, b"hi");
    }

    #[test]
    fn trailing_continuation_bit_is_incomplete() {
        assert_eq!(decode(&[0x80]), Err(FrameError::IncompleteNumber));
        assert_eq!(decode(&[0xFF, 0xFF]), Err(FrameError::IncompleteNumber));
    }

    #[test]
    fn empty_input_is_incomplete() {
        assert_eq!(decode(&[]), Err(FrameError::IncompleteNumber));
    }

    #[test]
    fn terminated_wide_value_overflows() {
        let mut wire = vec![0xFF; 9];
        wire.push(0x02);
        assert_eq!(decode(&wire), Err(FrameError::NumberOverflow));

        let mut eleven = vec![0x80; 10];
        eleven.push(0x01);
        assert_eq!(decode(&eleven), Err(FrameError::NumberOverflow));
    }

    #[test]
    fn long_unterminated_input_is_incomplete() {
        assert_eq!(decode(&[0x80; 11]), Err(FrameError::IncompleteNumber));
        assert_eq!(decode(&[0xFF; 32]), Err(FrameError::IncompleteNumber));
    }

    #[test]
    fn encode_into_appends() {
        let mut buf = BytesMut::from(&b"x"[..]);
        encode_into(300, &mut buf);
        assert_eq!(buf.as_ref(), &[b'x', 0xAC, 0x02]);
    }
}
