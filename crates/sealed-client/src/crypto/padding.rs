//! Block padding schemes for the non-authenticated AES modes.
//!
//! Padding is applied to the plaintext before any of CBC/CFB/OFB/CTR runs, so
//! stream-style modes carry padded ciphertext too. Zero padding adds nothing to
//! input that is already block-aligned.
//!
//! The schemes live here rather than in `cipher::block_padding`: that crate
//! pads inside the block-mode encryptors, while CFB, OFB and CTR here encrypt
//! the padded buffer as a stream and must see the same bytes. Keeping one
//! implementation for every mode keeps the padded length identical across
//! modes. The block modes then run with `block_padding::NoPadding` over the
//! pre-padded buffer.

use rand::{rngs::OsRng, RngCore};

use super::error::CryptoError;
use super::suite::PaddingScheme;

/// AES block length in bytes.
pub const BLOCK_LEN: usize = 16;

/// ISO/IEC 9797-1 method 2 marker byte.
const ISO_MARKER: u8 = 0x80;

/// Append `scheme`'s padding to `data` in place.
pub fn pad(scheme: PaddingScheme, data: &mut Vec<u8>) {
    let fill = BLOCK_LEN - data.len() % BLOCK_LEN;
    match scheme {
        PaddingScheme::NoPadding => {}
        PaddingScheme::Pkcs7 => data.resize(data.len() + fill, fill as u8),
        PaddingScheme::AnsiX923 => {
            data.resize(data.len() + fill - 1, 0);
            data.push(fill as u8);
        }
        PaddingScheme::Iso10126 => {
            let start = data.len();
            data.resize(start + fill - 1, 0);
            OsRng.fill_bytes(&mut data[start..]);
            data.push(fill as u8);
        }
        PaddingScheme::Iso97971 => {
            data.push(ISO_MARKER);
            zero_fill(data);
        }
        PaddingScheme::ZeroPadding => zero_fill(data),
    }
}

/// Strip `scheme`'s padding from decrypted `data`.
///
/// # Errors
///
/// Returns [`CryptoError::PaddingError`] if the trailing bytes are not a valid
/// padding of the given scheme.
pub fn unpad(scheme: PaddingScheme, data: &[u8]) -> Result<&[u8], CryptoError> {
    match scheme {
        PaddingScheme::NoPadding => Ok(data),
        PaddingScheme::ZeroPadding => Ok(strip_zeros(data)),
        PaddingScheme::Pkcs7 => {
            let (body, padding) = split_counted(data)?;
            if padding.iter().any(|&b| b as usize != padding.len()) {
                return Err(CryptoError::PaddingError("inconsistent PKCS7 padding bytes"));
            }
            Ok(body)
        }
        PaddingScheme::AnsiX923 => {
            let (body, padding) = split_counted(data)?;
            if padding[..padding.len() - 1].iter().any(|&b| b != 0) {
                return Err(CryptoError::PaddingError("non-zero ANSI X.923 filler"));
            }
            Ok(body)
        }
        PaddingScheme::Iso10126 => split_counted(data).map(|(body, _)| body),
        PaddingScheme::Iso97971 => match strip_zeros(data).split_last() {
            Some((&ISO_MARKER, body)) => Ok(body),
            _ => Err(CryptoError::PaddingError("missing ISO/IEC 9797-1 marker")),
        },
    }
}

fn zero_fill(data: &mut Vec<u8>) {
    let rem = data.len() % BLOCK_LEN;
    if rem != 0 {
        data.resize(data.len() + BLOCK_LEN - rem, 0);
    }
}

fn strip_zeros(data: &[u8]) -> &[u8] {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &data[..end]
}

/// Split off a padding whose length is given by the final byte.
fn split_counted(data: &[u8]) -> Result<(&[u8], &[u8]), CryptoError> {
    let count = *data
        .last()
        .ok_or(CryptoError::PaddingError("empty input"))? as usize;
    if count == 0 || count > BLOCK_LEN || count > data.len() {
        return Err(CryptoError::PaddingError("padding length out of range"));
    }
    Ok(data.split_at(data.len() - count))
}
