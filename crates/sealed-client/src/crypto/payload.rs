//! AES sealing and opening of request/response bodies.
//!
//! GCM uses a 12-byte random IV, no padding, and a detached 16-byte tag. The
//! other modes use a 16-byte random IV and pad the plaintext with the
//! configured scheme before the mode runs.

use aes::cipher::{
    block_padding::NoPadding, AsyncStreamCipher, BlockDecryptMut, BlockEncryptMut, InvalidLength,
    KeyIvInit, StreamCipher,
};
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::{consts::U12, generic_array::GenericArray, AeadInPlace, KeyInit};
use aes_gcm::AesGcm;
use rand::{rngs::OsRng, RngCore};

use super::error::CryptoError;
use super::frame::CipherFrame;
use super::keys::SymmetricKey;
use super::padding::{self, BLOCK_LEN};
use super::suite::{CipherConfiguration, KeySize, SymmetricMode};

/// IV length for GCM (96 bits).
pub const GCM_IV_LEN: usize = 12;

/// IV length for CBC/CFB/OFB/CTR (one AES block).
pub const BLOCK_IV_LEN: usize = 16;

/// GCM tag length (128 bits).
pub const GCM_TAG_LEN: usize = 16;

/// Bind `$aes` to the AES variant matching `$size` and evaluate `$body`.
macro_rules! with_aes {
    ($size:expr, |$aes:ident| $body:expr) => {
        match $size {
            KeySize::Aes128 => {
                type $aes = Aes128;
                $body
            }
            KeySize::Aes192 => {
                type $aes = Aes192;
                $body
            }
            KeySize::Aes256 => {
                type $aes = Aes256;
                $body
            }
        }
    };
}

/// Seal `plaintext` under `key` with a fresh random IV.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyLength`] if `key` does not match the
/// configured size, and [`CryptoError::PaddingError`] for CBC without padding
/// on input that is not block-aligned.
pub fn encrypt(
    config: &CipherConfiguration,
    key: &SymmetricKey,
    plaintext: &[u8],
) -> Result<CipherFrame, CryptoError> {
    check_key(config, key)?;

    if config.mode.is_authenticated() {
        let mut iv = [0u8; GCM_IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let mut buffer = plaintext.to_vec();
        let tag = with_aes!(config.key_size, |Aes| {
            AesGcm::<Aes, U12>::new_from_slice(key.as_bytes())
                .map_err(|_| key_length_error(config, key))?
                .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
                .map_err(|_| CryptoError::AuthenticationFailure)?
        });
        return Ok(CipherFrame {
            ciphertext: buffer,
            iv: iv.to_vec(),
            tag: Some(tag.to_vec()),
        });
    }

    let mut iv = [0u8; BLOCK_IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let mut data = plaintext.to_vec();
    padding::pad(config.padding, &mut data);
    encrypt_block_mode(config, key, &iv, &mut data)?;

    Ok(CipherFrame {
        ciphertext: data,
        iv: iv.to_vec(),
        tag: None,
    })
}

/// Open `frame` under `key`.
///
/// # Errors
///
/// - [`CryptoError::AuthenticationFailure`] if the GCM tag does not verify.
/// - [`CryptoError::PaddingError`] if the decrypted data carries malformed padding.
/// - [`CryptoError::MalformedFrame`] for a wrong IV/tag length, a missing GCM
///   tag, or CBC ciphertext that is not block-aligned.
/// - [`CryptoError::InvalidKeyLength`] if `key` does not match the configured size.
pub fn decrypt(
    config: &CipherConfiguration,
    key: &SymmetricKey,
    frame: &CipherFrame,
) -> Result<Vec<u8>, CryptoError> {
    check_key(config, key)?;

    if config.mode.is_authenticated() {
        expect_len("iv", &frame.iv, GCM_IV_LEN)?;
        let tag = frame
            .tag
            .as_deref()
            .ok_or_else(|| CryptoError::MalformedFrame("missing authentication tag".into()))?;
        if tag.len() != GCM_TAG_LEN {
            return Err(CryptoError::AuthenticationFailure);
        }
        let mut buffer = frame.ciphertext.clone();
        with_aes!(config.key_size, |Aes| {
            AesGcm::<Aes, U12>::new_from_slice(key.as_bytes())
                .map_err(|_| key_length_error(config, key))?
                .decrypt_in_place_detached(
                    GenericArray::from_slice(&frame.iv),
                    b"",
                    &mut buffer,
                    GenericArray::from_slice(tag),
                )
                .map_err(|_| CryptoError::AuthenticationFailure)?
        });
        return Ok(buffer);
    }

    expect_len("iv", &frame.iv, BLOCK_IV_LEN)?;
    let mut data = frame.ciphertext.clone();
    decrypt_block_mode(config, key, &frame.iv, &mut data)?;
    let len = padding::unpad(config.padding, &data)?.len();
    data.truncate(len);
    Ok(data)
}

fn encrypt_block_mode(
    config: &CipherConfiguration,
    key: &SymmetricKey,
    iv: &[u8],
    data: &mut Vec<u8>,
) -> Result<(), CryptoError> {
    let key_bytes = key.as_bytes();
    let bad_key = |_: InvalidLength| key_length_error(config, key);

    match config.mode {
        SymmetricMode::Cbc => {
            if data.len() % BLOCK_LEN != 0 {
                return Err(CryptoError::PaddingError(
                    "CBC plaintext is not block-aligned and no padding is configured",
                ));
            }
            with_aes!(config.key_size, |Aes| {
                let cipher = cbc::Encryptor::<Aes>::new_from_slices(key_bytes, iv).map_err(bad_key)?;
                *data = cipher.encrypt_padded_vec_mut::<NoPadding>(&data[..]);
            });
        }
        SymmetricMode::Cfb => with_aes!(config.key_size, |Aes| {
            cfb_mode::Encryptor::<Aes>::new_from_slices(key_bytes, iv)
                .map_err(bad_key)?
                .encrypt(data);
        }),
        SymmetricMode::Ofb => with_aes!(config.key_size, |Aes| {
            ofb::Ofb::<Aes>::new_from_slices(key_bytes, iv)
                .map_err(bad_key)?
                .apply_keystream(data);
        }),
        SymmetricMode::Ctr => with_aes!(config.key_size, |Aes| {
            ctr::Ctr128BE::<Aes>::new_from_slices(key_bytes, iv)
                .map_err(bad_key)?
                .apply_keystream(data);
        }),
        SymmetricMode::Gcm => unreachable!("GCM is sealed by the authenticated path"),
    }
    Ok(())
}

fn decrypt_block_mode(
    config: &CipherConfiguration,
    key: &SymmetricKey,
    iv: &[u8],
    data: &mut Vec<u8>,
) -> Result<(), CryptoError> {
    let key_bytes = key.as_bytes();
    let bad_key = |_: InvalidLength| key_length_error(config, key);

    match config.mode {
        SymmetricMode::Cbc => {
            if data.len() % BLOCK_LEN != 0 {
                return Err(CryptoError::MalformedFrame(
                    "CBC ciphertext is not block-aligned".into(),
                ));
            }
            with_aes!(config.key_size, |Aes| {
                let cipher = cbc::Decryptor::<Aes>::new_from_slices(key_bytes, iv).map_err(bad_key)?;
                *data = cipher
                    .decrypt_padded_vec_mut::<NoPadding>(&data[..])
                    .map_err(|_| CryptoError::MalformedFrame("CBC ciphertext rejected".into()))?;
            });
        }
        SymmetricMode::Cfb => with_aes!(config.key_size, |Aes| {
            cfb_mode::Decryptor::<Aes>::new_from_slices(key_bytes, iv)
                .map_err(bad_key)?
                .decrypt(data);
        }),
        SymmetricMode::Ofb => with_aes!(config.key_size, |Aes| {
            ofb::Ofb::<Aes>::new_from_slices(key_bytes, iv)
                .map_err(bad_key)?
                .apply_keystream(data);
        }),
        SymmetricMode::Ctr => with_aes!(config.key_size, |Aes| {
            ctr::Ctr128BE::<Aes>::new_from_slices(key_bytes, iv)
                .map_err(bad_key)?
                .apply_keystream(data);
        }),
        SymmetricMode::Gcm => unreachable!("GCM is opened by the authenticated path"),
    }
    Ok(())
}

fn check_key(config: &CipherConfiguration, key: &SymmetricKey) -> Result<(), CryptoError> {
    if key.len() != config.key_size.bytes() {
        return Err(key_length_error(config, key));
    }
    Ok(())
}

fn key_length_error(config: &CipherConfiguration, key: &SymmetricKey) -> CryptoError {
    CryptoError::InvalidKeyLength {
        expected: config.key_size.bytes(),
        got: key.len(),
    }
}

fn expect_len(what: &str, bytes: &[u8], expected: usize) -> Result<(), CryptoError> {
    if bytes.len() != expected {
        return Err(CryptoError::MalformedFrame(format!(
            "{what} must be {expected} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::suite::{PaddingScheme, VersionToken};

    fn config(token: &str) -> CipherConfiguration {
        VersionToken::new(token).resolve().unwrap()
    }

    fn key_from_hex(config: &CipherConfiguration, hex_key: &str) -> SymmetricKey {
        SymmetricKey::from_bytes(hex::decode(hex_key).unwrap(), config.key_size).unwrap()
    }

    fn nist_frame(ct: &str, iv: &str) -> CipherFrame {
        CipherFrame {
            ciphertext: hex::decode(ct).unwrap(),
            iv: hex::decode(iv).unwrap(),
            tag: None,
        }
    }

    const NIST_KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const NIST_PLAINTEXT: &str = "6bc1bee22e409f96e93d7e117393172a";
    const NIST_IV: &str = "000102030405060708090a0b0c0d0e0f";

    #[test]
    fn reference_token_round_trips_json() {
        let cfg = config("epsilon.alpha.tau.omega.sigma");
        let key = SymmetricKey::generate(&cfg);
        let frame = encrypt(&cfg, &key, br#"{"a":1}"#).unwrap();
        assert_eq!(frame.iv.len(), GCM_IV_LEN);
        assert_eq!(frame.tag.as_ref().map(Vec::len), Some(GCM_TAG_LEN));
        assert_eq!(decrypt(&cfg, &key, &frame).unwrap(), br#"{"a":1}"#);
    }

    #[test]
    fn every_configuration_round_trips() {
        let plaintexts: [&[u8]; 4] = [
            b"{}",
            br#"{"a":1}"#,
            br#"{"applicant":{"name":"Ada Lovelace","dob":"1815-12-10","income":1250000}}"#,
            b"[1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29]",
        ];
        for &mode in SymmetricMode::ALL {
            for &padding in PaddingScheme::ALL {
                for &key_size in KeySize::ALL {
                    let cfg = CipherConfiguration {
                        key_size,
                        mode,
                        padding,
                        asymmetric_padding: None,
                        digest: None,
                    };
                    let key = SymmetricKey::generate(&cfg);
                    for pt in plaintexts {
                        let unaligned_cbc = mode == SymmetricMode::Cbc
                            && padding == PaddingScheme::NoPadding
                            && pt.len() % BLOCK_LEN != 0;
                        let sealed = encrypt(&cfg, &key, pt);
                        if unaligned_cbc {
                            assert!(matches!(sealed, Err(CryptoError::PaddingError(_))));
                            continue;
                        }
                        let frame = sealed.unwrap();
                        assert_eq!(
                            decrypt(&cfg, &key, &frame).unwrap(),
                            pt,
                            "{}",
                            cfg.to_token()
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn gcm_detects_every_flipped_bit() {
        let cfg = config("epsilon.alpha.psi");
        let key = SymmetricKey::generate(&cfg);
        let frame = encrypt(&cfg, &key, br#"{"a":1}"#).unwrap();

        for i in 0..frame.ciphertext.len() * 8 {
            let mut tampered = frame.clone();
            tampered.ciphertext[i / 8] ^= 1 << (i % 8);
            assert!(matches!(
                decrypt(&cfg, &key, &tampered),
                Err(CryptoError::AuthenticationFailure)
            ));
        }
        for i in 0..GCM_TAG_LEN * 8 {
            let mut tampered = frame.clone();
            if let Some(tag) = tampered.tag.as_mut() {
                tag[i / 8] ^= 1 << (i % 8);
            }
            assert!(matches!(
                decrypt(&cfg, &key, &tampered),
                Err(CryptoError::AuthenticationFailure)
            ));
        }
    }

    #[test]
    fn gcm_wrong_key_fails_auth() {
        let cfg = config("epsilon.alpha.phi");
        let frame = encrypt(&cfg, &SymmetricKey::generate(&cfg), b"secret").unwrap();
        assert!(matches!(
            decrypt(&cfg, &SymmetricKey::generate(&cfg), &frame),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn gcm_missing_tag_is_malformed() {
        let cfg = config("epsilon.beta.tau");
        let key = SymmetricKey::generate(&cfg);
        let mut frame = encrypt(&cfg, &key, b"x").unwrap();
        frame.tag = None;
        assert!(matches!(
            decrypt(&cfg, &key, &frame),
            Err(CryptoError::MalformedFrame(_))
        ));
    }

    #[test]
    fn gcm_known_answer() {
        let cfg = config("epsilon.beta.tau");
        let key = key_from_hex(&cfg, "00000000000000000000000000000000");
        let frame = CipherFrame {
            ciphertext: hex::decode("0388dace60b6a392f328c2b971b2fe78").unwrap(),
            iv: vec![0u8; GCM_IV_LEN],
            tag: Some(hex::decode("ab6e47d42cec13bdf53a67b21257bddf").unwrap()),
        };
        assert_eq!(decrypt(&cfg, &key, &frame).unwrap(), vec![0u8; 16]);
    }

    #[test]
    fn cbc_known_answer() {
        let cfg = config("alpha.beta.tau");
        let key = key_from_hex(&cfg, NIST_KEY);
        let frame = nist_frame("7649abac8119b246cee98e9b12e9197d", NIST_IV);
        assert_eq!(
            decrypt(&cfg, &key, &frame).unwrap(),
            hex::decode(NIST_PLAINTEXT).unwrap()
        );
    }

    #[test]
    fn cfb_and_ofb_known_answer() {
        for token in ["beta.beta.tau", "gamma.beta.tau"] {
            let cfg = config(token);
            let key = key_from_hex(&cfg, NIST_KEY);
            let frame = nist_frame("3b3fd92eb72dad20333449f8e83cfb4a", NIST_IV);
            assert_eq!(
                decrypt(&cfg, &key, &frame).unwrap(),
                hex::decode(NIST_PLAINTEXT).unwrap(),
                "{token}"
            );
        }
    }

    #[test]
    fn ctr_known_answer() {
        let cfg = config("delta.beta.tau");
        let key = key_from_hex(&cfg, NIST_KEY);
        let frame = nist_frame(
            "874d6191b620e3261bef6864990db6ce",
            "f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff",
        );
        assert_eq!(
            decrypt(&cfg, &key, &frame).unwrap(),
            hex::decode(NIST_PLAINTEXT).unwrap()
        );
    }

    #[test]
    fn stream_modes_carry_padding() {
        let cfg = config("delta.alpha.tau");
        let key = SymmetricKey::generate(&cfg);
        let frame = encrypt(&cfg, &key, b"abc").unwrap();
        assert_eq!(frame.ciphertext.len(), BLOCK_LEN);
        assert_eq!(frame.iv.len(), BLOCK_IV_LEN);
        assert_eq!(frame.tag, None);
    }

    #[test]
    fn cbc_wrong_key_is_padding_error() {
        let cfg = config("alpha.alpha.psi");
        let frame = encrypt(&cfg, &SymmetricKey::generate(&cfg), &[b'x'; 40]).unwrap();
        // A wrong key yields random-looking plaintext; PKCS7 rejects it except
        // for the ~1/256 chance the last byte happens to be 0x01.
        let failures = (0..8)
            .filter(|_| decrypt(&cfg, &SymmetricKey::generate(&cfg), &frame).is_err())
            .count();
        assert!(failures >= 6);
    }

    #[test]
    fn cbc_misaligned_ciphertext_is_malformed() {
        let cfg = config("alpha.alpha.tau");
        let key = SymmetricKey::generate(&cfg);
        let mut frame = encrypt(&cfg, &key, b"hello").unwrap();
        frame.ciphertext.pop();
        assert!(matches!(
            decrypt(&cfg, &key, &frame),
            Err(CryptoError::MalformedFrame(_))
        ));
    }

    #[test]
    fn wrong_iv_length_is_malformed() {
        let cfg = config("gamma.alpha.tau");
        let key = SymmetricKey::generate(&cfg);
        let mut frame = encrypt(&cfg, &key, b"hello").unwrap();
        frame.iv.truncate(12);
        assert!(matches!(
            decrypt(&cfg, &key, &frame),
            Err(CryptoError::MalformedFrame(_))
        ));
    }

    #[test]
    fn key_size_mismatch_rejected() {
        let cfg = config("epsilon.alpha.psi");
        let short = SymmetricKey::generate(&config("epsilon.alpha.tau"));
        assert!(matches!(
            encrypt(&cfg, &short, b"x"),
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                got: 16
            })
        ));
    }

    #[test]
    fn ivs_are_fresh_per_call() {
        let cfg = config("epsilon.alpha.tau");
        let key = SymmetricKey::generate(&cfg);
        let a = encrypt(&cfg, &key, b"same").unwrap();
        let b = encrypt(&cfg, &key, b"same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
