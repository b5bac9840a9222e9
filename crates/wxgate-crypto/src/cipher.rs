//! AES-256-CBC over the platform's message frame.
//!
//! Frame layout: `random(16) | u32 big-endian message length | message | app id`,
//! PKCS#7 padded to the AES block size. The IV is the first 16 bytes of the key.

use std::fmt;

use aes::Aes256;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD, STANDARD};
use base64::Engine as _;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use tracing::debug;
use wxgate_core::error::{GatewayError, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const ENCODING_AES_KEY_LEN: usize = 43;
pub const PREFIX_LEN: usize = 16;
const HEADER_LEN: usize = PREFIX_LEN + 4;
const BLOCK_LEN: usize = 16;

// Platform-issued keys are 43 random characters, so the final symbol often
// carries non-zero trailing bits.
const KEY_ENGINE: GeneralPurpose =
    GeneralPurpose::new(&alphabet::STANDARD, PAD.with_decode_allow_trailing_bits(true));

/// 256-bit key decoded from the configured `encoding_aes_key`.
#[derive(Clone, PartialEq, Eq)]
pub struct AesKey([u8; 32]);

impl AesKey {
    /// Decode a 43-character `encoding_aes_key` (base64 without its trailing `=`).
    pub fn from_encoding_aes_key(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        if encoded.len() != ENCODING_AES_KEY_LEN {
            return Err(GatewayError::Config(format!(
                "encoding_aes_key must be {ENCODING_AES_KEY_LEN} characters, got {}",
                encoded.len()
            )));
        }
        let decoded = KEY_ENGINE.decode(format!("{encoded}=")).map_err(|e| {
            GatewayError::Config(format!("encoding_aes_key is not valid base64: {e}"))
        })?;
        let bytes: [u8; 32] = decoded.try_into().map_err(|v: Vec<u8>| {
            GatewayError::Config(format!(
                "encoding_aes_key decodes to {} bytes, expected 32",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn iv(&self) -> &[u8] {
        &self.0[..BLOCK_LEN]
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(..)")
    }
}

/// Frame and encrypt `message` for `app_id` behind a fresh random prefix.
pub fn encrypt_frame(message: &[u8], app_id: &str, key: &AesKey) -> Vec<u8> {
    let mut prefix = [0u8; PREFIX_LEN];
    rand::thread_rng().fill_bytes(&mut prefix);
    encrypt_frame_with_prefix(prefix, message, app_id, key)
}

pub fn encrypt_frame_with_prefix(
    prefix: [u8; PREFIX_LEN],
    message: &[u8],
    app_id: &str,
    key: &AesKey,
) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + message.len() + app_id.len() + BLOCK_LEN);
    frame.extend_from_slice(&prefix);
    frame.extend_from_slice(&(message.len() as u32).to_be_bytes());
    frame.extend_from_slice(message);
    frame.extend_from_slice(app_id.as_bytes());

    Aes256CbcEnc::new(key.as_bytes().as_slice().into(), key.iv().into())
        .encrypt_padded_vec_mut::<Pkcs7>(&frame)
}

/// Decrypt a frame, returning the message bytes and the embedded app id.
///
/// Every failure is reported as the same [`GatewayError::Crypto`].
pub fn decrypt_frame(ciphertext: &[u8], key: &AesKey) -> Result<(Vec<u8>, String)> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(reject("ciphertext is not block aligned"));
    }
    let frame = Aes256CbcDec::new(key.as_bytes().as_slice().into(), key.iv().into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| reject("invalid padding"))?;
    if frame.len() < HEADER_LEN {
        return Err(reject("frame shorter than header"));
    }

    let length = <[u8; 4]>::try_from(&frame[PREFIX_LEN..HEADER_LEN])
        .map_err(|_| reject("unreadable length"))?;
    let message_end = HEADER_LEN
        .checked_add(u32::from_be_bytes(length) as usize)
        .filter(|end| *end <= frame.len())
        .ok_or_else(|| reject("declared length exceeds frame"))?;

    let message = frame[HEADER_LEN..message_end].to_vec();
    let app_id = String::from_utf8(frame[message_end..].to_vec())
        .map_err(|_| reject("app id is not utf-8"))?;
    Ok((message, app_id))
}

fn reject(reason: &'static str) -> GatewayError {
    debug!(reason, "frame rejected");
    GatewayError::Crypto
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode the base64 `Encrypt` / `echostr` payload. Failure is a crypto failure.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|_| reject("payload is not base64"))
}
