//! Outer `<xml><Encrypt/>...</xml>` envelope: signature check, frame
//! decryption and inner message parsing on the way in; serialization,
//! encryption and signing on the way out.

use std::fmt;
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::crypto::cipher::{self, AesKey};
use crate::crypto::signature;
use crate::error::{GatewayError, Result};
use crate::message::Message;
use crate::reply::Reply;
use crate::xml::{self, DocumentWriter};

const NONCE_LEN: usize = 16;

/// Per-endpoint secrets. Encrypted mode is on whenever an AES key is present.
#[derive(Clone)]
pub struct SharedSecrets {
    token: String,
    aes_key: Option<AesKey>,
    app_id: String,
}

impl SharedSecrets {
    pub fn new(token: &str, encoding_aes_key: Option<&str>, app_id: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(GatewayError::Config("token must not be empty".into()));
        }
        let aes_key = encoding_aes_key
            .map(AesKey::from_encoding_aes_key)
            .transpose()?;
        Ok(Self {
            token: token.to_string(),
            aes_key,
            app_id: app_id.to_string(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn aes_key(&self) -> Option<&AesKey> {
        self.aes_key.as_ref()
    }

    pub fn encrypt_mode(&self) -> bool {
        self.aes_key.is_some()
    }
}

impl fmt::Debug for SharedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecrets")
            .field("token", &"<redacted>")
            .field("aes_key", &self.aes_key)
            .field("app_id", &self.app_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub encrypt: String,
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
}

impl EncryptedEnvelope {
    pub fn to_xml(&self) -> Result<String> {
        let mut doc = DocumentWriter::new()?;
        doc.cdata("Encrypt", &self.encrypt)?;
        doc.cdata("MsgSignature", &self.signature)?;
        doc.text("TimeStamp", &self.timestamp)?;
        doc.cdata("Nonce", &self.nonce)?;
        doc.finish()
    }

    /// Read a signed response envelope, as emitted by [`EnvelopeCodec::encode_and_sign`].
    pub fn from_xml(body: &str) -> Result<Self> {
        let mut fields = xml::read_document(body)?;
        let mut take = |name: &str| {
            fields
                .remove(name)
                .ok_or_else(|| GatewayError::MalformedXml(format!("envelope is missing <{name}>")))
        };
        Ok(Self {
            encrypt: take("Encrypt")?,
            signature: take("MsgSignature")?,
            timestamp: take("TimeStamp")?,
            nonce: take("Nonce")?,
        })
    }
}

pub struct EnvelopeCodec {
    secrets: Arc<SharedSecrets>,
}

impl EnvelopeCodec {
    pub fn new(secrets: Arc<SharedSecrets>) -> Self {
        Self { secrets }
    }

    pub fn secrets(&self) -> &SharedSecrets {
        &self.secrets
    }

    pub fn encrypt_mode(&self) -> bool {
        self.secrets.encrypt_mode()
    }

    /// Pair an inbound push body with the signature fields from its query string.
    pub fn parse_envelope(
        &self,
        body: &str,
        timestamp: &str,
        nonce: &str,
        signature: &str,
    ) -> Result<EncryptedEnvelope> {
        let mut fields = xml::read_document(body)?;
        let encrypt = fields
            .remove("Encrypt")
            .ok_or_else(|| GatewayError::MalformedXml("push body is missing <Encrypt>".into()))?;
        Ok(EncryptedEnvelope {
            encrypt,
            signature: signature.to_string(),
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
        })
    }

    pub fn verify_and_decode(&self, envelope: &EncryptedEnvelope) -> Result<Message> {
        self.check_signature(
            &envelope.signature,
            &envelope.timestamp,
            &envelope.nonce,
            &envelope.encrypt,
        )?;
        let plaintext = self.decrypt_payload(&envelope.encrypt)?;
        let xml = String::from_utf8(plaintext).map_err(|_| {
            debug!("decrypted message is not utf-8");
            GatewayError::Crypto
        })?;
        Message::from_xml(&xml)
    }

    /// Plaintext compatibility mode: the body is the message itself and the
    /// signature covers the raw body.
    pub fn decode_plain(
        &self,
        body: &str,
        timestamp: &str,
        nonce: &str,
        signature: &str,
    ) -> Result<Message> {
        self.check_signature(signature, timestamp, nonce, body)?;
        Message::from_xml(body)
    }

    pub fn encode_and_sign(&self, reply: &Reply) -> Result<EncryptedEnvelope> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        self.encode_and_sign_at(reply, &timestamp, &nonce)
    }

    pub fn encode_and_sign_at(
        &self,
        reply: &Reply,
        timestamp: &str,
        nonce: &str,
    ) -> Result<EncryptedEnvelope> {
        let key = self.secrets.aes_key().ok_or_else(|| {
            GatewayError::Config("encrypted replies require encoding_aes_key".into())
        })?;
        let inner = reply.to_xml()?;
        let ciphertext = cipher::encrypt_frame(inner.as_bytes(), self.secrets.app_id(), key);
        let encrypt = cipher::encode_base64(&ciphertext);
        let signature = signature::sign(self.secrets.token(), timestamp, nonce, &encrypt);
        Ok(EncryptedEnvelope {
            encrypt,
            signature,
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
        })
    }

    /// URL ownership check. Returns the bytes to echo back verbatim.
    pub fn verify_echo_handshake(
        &self,
        timestamp: &str,
        nonce: &str,
        msg_signature: &str,
        echostr: &str,
    ) -> Result<Vec<u8>> {
        self.check_signature(msg_signature, timestamp, nonce, echostr)?;
        if !self.encrypt_mode() {
            return Ok(echostr.as_bytes().to_vec());
        }
        self.decrypt_payload(echostr)
    }

    fn check_signature(
        &self,
        candidate: &str,
        timestamp: &str,
        nonce: &str,
        payload: &str,
    ) -> Result<()> {
        if signature::verify(candidate, self.secrets.token(), timestamp, nonce, payload) {
            Ok(())
        } else {
            Err(GatewayError::SignatureMismatch)
        }
    }

    fn decrypt_payload(&self, payload: &str) -> Result<Vec<u8>> {
        let key = self.secrets.aes_key().ok_or(GatewayError::Crypto)?;
        let ciphertext = cipher::decode_base64(payload)?;
        let (message, app_id) = cipher::decrypt_frame(&ciphertext, key)?;
        if app_id != self.secrets.app_id() {
            debug!(app_id = %app_id, "frame addressed to another app");
            return Err(GatewayError::Crypto);
        }
        Ok(message)
    }
}
