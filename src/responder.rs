use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::envelope::EnvelopeCodec;
use crate::error::{GatewayError, Result};
use crate::router::Router;

/// Query string the platform attaches to every callback request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub msg_signature: Option<String>,
    #[serde(default)]
    pub echostr: Option<String>,
}

impl CallbackQuery {
    /// `msg_signature`, falling back to the legacy `signature` parameter.
    pub fn effective_signature(&self) -> &str {
        self.msg_signature
            .as_deref()
            .or(self.signature.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl GatewayResponse {
    fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    fn rejected(err: &GatewayError) -> Self {
        Self {
            status: err.http_status(),
            body: Vec::new(),
        }
    }
}

/// verify → decrypt → route → encrypt → sign, once per request.
pub struct Responder {
    codec: EnvelopeCodec,
    router: Arc<Router>,
}

impl Responder {
    pub fn new(codec: EnvelopeCodec, router: Arc<Router>) -> Self {
        Self { codec, router }
    }

    pub fn handshake(&self, query: &CallbackQuery) -> GatewayResponse {
        let echostr = query.echostr.as_deref().unwrap_or_default();
        match self.codec.verify_echo_handshake(
            &query.timestamp,
            &query.nonce,
            query.effective_signature(),
            echostr,
        ) {
            Ok(plaintext) => GatewayResponse::ok(plaintext),
            Err(e) => {
                warn!("callback handshake rejected: {e}");
                GatewayResponse::rejected(&e)
            }
        }
    }

    pub fn push(&self, query: &CallbackQuery, body: &str) -> GatewayResponse {
        match self.process_push(query, body) {
            Ok(Some(xml)) => GatewayResponse::ok(xml),
            Ok(None) => GatewayResponse::ok(Vec::new()),
            Err(e) => {
                warn!("callback push rejected: {e}");
                GatewayResponse::rejected(&e)
            }
        }
    }

    fn process_push(&self, query: &CallbackQuery, body: &str) -> Result<Option<String>> {
        let signature = query.effective_signature();
        let message = if self.codec.encrypt_mode() {
            let envelope =
                self.codec
                    .parse_envelope(body, &query.timestamp, &query.nonce, signature)?;
            self.codec.verify_and_decode(&envelope)?
        } else {
            self.codec
                .decode_plain(body, &query.timestamp, &query.nonce, signature)?
        };
        debug!(
            msg_type = message.msg_type(),
            from = message.from_user_name(),
            "push decoded"
        );

        let Some(reply) = self.router.dispatch(&message) else {
            return Ok(None);
        };
        if self.codec.encrypt_mode() {
            self.codec.encode_and_sign(&reply)?.to_xml().map(Some)
        } else {
            reply.to_xml().map(Some)
        }
    }
}
