pub mod config;
pub mod envelope;
pub mod handlers;
pub mod responder;
pub mod web;

pub use wxgate_app::logging;
pub use wxgate_core::{error, message, reply, xml};
pub use wxgate_crypto as crypto;
pub use wxgate_router as router;
