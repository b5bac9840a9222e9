pub mod error;
pub mod message;
pub mod reply;
pub mod xml;
