pub mod cipher;
pub mod signature;

pub use cipher::{decrypt_frame, encrypt_frame, AesKey};
pub use signature::{sign, verify};
