pub mod error;
pub mod record;
pub mod sink;
pub mod payload;
pub mod layer;

#[cfg(feature = "loki")]
pub mod loki;

pub mod init;

#[cfg(feature = "loki")]
pub mod env;
