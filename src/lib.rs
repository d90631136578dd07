//! Chunked frame decoding and caching for annotation UIs that navigate
//! media non-linearly.
//!
//! See `reel-core` for the decoder itself; this crate re-exports it
//! together with the default codec implementations.

pub use reel_core::*;

#[cfg(feature = "decode-openh264")]
pub use reel_decode_openh264::*;

#[cfg(feature = "unzip-image")]
pub use reel_unzip_image::*;
