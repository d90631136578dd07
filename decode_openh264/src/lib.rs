//! [`VideoDecoder`] implementation over Cisco OpenH264.

use openh264::decoder::Decoder;
use openh264::formats::YUVSource;

use reel_core::decode::{RawFrame, VideoDecoder, VideoInitOptions};

mod error;
pub use error::OpenError;

/// Decodes H.264 payloads with Cisco OpenH264.
///
/// Payloads arrive without start codes; a four-byte Annex-B start code
/// is prepended before they are fed to the codec. Output is always
/// RGBA8 — the `rgb` init option is implied and `reuse_memory` has no
/// OpenH264 equivalent, so both are accepted and ignored.
pub struct OpenH264Decoder {
    decoder: Decoder,

    /// Scratch buffer holding the start-code-prefixed payload.
    annexb_buffer: Vec<u8>,
    /// Scratch buffer for the codec's RGB output.
    rgb_buffer: Vec<u8>,
}

impl VideoDecoder for OpenH264Decoder {
    type OpenError = OpenError;
    type FatalError = openh264::Error;

    fn new(_opts: VideoInitOptions) -> Result<Self, Self::OpenError> {
        let decoder = Decoder::new()?;

        Ok(OpenH264Decoder {
            decoder,
            annexb_buffer: Vec::new(),
            rgb_buffer: Vec::new(),
        })
    }

    fn decode(&mut self, payload: &[u8]) -> Result<Option<RawFrame>, Self::FatalError> {
        self.annexb_buffer.clear();
        self.annexb_buffer.extend_from_slice(&[0, 0, 0, 1]);
        self.annexb_buffer.extend_from_slice(payload);

        let Some(yuv) = self.decoder.decode(&self.annexb_buffer)? else {
            // Parameter sets (and codecs buffering ahead) produce no
            // picture.
            return Ok(None);
        };

        let (width, height) = yuv.dimensions();

        self.rgb_buffer.resize(yuv.estimate_rgb_u8_size(), 0);
        yuv.write_rgb8(&mut self.rgb_buffer);

        // Expand RGB8 to the RGBA8 the cache stores.
        let mut rgba = Vec::with_capacity(width * height * 4);
        for px in self.rgb_buffer.chunks_exact(3) {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }

        Ok(Some(RawFrame {
            rgba,
            width: width as u32,
            height: height as u32,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_opens() {
        let decoder = OpenH264Decoder::new(VideoInitOptions::default());
        assert!(decoder.is_ok());
    }

    #[test]
    fn no_picture_without_an_access_unit() {
        let mut decoder = OpenH264Decoder::new(VideoInitOptions::default()).unwrap();

        // Whether the codec rejects this payload or swallows it, it
        // must not hallucinate a picture from it.
        let result = decoder.decode(&[0x09, 0x10]);
        assert!(!matches!(result, Ok(Some(_))));
    }
}
