use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::FrameNumber;

/// A decoded raster frame.
///
/// The pixel store is owned by the cache while the frame is resident and
/// is released exactly once, either when the chunk is evicted or when the
/// decoder is closed. Clients receive bitmaps by reference and must not
/// hold on to the pixel data across calls into the decoder.
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Option<Arc<[u8]>>,
}

impl Bitmap {
    /// Create a bitmap from a row-major RGBA8 buffer.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Bitmap::from_shared(width, height, Arc::from(pixels))
    }

    pub(crate) fn from_shared(width: u32, height: u32, pixels: Arc<[u8]>) -> Self {
        Bitmap {
            width,
            height,
            pixels: Some(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The row-major RGBA8 pixel data, or `None` once the bitmap has
    /// been closed.
    pub fn pixels(&self) -> Option<&[u8]> {
        self.pixels.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.pixels.is_none()
    }

    /// Release the pixel store.
    ///
    /// Closing an already-closed bitmap does nothing.
    pub fn close(&mut self) {
        self.pixels = None;
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An opaque frame payload, used for 3D point-cloud frames.
///
/// Blobs are inert data and need no release.
#[derive(Debug, Clone)]
pub struct Blob {
    data: Arc<[u8]>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Blob {
            data: Arc::from(data),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A single decoded frame.
#[derive(Debug)]
pub enum DecodedFrame {
    Bitmap(Bitmap),
    Blob(Blob),
}

impl DecodedFrame {
    pub fn as_bitmap(&self) -> Option<&Bitmap> {
        match self {
            DecodedFrame::Bitmap(bitmap) => Some(bitmap),
            DecodedFrame::Blob(_) => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            DecodedFrame::Bitmap(_) => None,
            DecodedFrame::Blob(blob) => Some(blob),
        }
    }

    /// Release any native resources this frame owns.
    pub(crate) fn close(&mut self) {
        if let DecodedFrame::Bitmap(bitmap) = self {
            bitmap.close();
        }
    }
}

/// The complete frame set of one decoded chunk.
///
/// A chunk only ever becomes visible to readers with all of its frames
/// present; partially decoded sets stay local to the decode session.
pub(crate) struct DecodedChunk {
    frames: BTreeMap<FrameNumber, DecodedFrame>,
}

impl DecodedChunk {
    pub(crate) fn new() -> Self {
        DecodedChunk {
            frames: BTreeMap::new(),
        }
    }

    pub(crate) fn get(&self, frame_number: FrameNumber) -> Option<&DecodedFrame> {
        self.frames.get(&frame_number)
    }

    pub(crate) fn insert(&mut self, frame_number: FrameNumber, frame: DecodedFrame) {
        self.frames.insert(frame_number, frame);
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    /// Release every bitmap frame in this chunk.
    pub(crate) fn close_frames(&mut self) {
        for frame in self.frames.values_mut() {
            frame.close();
        }
    }
}
