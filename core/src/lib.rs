//! Core API for the `reel` frame-chunk decoder cache.
//!
//! A [`FrameDecoder`](decode::FrameDecoder) receives opaque byte blocks
//! (an H.264 elementary stream, or a zip archive of still images),
//! decodes them on a worker thread into per-frame bitmaps, and serves
//! those bitmaps to a UI that navigates frames non-linearly. Decoded
//! chunks are kept in a bounded cache ordered by admission recency.
//!
//! The codecs themselves are pluggable through the
//! [`VideoDecoder`](decode::VideoDecoder) and
//! [`ArchiveUnpacker`](decode::ArchiveUnpacker) traits. The companion
//! crates `reel-decode-openh264` and `reel-unzip-image` provide
//! implementations.

mod frame;

pub mod decode;

pub use frame::{Bitmap, Blob, DecodedFrame};

pub(crate) use frame::DecodedChunk;

/// Global index of a frame within the source media.
pub type FrameNumber = usize;

/// Identifier of a chunk, a contiguous group of frames decoded as a unit.
pub type ChunkNumber = usize;

/// The kind of byte block a decoder consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// A video chunk: one H.264 elementary stream per block.
    Video,
    /// An image chunk: one zipped archive of still images per block.
    Archive,
}

/// The output representation of frames unpacked from an archive block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDimension {
    /// Ordinary raster frames, decoded into [`Bitmap`]s.
    Dim2d,
    /// Point-cloud frames, passed through as inert [`Blob`]s.
    Dim3d,
}

/// The size of the surface video frames are rendered to.
///
/// Decoded video frames are cropped towards this size before they are
/// cached. Archive frames are never resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}
