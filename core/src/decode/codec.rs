use std::error::Error;

use crate::FrameDimension;

/// Options sent to a video codec when a decode session starts.
#[derive(Debug, Clone, Copy)]
pub struct VideoInitOptions {
    /// Ask the codec for RGB output.
    pub rgb: bool,
    /// Allow the codec to hand back buffers it still owns. Codecs
    /// without a matching mode ignore this.
    pub reuse_memory: bool,
}

impl Default for VideoInitOptions {
    fn default() -> Self {
        VideoInitOptions {
            rgb: true,
            reuse_memory: false,
        }
    }
}

/// A raw decoded picture, not yet sized for rendering.
pub struct RawFrame {
    /// Row-major RGBA8 pixel data.
    pub rgba: Vec<u8>,
    /// The width the codec reported.
    pub width: u32,
    /// The height the codec reported.
    pub height: u32,
}

/// A type that decodes video codec payloads into raw pictures.
///
/// The decoder is constructed on the worker thread at the start of every
/// decode session and dropped at its end; it never survives across
/// chunks.
pub trait VideoDecoder: Sized + 'static {
    /// The error type while constructing the codec.
    type OpenError: Error + Send;

    /// The error type when decoding fails. Any error ends the session.
    type FatalError: Error + Send;

    fn new(opts: VideoInitOptions) -> Result<Self, Self::OpenError>;

    /// Feed one located payload: a sequence or picture parameter set, or
    /// one access unit.
    ///
    /// Returns `Some` when the payload produced a picture. Parameter
    /// sets return `None`. Every access unit of a block is expected to
    /// produce exactly one picture.
    fn decode(&mut self, payload: &[u8]) -> Result<Option<RawFrame>, Self::FatalError>;
}

/// One entry produced by an archive unpacker.
pub enum UnpackedEntry {
    /// A decoded raster, 2D mode.
    Image(RawFrame),
    /// The entry's raw bytes, 3D mode.
    Blob(Vec<u8>),
}

/// A type that unpacks an archive block into frames.
///
/// One unpacker instance is constructed on the worker thread when the
/// decoder opens and is reused across decode sessions.
pub trait ArchiveUnpacker: Sized + 'static {
    /// The error type while constructing the unpacker.
    type OpenError: Error + Send;

    /// The error type when unpacking fails. Any error ends the session.
    type FatalError: Error + Send;

    fn new() -> Result<Self, Self::OpenError>;

    /// Unpack entries `start..=end` of `block`, calling `emit` once per
    /// entry with the entry's 0-based position within the range.
    /// Entries may be emitted in any order. Archive file names carry no
    /// meaning here.
    fn unpack(
        &mut self,
        block: &[u8],
        start: usize,
        end: usize,
        dimension: FrameDimension,
        emit: &mut dyn FnMut(usize, UnpackedEntry),
    ) -> Result<(), Self::FatalError>;
}
