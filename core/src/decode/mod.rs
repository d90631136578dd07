//! The decode pipeline: request arbitration, worker plumbing and the
//! chunk cache, behind the [`FrameDecoder`] facade.

mod annexb;
mod archive_worker;
mod cache;
mod codec;
mod decoder;
mod image_ops;
mod request;
mod video_worker;

pub mod error;

pub use codec::{ArchiveUnpacker, RawFrame, UnpackedEntry, VideoDecoder, VideoInitOptions};
pub use decoder::FrameDecoder;
pub use error::{DecodeError, RequestError, WorkerError};

use std::sync::Arc;
use std::time::Duration;

use crate::{DecodedFrame, FrameDimension, RenderSize};

/// How long idle worker threads sleep between checks for new messages.
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// The default number of decoded chunks kept in the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 5;

/// An event produced by a decode worker.
pub(crate) enum FrameEvent {
    /// The worker finished initializing. Carries no data.
    Init,
    /// One frame finished decoding. `index` is the 0-based position of
    /// the frame within the request's frame numbers.
    Ready { index: usize, payload: FramePayload },
    /// The worker failed. No further events follow.
    Error(WorkerError),
}

pub(crate) enum FramePayload {
    /// A raw picture from the video codec, not yet sized for rendering.
    Raw(RawFrame),
    /// A frame the archive worker already materialized.
    Frame(DecodedFrame),
}

pub(crate) enum VideoWorkerMsg {
    /// Construct the codec. Must be the first message of a session.
    Init(VideoInitOptions),
    /// One located codec payload (SPS, PPS or an access unit) within
    /// the shared block.
    Payload {
        buf: Arc<Vec<u8>>,
        offset: usize,
        length: usize,
    },
}

pub(crate) enum ArchiveWorkerMsg {
    /// Unpack entries `start..=end` of the block.
    Unpack {
        block: Arc<Vec<u8>>,
        start: usize,
        end: usize,
        dimension: FrameDimension,
    },
}

/// Options for a [`FrameDecoder`].
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoderOptions {
    /// The maximum number of decoded chunks kept in the cache. Values
    /// below 1 are treated as 1.
    pub capacity: usize,

    /// Whether archive blocks unpack into 2D bitmaps or 3D blobs. Has
    /// no effect on video blocks.
    pub dimension: FrameDimension,

    /// The render surface size video frames are cropped towards. Can be
    /// changed later with `set_render_size`. `None` caches frames at
    /// their decoded size.
    pub render_size: Option<RenderSize>,

    /// The capacity of the ring buffer carrying frame events from the
    /// archive worker. Video sessions size their channels from the
    /// block contents instead.
    ///
    /// This should be left alone unless you know what you are doing.
    pub event_channel_size: usize,

    /// How long `block_until_idle` and the worker threads sleep between
    /// polls.
    ///
    /// This should be left alone unless you know what you are doing.
    pub poll_interval: Duration,
}

impl Default for FrameDecoderOptions {
    fn default() -> Self {
        FrameDecoderOptions {
            capacity: DEFAULT_CACHE_CAPACITY,
            dimension: FrameDimension::Dim2d,
            render_size: None,
            event_channel_size: 64,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
