use std::marker::PhantomData;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::{
    Bitmap, BlockType, ChunkNumber, DecodedChunk, DecodedFrame, FrameDimension, FrameNumber,
    RenderSize,
};

use super::annexb;
use super::archive_worker::ArchiveWorkerHandle;
use super::cache::ChunkCache;
use super::codec::{ArchiveUnpacker, RawFrame, VideoDecoder, VideoInitOptions};
use super::error::{DecodeError, RequestError, WorkerError};
use super::image_ops;
use super::request::{self, BlockToDecode, RequestSlot};
use super::video_worker::VideoWorkerHandle;
use super::{ArchiveWorkerMsg, FrameDecoderOptions, FrameEvent, FramePayload, VideoWorkerMsg};

/// Decodes chunk blocks into per-frame bitmaps and caches the results.
///
/// One decoder serves one media source. The client hands it byte blocks
/// with [`request_decode`](FrameDecoder::request_decode) and reads
/// decoded frames back with [`frame`](FrameDecoder::frame); decoding
/// happens on a worker thread, one session at a time. A newer request
/// supersedes an older one that has not started decoding yet — that is
/// the only cancellation mechanism.
///
/// The decoder does no work on its own: callbacks fire and sessions
/// turn over inside [`poll`](FrameDecoder::poll), which every lookup
/// also runs on entry. A UI that relies on callbacks alone should call
/// `poll` once per tick.
pub struct FrameDecoder<V: VideoDecoder, A: ArchiveUnpacker> {
    block_type: BlockType,
    chunk_of: Box<dyn Fn(FrameNumber) -> ChunkNumber + Send>,
    dimension: FrameDimension,
    render_size: Option<RenderSize>,

    cache: ChunkCache,
    slot: RequestSlot,
    session: Option<Session>,

    video_worker: Option<VideoWorkerHandle>,
    archive_worker: Option<ArchiveWorkerHandle>,

    event_channel_size: usize,
    poll_interval: Duration,
    closed: bool,

    _codecs: PhantomData<fn() -> (V, A)>,
}

/// Bookkeeping of the decode session currently holding the worker.
struct Session {
    /// Frames decoded so far; admitted to the cache only when complete.
    collected: DecodedChunk,
    /// How many frames the in-flight request covers.
    expected: usize,
    /// The render size this session crops video frames towards,
    /// captured at promotion so later changes only affect later
    /// sessions.
    render_size: Option<RenderSize>,
}

impl<V: VideoDecoder, A: ArchiveUnpacker> FrameDecoder<V, A> {
    /// Open a new frame decoder.
    ///
    /// * `block_type` - The kind of blocks this decoder will receive.
    /// * `chunk_of` - Total function mapping a frame number to the
    ///   chunk it belongs to. Every frame belongs to exactly one chunk.
    /// * `options` - Additional decoder options.
    ///
    /// In archive mode this spawns the (session-spanning) unpacker
    /// worker and waits for it to open.
    pub fn new<F>(
        block_type: BlockType,
        chunk_of: F,
        options: FrameDecoderOptions,
    ) -> Result<Self, A::OpenError>
    where
        F: Fn(FrameNumber) -> ChunkNumber + Send + 'static,
    {
        let archive_worker = match block_type {
            BlockType::Archive => Some(ArchiveWorkerHandle::spawn::<A>(
                options.event_channel_size,
                options.poll_interval,
            )?),
            BlockType::Video => None,
        };

        Ok(FrameDecoder {
            block_type,
            chunk_of: Box::new(chunk_of),
            dimension: options.dimension,
            render_size: options.render_size,
            cache: ChunkCache::new(options.capacity),
            slot: RequestSlot::new(),
            session: None,
            video_worker: None,
            archive_worker,
            event_channel_size: options.event_channel_size,
            poll_interval: options.poll_interval,
            closed: false,
            _codecs: PhantomData,
        })
    }

    /// Submit a block for decoding.
    ///
    /// This is non-blocking: it only updates the request state and
    /// schedules the decode. The request's outcome arrives through the
    /// callbacks — `on_decode` once per frame, then exactly one of
    /// `on_decode_all` (the chunk was admitted to the cache) or
    /// `on_reject` (the request was superseded or the worker failed).
    ///
    /// A request for the frame set currently pending or in flight
    /// replaces that request's callbacks; any other pending request is
    /// rejected as outdated and replaced.
    ///
    /// ## Error
    /// Returns an error without touching any state if `frame_numbers`
    /// is empty or not strictly ascending, or if the decoder is closed.
    pub fn request_decode<D, C, R>(
        &mut self,
        block: Vec<u8>,
        frame_numbers: Vec<FrameNumber>,
        on_decode: D,
        on_decode_all: C,
        on_reject: R,
    ) -> Result<(), RequestError>
    where
        D: FnMut(FrameNumber, &DecodedFrame) + Send + 'static,
        C: FnOnce() + Send + 'static,
        R: FnOnce(DecodeError) + Send + 'static,
    {
        if self.closed {
            return Err(RequestError::Closed);
        }
        request::validate_frame_numbers(&frame_numbers)?;

        let chunk_number = (self.chunk_of)(frame_numbers[0]);
        debug!(
            "requested chunk {} ({} frames)",
            chunk_number,
            frame_numbers.len()
        );

        self.slot.submit(BlockToDecode {
            frame_numbers,
            chunk_number,
            block: Arc::new(block),
            on_decode: Box::new(on_decode),
            on_decode_all: Some(Box::new(on_decode_all)),
            on_reject: Some(Box::new(on_reject)),
        });

        Ok(())
    }

    /// Whether a chunk is resident in the cache.
    ///
    /// This is non-blocking.
    pub fn is_chunk_cached(&mut self, chunk_number: ChunkNumber) -> bool {
        self.poll();
        self.cache.has(chunk_number)
    }

    /// Look up a cached frame.
    ///
    /// This is non-blocking. Returns `None` if the frame's chunk is not
    /// resident. The frame is borrowed from the cache: it stays valid
    /// until the next call into the decoder and must not be released by
    /// the caller.
    pub fn frame(&mut self, frame_number: FrameNumber) -> Option<&DecodedFrame> {
        self.poll();
        let chunk_number = (self.chunk_of)(frame_number);
        self.cache.get(chunk_number, frame_number)
    }

    /// The resident chunk numbers, ascending. With
    /// `include_in_progress`, the chunk currently being decoded (if
    /// any) is appended.
    ///
    /// This is non-blocking.
    pub fn cached_chunks(&mut self, include_in_progress: bool) -> Vec<ChunkNumber> {
        self.poll();
        let mut chunks = self.cache.keys_sorted();
        if include_in_progress {
            if let Some(in_flight) = self.slot.in_flight() {
                chunks.push(in_flight.chunk_number);
            }
        }
        chunks
    }

    /// Set the render surface size. Takes effect from the next video
    /// decode session; has no effect on archive blocks.
    pub fn set_render_size(&mut self, width: u32, height: u32) {
        self.render_size = Some(RenderSize { width, height });
    }

    pub fn render_size(&self) -> Option<RenderSize> {
        self.render_size
    }

    pub fn dimension(&self) -> FrameDimension {
        self.dimension
    }

    /// The maximum number of decoded chunks kept in the cache.
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Process everything the decode worker has produced so far.
    ///
    /// This is non-blocking. Promotes a pending request into a decode
    /// session when none is active, hands each finished frame to the
    /// session's `on_decode`, and on the last frame admits the chunk
    /// and fires `on_decode_all`.
    pub fn poll(&mut self) {
        if self.closed {
            return;
        }

        loop {
            self.start_decode();

            if !self.slot.has_in_flight() {
                return;
            }
            let Some(event) = self.poll_event() else {
                return;
            };

            match event {
                FrameEvent::Init => {}
                FrameEvent::Ready { index, payload } => self.handle_ready(index, payload),
                FrameEvent::Error(error) => self.fail_session(error),
            }
        }
    }

    /// Whether nothing is queued or in flight.
    ///
    /// This is non-blocking.
    pub fn is_idle(&mut self) -> bool {
        self.poll();
        !self.slot.has_in_flight() && !self.slot.has_queued()
    }

    /// Block until every outstanding request has reached its terminal
    /// callback.
    ///
    /// NOTE: This is **not** realtime-safe and never returns if the
    /// worker hangs. It is only useful for shutdown paths and tests.
    pub fn block_until_idle(&mut self) {
        while !self.is_idle() {
            thread::sleep(self.poll_interval);
        }
    }

    /// Terminate the decode workers and release every cached frame.
    ///
    /// Outstanding requests are dropped without a terminal callback:
    /// after `close()`, pending callbacks must be treated as never
    /// arriving. Closing an already-closed decoder does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        debug!("closing decoder");
        self.video_worker = None;
        self.archive_worker = None;
        self.session = None;
        self.slot.abandon();
        self.cache.clear();
    }

    /// Promote the pending request into a decode session, if the worker
    /// is free. Does nothing while a session is active.
    fn start_decode(&mut self) {
        if self.slot.has_in_flight() {
            return;
        }

        let (chunk_number, expected, block) = {
            let Some(req) = self.slot.promote() else {
                return;
            };
            (
                req.chunk_number,
                req.frame_numbers.len(),
                Arc::clone(&req.block),
            )
        };

        debug!("decoding chunk {}", chunk_number);

        // Make the chunk the newest stack entry and leave a slot free
        // for it before any frame exists.
        self.cache.reserve(chunk_number);
        self.cache.evict_down_to(1);

        self.session = Some(Session {
            collected: DecodedChunk::new(),
            expected,
            render_size: self.render_size,
        });

        match self.block_type {
            BlockType::Video => self.dispatch_video(block),
            BlockType::Archive => self.dispatch_archive(block, expected),
        }
    }

    /// Locate the codec payloads in the block and hand them to a fresh
    /// video worker: parameter sets first, then every access unit.
    fn dispatch_video(&mut self, block: Arc<Vec<u8>>) {
        let units = annexb::split_nal_units(&block);

        // One init message plus one payload per unit, with room for the
        // worker's replies on the other ring.
        let channel_size = units.len() + 4;
        let mut worker = VideoWorkerHandle::spawn::<V>(channel_size, self.poll_interval);

        worker.send(VideoWorkerMsg::Init(VideoInitOptions::default()));

        let parameter_sets = units
            .iter()
            .filter(|u| u.nal_type == annexb::NAL_SPS || u.nal_type == annexb::NAL_PPS);
        let access_units = units.iter().filter(|u| annexb::is_access_unit(u.nal_type));

        for unit in parameter_sets.chain(access_units) {
            worker.send(VideoWorkerMsg::Payload {
                buf: Arc::clone(&block),
                offset: unit.offset,
                length: unit.length,
            });
        }

        self.video_worker = Some(worker);
    }

    /// Hand the block to the session-spanning archive worker, spawning
    /// a fresh one if the previous worker died with an error.
    fn dispatch_archive(&mut self, block: Arc<Vec<u8>>, expected: usize) {
        if self.archive_worker.is_none() {
            match ArchiveWorkerHandle::spawn::<A>(self.event_channel_size, self.poll_interval) {
                Ok(worker) => self.archive_worker = Some(worker),
                Err(e) => {
                    self.fail_session(WorkerError::new(e.to_string()));
                    return;
                }
            }
        }

        if let Some(worker) = self.archive_worker.as_mut() {
            worker.send(ArchiveWorkerMsg::Unpack {
                block,
                start: 0,
                end: expected - 1,
                dimension: self.dimension,
            });
        }
    }

    fn poll_event(&mut self) -> Option<FrameEvent> {
        match self.block_type {
            BlockType::Video => self.video_worker.as_mut()?.poll_event(),
            BlockType::Archive => self.archive_worker.as_mut()?.poll_event(),
        }
    }

    /// Record one finished frame into the session and hand it to the
    /// client; admit the chunk once the frame set is complete.
    fn handle_ready(&mut self, index: usize, payload: FramePayload) {
        let Some(frame_number) = self
            .slot
            .in_flight()
            .and_then(|req| req.frame_numbers.get(index).copied())
        else {
            warn!("dropping frame event with index {} outside the request", index);
            return;
        };

        let decoded = match payload {
            FramePayload::Raw(raw) => DecodedFrame::Bitmap(self.render_bitmap(raw)),
            FramePayload::Frame(frame) => frame,
        };

        let mut complete = false;
        if let (Some(session), Some(req)) = (self.session.as_mut(), self.slot.in_flight_mut()) {
            session.collected.insert(frame_number, decoded);
            if let Some(frame) = session.collected.get(frame_number) {
                (req.on_decode)(frame_number, frame);
            }
            complete = session.collected.len() == session.expected;
        }

        if complete {
            self.complete_session();
        }
    }

    /// Crop a raw video picture towards the session's render size.
    fn render_bitmap(&self, raw: RawFrame) -> Bitmap {
        let render_size = self.session.as_ref().and_then(|s| s.render_size);
        match render_size {
            Some(render_size) => {
                let (out_w, out_h) = image_ops::render_target(render_size, raw.width, raw.height);
                let rgba = image_ops::crop(raw.rgba, raw.width, raw.height, out_w, out_h);
                Bitmap::new(out_w, out_h, rgba)
            }
            None => Bitmap::new(raw.width, raw.height, raw.rgba),
        }
    }

    /// Admit the completed chunk, fire `on_decode_all` and release the
    /// session (video workers do not survive it).
    fn complete_session(&mut self) {
        self.video_worker = None;

        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(mut req) = self.slot.finish() {
            debug!(
                "admitted chunk {} ({} frames)",
                req.chunk_number,
                session.collected.len()
            );
            self.cache.admit(req.chunk_number, session.collected);
            req.decode_all();
        }
    }

    /// Abort the session after a worker error: terminate the worker,
    /// reject the request, admit nothing. Partial frames are released
    /// as the session drops.
    fn fail_session(&mut self, error: WorkerError) {
        warn!("decode session failed: {}", error);

        self.video_worker = None;
        self.archive_worker = None;
        self.session = None;

        if let Some(mut req) = self.slot.finish() {
            req.reject(DecodeError::Worker(error));
        }
    }
}

impl<V: VideoDecoder, A: ArchiveUnpacker> Drop for FrameDecoder<V, A> {
    fn drop(&mut self) {
        self.close();
    }
}
