use std::sync::Arc;

use log::debug;

use crate::{ChunkNumber, DecodedFrame, FrameNumber};

use super::error::{DecodeError, RequestError};

pub(crate) type OnDecode = Box<dyn FnMut(FrameNumber, &DecodedFrame) + Send>;
pub(crate) type OnDecodeAll = Box<dyn FnOnce() + Send>;
pub(crate) type OnReject = Box<dyn FnOnce(DecodeError) + Send>;

/// A decode request: the block to decode, the frames it covers, and the
/// callbacks its outcome is delivered through.
///
/// A request lives until exactly one terminal callback fires:
/// `on_decode_all` on success, or `on_reject` on supersession or
/// failure.
pub(crate) struct BlockToDecode {
    /// The frames this block covers, strictly ascending.
    pub frame_numbers: Vec<FrameNumber>,
    pub chunk_number: ChunkNumber,
    pub block: Arc<Vec<u8>>,
    pub on_decode: OnDecode,
    pub on_decode_all: Option<OnDecodeAll>,
    pub on_reject: Option<OnReject>,
}

impl BlockToDecode {
    /// Fire the rejection callback, if it has not fired yet.
    pub fn reject(&mut self, error: DecodeError) {
        if let Some(on_reject) = self.on_reject.take() {
            on_reject(error);
        }
    }

    /// Fire the completion callback, if it has not fired yet.
    pub fn decode_all(&mut self) {
        if let Some(on_decode_all) = self.on_decode_all.take() {
            on_decode_all();
        }
    }

    /// Replace the whole callback set with that of `other`, keeping
    /// every other field. Subsequent outputs of this request are
    /// delivered to `other`'s callbacks.
    pub fn adopt_callbacks(&mut self, other: BlockToDecode) {
        self.on_decode = other.on_decode;
        self.on_decode_all = other.on_decode_all;
        self.on_reject = other.on_reject;
    }
}

/// Coordinates at most one queued and one in-flight request, and decides
/// which of two competing requests survives.
pub(crate) struct RequestSlot {
    queued: Option<BlockToDecode>,
    in_flight: Option<BlockToDecode>,
}

impl RequestSlot {
    pub fn new() -> Self {
        RequestSlot {
            queued: None,
            in_flight: None,
        }
    }

    pub fn has_queued(&self) -> bool {
        self.queued.is_some()
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<&BlockToDecode> {
        self.in_flight.as_ref()
    }

    pub fn in_flight_mut(&mut self) -> Option<&mut BlockToDecode> {
        self.in_flight.as_mut()
    }

    /// Accept a new request, superseding whatever it obsoletes.
    ///
    /// A queued request is always rejected as outdated: either its
    /// callbacks are replaced (same frame set) or the whole request is
    /// replaced. A request matching the in-flight frame set hands its
    /// callbacks to the running session instead of queueing.
    pub fn submit(&mut self, req: BlockToDecode) {
        if let Some(queued) = self.queued.as_mut() {
            queued.reject(DecodeError::Outdated);
            if queued.frame_numbers == req.frame_numbers {
                debug!("updated callbacks of queued chunk {}", queued.chunk_number);
                queued.adopt_callbacks(req);
            } else {
                debug!(
                    "queued chunk {} superseded by chunk {}",
                    queued.chunk_number, req.chunk_number
                );
                self.queued = Some(req);
            }
            return;
        }

        match self.in_flight.as_mut() {
            Some(in_flight) if in_flight.frame_numbers == req.frame_numbers => {
                debug!(
                    "updated callbacks of in-flight chunk {}",
                    in_flight.chunk_number
                );
                in_flight.reject(DecodeError::Outdated);
                in_flight.adopt_callbacks(req);
            }
            _ => self.queued = Some(req),
        }
    }

    /// Promote the queued request to in-flight.
    ///
    /// Must only be called while nothing is in flight. Whatever request
    /// is queued at this moment is the one that decodes; anything it
    /// replaced was already rejected at replacement time.
    pub fn promote(&mut self) -> Option<&mut BlockToDecode> {
        debug_assert!(self.in_flight.is_none());

        self.in_flight = self.queued.take();
        self.in_flight.as_mut()
    }

    /// Take the in-flight request out of the slot, ending its session.
    pub fn finish(&mut self) -> Option<BlockToDecode> {
        self.in_flight.take()
    }

    /// Drop both requests without firing any callback.
    pub fn abandon(&mut self) {
        self.queued = None;
        self.in_flight = None;
    }
}

/// Check that a frame number list is non-empty and strictly ascending.
pub(crate) fn validate_frame_numbers(frame_numbers: &[FrameNumber]) -> Result<(), RequestError> {
    if frame_numbers.is_empty() {
        return Err(RequestError::EmptyFrameNumbers);
    }
    for index in 1..frame_numbers.len() {
        if frame_numbers[index] <= frame_numbers[index - 1] {
            return Err(RequestError::UnorderedFrameNumbers { index });
        }
    }
    Ok(())
}
