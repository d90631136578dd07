use std::collections::BTreeMap;

use log::debug;

use crate::{ChunkNumber, DecodedChunk, DecodedFrame, FrameNumber};

/// Bounded store of fully decoded chunks.
///
/// Residency is tracked by an ordered stack of chunk numbers, newest
/// admission first; the bottom of the stack is the eviction candidate.
/// Reads never reorder the stack. The stack may briefly hold a chunk
/// number reserved by an in-flight session before its entry exists.
pub(crate) struct ChunkCache {
    chunks: BTreeMap<ChunkNumber, DecodedChunk>,
    /// Chunk numbers by decreasing admission recency. Every key of
    /// `chunks` appears here exactly once.
    stack: Vec<ChunkNumber>,
    capacity: usize,
}

impl ChunkCache {
    pub fn new(capacity: usize) -> Self {
        ChunkCache {
            chunks: BTreeMap::new(),
            stack: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn has(&self, chunk_number: ChunkNumber) -> bool {
        self.chunks.contains_key(&chunk_number)
    }

    pub fn get(&self, chunk_number: ChunkNumber, frame_number: FrameNumber) -> Option<&DecodedFrame> {
        self.chunks.get(&chunk_number)?.get(frame_number)
    }

    /// Push a chunk number onto the top of the stack ahead of its
    /// admission. An existing occurrence moves to the top.
    pub fn reserve(&mut self, chunk_number: ChunkNumber) {
        self.stack.retain(|c| *c != chunk_number);
        self.stack.insert(0, chunk_number);
    }

    /// Insert a complete chunk.
    ///
    /// Must not be called twice for the same chunk without an
    /// intervening eviction.
    pub fn admit(&mut self, chunk_number: ChunkNumber, chunk: DecodedChunk) {
        debug_assert!(!self.chunks.contains_key(&chunk_number));

        if !self.stack.contains(&chunk_number) {
            self.stack.insert(0, chunk_number);
        }
        if let Some(mut old) = self.chunks.insert(chunk_number, chunk) {
            old.close_frames();
        }
    }

    /// Evict oldest-admitted chunks until at least
    /// `min(target_free_slots, capacity)` slots are free, releasing the
    /// bitmaps of every evicted chunk.
    pub fn evict_down_to(&mut self, target_free_slots: usize) {
        let max_len = self.capacity - target_free_slots.min(self.capacity);

        while self.chunks.len() > max_len {
            let Some(chunk_number) = self.stack.pop() else {
                break;
            };
            // A reservation whose session never completed has no entry
            // and releases nothing.
            if let Some(mut chunk) = self.chunks.remove(&chunk_number) {
                chunk.close_frames();
                debug!("evicted chunk {}", chunk_number);
            }
        }
    }

    /// Evict everything.
    pub fn clear(&mut self) {
        self.stack.clear();
        for (_, mut chunk) in std::mem::take(&mut self.chunks) {
            chunk.close_frames();
        }
    }

    /// The resident chunk numbers, ascending.
    pub fn keys_sorted(&self) -> Vec<ChunkNumber> {
        self.chunks.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Weak};

    use super::*;
    use crate::Bitmap;

    fn bitmap_with_probe() -> (DecodedFrame, Weak<[u8]>) {
        let pixels: Arc<[u8]> = Arc::from(vec![0u8; 16]);
        let probe = Arc::downgrade(&pixels);
        let bitmap = Bitmap::from_shared(2, 2, pixels);
        (DecodedFrame::Bitmap(bitmap), probe)
    }

    fn chunk_of_frames(frames: &[FrameNumber]) -> (DecodedChunk, Vec<Weak<[u8]>>) {
        let mut chunk = DecodedChunk::new();
        let mut probes = Vec::new();
        for &frame in frames {
            let (decoded, probe) = bitmap_with_probe();
            chunk.insert(frame, decoded);
            probes.push(probe);
        }
        (chunk, probes)
    }

    #[test]
    fn capacity_is_at_least_one() {
        assert_eq!(ChunkCache::new(0).capacity(), 1);
        assert_eq!(ChunkCache::new(4).capacity(), 4);
    }

    #[test]
    fn admission_and_lookup() {
        let mut cache = ChunkCache::new(2);
        let (chunk, _) = chunk_of_frames(&[10, 11]);
        cache.admit(1, chunk);

        assert!(cache.has(1));
        assert!(cache.get(1, 10).is_some());
        assert!(cache.get(1, 12).is_none());
        assert!(cache.get(2, 10).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.keys_sorted(), vec![1]);
    }

    #[test]
    fn eviction_is_by_admission_order() {
        let mut cache = ChunkCache::new(2);
        for chunk_number in 0..3 {
            let (chunk, _) = chunk_of_frames(&[chunk_number * 10]);
            cache.reserve(chunk_number);
            cache.evict_down_to(1);
            cache.admit(chunk_number, chunk);
        }

        assert_eq!(cache.keys_sorted(), vec![1, 2]);
    }

    #[test]
    fn eviction_releases_bitmaps() {
        let mut cache = ChunkCache::new(1);
        let (chunk, probes) = chunk_of_frames(&[0, 1]);
        cache.admit(0, chunk);

        cache.evict_down_to(1);

        assert!(cache.keys_sorted().is_empty());
        for probe in &probes {
            assert!(probe.upgrade().is_none());
        }
    }

    #[test]
    fn clear_releases_everything() {
        let mut cache = ChunkCache::new(4);
        let mut probes = Vec::new();
        for chunk_number in 0..2 {
            let (chunk, mut chunk_probes) = chunk_of_frames(&[chunk_number, chunk_number + 100]);
            cache.admit(chunk_number, chunk);
            probes.append(&mut chunk_probes);
        }

        cache.clear();

        assert!(cache.keys_sorted().is_empty());
        assert_eq!(probes.len(), 4);
        for probe in &probes {
            assert!(probe.upgrade().is_none());
        }
    }

    #[test]
    fn failed_reservation_is_popped_without_release() {
        let mut cache = ChunkCache::new(1);
        // The session for chunk 7 reserved its slot but never admitted
        // anything.
        cache.reserve(7);
        let (chunk, _) = chunk_of_frames(&[0]);
        cache.admit(0, chunk);

        // The next session evicts both the stale reservation and the
        // resident chunk on its way down to a free slot.
        let (chunk, _) = chunk_of_frames(&[10]);
        cache.reserve(1);
        cache.evict_down_to(1);
        cache.admit(1, chunk);

        assert_eq!(cache.keys_sorted(), vec![1]);
    }

    #[test]
    fn close_is_idempotent() {
        let (mut decoded, probe) = bitmap_with_probe();
        decoded.close();
        decoded.close();
        assert!(probe.upgrade().is_none());
        match &decoded {
            DecodedFrame::Bitmap(bitmap) => assert!(bitmap.is_closed()),
            DecodedFrame::Blob(_) => unreachable!(),
        }
    }
}
