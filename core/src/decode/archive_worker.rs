use std::thread;
use std::time::Duration;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::{Bitmap, Blob, DecodedFrame};

use super::codec::{ArchiveUnpacker, UnpackedEntry};
use super::error::WorkerError;
use super::{ArchiveWorkerMsg, FrameEvent, FramePayload};

/// Handle over the worker unpacking archive chunks.
///
/// Unlike a video worker, one archive worker serves every decode session
/// of the decoder's lifetime. It is terminated when the handle drops:
/// on `close()`, or after the worker reported an error (a fresh worker
/// is spawned for the next session).
pub(crate) struct ArchiveWorkerHandle {
    to_worker_tx: Producer<ArchiveWorkerMsg>,
    from_worker_rx: Consumer<FrameEvent>,
    close_signal_tx: Producer<()>,
}

impl ArchiveWorkerHandle {
    /// Spawn the worker thread and wait for the unpacker to open.
    pub fn spawn<A: ArchiveUnpacker>(
        event_channel_size: usize,
        poll_interval: Duration,
    ) -> Result<Self, A::OpenError> {
        let (to_worker_tx, from_client_rx) = RingBuffer::new(4);
        let (to_client_tx, from_worker_rx) = RingBuffer::new(event_channel_size);
        let (close_signal_tx, close_signal_rx) = RingBuffer::new(1);

        let (mut open_tx, mut open_rx) = RingBuffer::<Result<(), A::OpenError>>::new(1);

        thread::spawn(move || match A::new() {
            Ok(unpacker) => {
                // Push cannot fail because only one message is ever sent.
                let _ = open_tx.push(Ok(()));

                ArchiveWorker {
                    to_client_tx,
                    from_client_rx,
                    close_signal_rx,
                    unpacker: Some(unpacker),
                    poll_interval,
                    run: true,
                }
                .run();
            }
            Err(e) => {
                // Push cannot fail because only one message is ever sent.
                let _ = open_tx.push(Err(e));
            }
        });

        loop {
            match open_rx.pop() {
                Ok(Ok(())) => {
                    return Ok(ArchiveWorkerHandle {
                        to_worker_tx,
                        from_worker_rx,
                        close_signal_tx,
                    });
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => thread::sleep(poll_interval),
            }
        }
    }

    pub fn send(&mut self, msg: ArchiveWorkerMsg) {
        // This cannot fail because decode sessions are serialized: at
        // most one unpack request is ever outstanding.
        let _ = self.to_worker_tx.push(msg);
    }

    pub fn poll_event(&mut self) -> Option<FrameEvent> {
        self.from_worker_rx.pop().ok()
    }
}

impl Drop for ArchiveWorkerHandle {
    fn drop(&mut self) {
        // Tell the worker to shut down. This cannot fail because the
        // signal is only ever sent once.
        let _ = self.close_signal_tx.push(());
    }
}

struct ArchiveWorker<A: ArchiveUnpacker> {
    to_client_tx: Producer<FrameEvent>,
    from_client_rx: Consumer<ArchiveWorkerMsg>,
    close_signal_rx: Consumer<()>,

    unpacker: Option<A>,
    poll_interval: Duration,
    run: bool,
}

impl<A: ArchiveUnpacker> ArchiveWorker<A> {
    fn run(mut self) {
        while self.run {
            // Check for close signal.
            if self.close_signal_rx.pop().is_ok() {
                break;
            }

            let mut did_work = false;
            while let Ok(msg) = self.from_client_rx.pop() {
                did_work = true;
                self.handle_msg(msg);
                if !self.run {
                    return;
                }
            }

            if !did_work {
                thread::sleep(self.poll_interval);
            }
        }
    }

    fn handle_msg(&mut self, msg: ArchiveWorkerMsg) {
        let ArchiveWorkerMsg::Unpack {
            block,
            start,
            end,
            dimension,
        } = msg;

        // Move the unpacker out so the emit closure can borrow the
        // channel state.
        let Some(mut unpacker) = self.unpacker.take() else {
            self.fail(WorkerError::new("unpack requested after shutdown"));
            return;
        };

        let result = unpacker.unpack(&block, start, end, dimension, &mut |index, entry| {
            let frame = match entry {
                UnpackedEntry::Image(raw) => {
                    DecodedFrame::Bitmap(Bitmap::new(raw.width, raw.height, raw.rgba))
                }
                UnpackedEntry::Blob(data) => DecodedFrame::Blob(Blob::new(data)),
            };
            self.send_event(FrameEvent::Ready {
                index,
                payload: FramePayload::Frame(frame),
            });
        });

        self.unpacker = Some(unpacker);

        if let Err(e) = result {
            self.fail(WorkerError::new(e.to_string()));
        }
    }

    /// Report a single error, after which the worker is terminated.
    fn fail(&mut self, error: WorkerError) {
        self.send_event(FrameEvent::Error(error));
        self.run = false;
    }

    fn send_event(&mut self, event: FrameEvent) {
        if !self.run {
            return;
        }

        // Block until the event can be sent, bailing out if the client
        // closes in the meantime.
        loop {
            if !self.to_client_tx.is_full() {
                break;
            }
            if self.close_signal_rx.pop().is_ok() {
                self.run = false;
                return;
            }
            thread::sleep(self.poll_interval);
        }

        // Push cannot fail because a slot was available above and this
        // thread is the only producer.
        let _ = self.to_client_tx.push(event);
    }
}
