use std::thread;
use std::time::Duration;

use rtrb::{Consumer, Producer, RingBuffer};

use super::codec::VideoDecoder;
use super::error::WorkerError;
use super::{FrameEvent, FramePayload, VideoWorkerMsg};

/// Handle over the worker decoding one video chunk.
///
/// A video worker lives for exactly one decode session: it is spawned
/// when the session dispatches and terminated when the handle drops,
/// successful or not. The first message must be `Init`.
pub(crate) struct VideoWorkerHandle {
    to_worker_tx: Producer<VideoWorkerMsg>,
    from_worker_rx: Consumer<FrameEvent>,
    close_signal_tx: Producer<()>,
}

impl VideoWorkerHandle {
    /// Spawn the worker thread.
    ///
    /// `channel_size` must cover every message of the session upfront
    /// (one init plus one payload per located unit) so that submission
    /// never blocks.
    pub fn spawn<V: VideoDecoder>(channel_size: usize, poll_interval: Duration) -> Self {
        let (to_worker_tx, from_client_rx) = RingBuffer::new(channel_size);
        let (to_client_tx, from_worker_rx) = RingBuffer::new(channel_size);
        let (close_signal_tx, close_signal_rx) = RingBuffer::new(1);

        thread::spawn(move || {
            VideoWorker::<V> {
                to_client_tx,
                from_client_rx,
                close_signal_rx,
                decoder: None,
                next_index: 0,
                poll_interval,
                run: true,
            }
            .run();
        });

        VideoWorkerHandle {
            to_worker_tx,
            from_worker_rx,
            close_signal_tx,
        }
    }

    pub fn send(&mut self, msg: VideoWorkerMsg) {
        // This cannot fail because the channel is sized for the whole
        // session at spawn.
        let _ = self.to_worker_tx.push(msg);
    }

    pub fn poll_event(&mut self) -> Option<FrameEvent> {
        self.from_worker_rx.pop().ok()
    }
}

impl Drop for VideoWorkerHandle {
    fn drop(&mut self) {
        // Tell the worker to shut down. This cannot fail because the
        // signal is only ever sent once.
        let _ = self.close_signal_tx.push(());
    }
}

struct VideoWorker<V: VideoDecoder> {
    to_client_tx: Producer<FrameEvent>,
    from_client_rx: Consumer<VideoWorkerMsg>,
    close_signal_rx: Consumer<()>,

    decoder: Option<V>,
    next_index: usize,
    poll_interval: Duration,
    run: bool,
}

impl<V: VideoDecoder> VideoWorker<V> {
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

    fn handle_msg(&mut self, msg: VideoWorkerMsg) {
        match msg {
            VideoWorkerMsg::Init(opts) => match V::new(opts) {
                Ok(decoder) => {
                    self.decoder = Some(decoder);
                    self.send_event(FrameEvent::Init);
                }
                Err(e) => self.fail(WorkerError::new(e.to_string())),
            },
            VideoWorkerMsg::Payload {
                buf,
                offset,
                length,
            } => {
                let Some(payload) = buf.get(offset..offset + length) else {
                    self.fail(WorkerError::new("payload range outside the block"));
                    return;
                };
                let Some(decoder) = self.decoder.as_mut() else {
                    self.fail(WorkerError::new("payload received before init"));
                    return;
                };
                match decoder.decode(payload) {
                    Ok(Some(frame)) => {
                        let index = self.next_index;
                        self.next_index += 1;
                        self.send_event(FrameEvent::Ready {
                            index,
                            payload: FramePayload::Raw(frame),
                        });
                    }
                    Ok(None) => {}
                    Err(e) => self.fail(WorkerError::new(e.to_string())),
                }
            }
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
