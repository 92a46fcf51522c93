//! FIFO of rendered chunks between the producer and the sink.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use fp_engine::SampleChunk;

/// Unbounded multi-producer multi-consumer chunk queue.
///
/// Clones are handles to the same queue: the producer enqueues through one,
/// the sink's fill callback dequeues through another and the player keeps a
/// third to drain abandoned chunks.
#[derive(Clone, Debug)]
pub struct SampleQueue {
    tx: Sender<SampleChunk>,
    rx: Receiver<SampleChunk>,
}

impl SampleQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, chunk: SampleChunk) {
        // Every handle holds a receiver, so the channel cannot be disconnected.
        let _ = self.tx.send(chunk);
    }

    /// Dequeue the oldest chunk without blocking.
    pub fn try_pop(&self) -> Option<SampleChunk> {
        match self.rx.try_recv() {
            Ok(chunk) => Some(chunk),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discard everything queued. Returns the number of chunks dropped.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(tag: i16) -> SampleChunk {
        SampleChunk::from_vec(vec![tag; 3])
    }

    #[test]
    fn chunks_come_out_in_enqueue_order() {
        let producer = SampleQueue::new();
        let consumer = producer.clone();

        for tag in 0..5 {
            producer.push(chunk(tag));
        }
        assert_eq!(consumer.len(), 5);

        let tags: Vec<i16> = std::iter::from_fn(|| consumer.try_pop()).map(|c| c[0]).collect();
        assert_eq!(tags, [0, 1, 2, 3, 4]);
        assert!(producer.is_empty());
    }

    #[test]
    fn empty_queue_pops_none() {
        assert!(SampleQueue::new().try_pop().is_none());
    }

    #[test]
    fn clear_drops_pending_chunks() {
        let queue = SampleQueue::new();
        queue.push(chunk(1));
        queue.push(chunk(2));
        assert_eq!(queue.clone().clear(), 2);
        assert!(queue.is_empty());
    }
}
