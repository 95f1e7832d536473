//! Single-slot rendezvous channel.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};

/// A typed single-slot channel: holds at most one message of a byte size
/// fixed when the channel is opened. Senders block while the slot is full,
/// receivers block while it is empty.
pub struct Channel {
    element_size: usize,
    /// Byte count currently held in the slot; zero means empty.
    stored_bytes: AtomicU32,
    buffer: Mutex<Box<[u8]>>,
    sender: Condvar,
    receiver: Condvar,
}

impl Channel {
    /// Opens a channel carrying elements of `element_size` bytes.
    pub fn open(element_size: usize) -> Channel {
        assert!(element_size > 0, "channel elements cannot be empty");
        assert!(element_size <= u32::max_value() as usize);

        Channel {
            element_size,
            stored_bytes: AtomicU32::new(0),
            buffer: Mutex::new(vec![0u8; element_size].into_boxed_slice()),
            sender: Condvar::new(),
            receiver: Condvar::new(),
        }
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Bytes currently held in the slot.
    pub fn stored_bytes(&self) -> u32 {
        self.stored_bytes.load(Ordering::SeqCst)
    }

    /// Copies one element into the slot, blocking until the slot is empty.
    /// Returns the number of bytes copied from `input`.
    pub fn send(&self, input: &[u8]) -> u32 {
        let mut buffer = self.buffer.lock().unwrap();

        while self.stored_bytes.load(Ordering::SeqCst) != 0 {
            buffer = self.sender.wait(buffer).unwrap();
        }

        let copied = input.len().min(self.element_size);
        buffer[..copied].copy_from_slice(&input[..copied]);
        self.stored_bytes
            .store(self.element_size as u32, Ordering::SeqCst);
        self.receiver.notify_one();

        copied as u32
    }

    /// Copies the slotted element into `output`, blocking until a sender has
    /// filled the slot. Returns the number of bytes copied out.
    pub fn receive(&self, output: &mut [u8]) -> u32 {
        let mut buffer = self.buffer.lock().unwrap();

        while self.stored_bytes.load(Ordering::SeqCst) == 0 {
            buffer = self.receiver.wait(buffer).unwrap();
        }

        let copied = output.len().min(self.element_size);
        output[..copied].copy_from_slice(&buffer[..copied]);
        self.stored_bytes.store(0, Ordering::SeqCst);
        self.sender.notify_one();

        copied as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn rendezvous_round_trips_bytes() {
        let channel = Arc::new(Channel::open(8));
        let payload = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

        let sender = {
            let channel = channel.clone();

            thread::spawn(move || {
                assert_eq!(channel.send(&payload), 8);
            })
        };

        let mut received = [0u8; 8];
        assert_eq!(channel.receive(&mut received), 8);
        sender.join().unwrap();

        assert_eq!(received, payload);
        assert_eq!(channel.stored_bytes(), 0);
    }

    #[test]
    fn holds_at_most_one_message() {
        let channel = Arc::new(Channel::open(4));

        let sender = {
            let channel = channel.clone();

            thread::spawn(move || {
                channel.send(&1u32.to_le_bytes());
                // Blocks until the first message is drained.
                channel.send(&2u32.to_le_bytes());
            })
        };

        let mut received = [0u8; 4];
        channel.receive(&mut received);
        assert_eq!(u32::from_le_bytes(received), 1);

        channel.receive(&mut received);
        assert_eq!(u32::from_le_bytes(received), 2);

        sender.join().unwrap();
        assert_eq!(channel.stored_bytes(), 0);
    }

    #[test]
    fn short_reads_and_writes_clamp_to_element_size() {
        let channel = Channel::open(4);

        assert_eq!(channel.send(&[0xAA, 0xBB]), 2);
        assert_eq!(channel.stored_bytes(), 4);

        let mut received = [0u8; 2];
        assert_eq!(channel.receive(&mut received), 2);
        assert_eq!(received, [0xAA, 0xBB]);
        assert_eq!(channel.stored_bytes(), 0);
    }

    #[test]
    fn many_hand_offs_in_order() {
        let channel = Arc::new(Channel::open(8));

        let sender = {
            let channel = channel.clone();

            thread::spawn(move || {
                for value in 0..100u64 {
                    channel.send(&value.to_le_bytes());
                }
            })
        };

        for expected in 0..100u64 {
            let mut received = [0u8; 8];
            channel.receive(&mut received);
            assert_eq!(u64::from_le_bytes(received), expected);
        }

        sender.join().unwrap();
    }
}
