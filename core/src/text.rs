//! Immutable, cheaply clonable text values.
//!
//! Short strings are stored inline; anything longer than [`SMALL_CAPACITY`]
//! bytes moves to a shared allocation with an atomic reference count, so
//! cloning never copies the character data.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Byte length threshold below which text is stored inline.
pub const SMALL_CAPACITY: usize = 24;

#[derive(Clone)]
enum Repr {
    Small { len: u8, bytes: [u8; SMALL_CAPACITY] },
    Shared(Arc<[u8]>),
}

/// An immutable UTF-8 sequence. Both the character count and the byte count
/// are fixed at construction.
#[derive(Clone)]
pub struct Text {
    repr: Repr,
    chars: usize,
}

impl Text {
    pub fn new(source: &str) -> Text {
        let bytes = source.as_bytes();
        let chars = source.chars().count();

        let repr = if bytes.len() <= SMALL_CAPACITY {
            let mut inline = [0u8; SMALL_CAPACITY];
            inline[..bytes.len()].copy_from_slice(bytes);

            Repr::Small {
                len: bytes.len() as u8,
                bytes: inline,
            }
        } else {
            Repr::Shared(Arc::from(bytes))
        };

        Text { repr, chars }
    }

    pub fn empty() -> Text {
        Text::new("")
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.repr {
            Repr::Small { len, bytes } => &bytes[..usize::from(*len)],
            Repr::Shared(shared) => shared,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only constructible from `&str`, so the bytes are always valid UTF-8.
        unsafe { std::str::from_utf8_unchecked(self.as_bytes()) }
    }

    /// Number of characters.
    pub fn char_count(&self) -> usize {
        self.chars
    }

    /// Number of bytes.
    pub fn byte_count(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.byte_count() == 0
    }

    #[cfg(test)]
    pub(crate) fn shared_count(&self) -> Option<usize> {
        match &self.repr {
            Repr::Small { .. } => None,
            Repr::Shared(shared) => Some(Arc::strong_count(shared)),
        }
    }
}

impl Default for Text {
    fn default() -> Text {
        Text::empty()
    }
}

impl PartialEq for Text {
    fn eq(&self, that: &Text) -> bool {
        self.as_bytes() == that.as_bytes()
    }
}

impl Eq for Text {}

impl PartialEq<str> for Text {
    fn eq(&self, that: &str) -> bool {
        self.as_bytes() == that.as_bytes()
    }
}

impl Hash for Text {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // djb2 over the raw bytes.
        let mut hash: u64 = 5381;

        for &byte in self.as_bytes() {
            hash = hash.wrapping_mul(33).wrapping_add(u64::from(byte));
        }

        state.write_u64(hash);
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl From<&str> for Text {
    fn from(source: &str) -> Text {
        Text::new(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(text: &Text) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn round_trips_bytes_and_counts() {
        for source in &["", "ona", "0123456789012345678901234", "naïve héron"] {
            let text = Text::new(source);

            assert_eq!(text.as_bytes(), source.as_bytes());
            assert_eq!(text.as_str(), *source);
            assert_eq!(text.char_count(), source.chars().count());
            assert_eq!(text.byte_count(), source.len());
        }
    }

    #[test]
    fn small_boundary() {
        let at_capacity = "x".repeat(SMALL_CAPACITY);
        assert!(Text::new(&at_capacity).shared_count().is_none());

        let over_capacity = "x".repeat(SMALL_CAPACITY + 1);
        assert_eq!(Text::new(&over_capacity).shared_count(), Some(1));
    }

    #[test]
    fn clones_share_one_allocation() {
        let original = Text::new("a string long enough to be heap allocated");
        let copies: Vec<Text> = (0..4).map(|_| original.clone()).collect();

        assert_eq!(original.shared_count(), Some(5));

        drop(copies);

        assert_eq!(original.shared_count(), Some(1));
    }

    #[test]
    fn equality_and_hash_by_content() {
        let long = "another string long enough to be heap allocated";
        let a = Text::new(long);
        let b = Text::new(long);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(Text::new("left"), Text::new("right"));
        assert_eq!(Text::new("short"), *"short");
    }
}
