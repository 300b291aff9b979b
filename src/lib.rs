//! # dawgdict
//!
//! A static dictionary mapping byte-string keys to 31-bit values, stored as
//! a double-array trie compiled from a minimized
//! [DAWG](https://en.wikipedia.org/wiki/Deterministic_acyclic_finite_state_automaton).
//!
//! Keys go in once, sorted; the result is an immutable flat array of 32-bit
//! units that answers exact-match, common-prefix and incremental-traversal
//! queries with nothing but XORs and array reads. The image loads and
//! stores verbatim, and a borrowed reader runs the same queries over
//! memory-mapped bytes without copying.
//!
//! ## Features
//!
//! - **Compact**: suffix-sharing subgraphs collapse in the DAWG stage, and
//!   shared sibling groups keep sharing slots in the packed array
//! - **Fast**: lookups cost a handful of instructions per key byte, with no
//!   allocation and no pointer chasing beyond one table read
//! - **Portable**: the on-disk image is plain little-endian 32-bit words
//!
//! ## Quick start
//!
//! ```
//! use dawgdict::DoubleArray;
//!
//! let keys: Vec<&[u8]> = vec![b"a", b"ab", b"abc", b"b", b"bc"];
//! let dict = DoubleArray::build(&keys).unwrap();
//!
//! assert_eq!(dict.exact_match(b"abc"), Some(2));
//! assert_eq!(dict.exact_match(b"ba"), None);
//!
//! let prefixes: Vec<u32> = dict.common_prefix_search(b"abc").map(|m| m.value).collect();
//! assert_eq!(prefixes, vec![0, 1, 2]);
//! ```
//!
//! ## Explicit values and storage
//!
//! ```
//! use dawgdict::DoubleArray;
//!
//! let keys: Vec<&[u8]> = vec![b"one", b"three", b"two"];
//! let dict = DoubleArray::build_with_values(&keys, &[1, 3, 2]).unwrap();
//! assert_eq!(dict.exact_match(b"two"), Some(2));
//!
//! let bytes = dict.as_bytes();
//! let reloaded = DoubleArray::from_bytes(&bytes).unwrap();
//! assert_eq!(reloaded.exact_match(b"three"), Some(3));
//! ```

#![warn(missing_docs)]

mod bitvec;
mod build;
mod double_array;
mod io;
mod search;

pub mod dawg;

pub use dawg::{Dawg, DawgBuilder};
pub use double_array::{DoubleArrayUnit, UNIT_SIZE};
pub use search::{CommonPrefixIter, DoubleArray, DoubleArrayRef, Match, Traversal};

/// Errors reported while building a dictionary.
///
/// Every variant is a property of the input: a build either returns a
/// self-consistent image or one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// Keys arrived out of lexicographic order (or a key repeated).
    ///
    /// Carries the previously inserted key and the offending one.
    KeyOrder {
        /// The key inserted before the offending one.
        prev: Vec<u8>,
        /// The key that failed to sort strictly after `prev`.
        next: Vec<u8>,
    },
    /// A key was empty.
    EmptyKey,
    /// A key contained a `0x00` byte, which is reserved for the terminal
    /// label inside the trie.
    NulByte {
        /// The rejected key.
        key: Vec<u8>,
    },
    /// A value needed more than 31 bits.
    ValueOutOfRange {
        /// The rejected value.
        value: u32,
    },
    /// Layout ran past the encodable 29-bit offset range.
    OffsetOverflow {
        /// The offset that could not be encoded.
        offset: u32,
    },
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::KeyOrder { prev, next } => {
                write!(f, "key order violation: {prev:?} came before {next:?}")
            }
            BuildError::EmptyKey => write!(f, "empty keys cannot be stored"),
            BuildError::NulByte { key } => {
                write!(f, "key {key:?} contains the reserved byte 0x00")
            }
            BuildError::ValueOutOfRange { value } => {
                write!(f, "value {value} does not fit in 31 bits")
            }
            BuildError::OffsetOverflow { offset } => {
                write!(f, "offset {offset} exceeds the encodable 29-bit range")
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Errors reported while loading or storing a dictionary image.
#[derive(Debug)]
pub enum ImageError {
    /// The underlying file operation failed.
    Io(std::io::Error),
    /// The image is truncated, or its length is not a whole number of
    /// units.
    Truncated,
    /// A zero-copy view was requested over a buffer not aligned for 32-bit
    /// access.
    Misaligned,
    /// Refused to store an image with no units.
    Empty,
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::Io(err) => write!(f, "image i/o failed: {err}"),
            ImageError::Truncated => write!(f, "image is truncated or has a ragged length"),
            ImageError::Misaligned => write!(f, "image buffer is not 32-bit aligned"),
            ImageError::Empty => write!(f, "image holds no units"),
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImageError {
    fn from(err: std::io::Error) -> Self {
        ImageError::Io(err)
    }
}
