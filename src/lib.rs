#![forbid(unsafe_code)]
//! An embedded, single-file, append-only B+ tree key-value store.
//!
//! Every mutation appends new page/value blocks to the end of the
//! backing file and finishes by appending a fresh head block pointing at
//! the new root; nothing already on disk is ever overwritten in place.
//! Reclaiming space from superseded data is an explicit, offline
//! operation ([`Tree::compact`]).
//!
//! ```no_run
//! use logtree::Tree;
//!
//! # fn main() -> logtree::Result<()> {
//! let mut tree = Tree::open("example.db")?;
//! tree.set(b"hello", b"world")?;
//! assert_eq!(tree.get(b"hello")?, b"world");
//! # Ok(())
//! # }
//! ```

mod comparator;
mod compress;
mod config;
mod engine;
mod error;
mod head;
mod kv;
pub mod logger;
mod page;
mod tree;
mod writer;

pub use comparator::{DefaultComparator, KeyComparator};
pub use compress::{Compressor, GzipCompressor};
pub use config::{DEFAULT_PAGE_SIZE, FsyncPolicy, TreeConfig};
pub use error::{BpError, Result};
pub use tree::Tree;
