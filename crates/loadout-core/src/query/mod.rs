// ── Query cache ──
//
// Keyed async query results shared by every binding and consumer.

mod cache;
mod key;
mod stream;

pub use cache::{CacheEntry, QueryCache, QueryStatus};
pub use key::{CacheKey, KeySegment};
pub use stream::{QueryStream, QueryWatchStream, Snapshot};
