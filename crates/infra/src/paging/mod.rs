//! Cursor pagination: sealed tokens, the paging engine and its row sources.

mod engine;
mod in_memory;
mod token;

pub use engine::{CursorSource, Paginator, SliceQuery, compare, traversal_order};
pub use in_memory::{InMemorySource, Queryable};
pub use token::{PageTokenCipher, TokenPayload, fingerprint};
