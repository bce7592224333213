pub mod hash_index;

pub use hash_index::{Errors, Groups, HashGroup, HashIndex, IndexMeta};
