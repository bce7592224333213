pub mod walk;

pub use walk::{discover, DiscoveryOptions, FileDiscovery, TraversalError};
