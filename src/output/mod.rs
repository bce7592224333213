pub mod escape;
pub mod writer;

pub use escape::escape_posix;
pub use writer::{lossy_strings, Invocation, ResultWriter};
