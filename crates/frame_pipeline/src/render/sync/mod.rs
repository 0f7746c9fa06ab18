//! CPU/GPU synchronization

pub mod completion;

pub use completion::CompletionCounter;
