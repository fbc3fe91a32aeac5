//! Page context attached to every submission

pub mod metadata;

pub use metadata::{CONSOLE, ConsoleCapture, ConsoleLevel, LogEntry, PageInfo, PageMetadata};
