//! Final output assembly
//!
//! Segment files are joined by stream copy through the concat demuxer, with
//! an optional chapter sheet carrying markers and date tags. The finished
//! file then inherits its timestamps from the configured time source.

pub mod chapters;
pub mod timestamps;
pub mod writer;

pub use chapters::ChapterSheet;
pub use timestamps::{resolve_file_times, FileTimes};
pub use writer::OutputWriter;
