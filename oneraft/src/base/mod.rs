//! Basic types used in the OneRaft implementation.

pub mod display_ext;

pub use display_ext::DisplayOption;
pub use display_ext::DisplayOptionExt;
pub use display_ext::DisplaySlice;
pub use display_ext::DisplaySliceExt;
