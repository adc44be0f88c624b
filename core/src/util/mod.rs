pub mod ring;
pub mod strings;

pub use ring::TailBuffer;
pub use strings::{safe_truncate, sanitize_output, truncate, truncate_bytes};
