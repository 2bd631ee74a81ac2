//! Interval selection and extraction.
//!
//! ```text
//! [RawInterval] ──resolve──► sorted keep list ──filter_short──► Selection
//!                  (cut ⇒ complement)                               │
//!                                                                   ▼
//!                                    extract each ──► concat demuxer ──► trimmed video
//! ```

mod apply;
mod selector;

pub use apply::{extract_and_concat, extract_command};
pub use selector::{complement, filter_short, resolve, select, Selection};

pub(crate) use apply::{concat_command, write_concat_list};
