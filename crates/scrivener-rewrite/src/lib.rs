//! Rewrite-target computation (§4.7.7): which sections a rewrite pass
//! must regenerate, how they're batched across re-entries into the
//! `rewrite` queue, and how a freshly generated section is spliced back
//! into the draft.

mod affected;
mod batch;
mod splice;

pub use affected::affected_sections;
pub use batch::{combine_extra_guidance, is_rewrite_done, next_rewrite_batch};
pub use splice::splice_section;
