// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::tracing::{Level, SpanMetadata};

/// One entry of a call stack's span list.
///
/// The source links these through raw pointers (parent cursor, parent level cap, sibling
/// pointers, a back-pointer to the owning stack). A `Vec` used as a stack gives the same
/// LIFO-list semantics without unsafe code; `span_destroy` is only ever legal on the top frame, so
/// a vector's `pop` is exactly the operation the source's unlink step performs.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) id: u64,
    pub(crate) metadata: SpanMetadata,
    pub(crate) saved_cursor: usize,
    pub(crate) saved_level_cap: Level,
}
