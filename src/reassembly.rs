//! Reassembly of JSON objects split across SSE lines and transport chunks.
//!
//! The API streams one JSON object per logical update, but the transport may
//! cut it anywhere, including between braces. [`FragmentBuffer`] holds the
//! pieces until their concatenation forms a complete object.
//!
//! Completeness is a naive brace count: it does not know about string
//! literals, so a value containing a raw `{` or `}` can fool it.

/// Net count of `{` minus `}` over every character of `text`.
pub fn brace_balance(text: &str) -> i64 {
    text.chars().fold(0, |count, c| match c {
        '{' => count + 1,
        '}' => count - 1,
        _ => count,
    })
}

/// Whether `text` looks like one complete JSON object.
///
/// Surrounding whitespace is ignored, so the space kept after `data:` does
/// not matter. The trimmed text must be non-empty, start with `{`, end with
/// `}`, and have a brace balance of exactly zero.
///
/// ```
/// use deltastream::reassembly::is_complete;
///
/// assert!(is_complete(" {\"id\":1}"));
/// assert!(!is_complete("{\"id\":1,"));
/// assert!(!is_complete("}{"));
/// ```
pub fn is_complete(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && text.starts_with('{') && text.ends_with('}') && brace_balance(text) == 0
}

/// Balance-only test: `text` still has unmatched braces.
///
/// This is weaker than `!is_complete(text)`: `"}{"` is neither complete nor
/// incomplete by this measure.
pub fn is_incomplete(text: &str) -> bool {
    brace_balance(text) != 0
}

/// State of a [`FragmentBuffer`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferState {
    /// No pending fragments.
    Empty,
    /// One or more fragments whose concatenation is not yet complete.
    Accumulating,
}

/// Ordered fragments of JSON text awaiting concatenation into one message.
///
/// Concatenating the held fragments never yields a complete object: the
/// moment it would, the text is returned to the caller and the buffer is
/// cleared. Callers must feed lines sequentially; there is no locking.
///
/// Completeness of the concatenation is tracked incrementally (running
/// balance plus the first and last non-whitespace characters), so each push
/// costs time proportional to the new fragment only.
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    fragments: Vec<String>,
    pending_bytes: usize,
    balance: i64,
    first: Option<char>,
    last: Option<char>,
}

impl FragmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BufferState {
        if self.fragments.is_empty() {
            BufferState::Empty
        } else {
            BufferState::Accumulating
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of held fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Total bytes of text held across all fragments.
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// The held fragments joined in order.
    pub fn concatenated(&self) -> String {
        self.fragments.concat()
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
        self.pending_bytes = 0;
        self.balance = 0;
        self.first = None;
        self.last = None;
    }

    /// Feed the payload of a `data:` line.
    ///
    /// Returns the text of a complete message when one is recognized. A
    /// payload that is complete on its own is flushed as is; otherwise it is
    /// appended to the pending fragments.
    pub fn push_data(&mut self, payload: &str) -> Option<String> {
        if is_complete(payload) {
            self.clear();
            return Some(payload.to_string());
        }
        self.append(payload)
    }

    /// Feed a continuation line that carries no `data:` prefix.
    ///
    /// A line that is complete on its own replaces whatever was pending.
    /// Otherwise the line is joined onto the pending fragments, flushing the
    /// result once it completes. Empty lines are ignored.
    pub fn push_bare(&mut self, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }
        if is_complete(text) {
            self.clear();
            return Some(text.to_string());
        }
        self.append(text)
    }

    fn append(&mut self, fragment: &str) -> Option<String> {
        self.fragments.push(fragment.to_string());
        self.pending_bytes += fragment.len();
        self.balance += brace_balance(fragment);
        let mut visible = fragment.chars().filter(|c| !c.is_whitespace());
        if let Some(c) = visible.next() {
            self.first.get_or_insert(c);
            self.last = Some(visible.last().unwrap_or(c));
        }

        // Same outcome as is_complete on the joined text.
        if self.balance == 0 && self.first == Some('{') && self.last == Some('}') {
            let message = self.concatenated();
            self.clear();
            Some(message)
        } else {
            None
        }
    }
}
