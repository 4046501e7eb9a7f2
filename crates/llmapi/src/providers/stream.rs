use super::base::StreamCallback;

/// Drives a [`StreamCallback`] on behalf of an adapter.
///
/// Fragments are forwarded in order and collected; [`StreamSink::finish`]
/// consumes the sink, so the final `done` signal can only be sent once.
pub struct StreamSink<'a, 'b> {
    callback: &'a mut StreamCallback<'b>,
    text: String,
    fragments: usize,
}

impl<'a, 'b> StreamSink<'a, 'b> {
    pub fn new(callback: &'a mut StreamCallback<'b>) -> Self {
        Self {
            callback,
            text: String::new(),
            fragments: 0,
        }
    }

    /// Forward one fragment. Empty fragments are dropped.
    pub fn emit(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.text.push_str(fragment);
        self.fragments += 1;
        (self.callback)(fragment, false);
    }

    /// Everything emitted so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Signal completion and return the aggregated text
    pub fn finish(mut self) -> String {
        (self.callback)("", true);
        tracing::trace!(fragments = self.fragments, "stream finished");
        self.text
    }
}

/// Split `text` into fragments of at most `max_chars` characters, on char boundaries
pub fn split_fragments(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut fragments = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == max_chars {
            fragments.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        fragments.push(&text[start..]);
    }
    fragments
}
