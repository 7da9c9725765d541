use thiserror::Error;

/// Errors produced while reading or decoding event envelopes.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The underlying reader failed.
    #[error("Failed to read events: {0}")]
    Io(#[from] std::io::Error),

    /// An envelope could not be decoded into an event.
    #[error("Malformed event on line {line}: {message}")]
    Malformed {
        /// 1-based line number of the envelope in the input.
        line: usize,
        /// What was wrong with it.
        message: String,
    },
}
