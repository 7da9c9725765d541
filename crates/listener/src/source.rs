//! Newline-delimited envelope source.

use std::io::ErrorKind;

use async_trait::async_trait;
use dispatch::{Event, EventSource};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::envelope::decode_at;
use crate::ListenerError;

/// Reads one envelope per line from an async reader.
///
/// Blank lines are skipped. A malformed line is returned as an error carrying
/// its line number; the source stays usable and continues with the next line.
pub struct JsonLinesEventSource<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesEventSource<R> {
    /// Wraps `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl JsonLinesEventSource<BufReader<Stdin>> {
    /// Reads envelopes from the process's standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for JsonLinesEventSource<R> {
    type Error = ListenerError;

    async fn next_event(&mut self) -> Result<Option<Event>, ListenerError> {
        loop {
            let read = self.lines.next_line().await;
            let line = match read {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                // The undecodable line is consumed, so it still counts.
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    self.line_number += 1;
                    return Err(ListenerError::Malformed {
                        line: self.line_number,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            return decode_at(&line, self.line_number).map(Some);
        }
    }
}
