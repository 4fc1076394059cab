//! The unit of delivery handed from producers to connection outboxes.

/// One event to push to a set of connections.
///
/// A message carries an optional event name and one or more data lines.
/// Input text is split on line breaks (`\n`, `\r\n` or a lone `\r`) so
/// every resulting line becomes its own `data:` line on the wire, in
/// order. Empty input still yields a single empty data line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    event: String,
    data: Vec<String>,
}

impl Message {
    /// Creates a message, splitting `data` into lines.
    ///
    /// Line breaks inside `event` are dropped: an event name must fit on
    /// a single `event:` line.
    pub fn new(event: impl Into<String>, data: &str) -> Self {
        let mut event = event.into();
        event.retain(|c| c != '\n' && c != '\r');

        Self {
            event,
            data: split_lines(data),
        }
    }

    /// Creates a message for the default event (no `event:` line).
    pub fn data(data: &str) -> Self {
        Self::new(String::new(), data)
    }

    /// The event name; empty means the default event.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Whether this message targets the client's default event handler.
    pub fn is_default_event(&self) -> bool {
        self.event.is_empty()
    }

    /// The data lines, in delivery order. Never empty.
    pub fn lines(&self) -> &[String] {
        &self.data
    }
}

fn split_lines(data: &str) -> Vec<String> {
    data.split('\n')
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
        .map(str::to_string)
        .collect()
}
