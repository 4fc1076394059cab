//! Frame encoding.
//!
//! ```text
//! event:<name>\n     omitted when the event name is empty
//! data:<line 1>\n
//! data:<line n>\n
//! \n                 blank line ends the frame
//! ```

use streamer_core::Message;

/// Comment-only keep-alive frame.
pub const HEARTBEAT_FRAME: &str = ":\n\n";

const EVENT_FIELD: &str = "event:";
const DATA_FIELD: &str = "data:";

/// Encodes a message as one complete frame.
pub fn encode(message: &Message) -> String {
    let mut frame = String::with_capacity(frame_len(message));
    encode_into(message, &mut frame);
    frame
}

/// Appends the frame for `message` to `out`.
pub fn encode_into(message: &Message, out: &mut String) {
    if !message.is_default_event() {
        out.push_str(EVENT_FIELD);
        out.push_str(message.event());
        out.push('\n');
    }

    for line in message.lines() {
        out.push_str(DATA_FIELD);
        out.push_str(line);
        out.push('\n');
    }

    out.push('\n');
}

fn frame_len(message: &Message) -> usize {
    let event = if message.is_default_event() {
        0
    } else {
        EVENT_FIELD.len() + message.event().len() + 1
    };
    let data: usize = message
        .lines()
        .iter()
        .map(|line| DATA_FIELD.len() + line.len() + 1)
        .sum();
    event + data + 1
}
