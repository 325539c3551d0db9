/// Ordered `(needle, label)` table, evaluated top to bottom on the lowercased
/// error text. More specific needles come first so that, for example, a reset
/// is never reported as a bare `EOF`.
const ERROR_LABELS: [(&str, &str); 12] = [
    ("connection reset by peer", "connection reset by peer"),
    ("connection reset", "connection reset by peer"),
    ("connection refused", "connection refused"),
    (
        "use of closed network connection",
        "use of closed network connection",
    ),
    ("broken pipe", "broken pipe"),
    ("no buffer space available", "no buffer space available"),
    ("i/o timeout", "i/o timeout"),
    ("timed out", "i/o timeout"),
    ("connection closed before message completed", "EOF"),
    ("incomplete message", "EOF"),
    ("unexpected eof", "EOF"),
    ("eof", "EOF"),
];

/// Maps a transport error message to a coarse label.
///
/// The first matching needle wins; text matching nothing is returned as-is so
/// it still gets its own histogram bucket.
#[must_use]
pub fn classify_transport_error(message: &str) -> String {
    let lowered = message.to_ascii_lowercase();
    ERROR_LABELS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map_or_else(|| message.to_owned(), |(_, label)| (*label).to_owned())
}
