//! Server-generated lines

/// Announcement sent to the other clients once a username is established.
pub fn joined_notice(username: &str) -> String {
    format!("{} has joined the chat.", username)
}

/// Announcement sent to the remaining clients when a joined client disconnects.
pub fn left_notice(username: &str) -> String {
    format!("{} has left the chat.", username)
}

/// A relayed chat line.
pub fn chat_line(username: &str, message: &str) -> String {
    format!("{}: {}", username, message)
}
