use serde_json::Value;
use tokio::sync::mpsc;

/// Pulls every frame currently queued for a client and decodes it.
pub fn drain_messages(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut messages = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        for line in frame.lines() {
            messages.push(serde_json::from_str(line).expect("outbound frame is JSON"));
        }
    }
    messages
}

pub fn message_types(messages: &[Value]) -> Vec<String> {
    messages
        .iter()
        .map(|msg| msg["type"].as_str().unwrap_or_default().to_string())
        .collect()
}

pub fn find_message<'a>(messages: &'a [Value], kind: &str) -> Option<&'a Value> {
    messages.iter().find(|msg| msg["type"] == kind)
}
