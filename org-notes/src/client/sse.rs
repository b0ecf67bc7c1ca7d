/// One `text/event-stream` frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental decoder for `text/event-stream` bodies. Chunks may split
/// frames, lines and UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct Decoder {
    buffer: Vec<u8>,
}

impl Decoder {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Next complete frame, skipping comment-only frames such as keep-alives.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&raw[..end]);

            if let Some(frame) = parse_frame(&text) {
                return Some(frame);
            }
        }
    }
}

fn parse_frame(text: &str) -> Option<Frame> {
    let mut frame = Frame::default();
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => frame.event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if frame.event.is_none() && data.is_empty() {
        return None;
    }
    frame.data = data.join("\n");
    Some(frame)
}
