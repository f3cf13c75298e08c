//! Wire framing for the streaming chat protocol.
//!
//! Each frame is one line of text. Generated tokens are framed as
//! `0:<json string>` so embedded quotes and newlines cannot break the
//! framing; structured payloads are framed as `8:[<json value>]`. The numeric
//! prefix lets a client route a line without parsing the whole payload.

use serde_json::{Value, json};

use crate::node::Citation;

/// One unit of the streaming wire protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// An incremental fragment of generated text.
    Text(String),
    /// A structured payload, emitted once at the end of the stream.
    Data(Value),
}

impl Frame {
    /// The trailing data frame carrying every citation for the turn.
    pub fn sources(nodes: &[Citation]) -> Self {
        Frame::Data(json!({
            "type": "sources",
            "data": { "nodes": nodes },
        }))
    }

    /// Encode this frame as one line of the wire protocol.
    pub fn encode(&self) -> String {
        match self {
            Frame::Text(token) => format!("0:{}\n", Value::from(token.as_str())),
            Frame::Data(payload) => format!("8:[{payload}]\n"),
        }
    }

    /// Decode one line of the wire protocol.
    ///
    /// Returns `None` for unknown prefixes or malformed payloads so a client
    /// can skip lines it does not understand.
    pub fn decode(line: &str) -> Option<Frame> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        if let Some(rest) = line.strip_prefix("0:") {
            let token: String = serde_json::from_str(rest).ok()?;
            Some(Frame::Text(token))
        } else if let Some(rest) = line.strip_prefix("8:") {
            let payloads: Vec<Value> = serde_json::from_str(rest).ok()?;
            payloads.into_iter().next().map(Frame::Data)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn text_frames_are_json_escaped() {
        assert_eq!(Frame::Text("Hel".into()).encode(), "0:\"Hel\"\n");
        assert_eq!(Frame::Text(String::new()).encode(), "0:\"\"\n");
        assert_eq!(
            Frame::Text("line\nwith \"quotes\" and \\".into()).encode(),
            "0:\"line\\nwith \\\"quotes\\\" and \\\\\"\n"
        );
    }

    #[test]
    fn text_frames_round_trip() {
        for token in ["", "plain", "say \"hi\"", "back\\slash", "two\nlines", "tab\there"] {
            let encoded = Frame::Text(token.into()).encode();
            assert_eq!(Frame::decode(&encoded), Some(Frame::Text(token.into())));
        }
    }

    #[test]
    fn empty_sources_frame_matches_wire_bytes() {
        let frame = Frame::sources(&[]);
        assert_eq!(frame.encode(), "8:[{\"type\":\"sources\",\"data\":{\"nodes\":[]}}]\n");
    }

    #[test]
    fn sources_frame_carries_citations() {
        let citation = Citation {
            id: "n1".into(),
            metadata: Map::new(),
            score: Some(0.5),
            text: "passage".into(),
            url: None,
        };
        let encoded = Frame::sources(&[citation]).encode();
        assert!(encoded.starts_with("8:["));
        assert!(encoded.contains("\"nodes\":[{\"id\":\"n1\""));
        assert!(encoded.contains("\"url\":null"));
    }

    #[test]
    fn unknown_prefixes_decode_to_none() {
        assert_eq!(Frame::decode("9:\"x\"\n"), None);
        assert_eq!(Frame::decode("0:not-json\n"), None);
        assert_eq!(Frame::decode(""), None);
    }
}
