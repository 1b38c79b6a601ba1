// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

const WORK_TAG: &[u8] = b"W:";
const RESULT_TAG: &[u8] = b"R:";
const HEARTBEAT_TAG: &[u8] = b"H:";

/// The three messages exchanged between coordinator and workers.
///
/// Wire form is a 2-byte ASCII tag followed by the payload, with no length
/// prefix or terminator:
///
/// | Message     | Bytes          |
/// |-------------|----------------|
/// | `Work`      | `W:<token>`    |
/// | `Result`    | `R:<decimal>`  |
/// | `Heartbeat` | `H:`           |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    Work(String),
    Result(u64),
    Heartbeat,
}

impl ProtocolMessage {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ProtocolMessage::Work(token) => [WORK_TAG, token.as_bytes()].concat(),
            ProtocolMessage::Result(count) => {
                [RESULT_TAG, count.to_string().as_bytes()].concat()
            }
            ProtocolMessage::Heartbeat => HEARTBEAT_TAG.to_vec(),
        }
    }

    /// Decodes one message. Returns `None` for input shorter than the tag,
    /// an unknown tag, a non UTF-8 work token, or a result without a leading
    /// decimal number.
    ///
    /// A result only needs to *start* with digits (`R:12H:` decodes to
    /// `Result(12)`), so a heartbeat that coalesced behind a result in the
    /// same read does not cost the result. Anything after `H:` is ignored
    /// for the same reason.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }

        let (tag, rest) = data.split_at(2);
        match tag {
            WORK_TAG => String::from_utf8(rest.to_vec())
                .ok()
                .map(ProtocolMessage::Work),
            RESULT_TAG => parse_leading_decimal(rest).map(ProtocolMessage::Result),
            HEARTBEAT_TAG => Some(ProtocolMessage::Heartbeat),
            _ => None,
        }
    }
}

fn parse_leading_decimal(data: &[u8]) -> Option<u64> {
    let digits = data.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    // Digits are ASCII, so the slice is valid UTF-8; overflow yields None
    std::str::from_utf8(&data[..digits]).ok()?.parse().ok()
}
