use super::value::ResetTrigger;

/// Single classified fragment of a data-set payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `key=value`: set or replace the entry.
    Upsert { key: String, value: String },
    /// Bare `key`: delete the entry if present.
    Remove { key: String },
    /// `:NAME`: discard accumulated state before applying the payload.
    Reset(ResetTrigger),
}

/// Tokens of one payload with the reset trigger hoisted in front of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedPayload {
    pub reset_trigger: Option<ResetTrigger>,
    /// Upsert and remove tokens in textual order.
    pub tokens: Vec<Token>,
}

impl TokenizedPayload {
    pub fn is_reset(&self) -> bool {
        self.reset_trigger.is_some()
    }
}

/// Splits a raw payload into tokens. Never fails: text without structure
/// degrades to bare-key tokens, and an unterminated quote swallows the rest
/// of the input together with the token it opened.
pub fn tokenize(raw: &str) -> Vec<Token> {
    let bytes = raw.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;

        if bytes[start] == b':' && start + 1 < bytes.len() && !bytes[start + 1].is_ascii_whitespace()
        {
            pos = scan_word(bytes, start + 1, false);
            tokens.push(Token::Reset(ResetTrigger::from_name(&raw[start + 1..pos])));
            continue;
        }

        pos = scan_word(bytes, start, true);
        let key = &raw[start..pos];
        if pos < bytes.len() && bytes[pos] == b'=' {
            match scan_value(raw, pos + 1) {
                Some((value, end)) => {
                    pos = end;
                    if !key.is_empty() {
                        tokens.push(Token::Upsert {
                            key: key.to_string(),
                            value: value.to_string(),
                        });
                    }
                }
                None => break,
            }
        } else {
            tokens.push(Token::Remove {
                key: key.to_string(),
            });
        }
    }
    tokens
}

/// Tokenizes and hoists the first reset-trigger token; later ones are ignored.
pub fn parse_payload(raw: &str) -> TokenizedPayload {
    let mut payload = TokenizedPayload::default();
    for token in tokenize(raw) {
        match token {
            Token::Reset(trigger) => {
                if payload.reset_trigger.is_none() {
                    payload.reset_trigger = Some(trigger);
                }
            }
            other => payload.tokens.push(other),
        }
    }
    payload
}

fn scan_word(bytes: &[u8], mut pos: usize, stop_at_equals: bool) -> usize {
    while pos < bytes.len() {
        let byte = bytes[pos];
        if byte.is_ascii_whitespace() || (stop_at_equals && byte == b'=') {
            break;
        }
        pos += 1;
    }
    pos
}

/// Returns the value starting at `pos` and the offset just past it, or `None`
/// when a quote or brace is never closed.
fn scan_value(raw: &str, pos: usize) -> Option<(&str, usize)> {
    let bytes = raw.as_bytes();
    let closer = match bytes.get(pos) {
        Some(b'\'') => b'\'',
        Some(b'"') => b'"',
        Some(b'{') => b'}',
        _ => {
            let end = scan_word(bytes, pos, false);
            return Some((&raw[pos..end], end));
        }
    };
    let body = pos + 1;
    bytes[body..]
        .iter()
        .position(|byte| *byte == closer)
        .map(|offset| (&raw[body..body + offset], body + offset + 1))
}
