//! Hand-written recursive-descent parser for text VDF (spec §4.1).
//!
//! Grammar:
//!   map    := (pair)*
//!   pair   := string ( string | "{" map "}" )
//!   string := '"' ((escape | non-quote))* '"'
//!   escape := \" | \\ | \n | \t
//! `// ...` to end-of-line is skipped at token boundaries.

use super::{VdfMap, VdfValue};
use crate::error::VdfError;

pub fn decode_text(input: &[u8]) -> Result<VdfMap, VdfError> {
    let mut parser = Parser { buf: input, pos: 0 };
    let map = parser.parse_map(true)?;
    Ok(map)
}

struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    /// Skip whitespace and `//` line comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'/') if self.buf.get(self.pos + 1) == Some(&b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Parse a `map := (pair)*` body. `top_level` controls whether we stop
    /// at EOF (true, root map) or at `}` (false, nested map).
    fn parse_map(&mut self, top_level: bool) -> Result<VdfMap, VdfError> {
        let mut map = VdfMap::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    if top_level {
                        return Ok(map);
                    }
                    return Err(VdfError::MalformedText("unexpected end of input inside map".into()));
                }
                Some(b'}') => {
                    if top_level {
                        return Err(VdfError::MalformedText("unexpected '}' at top level".into()));
                    }
                    self.pos += 1;
                    return Ok(map);
                }
                Some(b'"') => {
                    let key = self.parse_string()?;
                    self.skip_trivia();
                    match self.peek() {
                        Some(b'"') => {
                            let value = self.parse_string()?;
                            map.insert(key, VdfValue::Str(value));
                        }
                        Some(b'{') => {
                            self.pos += 1;
                            let nested = self.parse_map(false)?;
                            map.insert(key, VdfValue::Map(nested));
                        }
                        _ => {
                            return Err(VdfError::MalformedText(format!(
                                "expected value for key '{key}'"
                            )));
                        }
                    }
                }
                Some(other) => {
                    return Err(VdfError::MalformedText(format!(
                        "unexpected byte 0x{other:02x} where a key was required"
                    )));
                }
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, VdfError> {
        debug_assert_eq!(self.peek(), Some(b'"'));
        self.pos += 1;
        let mut out: Vec<u8> = Vec::new();
        loop {
            match self.bump() {
                None => return Err(VdfError::MalformedText("unterminated string".into())),
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'"') => out.push(b'"'),
                    Some(b'\\') => out.push(b'\\'),
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(other) => {
                        // Unknown escape: pass both bytes through literally,
                        // matching how real-world VDF files often encode
                        // Windows paths with unescaped backslashes.
                        out.push(b'\\');
                        out.push(other);
                    }
                    None => return Err(VdfError::MalformedText("unterminated escape".into())),
                },
                Some(b) => out.push(b),
            }
        }
        String::from_utf8(out).map_err(|_| VdfError::EncodingError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_map() {
        let input = br#""appid" "413150" "name" "Stardew Valley""#;
        let map = decode_text(input).unwrap();
        assert_eq!(map.get("appid").and_then(|v| v.as_str()), Some("413150"));
        assert_eq!(map.get("name").and_then(|v| v.as_str()), Some("Stardew Valley"));
    }

    #[test]
    fn nested_map() {
        let input = br#"
            "AppState"
            {
                "appid" "413150"
                "UserConfig"
                {
                    "language" "english"
                }
            }
        "#;
        let map = decode_text(input).unwrap();
        let app_state = map.get("AppState").unwrap().as_map().unwrap();
        assert_eq!(app_state.get("appid").and_then(|v| v.as_str()), Some("413150"));
        let user_config = app_state.get("UserConfig").unwrap().as_map().unwrap();
        assert_eq!(user_config.get("language").and_then(|v| v.as_str()), Some("english"));
    }

    #[test]
    fn line_comment_skipped() {
        let input = b"// a comment\n\"key\" \"value\" // trailing\n";
        let map = decode_text(input).unwrap();
        assert_eq!(map.get("key").and_then(|v| v.as_str()), Some("value"));
    }

    #[test]
    fn escapes() {
        let input = br#""key" "line\nbreak\ttab\"quote\\slash""#;
        let map = decode_text(input).unwrap();
        assert_eq!(
            map.get("key").and_then(|v| v.as_str()),
            Some("line\nbreak\ttab\"quote\\slash")
        );
    }

    #[test]
    fn unterminated_string_is_malformed() {
        let input = br#""key" "unterminated"#;
        assert!(matches!(decode_text(input), Err(VdfError::MalformedText(_))));
    }

    #[test]
    fn missing_value_is_malformed() {
        let input = br#""key" }"#;
        assert!(matches!(decode_text(input), Err(VdfError::MalformedText(_))));
    }

    #[test]
    fn duplicate_keys_overwrite() {
        let input = br#""key" "first" "key" "second""#;
        let map = decode_text(input).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("key").and_then(|v| v.as_str()), Some("second"));
    }

    #[test]
    fn round_trip_preserves_structure() {
        let input = br#""a" "1" "b" { "c" "2" }"#;
        let map = decode_text(input).unwrap();
        let serialized = super::super::text_test_helpers::to_canonical(&map);
        let reparsed = decode_text(serialized.as_bytes()).unwrap();
        assert_eq!(map, reparsed);
    }
}
