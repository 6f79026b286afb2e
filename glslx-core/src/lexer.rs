//! Lexer for the glslx shading language.

use crate::error::CoreError;
use crate::span::Range;

/// Kind of a token produced by the lexer.
///
/// The lexer does not attach meaning beyond the category; the grammar
/// interprets keyword and symbol text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    Symbol,
    Identifier,
    IntDecimal,
    IntOctal,
    IntHex,
    Float,
    Comment,
    /// A quoted path after `from`, quotes included.
    ImportString,
}

impl TokenKind {
    pub fn is_int(self) -> bool {
        matches!(
            self,
            TokenKind::IntDecimal | TokenKind::IntOctal | TokenKind::IntHex
        )
    }
}

/// A single token with its raw text and byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn range(&self) -> Range {
        Range::new(self.start, self.end)
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }
}

pub const KEYWORDS: &[&str] = &[
    // storage, layout, interpolation
    "attribute", "const", "uniform", "varying", "buffer", "shared", "layout", "centroid", "flat",
    "smooth", "noperspective", "patch", "sample", "in", "out", "inout", "invariant", "precise",
    // control flow
    "break", "continue", "do", "for", "while", "switch", "case", "default", "if", "else",
    "discard", "return",
    // precision
    "lowp", "mediump", "highp", "precision",
    // types
    "void", "bool", "int", "uint", "float", "double", "vec2", "vec3", "vec4", "ivec2", "ivec3",
    "ivec4", "uvec2", "uvec3", "uvec4", "bvec2", "bvec3", "bvec4", "mat2", "mat3", "mat4",
    "mat2x2", "mat2x3", "mat2x4", "mat3x2", "mat3x3", "mat3x4", "mat4x2", "mat4x3", "mat4x4",
    "sampler2D", "sampler3D", "samplerCube", "sampler2DShadow", "samplerCubeShadow",
    "sampler2DArray", "sampler2DArrayShadow", "isampler2D", "isampler3D", "isamplerCube",
    "isampler2DArray", "usampler2D", "usampler3D", "usamplerCube", "usampler2DArray", "struct",
    // literals
    "true", "false",
    // module system
    "import", "from", "as",
];

/// Operators and punctuation, longest first so the first hit is the longest.
const SYMBOLS: &[&str] = &[
    "<<=", ">>=", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "^^", "+=", "-=",
    "*=", "/=", "%=", "&=", "^=", "|=", "(", ")", "[", "]", "{", "}", ".", ",", ":", "=", ";", "!",
    "-", "~", "+", "*", "/", "%", "<", ">", "|", "^", "&", "?",
];

/// Type keywords that name a builtin type usable as a type specifier.
pub fn is_type_keyword(text: &str) -> bool {
    matches!(
        text,
        "void"
            | "bool"
            | "int"
            | "uint"
            | "float"
            | "double"
            | "vec2"
            | "vec3"
            | "vec4"
            | "ivec2"
            | "ivec3"
            | "ivec4"
            | "uvec2"
            | "uvec3"
            | "uvec4"
            | "bvec2"
            | "bvec3"
            | "bvec4"
    ) || text.starts_with("mat")
        || text.contains("sampler")
}

/// Lex a source string into tokens, comments included.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CoreError> {
    let mut lexer = Lexer {
        source,
        chars: source.as_bytes(),
        index: 0,
    };
    lexer.run()
}

struct Lexer<'src> {
    source: &'src str,
    chars: &'src [u8],
    index: usize,
}

/// Candidate categories in tie-breaking order.
const CATEGORIES: &[TokenKind] = &[
    TokenKind::Comment,
    TokenKind::ImportString,
    TokenKind::Keyword,
    TokenKind::Float,
    TokenKind::IntHex,
    TokenKind::IntOctal,
    TokenKind::IntDecimal,
    TokenKind::Identifier,
    TokenKind::Symbol,
];

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Result<Vec<Token>, CoreError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.index += 1;
                continue;
            }

            let start = self.index;
            let mut best: Option<(TokenKind, usize)> = None;
            for &kind in CATEGORIES {
                if let Some(len) = self.match_len(kind)? {
                    if best.is_none_or(|(_, best_len)| len > best_len) {
                        best = Some((kind, len));
                    }
                }
            }

            let Some((kind, len)) = best else {
                let ch = self.source[start..].chars().next().unwrap_or('\0');
                return Err(CoreError::LexError {
                    position: start,
                    message: format!("unexpected character {ch:?}"),
                });
            };

            self.index += len;
            tokens.push(Token {
                kind,
                text: self.source[start..self.index].to_string(),
                start,
                end: self.index,
            });
        }

        Ok(tokens)
    }

    /// Length of the longest prefix at the cursor matching `kind`.
    fn match_len(&self, kind: TokenKind) -> Result<Option<usize>, CoreError> {
        let rest = &self.chars[self.index..];
        Ok(match kind {
            TokenKind::Comment => self.comment_len(rest)?,
            TokenKind::ImportString => string_len(rest),
            TokenKind::Keyword => {
                let len = word_len(rest);
                let word = &self.source[self.index..self.index + len];
                (len > 0 && KEYWORDS.contains(&word)).then_some(len)
            }
            TokenKind::Identifier => Some(word_len(rest)).filter(|len| *len > 0),
            TokenKind::Float => float_len(rest),
            TokenKind::IntHex => hex_len(rest),
            TokenKind::IntOctal => octal_len(rest),
            TokenKind::IntDecimal => decimal_len(rest),
            TokenKind::Symbol => SYMBOLS
                .iter()
                .find(|symbol| rest.starts_with(symbol.as_bytes()))
                .map(|symbol| symbol.len()),
        })
    }

    fn comment_len(&self, rest: &[u8]) -> Result<Option<usize>, CoreError> {
        if rest.starts_with(b"//") {
            let len = rest.iter().position(|&ch| ch == b'\n').unwrap_or(rest.len());
            return Ok(Some(len));
        }
        if rest.starts_with(b"/*") {
            return match rest[2..].windows(2).position(|pair| pair == b"*/") {
                Some(offset) => Ok(Some(offset + 4)),
                None => Err(CoreError::LexError {
                    position: self.index,
                    message: "unterminated block comment".to_string(),
                }),
            };
        }
        Ok(None)
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }
}

fn string_len(rest: &[u8]) -> Option<usize> {
    if rest.first() != Some(&b'"') {
        return None;
    }
    rest[1..]
        .iter()
        .take_while(|&&ch| ch != b'\n')
        .position(|&ch| ch == b'"')
        .map(|offset| offset + 2)
}

fn word_len(rest: &[u8]) -> usize {
    match rest.first() {
        Some(&ch) if is_ident_start(ch) => {
            1 + rest[1..]
                .iter()
                .take_while(|&&ch| is_ident_continue(ch))
                .count()
        }
        _ => 0,
    }
}

fn digits(rest: &[u8]) -> usize {
    rest.iter().take_while(|ch| ch.is_ascii_digit()).count()
}

fn unsigned_suffix(rest: &[u8], len: usize) -> usize {
    match rest.get(len) {
        Some(b'u' | b'U') => len + 1,
        _ => len,
    }
}

fn decimal_len(rest: &[u8]) -> Option<usize> {
    let len = match rest.first()? {
        b'0' => 1,
        b'1'..=b'9' => digits(rest),
        _ => return None,
    };
    Some(unsigned_suffix(rest, len))
}

fn octal_len(rest: &[u8]) -> Option<usize> {
    if rest.first() != Some(&b'0') {
        return None;
    }
    let len = rest[1..]
        .iter()
        .take_while(|ch| (b'0'..=b'7').contains(ch))
        .count();
    (len > 0).then(|| unsigned_suffix(rest, len + 1))
}

fn hex_len(rest: &[u8]) -> Option<usize> {
    if !(rest.starts_with(b"0x") || rest.starts_with(b"0X")) {
        return None;
    }
    let len = rest[2..]
        .iter()
        .take_while(|ch| ch.is_ascii_hexdigit())
        .count();
    (len > 0).then(|| unsigned_suffix(rest, len + 2))
}

fn exponent_len(rest: &[u8]) -> usize {
    if !matches!(rest.first(), Some(b'e' | b'E')) {
        return 0;
    }
    let sign = usize::from(matches!(rest.get(1), Some(b'+' | b'-')));
    let len = digits(&rest[1 + sign..]);
    if len == 0 { 0 } else { 1 + sign + len }
}

fn float_len(rest: &[u8]) -> Option<usize> {
    let whole = digits(rest);
    let mut len = whole;
    let fractional = rest.get(len) == Some(&b'.');
    if fractional {
        let fraction = digits(&rest[len + 1..]);
        if whole == 0 && fraction == 0 {
            return None;
        }
        len += 1 + fraction;
    } else if whole == 0 {
        return None;
    }
    let exponent = exponent_len(&rest[len..]);
    if !fractional && exponent == 0 {
        return None;
    }
    len += exponent;
    if matches!(rest.get(len), Some(b'f' | b'F')) {
        len += 1;
    }
    Some(len)
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .expect("lex")
            .into_iter()
            .map(|token| (token.kind, token.text))
            .collect()
    }

    #[test]
    fn keywords_win_ties_but_not_longer_identifiers() {
        let tokens = kinds("in int input");
        assert_eq!(tokens[0], (TokenKind::Keyword, "in".to_string()));
        assert_eq!(tokens[1], (TokenKind::Keyword, "int".to_string()));
        assert_eq!(tokens[2], (TokenKind::Identifier, "input".to_string()));
    }

    #[test]
    fn classifies_numeric_literals() {
        let tokens = kinds("0 017 0x1Fu 42u 1.00 .5 2e3 1.5e-2f 3.");
        let expected = [
            TokenKind::IntDecimal,
            TokenKind::IntOctal,
            TokenKind::IntHex,
            TokenKind::IntDecimal,
            TokenKind::Float,
            TokenKind::Float,
            TokenKind::Float,
            TokenKind::Float,
            TokenKind::Float,
        ];
        let actual: Vec<_> = tokens.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(actual, expected);
        assert_eq!(tokens[2].1, "0x1Fu");
        assert_eq!(tokens[4].1, "1.00");
    }

    #[test]
    fn keeps_comments_as_tokens() {
        let tokens = kinds("a /* b */ + // c\n d");
        assert_eq!(tokens[1], (TokenKind::Comment, "/* b */".to_string()));
        assert_eq!(tokens[3], (TokenKind::Comment, "// c".to_string()));
        assert_eq!(tokens.len(), 5);
    }

    #[test]
    fn prefers_longest_symbol() {
        let tokens = kinds("a<<=b>>c");
        assert_eq!(tokens[1].1, "<<=");
        assert_eq!(tokens[3].1, ">>");
    }

    #[test]
    fn lexes_import_strings() {
        let tokens = kinds("import * from \"lib/noise.glsl\"");
        assert_eq!(
            tokens[3],
            (TokenKind::ImportString, "\"lib/noise.glsl\"".to_string())
        );
    }

    #[test]
    fn reports_unexpected_character_position() {
        let err = tokenize("float a = 1.0 @").unwrap_err();
        assert!(matches!(err, CoreError::LexError { position: 14, .. }));
    }

    #[test]
    fn reports_unterminated_block_comment() {
        let err = tokenize("a /* never closed").unwrap_err();
        assert!(matches!(err, CoreError::LexError { position: 2, .. }));
    }
}
