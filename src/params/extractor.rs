//! Lexical placeholder extraction.
//!
//! Runs before the parser, so it only knows about strings, quoted
//! identifiers, comments and words. Placeholder-like text inside any of
//! those is never reported.

use nom::IResult;

use super::{ParameterDescriptor, ParameterStyle, SemanticType, Span, StyleFamily};
use crate::dialect::Dialect;
use crate::scan;

/// Finds placeholders of the recognized styles in SQL text.
#[derive(Debug, Clone)]
pub struct ParameterExtractor {
    dialect: Dialect,
    styles: Vec<ParameterStyle>,
}

enum Skip {
    /// Not an opaque run; try a placeholder here.
    No,
    /// Skip this many bytes.
    Consumed(usize),
    /// Unterminated run; nothing after this point can hold a placeholder.
    ToEnd,
}

impl ParameterExtractor {
    pub fn new(dialect: Dialect, styles: impl IntoIterator<Item = ParameterStyle>) -> Self {
        let mut recognized: Vec<ParameterStyle> = Vec::new();
        for style in styles {
            if !recognized.contains(&style) {
                recognized.push(style);
            }
        }
        Self {
            dialect,
            styles: recognized,
        }
    }

    /// Extractor recognizing the dialect's usual styles.
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self::new(dialect, dialect.recognized_parameter_styles().iter().copied())
    }

    pub fn styles(&self) -> &[ParameterStyle] {
        &self.styles
    }

    /// Extract every placeholder occurrence, in textual order.
    pub fn extract(&self, sql: &str) -> Vec<ParameterDescriptor> {
        let mut descriptors = Vec::new();
        let mut sequential = 0;
        let mut pos = 0;

        while pos < sql.len() {
            match self.skip(sql, pos) {
                Skip::Consumed(n) => {
                    pos += n;
                    continue;
                }
                Skip::ToEnd => break,
                Skip::No => {}
            }

            let rest = &sql[pos..];
            if let Some(found) = scan::placeholder(rest, &self.styles) {
                let position = match found.style.family() {
                    StyleFamily::Sequential => {
                        sequential += 1;
                        Some(sequential - 1)
                    }
                    StyleFamily::Numbered => found.number.map(|n| n - 1),
                    StyleFamily::Named => None,
                };
                descriptors.push(ParameterDescriptor {
                    ordinal: descriptors.len(),
                    style: found.style,
                    position,
                    name: found.name.map(str::to_string),
                    span: Span {
                        start: pos,
                        end: pos + found.len,
                    },
                    value: None,
                    semantic_type: SemanticType::Unknown,
                });
                pos += found.len;
                continue;
            }

            pos += rest.chars().next().map(char::len_utf8).unwrap_or(1);
        }

        tracing::trace!(count = descriptors.len(), "extracted placeholders");
        descriptors
    }

    fn skip(&self, sql: &str, pos: usize) -> Skip {
        let rest = &sql[pos..];
        let Some(c) = rest.chars().next() else {
            return Skip::ToEnd;
        };
        let run = |result: IResult<&str, &str>| match result {
            Ok((_, raw)) => Skip::Consumed(raw.len()),
            Err(_) => Skip::ToEnd,
        };
        let dialect = self.dialect;

        match c {
            '\'' => run(scan::quoted(
                rest,
                '\'',
                '\'',
                dialect.backslash_escapes() || escape_string_prefix(sql, pos),
            )),
            '"' if dialect.double_quoted_strings() => {
                run(scan::quoted(rest, '"', '"', dialect.backslash_escapes()))
            }
            '-' if rest.starts_with("--") => run(scan::line_comment(rest, false)),
            '#' if dialect.hash_comments() => run(scan::line_comment(rest, true)),
            '/' if rest.starts_with("/*") => run(scan::block_comment(rest)),
            '$' if dialect.dollar_quoted_strings() => match scan::dollar_quoted(rest) {
                Ok((_, raw)) => Skip::Consumed(raw.len()),
                Err(_) => Skip::No,
            },
            ':' if rest.starts_with("::") || rest.starts_with(":=") => Skip::Consumed(2),
            '%' if rest.starts_with("%%") => Skip::Consumed(2),
            '@' if rest.starts_with("@@") => {
                let name = scan::identifier(&rest[2..]).map(|(_, n)| n.len()).unwrap_or(0);
                Skip::Consumed(2 + name)
            }
            c if scan::is_ident_start(c) => match scan::word(rest) {
                Ok((_, word)) => Skip::Consumed(word.len()),
                Err(_) => Skip::No,
            },
            c => match dialect.identifier_quotes().iter().find(|(open, _)| *open == c) {
                Some((open, close)) => run(scan::quoted(rest, *open, *close, false)),
                None => Skip::No,
            },
        }
    }
}

/// `E'...'` strings honour backslash escapes.
pub(crate) fn escape_string_prefix(sql: &str, quote_pos: usize) -> bool {
    let before = &sql[..quote_pos];
    let mut chars = before.chars().rev();
    match (chars.next(), chars.next()) {
        (Some('e' | 'E'), None) => true,
        (Some('e' | 'E'), Some(prev)) => !scan::is_ident_char(prev),
        _ => false,
    }
}
