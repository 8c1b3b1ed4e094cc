//! Lexical scanning primitives.
//!
//! Shared by the parameter extractor and the tokenizer so both agree on what
//! counts as a string, a quoted identifier, a comment or a placeholder.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while, take_while1},
    character::complete::{anychar, char, digit1, satisfy},
    combinator::{not, opt, peek, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};

use crate::params::ParameterStyle;

/// Characters allowed after the first character of an identifier.
pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Characters allowed to start an identifier.
pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// An unquoted identifier.
pub fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(input)
}

/// An unquoted word: identifier characters plus `$` after the first.
pub fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(is_ident_start),
        take_while(|c: char| is_ident_char(c) || c == '$'),
    ))(input)
}

/// A `--` (or, when enabled, `#`) comment running to the end of the line.
pub fn line_comment(input: &str, hash: bool) -> IResult<&str, &str> {
    let (rest, _) = if hash {
        alt((tag("--"), tag("#")))(input)?
    } else {
        tag("--")(input)?
    };
    let (rest, _) = opt(is_not("\n"))(rest)?;
    Ok((rest, &input[..input.len() - rest.len()]))
}

/// A `/* ... */` comment. Fails when unterminated.
pub fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(delimited(tag("/*"), take_until("*/"), tag("*/")))(input)
}

/// A quoted run such as `'it''s'`, `"col"` or `[name]`.
///
/// The closing delimiter escapes itself by doubling. With `backslash` set, a
/// backslash escapes the next character. Returns the raw text including the
/// delimiters; fails when unterminated.
pub fn quoted(input: &str, open: char, close: char, backslash: bool) -> IResult<&str, &str> {
    let mut stop = String::from(close);
    if backslash {
        stop.push('\\');
    }
    let doubled: String = [close, close].iter().collect();
    let body = many0(alt((
        is_not(stop.as_str()),
        tag(doubled.as_str()),
        recognize(pair(char('\\'), anychar)),
    )));
    recognize(delimited(char(open), body, char(close)))(input)
}

/// Strip delimiters from a [`quoted`] run and resolve its escapes.
pub fn unquote(raw: &str, close: char, backslash: bool) -> String {
    let inner = {
        let mut chars = raw.chars();
        chars.next();
        chars.next_back();
        chars.as_str()
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == close && chars.peek() == Some(&close) {
            chars.next();
            out.push(close);
        } else if backslash && c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// A dollar-quoted body: `$$ ... $$` or `$tag$ ... $tag$`.
pub fn dollar_quoted(input: &str) -> IResult<&str, &str> {
    let (_, delimiter) = recognize(delimited(char('$'), opt(identifier), char('$')))(input)?;
    let (rest, _) = tag(delimiter)(input)?;
    let (rest, _) = take_until(delimiter)(rest)?;
    let (rest, _) = tag(delimiter)(rest)?;
    let consumed = input.len() - rest.len();
    Ok((rest, &input[..consumed]))
}

/// A numeric literal: `42`, `3.14`, `.5`, `1e10`, `2.5E-3`.
pub fn number(input: &str) -> IResult<&str, &str> {
    let exponent = recognize(pair(
        alt((char('e'), char('E'))),
        pair(opt(alt((char('+'), char('-')))), digit1),
    ));
    let digits_first = recognize(pair(digit1, opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit())))));
    let dot_first = recognize(pair(char('.'), digit1));
    recognize(pair(alt((digits_first, dot_first)), opt(exponent)))(input)
}

/// A placeholder recognized by [`placeholder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMatch<'a> {
    pub style: ParameterStyle,
    /// Name for named styles.
    pub name: Option<&'a str>,
    /// 1-based number for numbered styles.
    pub number: Option<usize>,
    /// Bytes consumed.
    pub len: usize,
}

/// Try each recognized style at the start of `input`.
///
/// Callers must have already ruled out `::`, `:=`, `@@` and `%%`.
pub fn placeholder<'a>(input: &'a str, styles: &[ParameterStyle]) -> Option<PlaceholderMatch<'a>> {
    styles.iter().find_map(|style| match_style(input, *style))
}

fn match_style(input: &str, style: ParameterStyle) -> Option<PlaceholderMatch<'_>> {
    let (len, name, number) = match style {
        ParameterStyle::Qmark => {
            if !input.starts_with('?') {
                return None;
            }
            (1, None, None)
        }
        ParameterStyle::Numeric => numbered(input, preceded(char('$'), digit1)(input))?,
        ParameterStyle::PositionalColon => numbered(input, preceded(char(':'), digit1)(input))?,
        ParameterStyle::NamedColon => named(input, preceded(char(':'), identifier)(input))?,
        ParameterStyle::NamedAt => named(input, preceded(char('@'), identifier)(input))?,
        ParameterStyle::NamedDollar => named(input, preceded(char('$'), identifier)(input))?,
        ParameterStyle::Format => {
            let result: IResult<&str, &str> =
                terminated(tag("%s"), not(peek(satisfy(is_ident_char))))(input);
            let (rest, _) = result.ok()?;
            (input.len() - rest.len(), None, None)
        }
        ParameterStyle::Pyformat => named(
            input,
            delimited(
                tag("%("),
                take_while1(|c: char| c != ')' && !c.is_whitespace()),
                tag(")s"),
            )(input),
        )?,
    };
    Some(PlaceholderMatch {
        style,
        name,
        number,
        len,
    })
}

type Found<'a> = (usize, Option<&'a str>, Option<usize>);

fn named<'a>(input: &'a str, result: IResult<&'a str, &'a str>) -> Option<Found<'a>> {
    let (rest, name) = result.ok()?;
    Some((input.len() - rest.len(), Some(name), None))
}

fn numbered<'a>(input: &'a str, result: IResult<&'a str, &'a str>) -> Option<Found<'a>> {
    let (rest, digits) = result.ok()?;
    let n: usize = digits.parse().ok()?;
    (n > 0).then_some((input.len() - rest.len(), None, Some(n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_doubling_and_backslash() {
        let (rest, raw) = quoted("'it''s' tail", '\'', '\'', false).unwrap();
        assert_eq!(raw, "'it''s'");
        assert_eq!(rest, " tail");
        assert_eq!(unquote(raw, '\'', false), "it's");

        let (_, raw) = quoted(r"'a\'b' x", '\'', '\'', true).unwrap();
        assert_eq!(raw, r"'a\'b'");
        assert_eq!(unquote(raw, '\'', true), "a'b");

        assert!(quoted("'open", '\'', '\'', false).is_err());
    }

    #[test]
    fn test_comments() {
        assert_eq!(line_comment("-- hi\nSELECT", false).unwrap(), ("\nSELECT", "-- hi"));
        assert!(line_comment("# hi", false).is_err());
        assert_eq!(line_comment("# hi", true).unwrap().1, "# hi");
        assert_eq!(block_comment("/* a ? */ b").unwrap(), (" b", "/* a ? */"));
        assert!(block_comment("/* open").is_err());
    }

    #[test]
    fn test_dollar_quoted() {
        assert_eq!(dollar_quoted("$$a $1 b$$ rest").unwrap(), (" rest", "$$a $1 b$$"));
        assert_eq!(dollar_quoted("$fn$x$fn$").unwrap().1, "$fn$x$fn$");
        assert!(dollar_quoted("$1").is_err());
    }

    #[test]
    fn test_number() {
        assert_eq!(number("42,").unwrap(), (",", "42"));
        assert_eq!(number("3.14)").unwrap().1, "3.14");
        assert_eq!(number(".5").unwrap().1, ".5");
        assert_eq!(number("1e10").unwrap().1, "1e10");
        assert_eq!(number("2.5E-3 ").unwrap().1, "2.5E-3");
    }

    #[test]
    fn test_placeholder_styles() {
        use ParameterStyle::*;
        let all = [Qmark, Numeric, NamedColon, PositionalColon, NamedAt, NamedDollar, Format, Pyformat];

        let m = placeholder("$12 ", &all).unwrap();
        assert_eq!((m.style, m.number, m.len), (Numeric, Some(12), 3));

        let m = placeholder(":user_id)", &all).unwrap();
        assert_eq!((m.style, m.name, m.len), (NamedColon, Some("user_id"), 8));

        let m = placeholder("%(name)s", &all).unwrap();
        assert_eq!((m.style, m.name), (Pyformat, Some("name")));

        assert_eq!(placeholder("%s,", &all).unwrap().style, Format);
        assert!(placeholder("%sum", &all).is_none());
        assert!(placeholder("$0", &[Numeric]).is_none());
        assert!(placeholder(":name", &[Qmark]).is_none());
    }
}
