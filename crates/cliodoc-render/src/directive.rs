//! Directive scanning and parsing.
//!
//! Two syntaxes are recognized. Template directives sit between the
//! configured delimiters:
//!
//! ```text
//! {{ run "ls" long=true "src" }}
//! {{/* comments render to nothing */}}
//! ```
//!
//! YAML marker blocks carry a mapping inside an HTML comment:
//!
//! ```text
//! <!-- cliodoc
//! program: ls
//! values:
//!   long: true
//! -->
//! ```
//!
//! A single newline directly after a YAML block's closing `-->` belongs to the
//! block, so block output is not followed by a blank line.

use crate::options::Delimiters;
use cliodoc_program::Program;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// Opening marker of YAML directive blocks.
pub const YAML_MARKER_OPEN: &str = "<!-- cliodoc";
/// Closing marker of YAML directive blocks.
pub const YAML_MARKER_CLOSE: &str = "-->";

const RUN_ACTION: &str = "run";

/// A piece of a scanned document.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    /// Literal text, copied to the output.
    Text(&'a str),
    /// An embedded directive.
    Directive(Directive<'a>),
}

/// Syntax a directive was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Template,
    YamlMarker,
}

/// A directive found in a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive<'a> {
    pub syntax: Syntax,
    /// Text between the markers.
    pub body: &'a str,
    /// 1-based line of the opening marker.
    pub line: usize,
}

/// Scanning failures, located by line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    Unterminated { line: usize, closing: String },
}

/// Which program a directive targets.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProgramRef {
    /// A registered program, or an ad hoc one when creation is allowed.
    Name(String),
    /// A full program definition.
    Inline(Box<Program>),
}

impl ProgramRef {
    /// Name of the targeted program.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Inline(program) => &program.name,
        }
    }
}

/// A parsed request to run a program.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: ProgramRef,
    /// `key=value` bindings in the order written.
    pub bindings: Vec<(String, Value)>,
    /// Bare words, bound to positional args in order.
    pub positionals: Vec<String>,
    /// Stdin override.
    pub stdin: Option<String>,
}

/// What a directive asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Render nothing.
    Comment,
    /// Run a program and substitute its output.
    Run(Invocation),
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

fn find_yaml_marker(text: &str, from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(found) = text[search..].find(YAML_MARKER_OPEN) {
        let start = search + found;
        let after = start + YAML_MARKER_OPEN.len();
        match text[after..].chars().next() {
            Some(c) if c.is_whitespace() => return Some(start),
            None => return Some(start),
            _ => search = after,
        }
    }
    None
}

/// Offset of the right delimiter closing a template body that starts at
/// `from`.
///
/// Delimiters inside double-quoted words (with `\"` and `\\` escapes) do not
/// close the directive. A comment body (`/* ... */`) ends at the first
/// delimiter after `*/` and may contain unbalanced quotes.
fn find_template_close(text: &str, from: usize, close: &str) -> Option<usize> {
    let body = &text[from..];
    let leading = body.len() - body.trim_start().len();
    if body[leading..].starts_with("/*") {
        let comment_end = from + leading + body[leading..].find("*/")? + 2;
        return text[comment_end..].find(close).map(|i| comment_end + i);
    }

    let mut quoted = false;
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        if quoted {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => quoted = false,
                _ => {}
            }
        } else if c == '"' {
            quoted = true;
        } else if body[i..].starts_with(close) {
            return Some(from + i);
        }
    }
    None
}

/// Split `text` into literal segments and directives.
///
/// Only the enabled syntaxes are recognized; whichever opening marker comes
/// first wins, and a directive's body is never scanned again.
pub fn scan<'a>(
    text: &'a str,
    delimiters: &Delimiters,
    with_template: bool,
    with_yaml_markers: bool,
) -> Result<Vec<Segment<'a>>, ScanError> {
    let mut segments = Vec::new();
    let mut pos = 0;

    loop {
        let template = with_template
            .then(|| text[pos..].find(&delimiters.left).map(|i| pos + i))
            .flatten();
        let yaml = with_yaml_markers
            .then(|| find_yaml_marker(text, pos))
            .flatten();

        let (start, syntax) = match (template, yaml) {
            (Some(t), Some(y)) if y < t => (y, Syntax::YamlMarker),
            (Some(t), _) => (t, Syntax::Template),
            (None, Some(y)) => (y, Syntax::YamlMarker),
            (None, None) => break,
        };

        if start > pos {
            segments.push(Segment::Text(&text[pos..start]));
        }

        let (open, close) = match syntax {
            Syntax::Template => (delimiters.left.as_str(), delimiters.right.as_str()),
            Syntax::YamlMarker => (YAML_MARKER_OPEN, YAML_MARKER_CLOSE),
        };

        let body_start = start + open.len();
        let line = line_of(text, start);
        let body_end = match syntax {
            Syntax::Template => find_template_close(text, body_start, close),
            Syntax::YamlMarker => text[body_start..].find(close).map(|i| body_start + i),
        }
        .ok_or_else(|| ScanError::Unterminated {
            line,
            closing: close.to_string(),
        })?;

        segments.push(Segment::Directive(Directive {
            syntax,
            body: &text[body_start..body_end],
            line,
        }));

        pos = body_end + close.len();
        if syntax == Syntax::YamlMarker {
            if text[pos..].starts_with("\r\n") {
                pos += 2;
            } else if text[pos..].starts_with('\n') {
                pos += 1;
            }
        }
    }

    if pos < text.len() {
        segments.push(Segment::Text(&text[pos..]));
    }
    Ok(segments)
}

/// A word of a template directive; `key` is set for `key=value` words.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Word {
    key: Option<String>,
    text: String,
}

/// Split a template body into words.
///
/// Double quotes group whitespace and understand `\"`, `\\`, `\n` and `\t`.
/// An unquoted `=` after a non-empty prefix turns the word into a binding.
fn split_words(body: &str) -> Result<Vec<Word>, String> {
    let mut words = Vec::new();
    let mut chars = body.chars().peekable();

    loop {
        while chars.peek().map_or(false, |c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut text = String::new();
        let mut key = None;
        let mut quoted = false;

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
            match c {
                '"' => {
                    quoted = true;
                    loop {
                        match chars.next() {
                            None => return Err("unterminated quoted string".to_string()),
                            Some('"') => break,
                            Some('\\') => match chars.next() {
                                Some('n') => text.push('\n'),
                                Some('t') => text.push('\t'),
                                Some(other) => text.push(other),
                                None => return Err("dangling escape".to_string()),
                            },
                            Some(other) => text.push(other),
                        }
                    }
                }
                '=' if key.is_none() && !quoted && !text.is_empty() => {
                    key = Some(std::mem::take(&mut text));
                }
                other => text.push(other),
            }
        }

        words.push(Word { key, text });
    }

    Ok(words)
}

/// Parse the body of a template directive.
pub fn parse_template(body: &str) -> Result<Action, String> {
    let trimmed = body.trim();
    if trimmed.starts_with("/*") && trimmed.ends_with("*/") {
        return Ok(Action::Comment);
    }

    let mut words = split_words(trimmed)?.into_iter();
    match words.next() {
        Some(Word { key: None, text }) if text == RUN_ACTION => {}
        Some(Word { key: Some(key), .. }) => {
            return Err(format!("unsupported action {key:?}"));
        }
        Some(Word { text, .. }) => return Err(format!("unsupported action {text:?}")),
        None => return Err("empty directive".to_string()),
    }

    let name = match words.next() {
        Some(Word { key: None, text }) if !text.is_empty() => text,
        _ => return Err(format!("{RUN_ACTION} expects a program name")),
    };

    let mut bindings = Vec::new();
    let mut positionals = Vec::new();
    for word in words {
        match word.key {
            Some(key) => bindings.push((key, Value::String(word.text))),
            None => positionals.push(word.text),
        }
    }

    Ok(Action::Run(Invocation {
        program: ProgramRef::Name(name),
        bindings,
        positionals,
        stdin: None,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlDirective {
    program: ProgramRef,
    #[serde(default)]
    values: Mapping,
    #[serde(default)]
    stdin: Option<String>,
}

/// Parse the body of a YAML marker block.
pub fn parse_yaml(body: &str) -> Result<Action, String> {
    let directive: YamlDirective = serde_yaml::from_str(body).map_err(|e| e.to_string())?;

    let bindings = directive
        .values
        .into_iter()
        .map(|(key, value)| match key {
            Value::String(key) => Ok((key, value)),
            other => Err(format!("value keys must be strings, got {other:?}")),
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(Action::Run(Invocation {
        program: directive.program,
        bindings,
        positionals: Vec::new(),
        stdin: directive.stdin,
    }))
}

/// Parse a directive according to its syntax.
pub fn parse(directive: &Directive<'_>) -> Result<Action, String> {
    match directive.syntax {
        Syntax::Template => parse_template(directive.body),
        Syntax::YamlMarker => parse_yaml(directive.body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_default(text: &str) -> Vec<Segment<'_>> {
        scan(text, &Delimiters::default(), true, true).unwrap()
    }

    #[test]
    fn test_scan_template_directive() {
        let segments = scan_default("a {{ run \"echo\" }} b");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Text("a "));
        match &segments[1] {
            Segment::Directive(d) => {
                assert_eq!(d.syntax, Syntax::Template);
                assert_eq!(d.body, " run \"echo\" ");
                assert_eq!(d.line, 1);
            }
            other => panic!("unexpected segment {other:?}"),
        }
        assert_eq!(segments[2], Segment::Text(" b"));
    }

    #[test]
    fn test_scan_yaml_block_and_lines() {
        let text = "# Title\n\n<!-- cliodoc\nprogram: echo\n-->\nafter\n";
        let segments = scan_default(text);
        assert_eq!(segments[0], Segment::Text("# Title\n\n"));
        match &segments[1] {
            Segment::Directive(d) => {
                assert_eq!(d.syntax, Syntax::YamlMarker);
                assert_eq!(d.line, 3);
                assert_eq!(d.body, "\nprogram: echo\n");
            }
            other => panic!("unexpected segment {other:?}"),
        }
        assert_eq!(segments[2], Segment::Text("after\n"));
    }

    #[test]
    fn test_scan_ignores_other_comments() {
        let text = "<!-- cliodocs is not a marker --> <!-- plain -->";
        assert_eq!(scan_default(text), vec![Segment::Text(text)]);
    }

    #[test]
    fn test_scan_disabled_syntaxes() {
        let text = "{{ run x }} <!-- cliodoc\nprogram: y\n-->";
        let segments = scan(text, &Delimiters::default(), false, false).unwrap();
        assert_eq!(segments, vec![Segment::Text(text)]);

        let segments = scan(text, &Delimiters::default(), false, true).unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_scan_custom_delimiters() {
        let delimiters = Delimiters::new("<<", ">>").unwrap();
        let segments = scan("{{ kept }} <<run x>>", &delimiters, true, false).unwrap();
        assert_eq!(segments[0], Segment::Text("{{ kept }} "));
        assert!(matches!(&segments[1], Segment::Directive(d) if d.body == "run x"));
    }

    #[test]
    fn test_scan_quoted_right_delimiter() {
        let segments = scan(
            r#"{{ run "echo" "a}}b" "say \"}}\"" }} tail"#,
            &Delimiters::default(),
            true,
            false,
        )
        .unwrap();
        assert_eq!(segments.len(), 2);
        let Segment::Directive(directive) = &segments[0] else {
            panic!("expected a directive");
        };
        assert_eq!(directive.body, r#" run "echo" "a}}b" "say \"}}\"" "#);
        assert_eq!(segments[1], Segment::Text(" tail"));

        let Action::Run(invocation) = parse(directive).unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(invocation.positionals, vec!["a}}b", "say \"}}\""]);
    }

    #[test]
    fn test_scan_comment_with_lone_quote() {
        let segments = scan(
            r#"{{/* don't "close */}}after"#,
            &Delimiters::default(),
            true,
            false,
        )
        .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1], Segment::Text("after"));
    }

    #[test]
    fn test_scan_unterminated_quote() {
        let err = scan(r#"{{ run "echo }}"#, &Delimiters::default(), true, false).unwrap_err();
        assert!(matches!(err, ScanError::Unterminated { line: 1, .. }));
    }

    #[test]
    fn test_scan_unterminated() {
        let err = scan("ok\n{{ run x", &Delimiters::default(), true, true).unwrap_err();
        assert_eq!(
            err,
            ScanError::Unterminated {
                line: 2,
                closing: "}}".to_string()
            }
        );
    }

    #[test]
    fn test_parse_template_bindings() {
        let action =
            parse_template(r#" run "ls" long=true name="a b" "src dir" plain quote="say \"hi\"" "#)
                .unwrap();
        let Action::Run(invocation) = action else {
            panic!("expected a run action");
        };
        assert_eq!(invocation.program, ProgramRef::Name("ls".to_string()));
        assert_eq!(
            invocation.bindings,
            vec![
                ("long".to_string(), Value::from("true")),
                ("name".to_string(), Value::from("a b")),
                ("quote".to_string(), Value::from("say \"hi\"")),
            ]
        );
        assert_eq!(invocation.positionals, vec!["src dir", "plain"]);
    }

    #[test]
    fn test_quoted_equals_is_positional() {
        let Action::Run(invocation) = parse_template(r#"run x "a=b""#).unwrap() else {
            panic!("expected a run action");
        };
        assert!(invocation.bindings.is_empty());
        assert_eq!(invocation.positionals, vec!["a=b"]);
    }

    #[test]
    fn test_parse_template_errors() {
        assert_eq!(parse_template("/* note */").unwrap(), Action::Comment);
        assert!(parse_template("").is_err());
        assert!(parse_template(".Title").is_err());
        assert!(parse_template("run").is_err());
        assert!(parse_template(r#"run "unterminated"#).is_err());
    }

    #[test]
    fn test_parse_yaml_reference() {
        let action = parse_yaml("program: echo\nvalues:\n  msg: hi\n  count: 3\nstdin: data\n").unwrap();
        let Action::Run(invocation) = action else {
            panic!("expected a run action");
        };
        assert_eq!(invocation.program.name(), "echo");
        assert!(matches!(invocation.program, ProgramRef::Name(_)));
        assert_eq!(invocation.bindings[0], ("msg".to_string(), Value::from("hi")));
        assert_eq!(invocation.bindings[1], ("count".to_string(), Value::from(3)));
        assert_eq!(invocation.stdin.as_deref(), Some("data"));
    }

    #[test]
    fn test_parse_yaml_inline_program() {
        let action = parse_yaml("program:\n  name: hello\n  path: /bin/echo\n  rawFlags: [hello]\n").unwrap();
        let Action::Run(invocation) = action else {
            panic!("expected a run action");
        };
        match invocation.program {
            ProgramRef::Inline(program) => {
                assert_eq!(program.name, "hello");
                assert_eq!(program.raw_flags, vec!["hello"]);
            }
            other => panic!("expected an inline program, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_yaml_rejects_unknown_fields() {
        assert!(parse_yaml("program: echo\nextra: 1\n").is_err());
        assert!(parse_yaml("values: {}\n").is_err());
    }
}
