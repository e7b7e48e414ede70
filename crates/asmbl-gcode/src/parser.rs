//! G-Code line tokenizer
//!
//! Turns raw text lines into [`GcodeLine`] records. Only lines that start
//! with a `G`, `M` or `T` command word (optionally preceded by an `N` line
//! number) or that are pure `;` comments are recognized. Anything else is
//! not a meaningful instruction for the merger and is skipped, never
//! reported as an error.

use regex::Regex;
use std::sync::OnceLock;

use super::{Command, GcodeLine, ParamValue};

fn command_regex() -> &'static Regex {
    static COMMAND_REGEX: OnceLock<Regex> = OnceLock::new();
    COMMAND_REGEX.get_or_init(|| {
        Regex::new(r"^\s*(?:[Nn]\d+\s*)?([GMTgmt])(\d+)(?:\.(\d+))?").expect("invalid regex pattern")
    })
}

fn param_regex() -> &'static Regex {
    static PARAM_REGEX: OnceLock<Regex> = OnceLock::new();
    PARAM_REGEX.get_or_init(|| {
        // a lower-case `e` right after digits is an exponent, not an E word
        Regex::new(r#"([A-Za-z])\s*("[^"]*"|[-+]?[0-9]*\.?[0-9]+e[-+]?[0-9]+|[-+]?[0-9.]*)"#)
            .expect("invalid regex pattern")
    })
}

fn comment_regex() -> &'static Regex {
    static COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();
    COMMENT_REGEX.get_or_init(|| Regex::new(r"^\s*;\s*(.*\S)\s*$").expect("invalid regex pattern"))
}

/// Split the text after the command word into (parameters, comment).
///
/// The comment starts at the first `;` outside a quoted string. A
/// parenthesized comment ends the parameter section as well; its text is
/// used when there is no `;` comment.
fn split_comment(rest: &str) -> (&str, String) {
    let mut in_quotes = false;
    for (index, ch) in rest.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                return (&rest[..index], rest[index + 1..].trim().to_string());
            }
            '(' if !in_quotes => {
                let params = &rest[..index];
                let tail = &rest[index + 1..];
                if let Some(semicolon) = tail.find(';') {
                    return (params, tail[semicolon + 1..].trim().to_string());
                }
                let text = tail.split(')').next().unwrap_or_default().trim();
                return (params, text.to_string());
            }
            _ => {}
        }
    }
    (rest, String::new())
}

/// Tokenize a single line
///
/// Returns `None` for blank, malformed or unrecognized lines, and for pure
/// comment lines unless `include_comments` is set.
pub fn parse_line(line: &str, include_comments: bool) -> Option<GcodeLine> {
    if let Some(captures) = command_regex().captures(line) {
        let letter = captures[1].chars().next()?.to_ascii_uppercase();
        let number = captures[2].parse::<u32>().ok()?;
        let sub = captures.get(3).and_then(|m| m.as_str().parse::<u32>().ok());
        let rest = &line[captures.get(0)?.end()..];

        let (param_text, comment) = split_comment(rest);
        let mut gcode_line = GcodeLine::new(Command::Code {
            letter,
            number,
            sub,
        });
        for param in param_regex().captures_iter(param_text) {
            let key = param[1].chars().next()?.to_ascii_uppercase();
            gcode_line.params.insert(key, ParamValue::parse(&param[2]));
        }
        gcode_line.comment = comment;
        return Some(gcode_line);
    }

    if include_comments {
        if let Some(captures) = comment_regex().captures(line) {
            return Some(GcodeLine::comment(&captures[1]));
        }
    }

    None
}

/// Tokenize a whole program, dropping unrecognized lines
pub fn parse_lines(gcode: &str, include_comments: bool) -> Vec<GcodeLine> {
    gcode
        .lines()
        .filter_map(|line| parse_line(line, include_comments))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LineKind;

    #[test]
    fn test_parse_move() {
        let line = parse_line("G1 X10.5 Y-3 E0.02 F1800", false).unwrap();
        assert!(line.command.is('G', 1));
        assert_eq!(line.param_f64('X'), Some(10.5));
        assert_eq!(line.param('Y'), Some(&ParamValue::Int(-3)));
        assert_eq!(line.param_f64('E'), Some(0.02));
        assert_eq!(line.param('F'), Some(&ParamValue::Int(1800)));
        assert!(line.comment.is_empty());
        assert_eq!(line.kind(), LineKind::Move);
    }

    #[test]
    fn test_parse_lowercase_and_comment() {
        let line = parse_line("g0 x1 y2 ;  travel move ", false).unwrap();
        assert!(line.command.is('G', 0));
        assert_eq!(line.param_f64('X'), Some(1.0));
        assert_eq!(line.comment, "travel move");
        assert_eq!(line.to_gcode(), "G0 X1 Y2 ; travel move");
    }

    #[test]
    fn test_parse_glued_params() {
        let line = parse_line("G1X5Y6Z0.3", false).unwrap();
        assert_eq!(line.param_f64('X'), Some(5.0));
        assert_eq!(line.param_f64('Y'), Some(6.0));
        assert_eq!(line.param_f64('Z'), Some(0.3));
    }

    #[test]
    fn test_exponent_is_not_an_extrusion_word() {
        let line = parse_line("G1 X1e5 Y2", false).unwrap();
        assert!(!line.has_param('E'));
        assert_eq!(line.param('X'), Some(&ParamValue::Verbatim("1e5".to_string())));
        assert_eq!(line.param_f64('Y'), Some(2.0));
        assert_eq!(line.to_gcode(), "G1 X1e5 Y2");

        let line = parse_line("G1 X-2.5e-3", false).unwrap();
        assert_eq!(line.param('X'), Some(&ParamValue::Verbatim("-2.5e-3".to_string())));

        // upper-case E after a number is still its own word
        let line = parse_line("G1X10E0.5", false).unwrap();
        assert_eq!(line.param_f64('X'), Some(10.0));
        assert_eq!(line.param_f64('E'), Some(0.5));
    }

    #[test]
    fn test_parse_tool_change() {
        let line = parse_line("T2", false).unwrap();
        assert_eq!(line.kind(), LineKind::ToolChange);
        assert_eq!(line.to_gcode(), "T2");
    }

    #[test]
    fn test_parse_line_number_prefix() {
        let line = parse_line("N120 G1 Z0.2", false).unwrap();
        assert!(line.command.is('G', 1));
        assert_eq!(line.to_gcode(), "G1 Z0.2");
    }

    #[test]
    fn test_parse_quoted_string() {
        let line = parse_line("M23 P\"file; name.g\" ; select", false).unwrap();
        assert_eq!(
            line.param('P'),
            Some(&ParamValue::Verbatim("\"file; name.g\"".to_string()))
        );
        assert_eq!(line.comment, "select");
    }

    #[test]
    fn test_parse_sub_code() {
        let line = parse_line("G61.1", false).unwrap();
        assert_eq!(line.to_gcode(), "G61.1");
        assert_eq!(line.kind(), LineKind::Other);
    }

    #[test]
    fn test_parse_paren_comment() {
        let line = parse_line("G0 Z15 (safe height)", false).unwrap();
        assert_eq!(line.params.len(), 1);
        assert_eq!(line.comment, "safe height");
    }

    #[test]
    fn test_comment_lines() {
        assert!(parse_line("; layer 1, Z = 0.2", false).is_none());
        let comment = parse_line("; layer 1, Z = 0.2", true).unwrap();
        assert_eq!(comment.kind(), LineKind::Comment);
        assert_eq!(comment.comment, "layer 1, Z = 0.2");
        assert_eq!(comment.to_gcode(), "; layer 1, Z = 0.2");
        assert!(parse_line(";", true).is_none());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        assert!(parse_line("", true).is_none());
        assert!(parse_line("   ", true).is_none());
        assert!(parse_line("(type: cutting)", true).is_none());
        assert!(parse_line("%", true).is_none());
        assert!(parse_line("hello world", true).is_none());
    }

    #[test]
    fn test_parse_lines() {
        let gcode = "; header\nG28\n\nM83\nG1 X1 E1\nnot gcode\n";
        assert_eq!(parse_lines(gcode, false).len(), 3);
        assert_eq!(parse_lines(gcode, true).len(), 4);
    }
}
