//! G-Code line types
//!
//! A [`GcodeLine`] is one tokenized instruction: a command word, an ordered
//! map of parameter words and an optional trailing comment. Lines are
//! mutated in place by the offsetter and the extrusion normalizer and then
//! serialized back to text.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Command word of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// A letter/number command such as `G1`, `M83`, `T2` or `G61.1`
    Code {
        /// Upper-case command letter (`G`, `M` or `T`)
        letter: char,
        /// Command number
        number: u32,
        /// Optional sub-code after the decimal point
        sub: Option<u32>,
    },
    /// Sentinel for a line that is only a comment
    Comment,
}

impl Command {
    /// Create a command without a sub-code
    pub fn new(letter: char, number: u32) -> Self {
        Self::Code {
            letter: letter.to_ascii_uppercase(),
            number,
            sub: None,
        }
    }

    /// True when this is exactly `<letter><number>` with no sub-code
    pub fn is(&self, letter: char, number: u32) -> bool {
        matches!(
            self,
            Self::Code { letter: l, number: n, sub: None } if *l == letter && *n == number
        )
    }

    /// The command letter, if this is not a comment
    pub fn letter(&self) -> Option<char> {
        match self {
            Self::Code { letter, .. } => Some(*letter),
            Self::Comment => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code {
                letter,
                number,
                sub: Some(sub),
            } => write!(f, "{}{}.{}", letter, number, sub),
            Self::Code { letter, number, .. } => write!(f, "{}{}", letter, number),
            Self::Comment => write!(f, ";"),
        }
    }
}

/// Movement classification of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    /// `G0`, `G1`, `G2` or `G3`
    Move,
    /// A pure comment line
    Comment,
    /// `T<n>`
    ToolChange,
    /// Anything else
    Other,
}

/// Value of a parameter word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Integer literal, e.g. `F1800`
    Int(i64),
    /// Decimal literal, e.g. `X10.5`
    Float(f64),
    /// Quoted string or a token that is not a well-formed number, kept as written
    Verbatim(String),
    /// Bare axis word with no value, e.g. the `X` in `G28 X`
    Flag,
}

impl ParamValue {
    /// Parse the raw text following a parameter letter
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Flag;
        }
        // exponent forms are outside the dialect and kept as written
        if raw.starts_with('"') || raw.contains(['e', 'E']) {
            return Self::Verbatim(raw.to_string());
        }
        if raw.contains('.') {
            match raw.parse::<f64>() {
                Ok(value) => Self::Float(value),
                Err(_) => Self::Verbatim(raw.to_string()),
            }
        } else {
            match raw.parse::<i64>() {
                Ok(value) => Self::Int(value),
                Err(_) => Self::Verbatim(raw.to_string()),
            }
        }
    }

    /// Numeric value, if this parameter carries one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Verbatim(_) | Self::Flag => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Float(value) => f.write_str(&format_float(*value)),
            Self::Verbatim(raw) => f.write_str(raw),
            Self::Flag => Ok(()),
        }
    }
}

/// Format a float without an exponent and always with a decimal point
///
/// `Display` for `f64` already prints the shortest exact decimal, so only
/// integral values need the `.0` suffix to re-parse as floats.
pub fn format_float(value: f64) -> String {
    if value == 0.0 {
        return "0.0".to_string();
    }
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// One tokenized G-code instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcodeLine {
    /// Command word
    pub command: Command,
    /// Parameter words keyed by upper-case letter, in source order
    pub params: IndexMap<char, ParamValue>,
    /// Trailing comment text without the `;`, trimmed
    pub comment: String,
}

impl GcodeLine {
    /// Create a line with no parameters or comment
    pub fn new(command: Command) -> Self {
        Self {
            command,
            params: IndexMap::new(),
            comment: String::new(),
        }
    }

    /// Create a pure comment line
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            command: Command::Comment,
            params: IndexMap::new(),
            comment: text.into(),
        }
    }

    /// Builder-style parameter insertion
    pub fn with_param(mut self, letter: char, value: ParamValue) -> Self {
        self.params.insert(letter.to_ascii_uppercase(), value);
        self
    }

    /// Classify the line by movement type
    pub fn kind(&self) -> LineKind {
        match self.command {
            Command::Comment => LineKind::Comment,
            Command::Code {
                letter: 'G',
                number: 0..=3,
                sub: None,
            } => LineKind::Move,
            Command::Code { letter: 'T', .. } => LineKind::ToolChange,
            Command::Code { .. } => LineKind::Other,
        }
    }

    /// True for `G0`-`G3`
    pub fn is_move(&self) -> bool {
        self.kind() == LineKind::Move
    }

    /// Get a parameter value
    pub fn param(&self, letter: char) -> Option<&ParamValue> {
        self.params.get(&letter)
    }

    /// Get a numeric parameter value
    pub fn param_f64(&self, letter: char) -> Option<f64> {
        self.param(letter).and_then(ParamValue::as_f64)
    }

    /// Check whether a parameter is present
    pub fn has_param(&self, letter: char) -> bool {
        self.params.contains_key(&letter)
    }

    /// Replace the value of an existing parameter
    ///
    /// Returns false and leaves the line untouched when the parameter is absent.
    pub fn update_param(&mut self, letter: char, value: ParamValue) -> bool {
        match self.params.get_mut(&letter) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Insert or replace a parameter
    pub fn set_param(&mut self, letter: char, value: ParamValue) {
        self.params.insert(letter.to_ascii_uppercase(), value);
    }

    /// Serialize back to `COMMAND PARAM... ; comment`
    pub fn to_gcode(&self) -> String {
        let comment = if self.comment.is_empty() {
            String::new()
        } else {
            format!("; {}", self.comment)
        };

        if self.command == Command::Comment {
            return comment;
        }

        let mut words = vec![self.command.to_string()];
        words.extend(
            self.params
                .iter()
                .map(|(letter, value)| format!("{}{}", letter, value)),
        );
        if !comment.is_empty() {
            words.push(comment);
        }
        words.join(" ")
    }
}

impl std::fmt::Display for GcodeLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_gcode())
    }
}
