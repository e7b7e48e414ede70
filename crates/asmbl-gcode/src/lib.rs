//! # ASMBL G-Code
//!
//! Line-level G-code handling shared by the additive and subtractive sides
//! of the merger:
//! - Tokenizing raw lines into commands, parameters and comments
//! - Serializing tokenized lines back to text
//! - Offsetting move coordinates into the printer frame
//! - Normalizing absolute extrusion to relative extrusion

pub mod line;
pub mod parser;
pub mod processors;

pub use line::*;
pub use parser::*;
pub use processors::*;
