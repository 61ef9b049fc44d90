//! Rust language mode

use crate::syntax::language::LanguageMode;

const PATTERNS: &str = r##"
line comment::"//":"$":Comment:
block comment::"/\*":"\*/":Comment:
raw string hashed::"b?r#""":"""#":String:
raw string::"b?r""":"""":String:
string::"b?""":"""":String:
string escape:string:"\\(?:.|\n)"::String1:
character constant::"b?'(?:\\(?:[nrt0'""\\]|x[0-9a-fA-F]{2}|u\{[0-9a-fA-F]{1,6}\})|[^\\'\n])'"::Character Const:
attribute::"#!?\[":"\]":Preprocessor:
attribute string:attribute:"""":"""":Preprocessor1::"\n"
function::"\b(fn)[ \t]+([A-Za-z_][A-Za-z0-9_]*)"::Plain:
function keyword:function:"\1"::Keyword:C
function name:function:"\2"::Subroutine:C
lifetime::"'[A-Za-z_][A-Za-z0-9_]*\b"::Label:D
macro::"\b[A-Za-z_][A-Za-z0-9_]*!"::Subroutine1:D
numeric constant::"\b(?:0x[0-9a-fA-F_]+|0o[0-7_]+|0b[01_]+|[0-9][0-9_]*(?:\.[0-9][0-9_]*)?(?:[eE][+-]?[0-9_]+)?)(?:[iu](?:8|16|32|64|128|size)|f32|f64)?\b"::Numeric Const:D
type::"\b(?:bool|char|str|u8|u16|u32|u64|u128|usize|i8|i16|i32|i64|i128|isize|f32|f64|Self|String|Vec|Option|Result|Box)\b"::Storage Type:D
keyword::"\b(?:as|async|await|break|const|continue|crate|dyn|else|enum|extern|false|for|if|impl|in|let|loop|match|mod|move|mut|pub|ref|return|self|static|struct|super|trait|true|type|unsafe|use|where|while)\b"::Keyword:D
"##;

/// Create the Rust mode
pub fn rust_mode() -> LanguageMode {
    let mut mode = LanguageMode::new("Rust", PATTERNS);
    mode.add_extension("rs");
    mode
}
