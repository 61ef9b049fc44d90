//! Python language mode

use crate::syntax::language::LanguageMode;

const PATTERNS: &str = r##"
long string 1::"[rRuUbBfF]{0,2}'''":"'''":String:
long escape 1:long string 1:"\\(?:.|\n)"::String1:
long string 2::"[rRuUbBfF]{0,2}""""""":"""""""":String:
long escape 2:long string 2:"\\(?:.|\n)"::String1:
comment::"#":"$":Comment:
string 1::"[rRuUbBfF]{0,2}'":"'":String::"\n"
escape 1:string 1:"\\(?:.|\n)"::String1:
string 2::"[rRuUbBfF]{0,2}""":"""":String::"\n"
escape 2:string 2:"\\(?:.|\n)"::String1:
decorator::"^[ \t]*@[A-Za-z_][A-Za-z0-9_.]*"::Preprocessor:
definition::"\b(def|class)[ \t]+([A-Za-z_][A-Za-z0-9_]*)"::Plain:
definition keyword:definition:"\1"::Keyword:C
definition name:definition:"\2"::Subroutine:C
numeric constant::"\b(?:0[xX][0-9a-fA-F_]+|0[oO][0-7_]+|0[bB][01_]+|[0-9][0-9_]*(?:\.[0-9_]*)?(?:[eE][+-]?[0-9_]+)?[jJ]?)\b"::Numeric Const:D
builtin constant::"\b(?:True|False|None|self|cls)\b"::Storage Type:D
keyword::"\b(?:and|as|assert|async|await|break|continue|del|elif|else|except|finally|for|from|global|if|import|in|is|lambda|nonlocal|not|or|pass|raise|return|try|while|with|yield)\b"::Keyword:D
"##;

/// Create the Python mode
pub fn python_mode() -> LanguageMode {
    let mut mode = LanguageMode::new("Python", PATTERNS);
    mode.add_extension("py");
    mode.add_extension("pyw");
    mode.add_extension("pyi");
    mode
}
