//! C/C++ language mode

use crate::syntax::language::LanguageMode;

const PATTERNS: &str = r##"
comment::"/\*":"\*/":Comment:
line comment::"//":"$":Comment:
string::"L?""":"""":String::"\n"
string escape:string:"\\(?:.|\n)"::String1:
preprocessor line::"^[ \t]*#":"$":Preprocessor:
preprocessor comment:preprocessor line:"/\*":"\*/":Comment:
preprocessor line comment:preprocessor line:"//":"$":Comment:
preprocessor string:preprocessor line:"L?""":"""":Preprocessor1::"\n"
preprocessor header:preprocessor line:"<[^>\n]*>"::Preprocessor1:
preprocessor continuation:preprocessor line:"\\\n"::Preprocessor1:
character constant::"L?'(?:\\.|[^\\'\n])'"::Character Const:D
numeric constant::"\b(?:0[xX][0-9a-fA-F]+|[0-9]+(?:\.[0-9]*)?(?:[eE][+-]?[0-9]+)?)[uUlLfF]*\b"::Numeric Const:D
storage keyword::"\b(?:auto|bool|char|class|const|constexpr|double|enum|explicit|extern|float|friend|inline|int|long|mutable|namespace|private|protected|public|register|short|signed|size_t|static|struct|template|typedef|typename|union|unsigned|virtual|void|volatile)\b"::Storage Type:D
keyword::"\b(?:break|case|catch|continue|default|delete|do|else|for|goto|if|new|nullptr|operator|return|sizeof|switch|this|throw|try|using|while)\b"::Keyword:D
braces::"[{}]"::Keyword:D
"##;

/// Create the C mode (also used for C++)
pub fn c_mode() -> LanguageMode {
    let mut mode = LanguageMode::new("C", PATTERNS);
    mode.add_extension("c");
    mode.add_extension("h");
    mode.add_extension("cpp");
    mode.add_extension("hpp");
    mode.add_extension("cc");
    mode.add_extension("cxx");
    mode
}
