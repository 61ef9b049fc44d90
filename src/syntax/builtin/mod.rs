//! Built-in language modes
//!
//! Pattern sets for common programming languages, written in the same text
//! form as user-supplied pattern files.

mod c;
mod python;
mod rust;

use super::language::LanguageMode;

/// Get all built-in language modes
pub fn all_modes() -> Vec<LanguageMode> {
    vec![c::c_mode(), rust::rust_mode(), python::python_mode()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::pattern_set::PatternSet;
    use crate::syntax::queue::IdleQueue;
    use crate::syntax::scheduler::{HighlightSettings, Highlighter};
    use crate::syntax::style_buffer::StyleCode;
    use crate::syntax::style::StyleTable;
    use crate::syntax::table::PatternTable;

    fn table(mode: LanguageMode) -> PatternTable {
        let set = PatternSet::parse(&mode.name, &mode.patterns).unwrap();
        let (table, diagnostics) = PatternTable::compile(&set, &StyleTable::new());
        assert!(diagnostics.is_empty(), "{}: {diagnostics:?}", mode.name);
        table
    }

    fn highlighter(mode: LanguageMode) -> Highlighter {
        Highlighter::new(table(mode), HighlightSettings::default(), IdleQueue::new())
    }

    /// Final styles of `text` parsed from scratch
    fn settled(table: &PatternTable, settings: HighlightSettings, text: &str) -> Vec<StyleCode> {
        let mut h = Highlighter::new(table.clone(), settings, IdleQueue::new());
        h.start(text.as_bytes(), false);
        h.ensure_styles(text.as_bytes(), 0..text.len());
        h.styles().as_slice().to_vec()
    }

    /// Small deterministic generator for edit scripts
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, n: usize) -> usize {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 33) as usize % n
        }
    }

    fn longest_line(text: &str) -> usize {
        text.split('\n').map(str::len).max().unwrap_or(0)
    }

    /// Style name of the first byte of `needle`
    fn style_of<'h>(h: &'h mut Highlighter, text: &str, needle: &str) -> &'h str {
        let pos = text.find(needle).unwrap();
        h.style_name_at(text.as_bytes(), pos).unwrap()
    }

    #[test]
    fn test_builtins_compile_cleanly() {
        for mode in all_modes() {
            let h = highlighter(mode);
            assert!(h.table().has_deferred());
        }
    }

    #[test]
    fn test_c_mode() {
        let text = "#include <stdio.h>\nint main(void) {\n    /* hi */ return 'x' + 0x1F; // done\n}\n";
        let mut h = highlighter(c::c_mode());
        h.start(text.as_bytes(), false);

        assert_eq!(style_of(&mut h, text, "#include"), "Preprocessor");
        assert_eq!(style_of(&mut h, text, "<stdio"), "Preprocessor1");
        assert_eq!(style_of(&mut h, text, "int"), "Storage Type");
        assert_eq!(style_of(&mut h, text, "main"), "Plain");
        assert_eq!(style_of(&mut h, text, "/* hi"), "Comment");
        assert_eq!(style_of(&mut h, text, "return"), "Keyword");
        assert_eq!(style_of(&mut h, text, "'x'"), "Character Const");
        assert_eq!(style_of(&mut h, text, "0x1F"), "Numeric Const");
        assert_eq!(style_of(&mut h, text, "// done"), "Comment");
    }

    #[test]
    fn test_rust_mode() {
        let text = "#[derive(Debug)]\nfn parse<'a>(s: &'a str) -> usize {\n    let c = 'q'; println!(\"{}\\n\", c); 42\n}\n";
        let mut h = highlighter(rust::rust_mode());
        h.start(text.as_bytes(), false);

        assert_eq!(style_of(&mut h, text, "#[derive"), "Preprocessor");
        assert_eq!(style_of(&mut h, text, "fn parse"), "Keyword");
        assert_eq!(style_of(&mut h, text, "parse"), "Subroutine");
        assert_eq!(style_of(&mut h, text, "'a>"), "Label");
        assert_eq!(style_of(&mut h, text, "str"), "Storage Type");
        assert_eq!(style_of(&mut h, text, "let"), "Keyword");
        assert_eq!(style_of(&mut h, text, "'q'"), "Character Const");
        assert_eq!(style_of(&mut h, text, "println!"), "Subroutine1");
        assert_eq!(style_of(&mut h, text, "\\n"), "String1");
        assert_eq!(style_of(&mut h, text, "42"), "Numeric Const");
    }

    #[test]
    fn test_python_mode() {
        let text = "@cache\ndef area(r):\n    \"\"\"Circle.\"\"\"\n    return 3.14 * r * r  # approx\n";
        let mut h = highlighter(python::python_mode());
        h.start(text.as_bytes(), false);

        assert_eq!(style_of(&mut h, text, "@cache"), "Preprocessor");
        assert_eq!(style_of(&mut h, text, "def"), "Keyword");
        assert_eq!(style_of(&mut h, text, "area"), "Subroutine");
        assert_eq!(style_of(&mut h, text, "Circle"), "String");
        assert_eq!(style_of(&mut h, text, "return"), "Keyword");
        assert_eq!(style_of(&mut h, text, "3.14"), "Numeric Const");
        assert_eq!(style_of(&mut h, text, "# approx"), "Comment");
    }

    #[test]
    fn test_deleting_at_the_end() {
        let c_table = table(c::c_mode());
        let cases = [("x int", 4), ("int", 2), ("a /* c */ int", 12), ("x = 12", 5)];
        for (original, pos) in cases {
            let mut text = original.to_string();
            let mut h = Highlighter::new(c_table.clone(), HighlightSettings::default(), IdleQueue::new());
            h.start(text.as_bytes(), false);
            h.ensure_styles(text.as_bytes(), 0..text.len());

            text.truncate(pos);
            h.text_modified(text.as_bytes(), pos, 0, original.len() - pos);
            h.ensure_styles(text.as_bytes(), 0..text.len());
            let expected = settled(&c_table, HighlightSettings::default(), &text);
            assert_eq!(h.styles().as_slice(), expected, "{original:?} cut to {text:?}");
        }
    }

    #[test]
    fn test_random_edits_match_fresh_parse() {
        const MAX_LINE: usize = 24;
        let modes: [(fn() -> LanguageMode, &[&str]); 3] = [
            (
                c::c_mode,
                &["int ", "if ", "x", " ", "\n", "/*", "*/", "\"", "'a'", "0x1F", "// ", "#", "12", "{", "\\"],
            ),
            (
                rust::rust_mode,
                &["fn ", "let ", "x", " ", "\n", "/*", "*/", "\"", "'a", "r#\"", "\"#", "42", "#[", "]", "//", "b'", "!"],
            ),
            (
                python::python_mode,
                &["def ", "if ", "x", " ", "\n", "#", "'", "\"", "'''", "12", "@d", "\\", "(", "None"],
            ),
        ];

        for (make_mode, fragments) in modes {
            let compiled = table(make_mode());
            for chunk_size in [64, 1000] {
                let settings = HighlightSettings {
                    chunk_size,
                    ..HighlightSettings::default()
                };
                for seed in 1..=12u64 {
                    let mut rng = Lcg(seed);
                    let mut text = String::new();
                    while text.len() < 200 {
                        let fragment = fragments[rng.below(fragments.len())];
                        if longest_line(&format!("{text}{fragment}")) > MAX_LINE {
                            text.push('\n');
                        }
                        text.push_str(fragment);
                    }

                    let mut h = Highlighter::new(compiled.clone(), settings, IdleQueue::new());
                    h.start(text.as_bytes(), false);
                    h.ensure_styles(text.as_bytes(), 0..text.len());

                    for step in 0..30 {
                        let pos = rng.below(text.len() + 1);
                        let mut next = text.clone();
                        let (deleted, inserted) = if rng.below(3) == 0 {
                            let n = (1 + rng.below(3)).min(text.len() - pos);
                            next.replace_range(pos..pos + n, "");
                            (n, "")
                        } else {
                            let fragment = fragments[rng.below(fragments.len())];
                            next.insert_str(pos, fragment);
                            (0, fragment)
                        };
                        if (deleted == 0 && inserted.is_empty()) || longest_line(&next) > MAX_LINE {
                            continue;
                        }
                        text = next;
                        h.text_modified(text.as_bytes(), pos, inserted.len(), deleted);
                        if step % 2 == 1 {
                            continue;
                        }

                        h.ensure_styles(text.as_bytes(), 0..text.len());
                        assert_eq!(
                            h.styles().as_slice(),
                            settled(&compiled, settings, &text),
                            "{} seed {seed} chunk {chunk_size} step {step}: {text:?}",
                            h.table().language_mode(),
                        );
                    }
                }
            }
        }
    }
}
