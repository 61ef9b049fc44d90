//! Pattern table compiler
//!
//! Turns a [`PatternSet`] into two pattern trees (immediate and deferred
//! pass) under synthetic roots, assigns style codes, and answers the
//! hierarchy questions the reparse scheduler asks about stored codes.
//!
//! Problems are local to the pattern that has them. A pattern with a bad
//! expression, an unknown parent or an inconsistent shape is left out
//! together with its descendants; an unknown style name falls back to
//! `Plain`. All diagnostics are returned to the caller and logged.

use std::collections::HashMap;

use tracing::warn;

use super::context::ReparseContext;
use super::pattern::{
    parse_group_refs, Branch, CompiledPattern, Expr, Pass, PatternId, PatternKind, SubMatcher,
};
use super::pattern_set::{PatternSet, PatternSpec};
use super::style::{StyleTable, PLAIN_STYLE};
use super::style_buffer::StyleCode;
use crate::error::HighlightError;

/// Compiled, matchable form of one pattern set
#[derive(Debug, Clone)]
pub struct PatternTable {
    language_mode: String,
    patterns: Vec<CompiledPattern>,
    immediate_root: PatternId,
    deferred_root: Option<PatternId>,
    /// Pattern owning each code, indexed by raw code value
    by_code: Vec<Option<PatternId>>,
    first_deferred: StyleCode,
    context: ReparseContext,
    failures: HashMap<PatternId, usize>,
}

/// Validated source pattern awaiting placement in the arena
struct Staged<'a> {
    spec: &'a PatternSpec,
    parent: Option<usize>,
    kind: PatternKind,
    pass: Pass,
    style: String,
}

impl PatternTable {
    /// Compile a pattern set against the available styles
    ///
    /// Never fails as a whole: the returned diagnostics list everything
    /// that was left out or degraded.
    pub fn compile(set: &PatternSet, styles: &StyleTable) -> (PatternTable, Vec<HighlightError>) {
        let mut diagnostics = Vec::new();
        let specs = &set.patterns;

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut usable = vec![true; specs.len()];
        for (i, spec) in specs.iter().enumerate() {
            if index.contains_key(spec.name.as_str()) {
                diagnostics.push(HighlightError::InvalidPattern {
                    name: spec.name.clone(),
                    message: "duplicate pattern name".to_string(),
                });
                usable[i] = false;
            } else {
                index.insert(&spec.name, i);
            }
        }

        let mut parents: Vec<Option<usize>> = vec![None; specs.len()];
        for (i, spec) in specs.iter().enumerate() {
            let Some(parent) = spec.parent.as_deref() else {
                continue;
            };
            match index.get(parent) {
                Some(&p) if p != i => parents[i] = Some(p),
                Some(_) => {
                    diagnostics.push(HighlightError::InvalidPattern {
                        name: spec.name.clone(),
                        message: "pattern names itself as parent".to_string(),
                    });
                    usable[i] = false;
                }
                None => {
                    diagnostics.push(HighlightError::UnknownParent {
                        name: spec.name.clone(),
                        parent: parent.to_string(),
                    });
                    usable[i] = false;
                }
            }
        }

        for i in 0..specs.len() {
            if usable[i] && in_cycle(&parents, i) {
                diagnostics.push(HighlightError::InvalidPattern {
                    name: specs[i].name.clone(),
                    message: "circular parentage".to_string(),
                });
                usable[i] = false;
            }
        }

        let mut kinds: Vec<Option<PatternKind>> = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if !usable[i] {
                kinds.push(None);
                continue;
            }
            match build_kind(spec, parents[i].is_some()) {
                Ok(kind) => kinds.push(Some(kind)),
                Err(err) => {
                    diagnostics.push(err);
                    kinds.push(None);
                }
            }
        }

        // Color-only references must exist in the compiled parent
        for i in 0..specs.len() {
            let Some(p) = parents[i] else {
                continue;
            };
            let checked = match (&kinds[i], &kinds[p]) {
                (Some(PatternKind::ColorOnly { start_groups, end_groups }), Some(parent)) => {
                    let (start, end) = match parent {
                        PatternKind::Simple { start } => (Some(start), None),
                        PatternKind::NestedBlock { start, end, .. } => (Some(start), Some(end)),
                        _ => continue,
                    };
                    check_groups(start_groups, start).and_then(|()| check_groups(end_groups, end))
                }
                _ => continue,
            };
            if let Err(message) = checked {
                diagnostics.push(HighlightError::InvalidPattern {
                    name: specs[i].name.clone(),
                    message,
                });
                kinds[i] = None;
            }
        }

        // A pattern is usable only if its whole ancestry is
        let mut alive = vec![false; specs.len()];
        for i in 0..specs.len() {
            let mut ok = kinds[i].is_some();
            let mut p = parents[i];
            while ok {
                match p {
                    Some(pi) => {
                        ok = kinds[pi].is_some();
                        if ok && matches!(kinds[pi], Some(PatternKind::ColorOnly { .. })) {
                            diagnostics.push(HighlightError::InvalidPattern {
                                name: specs[i].name.clone(),
                                message: "color-only patterns cannot have sub-patterns".to_string(),
                            });
                            ok = false;
                        }
                        p = parents[pi];
                    }
                    None => break,
                }
            }
            alive[i] = ok;
        }

        let mut staged: Vec<Option<Staged>> = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            let Some(kind) = kinds[i].take().filter(|_| alive[i]) else {
                staged.push(None);
                continue;
            };
            let mut top = i;
            while let Some(p) = parents[top] {
                top = p;
            }
            let pass = if specs[top].flags.deferred {
                Pass::Deferred
            } else {
                Pass::Immediate
            };
            let style = if styles.contains(&spec.style) {
                spec.style.clone()
            } else {
                diagnostics.push(HighlightError::MissingStyleName {
                    pattern: spec.name.clone(),
                    style: spec.style.clone(),
                });
                PLAIN_STYLE.to_string()
            };
            staged.push(Some(Staged {
                spec,
                parent: parents[i],
                kind,
                pass,
                style,
            }));
        }

        let table = Self::assemble(set, staged);

        for diagnostic in &diagnostics {
            warn!(mode = %set.language_mode, "{}", diagnostic);
        }
        (table, diagnostics)
    }

    fn assemble(set: &PatternSet, staged: Vec<Option<Staged>>) -> PatternTable {
        let has_deferred = staged
            .iter()
            .flatten()
            .any(|s| s.pass == Pass::Deferred);

        let mut patterns = Vec::new();
        let immediate_root = PatternId(0);
        patterns.push(root_pattern(
            "immediate root",
            if has_deferred {
                StyleCode::UNFINISHED
            } else {
                StyleCode::PLAIN
            },
            Pass::Immediate,
        ));
        let deferred_root = if has_deferred {
            patterns.push(root_pattern("deferred root", StyleCode::PLAIN, Pass::Deferred));
            Some(PatternId(1))
        } else {
            None
        };

        // Immediate patterns take the low codes, deferred ones follow
        let mut ids: Vec<Option<PatternId>> = vec![None; staged.len()];
        let mut next_code: u16 = 2;
        let mut first_deferred = None;
        for pass in [Pass::Immediate, Pass::Deferred] {
            if pass == Pass::Deferred {
                first_deferred = Some(StyleCode::new(next_code));
            }
            for (i, entry) in staged.iter().enumerate() {
                let Some(s) = entry.as_ref().filter(|s| s.pass == pass) else {
                    continue;
                };
                ids[i] = Some(PatternId(patterns.len()));
                patterns.push(CompiledPattern {
                    name: s.spec.name.clone(),
                    style: s.style.clone(),
                    code: StyleCode::new(next_code),
                    pass,
                    parent: None,
                    children: Vec::new(),
                    kind: s.kind.clone(),
                    sub: None,
                    enabled: true,
                });
                next_code = next_code.saturating_add(1);
            }
        }

        let mut by_code = vec![None; next_code as usize];
        for (i, entry) in staged.iter().enumerate() {
            let (Some(s), Some(id)) = (entry, ids[i]) else {
                continue;
            };
            let parent = match s.parent {
                Some(p) => ids[p].unwrap_or(immediate_root),
                None if s.pass == Pass::Deferred => deferred_root.unwrap_or(immediate_root),
                None => immediate_root,
            };
            patterns[id.0].parent = Some(parent);
            patterns[parent.0].children.push(id);
            by_code[patterns[id.0].code.raw() as usize] = Some(id);
        }

        let mut table = PatternTable {
            language_mode: set.language_mode.clone(),
            patterns,
            immediate_root,
            deferred_root,
            by_code,
            first_deferred: first_deferred.unwrap_or(StyleCode::new(next_code)),
            context: set.reparse_context(),
            failures: HashMap::new(),
        };
        for i in 0..table.patterns.len() {
            table.rebuild_sub_matcher(PatternId(i));
        }
        table
    }

    fn rebuild_sub_matcher(&mut self, id: PatternId) {
        let pattern = &self.patterns[id.0];
        let mut branches = Vec::new();
        if let PatternKind::NestedBlock { end, error, .. } = &pattern.kind {
            branches.push((Branch::End, end.clone()));
            if let Some(error) = error {
                branches.push((Branch::Error, error.clone()));
            }
        }
        for &child_id in &pattern.children {
            let child = &self.patterns[child_id.0];
            if !child.enabled {
                continue;
            }
            if let Some(start) = child.start_expr() {
                branches.push((Branch::Child(child_id), start.clone()));
            }
        }
        let sub = match pattern.kind {
            PatternKind::ColorOnly { .. } => None,
            _ => SubMatcher::build(branches),
        };
        self.patterns[id.0].sub = sub;
    }

    pub fn language_mode(&self) -> &str {
        &self.language_mode
    }

    pub fn pattern(&self, id: PatternId) -> &CompiledPattern {
        &self.patterns[id.0]
    }

    /// Find a pattern by name
    pub fn find(&self, name: &str) -> Option<PatternId> {
        self.patterns
            .iter()
            .position(|p| !matches!(p.kind, PatternKind::Root) && p.name == name)
            .map(PatternId)
    }

    /// Root of the immediate pass
    pub fn immediate_root(&self) -> PatternId {
        self.immediate_root
    }

    /// Root of the deferred pass, if any pattern is deferred
    pub fn deferred_root(&self) -> Option<PatternId> {
        self.deferred_root
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred_root.is_some()
    }

    /// Lowest code assigned to a deferred pattern
    pub fn first_deferred(&self) -> StyleCode {
        self.first_deferred
    }

    pub fn context(&self) -> ReparseContext {
        self.context
    }

    pub fn is_deferred_code(&self, code: StyleCode) -> bool {
        code >= self.first_deferred
    }

    /// Text with this code is (re)parsed by the deferred pass
    pub fn is_pass_two_target(&self, code: StyleCode) -> bool {
        code.is_plain() || self.is_deferred_code(code)
    }

    /// Codes that compare as equal when deciding whether styles changed
    ///
    /// `Unfinished` stands in for anything the deferred pass may produce.
    pub fn equivalent(&self, a: StyleCode, b: StyleCode) -> bool {
        a == b
            || (a.is_unfinished() && (b == StyleCode::PLAIN || self.is_deferred_code(b)))
            || (b.is_unfinished() && (a == StyleCode::PLAIN || self.is_deferred_code(a)))
    }

    /// Pattern owning a code (reserved codes have none)
    pub fn pattern_of_code(&self, code: StyleCode) -> Option<PatternId> {
        self.by_code.get(code.raw() as usize).copied().flatten()
    }

    /// Resolved style name for a code
    pub fn style_name(&self, code: StyleCode) -> &str {
        self.pattern_of_code(code)
            .map_or(PLAIN_STYLE, |id| self.patterns[id.0].style.as_str())
    }

    pub fn parent_of(&self, id: PatternId) -> Option<PatternId> {
        self.patterns[id.0].parent
    }

    /// Whether `ancestor` lies strictly above `id` in its tree
    pub fn is_ancestor(&self, ancestor: PatternId, id: PatternId) -> bool {
        let mut p = self.parent_of(id);
        while let Some(pid) = p {
            if pid == ancestor {
                return true;
            }
            p = self.parent_of(pid);
        }
        false
    }

    /// Parsing can begin inside this pattern's text
    pub fn is_resumable(&self, id: PatternId) -> bool {
        self.patterns[id.0].is_resumable()
    }

    /// Immediate-pass pattern to attribute a stored code to
    ///
    /// Plain, unfinished and deferred text all belong to the immediate root.
    pub fn restart_pattern(&self, code: StyleCode) -> PatternId {
        match self.pattern_of_code(code) {
            Some(id) if self.patterns[id.0].pass == Pass::Immediate => id,
            _ => self.immediate_root,
        }
    }

    /// Resumable patterns enclosing a position styled by `id`, innermost
    /// first, excluding the root
    pub fn stack_for(&self, id: PatternId) -> Vec<PatternId> {
        let mut stack = Vec::new();
        let mut p = Some(id);
        while let Some(pid) = p {
            let pattern = &self.patterns[pid.0];
            if matches!(pattern.kind, PatternKind::Root) {
                break;
            }
            if pattern.is_resumable() {
                stack.push(pid);
            }
            p = pattern.parent;
        }
        stack
    }

    /// Record a runtime failure; returns `true` if the pattern got disabled
    pub fn note_failure(&mut self, id: PatternId, limit: usize) -> bool {
        if matches!(self.patterns[id.0].kind, PatternKind::Root) || !self.patterns[id.0].enabled {
            return false;
        }
        let count = self.failures.entry(id).or_insert(0);
        *count += 1;
        if *count < limit.max(1) {
            return false;
        }
        self.disable(id);
        true
    }

    /// Stop matching a pattern for the rest of the session
    pub fn disable(&mut self, id: PatternId) {
        let pattern = &mut self.patterns[id.0];
        if !pattern.enabled {
            return;
        }
        pattern.enabled = false;
        warn!(
            mode = %self.language_mode,
            pattern = %pattern.name,
            "disabling highlight pattern after repeated failures"
        );
        if let Some(parent) = pattern.parent {
            self.rebuild_sub_matcher(parent);
        }
    }

    /// Number of compiled patterns, roots excluded
    pub fn len(&self) -> usize {
        self.patterns
            .iter()
            .filter(|p| !matches!(p.kind, PatternKind::Root))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn root_pattern(name: &str, code: StyleCode, pass: Pass) -> CompiledPattern {
    CompiledPattern {
        name: name.to_string(),
        style: PLAIN_STYLE.to_string(),
        code,
        pass,
        parent: None,
        children: Vec::new(),
        kind: PatternKind::Root,
        sub: None,
        enabled: true,
    }
}

fn in_cycle(parents: &[Option<usize>], start: usize) -> bool {
    let mut p = parents[start];
    let mut steps = 0;
    while let Some(pi) = p {
        if pi == start || steps > parents.len() {
            return true;
        }
        steps += 1;
        p = parents[pi];
    }
    false
}

fn compile_expr(name: &str, source: &str) -> Result<Expr, HighlightError> {
    Expr::compile(source).map_err(|message| HighlightError::PatternCompile {
        name: name.to_string(),
        message,
    })
}

fn build_kind(spec: &PatternSpec, has_parent: bool) -> Result<PatternKind, HighlightError> {
    let invalid = |message: &str| HighlightError::InvalidPattern {
        name: spec.name.clone(),
        message: message.to_string(),
    };

    if spec.flags.color_only {
        if !has_parent {
            return Err(invalid("color-only pattern needs a parent"));
        }
        if spec.error.is_some() {
            return Err(invalid("color-only patterns take no error expression"));
        }
        let start_groups = parse_group_refs(spec.start.as_deref()).map_err(|m| invalid(&m))?;
        let end_groups = parse_group_refs(spec.end.as_deref()).map_err(|m| invalid(&m))?;
        return Ok(PatternKind::ColorOnly {
            start_groups,
            end_groups,
        });
    }

    let start = spec
        .start
        .as_deref()
        .ok_or_else(|| invalid("start expression is required"))?;
    let start = compile_expr(&spec.name, start)?;

    match spec.end.as_deref() {
        Some(end) => Ok(PatternKind::NestedBlock {
            start,
            end: compile_expr(&spec.name, end)?,
            error: spec
                .error
                .as_deref()
                .map(|e| compile_expr(&spec.name, e))
                .transpose()?,
            from_start: spec.flags.parse_from_start,
        }),
        None if spec.error.is_some() => Err(invalid("error expression requires an end expression")),
        None => Ok(PatternKind::Simple { start }),
    }
}

/// Color-only references must exist in the parent's expression
fn check_groups(groups: &[usize], expr: Option<&Expr>) -> Result<(), String> {
    if groups.is_empty() {
        return Ok(());
    }
    let Some(expr) = expr else {
        return Err("parent has no expression to take sub-expressions from".to_string());
    };
    match groups.iter().find(|&&g| g >= expr.captures_len()) {
        Some(g) => Err(format!("parent expression has no sub-expression {g}")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(text: &str) -> (PatternTable, Vec<HighlightError>) {
        let set = PatternSet::parse("Test", text).unwrap();
        PatternTable::compile(&set, &StyleTable::new())
    }

    const C_LIKE: &str = r#"
comment::"/\*":"\*/":Comment:
todo:comment:"TODO"::Flag:
string::"""":"""":String::"\n"
escape:string:"\\."::String1:
keyword::"\b(?:if|else)\b"::Keyword:D
"#;

    #[test]
    fn test_codes_and_passes() {
        let (table, diagnostics) = compile(C_LIKE);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(table.len(), 5);
        assert!(table.has_deferred());

        let comment = table.find("comment").unwrap();
        let keyword = table.find("keyword").unwrap();
        assert_eq!(table.pattern(comment).code(), StyleCode::new(2));
        assert_eq!(table.pattern(keyword).code(), StyleCode::new(6));
        assert_eq!(table.first_deferred(), StyleCode::new(6));
        assert_eq!(table.pattern(keyword).pass(), Pass::Deferred);
        assert_eq!(table.pattern(table.immediate_root()).code(), StyleCode::UNFINISHED);

        assert_eq!(table.style_name(StyleCode::new(3)), "Flag");
        assert_eq!(table.style_name(StyleCode::PLAIN), "Plain");
        assert_eq!(table.style_name(StyleCode::UNFINISHED), "Plain");
    }

    #[test]
    fn test_hierarchy_queries() {
        let (table, _) = compile(C_LIKE);
        let root = table.immediate_root();
        let string = table.find("string").unwrap();
        let escape = table.find("escape").unwrap();
        assert!(table.is_ancestor(string, escape));
        assert!(table.is_ancestor(root, escape));
        assert!(!table.is_ancestor(escape, string));
        assert!(table.is_resumable(string));
        assert!(!table.is_resumable(escape));
        assert_eq!(table.stack_for(escape), vec![string]);
        assert!(table.stack_for(root).is_empty());

        let keyword_code = table.pattern(table.find("keyword").unwrap()).code();
        assert_eq!(table.restart_pattern(keyword_code), root);
        assert_eq!(table.restart_pattern(StyleCode::PLAIN), root);
    }

    #[test]
    fn test_equivalence() {
        let (table, _) = compile(C_LIKE);
        let keyword = table.first_deferred();
        let comment = StyleCode::new(2);
        assert!(table.equivalent(StyleCode::UNFINISHED, StyleCode::PLAIN));
        assert!(table.equivalent(keyword, StyleCode::UNFINISHED));
        assert!(!table.equivalent(comment, StyleCode::UNFINISHED));
        assert!(!table.equivalent(comment, StyleCode::PLAIN));
        assert!(!table.equivalent(keyword, StyleCode::PLAIN));
    }

    #[test]
    fn test_no_deferred_root_is_plain() {
        let (table, _) = compile("word::\"\\w+\"::Identifier:\n");
        assert!(!table.has_deferred());
        assert_eq!(table.pattern(table.immediate_root()).code(), StyleCode::PLAIN);
    }

    #[test]
    fn test_compile_error_is_isolated() {
        let text = r#"
good::"a+"::Keyword:
bad::"(b"::Keyword:
child:bad:"c"::Flag:
other::"d"::String:
"#;
        let (table, diagnostics) = compile(text);
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(&diagnostics[0], HighlightError::PatternCompile { name, .. } if name == "bad"));
        assert!(table.find("good").is_some());
        assert!(table.find("other").is_some());
        assert!(table.find("bad").is_none());
        assert!(table.find("child").is_none());
    }

    #[test]
    fn test_missing_style_falls_back_to_plain() {
        let (table, diagnostics) = compile("x::\"x\"::No Such Style:\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_warning());
        let x = table.find("x").unwrap();
        assert_eq!(table.pattern(x).style_name(), "Plain");
    }

    #[test]
    fn test_structural_errors() {
        let text = r#"
orphan:nobody:"x"::Plain:
a:b:"a"::Plain:
b:a:"b"::Plain:
paint::"&"::Plain:C
nostart:::"e":Plain:
lonely::"s"::Plain::"err"
"#;
        let (table, diagnostics) = compile(text);
        assert!(table.is_empty());
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, HighlightError::UnknownParent { parent, .. } if parent == "nobody")));
        assert_eq!(diagnostics.len(), 6);
    }

    #[test]
    fn test_color_only_groups_checked() {
        let text = r#"
call::"(\w+)\("::Subroutine:
name:call:"\1"::Identifier:C
bad:call:"\3"::Identifier:C
"#;
        let (table, diagnostics) = compile(text);
        assert!(table.find("name").is_some());
        assert!(table.find("bad").is_none());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_color_only_before_its_parent() {
        let text = r#"
name:call:"\1"::Identifier:C
call::"(\w+)\("::Subroutine:
bad:call:"\2"::Identifier:C
end:call::"\1":Identifier:C
"#;
        let (table, diagnostics) = compile(text);
        assert!(table.find("name").is_some());
        assert!(table.find("bad").is_none());
        assert!(table.find("end").is_none());
        let messages: Vec<String> = diagnostics.iter().map(|d| d.to_string()).collect();
        assert_eq!(messages.len(), 2, "{messages:?}");
        assert!(messages[0].contains("no sub-expression 2"), "{messages:?}");
        assert!(messages[1].contains("parent has no expression"), "{messages:?}");
    }

    #[test]
    fn test_children_inherit_deferral() {
        let text = r#"
str::"'":"'":String:D
esc:str:"\\."::String1:
"#;
        let (table, _) = compile(text);
        let esc = table.find("esc").unwrap();
        assert_eq!(table.pattern(esc).pass(), Pass::Deferred);
        assert_eq!(table.parent_of(table.find("str").unwrap()), table.deferred_root());
    }

    #[test]
    fn test_disable_after_limit() {
        let (mut table, _) = compile(C_LIKE);
        let todo = table.find("todo").unwrap();
        let comment = table.find("comment").unwrap();
        assert_eq!(table.pattern(comment).sub.as_ref().unwrap().branches().count(), 2);
        assert!(!table.note_failure(todo, 2));
        assert!(table.note_failure(todo, 2));
        assert!(!table.pattern(todo).is_enabled());
        let branches: Vec<_> = table.pattern(comment).sub.as_ref().unwrap().branches().collect();
        assert_eq!(branches, vec![Branch::End]);
        assert!(!table.note_failure(table.immediate_root(), 1));
    }
}
