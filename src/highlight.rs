//! A small syntax highlighter built from an ordered list of regular-expression
//! passes. The input is escaped first and then split into segments; each pass
//! only looks at the segments that no earlier pass has claimed, wrapping its
//! matches in `<span class="token {class}">`. Because claimed segments are
//! never scanned again, spans don't overlap and a keyword inside a string
//! literal stays part of the string.
//!
//! The passes run in this order:
//!
//! 1. string literals
//! 2. comments (line comments, then block comments)
//! 3. keywords
//! 4. global/builtin identifiers and numeric literals
//! 5. the name bound by a declaring keyword (`const a`, `fn main`)
//! 6. call-like identifiers immediately followed by `(`
//!
//! Markup (`html`, `xml`, `svg`) replaces passes 3-6 with tag boundaries and
//! attribute names.
//!
//! Highlighting is one-shot: running [`highlight`] over its own output will
//! happily wrap the spans it produced the first time.

use crate::dom::escape_text;
use regex::Regex;
use std::sync::LazyLock;

pub const STRING: &str = "string";
pub const COMMENT: &str = "comment";
pub const KEYWORD: &str = "keyword";
pub const GLOBAL: &str = "global";
pub const DECLARATION: &str = "declaration";
pub const METHOD: &str = "method";
pub const TAG: &str = "tag";
pub const ATTR_NAME: &str = "attr-name";

/// Highlights `code` as `language`, returning markup. Unknown languages are
/// highlighted with a generic C-family grammar; plain-text languages (`text`,
/// `plain`, `none`, TeX, or no language at all) are only escaped.
pub fn highlight(code: &str, language: &str) -> String {
    let segments = vec![Segment::raw(&escape_text(code))];
    let segments = match grammar(language) {
        Grammar::Plain => segments,
        Grammar::Markup => highlight_markup(segments),
        Grammar::Code(grammar) => grammar.highlight(segments),
    };

    let mut out = String::new();
    for segment in segments {
        match segment.class {
            None => out.push_str(&segment.text),
            Some(class) => {
                out.push_str(r#"<span class="token "#);
                out.push_str(class);
                out.push_str(r#"">"#);
                out.push_str(&segment.text);
                out.push_str("</span>");
            }
        }
    }
    out
}

#[derive(Debug)]
struct Segment {
    text: String,

    /// The token class of a claimed segment, or `None` if no pass has claimed
    /// it yet.
    class: Option<&'static str>,
}

impl Segment {
    fn raw(text: &str) -> Segment {
        Segment {
            text: text.to_owned(),
            class: None,
        }
    }
}

fn push_raw(out: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = out.last_mut() {
        if last.class.is_none() {
            last.text.push_str(text);
            return;
        }
    }
    out.push(Segment::raw(text));
}

/// Runs one pass: every match of capture group `group` of `re` inside an
/// unclaimed segment is claimed as `class`.
fn wrap_matches(
    segments: Vec<Segment>,
    re: &Regex,
    group: usize,
    class: &'static str,
) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.class.is_some() {
            out.push(segment);
            continue;
        }

        let mut last = 0;
        for caps in re.captures_iter(&segment.text) {
            let m = match caps.get(group) {
                Some(m) if !m.as_str().is_empty() && m.start() >= last => m,
                _ => continue,
            };
            push_raw(&mut out, &segment.text[last..m.start()]);
            out.push(Segment {
                text: m.as_str().to_owned(),
                class: Some(class),
            });
            last = m.end();
        }
        push_raw(&mut out, &segment.text[last..]);
    }
    out
}

/// Claims the identifier immediately following a declaring keyword (e.g., the
/// `a` in `const a`).
fn wrap_declarations(
    segments: Vec<Segment>,
    declaring: &[&str],
) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        let follows_declaring = matches!(
            out.last(),
            Some(Segment { class: Some(KEYWORD), text })
                if declaring.contains(&text.as_str())
        );
        if segment.class.is_none() && follows_declaring {
            let name = DECLARATION_NAME
                .captures(&segment.text)
                .and_then(|c| c.get(1));
            if let Some(name) = name {
                push_raw(&mut out, &segment.text[..name.start()]);
                out.push(Segment {
                    text: name.as_str().to_owned(),
                    class: Some(DECLARATION),
                });
                push_raw(&mut out, &segment.text[name.end()..]);
                continue;
            }
        }
        out.push(segment);
    }
    out
}

enum Grammar {
    Plain,
    Markup,
    Code(&'static CodeGrammar),
}

fn grammar(language: &str) -> Grammar {
    match language.to_ascii_lowercase().as_str() {
        "" | "text" | "plain" | "plaintext" | "txt" | "none" => Grammar::Plain,
        "math" | "tex" | "latex" => Grammar::Plain,
        "html" | "xml" | "svg" | "markup" => Grammar::Markup,
        "js" | "javascript" | "jsx" | "ts" | "typescript" | "tsx" => {
            Grammar::Code(&JAVASCRIPT)
        }
        "rust" | "rs" => Grammar::Code(&RUST),
        "python" | "py" => Grammar::Code(&PYTHON),
        "sh" | "bash" | "shell" | "zsh" => Grammar::Code(&SHELL),
        _ => Grammar::Code(&GENERIC),
    }
}

struct CodeGrammar {
    strings: Regex,
    line_comment: Regex,
    block_comment: Option<Regex>,
    keywords: Regex,
    globals: Regex,

    /// Keywords which bind the name that follows them.
    declaring: &'static [&'static str],
}

impl CodeGrammar {
    fn new(
        strings: &Regex,
        line_comment: &str,
        block_comment: Option<&str>,
        keywords: &[&str],
        globals: &[&str],
        declaring: &'static [&'static str],
    ) -> CodeGrammar {
        CodeGrammar {
            strings: strings.clone(),
            line_comment: Regex::new(line_comment).unwrap(),
            block_comment: block_comment.map(|re| Regex::new(re).unwrap()),
            keywords: Regex::new(&word_list(keywords)).unwrap(),
            globals: Regex::new(&format!(
                r"{}|\b0x[0-9a-fA-F]+\b|\b\d+(?:\.\d+)?\b",
                word_list(globals)
            ))
            .unwrap(),
            declaring,
        }
    }

    fn highlight(&self, segments: Vec<Segment>) -> Vec<Segment> {
        let mut segments = wrap_matches(segments, &self.strings, 0, STRING);
        segments = wrap_matches(segments, &self.line_comment, 0, COMMENT);
        if let Some(block_comment) = &self.block_comment {
            segments = wrap_matches(segments, block_comment, 0, COMMENT);
        }
        segments = wrap_matches(segments, &self.keywords, 0, KEYWORD);
        segments = wrap_matches(segments, &self.globals, 0, GLOBAL);
        segments = wrap_declarations(segments, self.declaring);
        wrap_matches(segments, &CALL, 1, METHOD)
    }
}

fn highlight_markup(segments: Vec<Segment>) -> Vec<Segment> {
    let segments = wrap_matches(segments, &STRINGS, 0, STRING);
    let segments = wrap_matches(segments, &MARKUP_COMMENT, 0, COMMENT);
    let segments = wrap_matches(segments, &MARKUP_TAG, 0, TAG);
    wrap_matches(segments, &MARKUP_ATTR_NAME, 1, ATTR_NAME)
}

fn word_list(words: &[&str]) -> String {
    let alternatives: Vec<String> =
        words.iter().map(|w| regex::escape(w)).collect();
    format!(r"\b(?:{})\b", alternatives.join("|"))
}

static STRINGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#""(?:\\.|[^"\\\n])*"|"#,
        r#"'(?:\\.|[^'\\\n])*'|"#,
        r#"`(?:\\.|[^`\\])*`"#,
    ))
    .unwrap()
});

/// Rust uses `'` for lifetimes as well as char literals, so only single
/// (possibly escaped) characters count.
static RUST_STRINGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\\n])'"#).unwrap()
});

static DECLARATION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+([A-Za-z_$][\w$]*)").unwrap());

static CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\(").unwrap());

static MARKUP_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&lt;!--[\s\S]*?--&gt;").unwrap());

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&lt;/?[A-Za-z][\w:.-]*|/?&gt;").unwrap());

static MARKUP_ATTR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_:@][\w:.-]*)=").unwrap());

static JAVASCRIPT: LazyLock<CodeGrammar> = LazyLock::new(|| {
    CodeGrammar::new(
        &STRINGS,
        r"//[^\n]*",
        Some(r"/\*[\s\S]*?\*/"),
        &[
            "async", "await", "break", "case", "catch", "class", "const",
            "continue", "debugger", "default", "delete", "do", "else", "export",
            "extends", "finally", "for", "from", "function", "if", "import",
            "in", "instanceof", "interface", "let", "new", "of", "return",
            "static", "super", "switch", "this", "throw", "try", "type",
            "typeof", "var", "void", "while", "with", "yield",
        ],
        &[
            "true", "false", "null", "undefined", "NaN", "Infinity", "window",
            "document", "console", "Math", "JSON", "Object", "Array", "String",
            "Number", "Boolean", "Promise", "Symbol", "Map", "Set", "Error",
            "require", "module", "exports", "process", "globalThis",
        ],
        &["const", "let", "var", "function", "class", "interface", "type"],
    )
});

static RUST: LazyLock<CodeGrammar> = LazyLock::new(|| {
    CodeGrammar::new(
        &RUST_STRINGS,
        r"//[^\n]*",
        Some(r"/\*[\s\S]*?\*/"),
        &[
            "as", "async", "await", "break", "const", "continue", "crate",
            "dyn", "else", "enum", "extern", "fn", "for", "if", "impl", "in",
            "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
            "return", "self", "Self", "static", "struct", "super", "trait",
            "type", "unsafe", "use", "where", "while",
        ],
        &[
            "true", "false", "Some", "None", "Ok", "Err", "Box", "Vec",
            "String", "Option", "Result",
        ],
        &[
            "const", "enum", "fn", "let", "mod", "static", "struct", "trait",
            "type",
        ],
    )
});

static PYTHON: LazyLock<CodeGrammar> = LazyLock::new(|| {
    CodeGrammar::new(
        &STRINGS,
        r"#[^\n]*",
        None,
        &[
            "and", "as", "assert", "async", "await", "break", "class",
            "continue", "def", "del", "elif", "else", "except", "finally",
            "for", "from", "global", "if", "import", "in", "is", "lambda",
            "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
            "with", "yield",
        ],
        &[
            "True", "False", "None", "self", "print", "len", "range", "list",
            "dict", "set", "str", "int", "float",
        ],
        &["def", "class"],
    )
});

static SHELL: LazyLock<CodeGrammar> = LazyLock::new(|| {
    CodeGrammar::new(
        &STRINGS,
        r"#[^\n]*",
        None,
        &[
            "case", "do", "done", "elif", "else", "esac", "export", "fi", "for",
            "function", "if", "in", "local", "return", "then", "until", "while",
        ],
        &["echo", "cd", "exit", "true", "false"],
        &["function", "local", "export"],
    )
});

static GENERIC: LazyLock<CodeGrammar> = LazyLock::new(|| {
    CodeGrammar::new(
        &STRINGS,
        r"//[^\n]*",
        Some(r"/\*[\s\S]*?\*/"),
        &[
            "break", "case", "class", "const", "continue", "default", "do",
            "else", "enum", "for", "func", "function", "if", "import", "new",
            "package", "private", "public", "return", "static", "struct",
            "switch", "this", "var", "void", "while",
        ],
        &["true", "false", "null", "nil", "NULL"],
        &["class", "const", "enum", "func", "function", "struct", "var"],
    )
});

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn span(class: &str, text: &str) -> String {
        format!(r#"<span class="token {}">{}</span>"#, class, text)
    }

    #[test]
    fn test_declaration_and_call_are_distinct_spans() {
        assert_eq!(
            format!(
                "{} {}(){{}}",
                span(KEYWORD, "const"),
                span(DECLARATION, "a")
            ),
            highlight("const a(){}", "js")
        );
        assert_eq!(
            format!("{}()", span(METHOD, "a")),
            highlight("a()", "js")
        );
    }

    #[test]
    fn test_keyword_inside_string_stays_string() {
        assert_eq!(
            format!(
                "{} {};",
                span(KEYWORD, "return"),
                span(STRING, r#""return""#)
            ),
            highlight(r#"return "return";"#, "javascript")
        );
    }

    #[test]
    fn test_comments_claim_their_contents() {
        assert_eq!(
            format!(
                "{} {}\n{}",
                span(GLOBAL, "1"),
                span(COMMENT, "// let x = f()"),
                span(COMMENT, "/* if */"),
            ),
            highlight("1 // let x = f()\n/* if */", "js")
        );
    }

    #[test]
    fn test_globals_and_numbers() {
        assert_eq!(
            format!(
                "{}.{}({}, {})",
                span(GLOBAL, "console"),
                span(METHOD, "log"),
                span(GLOBAL, "42"),
                span(GLOBAL, "null"),
            ),
            highlight("console.log(42, null)", "js")
        );
    }

    #[test]
    fn test_rust_declarations_and_lifetimes() {
        assert_eq!(
            format!(
                "{} {}&lt;'a&gt;(s: &amp;'a str) {{ {}(s) }}",
                span(KEYWORD, "fn"),
                span(DECLARATION, "first"),
                span(METHOD, "go"),
            ),
            highlight("fn first<'a>(s: &'a str) { go(s) }", "rust")
        );
    }

    #[test]
    fn test_python_comments() {
        assert_eq!(
            format!(
                "{} {}(): {}",
                span(KEYWORD, "def"),
                span(DECLARATION, "f"),
                span(COMMENT, "# return"),
            ),
            highlight("def f(): # return", "py")
        );
    }

    #[test]
    fn test_markup() {
        assert_eq!(
            format!(
                "{} {}{}{}hi{}{}{}",
                span(TAG, "&lt;a"),
                span(ATTR_NAME, "href"),
                "=",
                format!("{}{}", span(STRING, r#""/x""#), span(TAG, "&gt;")),
                span(TAG, "&lt;/a"),
                span(TAG, "&gt;"),
                span(COMMENT, "&lt;!-- c --&gt;"),
            ),
            highlight(r#"<a href="/x">hi</a><!-- c -->"#, "html")
        );
    }

    #[test]
    fn test_plain_text_is_only_escaped() {
        assert_eq!(
            "if (a &lt; b) return;",
            highlight("if (a < b) return;", "text")
        );
        assert_eq!("x &amp;&amp; y", highlight("x && y", ""));
        assert_eq!("return x", highlight("return x", "none"));
        assert!(highlight("return x", "go").contains("token keyword"));
    }

    #[test]
    fn test_not_idempotent() {
        let once = highlight("let x", "js");
        assert_ne!(once, highlight(&once, "js"));
    }
}
