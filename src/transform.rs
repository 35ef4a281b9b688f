//! Post-processes a rendered post body: walks the document tree, replacing
//! fenced math blocks, inline math and code with typeset or highlighted
//! fragments.
//!
//! The walk is a pre-order, depth-first traversal over siblings from left to
//! right. Each node is classified when it is visited:
//!
//! * `pre` whose first element child is a `code` with a class: a display math
//!   block if the first class token is [`MATH_LANGUAGE`], otherwise a code
//!   block in the language named by that token (minus the `lang-` prefix).
//!   The `pre` is replaced.
//! * `pre` of any other shape is left alone and its children are visited.
//! * `code`: inline math if its text is wrapped in `$`, otherwise inline code.
//!   The `code` is replaced.
//! * any other element: its children are visited.
//!
//! Replacement fragments are not visited again. Typesetting is sequential:
//! the walk doesn't advance until the current node's fragment is ready, and
//! the first failure aborts the whole walk.

use crate::dom::{self, Element, Node};
use crate::highlight::highlight;
use crate::math::{typeset_fragment, MathMode, TypesetError, Typesetter};
use log::debug;
use std::fmt;

/// The class a fenced code block carries when it holds display math.
pub const MATH_LANGUAGE: &str = "lang-math";

/// The prefix of the class naming a code block's language.
pub const LANGUAGE_PREFIX: &str = "lang-";

/// Per-document switches for the [`Transformer`].
#[derive(Clone, Debug)]
pub struct TransformOptions {
    /// Whether math blocks and `$...$` inline code are typeset. Documents
    /// which don't opt into math have their `$` spans highlighted as ordinary
    /// inline code.
    pub math: bool,

    /// The language inline code is highlighted as when it has no `lang-`
    /// class of its own.
    pub inline_language: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            math: true,
            inline_language: String::from("text"),
        }
    }
}

/// Counts what a [`Transformer::transform`] call replaced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub display_math: usize,
    pub inline_math: usize,
    pub code_blocks: usize,
    pub inline_code: usize,

    /// `pre` elements left alone because they didn't have the expected shape.
    pub skipped: usize,
}

impl Summary {
    /// Whether any math was typeset (and thus whether the page needs the math
    /// stylesheet).
    pub fn has_math(&self) -> bool {
        self.display_math > 0 || self.inline_math > 0
    }
}

/// Walks document trees, replacing math and code. See the module
/// documentation for the traversal and classification rules.
pub struct Transformer<'a> {
    typesetter: &'a dyn Typesetter,
    options: TransformOptions,
}

/// What to do with a visited node.
enum Visit {
    /// Substitute the node in place.
    Replace(Node),

    /// Visit the node's children (if any).
    Descend,
}

impl<'a> Transformer<'a> {
    pub fn new(
        typesetter: &'a dyn Typesetter,
        options: TransformOptions,
    ) -> Transformer<'a> {
        Transformer {
            typesetter,
            options,
        }
    }

    /// Transforms `nodes` in place.
    pub fn transform(&self, nodes: &mut [Node]) -> Result<Summary> {
        let mut summary = Summary::default();
        self.visit_all(nodes, &mut summary)?;
        Ok(summary)
    }

    fn visit_all(
        &self,
        siblings: &mut [Node],
        summary: &mut Summary,
    ) -> Result<()> {
        for index in 0..siblings.len() {
            match self.visit(&siblings[index], summary)? {
                Visit::Replace(node) => siblings[index] = node,
                Visit::Descend => {
                    if let Some(el) = siblings[index].as_element_mut() {
                        self.visit_all(&mut el.children, summary)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn visit(&self, node: &Node, summary: &mut Summary) -> Result<Visit> {
        let el = match node {
            Node::Element(el) => el,
            _ => return Ok(Visit::Descend),
        };

        if el.name.eq_ignore_ascii_case("pre") {
            let code = el
                .first_element_child()
                .filter(|code| code.name.eq_ignore_ascii_case("code"));
            let token = code.and_then(|code| {
                code.classes().first().map(|token| token.to_string())
            });
            return match (code, token) {
                (Some(code), Some(token))
                    if token == MATH_LANGUAGE && self.options.math =>
                {
                    summary.display_math += 1;
                    let expression = code.text_content();
                    Ok(Visit::Replace(typeset_fragment(
                        self.typesetter,
                        expression.trim(),
                        MathMode::Display,
                    )?))
                }
                (Some(code), Some(token)) => {
                    summary.code_blocks += 1;
                    let language =
                        token.strip_prefix(LANGUAGE_PREFIX).unwrap_or(&token);
                    Ok(Visit::Replace(code_block(el, code, language)))
                }
                _ => {
                    // Not the shape of a fenced code block.
                    summary.skipped += 1;
                    debug!("Leaving <pre> without a classed <code> untouched");
                    Ok(Visit::Descend)
                }
            };
        }

        if el.name.eq_ignore_ascii_case("code") {
            let text = el.text_content();
            if self.options.math && is_inline_math(&text) {
                summary.inline_math += 1;
                return Ok(Visit::Replace(typeset_fragment(
                    self.typesetter,
                    &text[1..text.len() - 1],
                    MathMode::Inline,
                )?));
            }
            summary.inline_code += 1;
            let classes = el.classes();
            let language = classes
                .first()
                .and_then(|token| token.strip_prefix(LANGUAGE_PREFIX))
                .unwrap_or(&self.options.inline_language);
            return Ok(Visit::Replace(Node::Element(highlighted(
                el, &text, language,
            ))));
        }

        Ok(Visit::Descend)
    }
}

fn is_inline_math(text: &str) -> bool {
    text.len() >= 2 && text.starts_with('$') && text.ends_with('$')
}

/// Rebuilds a `pre > code` block with highlighted contents, keeping the
/// attributes of both elements.
fn code_block(pre: &Element, code: &Element, language: &str) -> Node {
    let code = highlighted(code, &code.text_content(), language);
    let mut pre = Element {
        name: pre.name.clone(),
        attributes: pre.attributes.clone(),
        children: vec![Node::Element(code)],
    };
    if !pre.classes().contains(&"code") {
        let mut classes: Vec<String> =
            pre.classes().into_iter().map(str::to_owned).collect();
        classes.push(String::from("code"));
        pre.set_classes(classes.as_slice());
    }
    Node::Element(pre)
}

/// Copies `el` with its children replaced by the highlighted `text`.
fn highlighted(el: &Element, text: &str, language: &str) -> Element {
    Element {
        name: el.name.clone(),
        attributes: el.attributes.clone(),
        children: dom::parse_fragment(&highlight(text, language)),
    }
}

/// Parses `markup`, transforms it, and serializes it again.
pub fn transform_html(
    markup: &str,
    transformer: &Transformer,
) -> Result<(String, Summary)> {
    let mut nodes = dom::parse_fragment(markup);
    let summary = transformer.transform(&mut nodes)?;
    Ok((dom::serialize(&nodes), summary))
}

/// The result of a fallible transformation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to transform a document.
#[derive(Debug)]
pub enum Error {
    /// Returned when an expression couldn't be typeset.
    Typeset(TypesetError),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Typeset(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Typeset(err) => Some(err),
        }
    }
}

impl From<TypesetError> for Error {
    /// Converts a [`TypesetError`] into an [`Error`]. This allows us to use
    /// the `?` operator when typesetting.
    fn from(err: TypesetError) -> Error {
        Error::Typeset(err)
    }
}
