//! Math typesetting. The [`Typesetter`] trait is the seam between the
//! document transformer and whatever turns TeX into markup;
//! [`LatexTypesetter`] is the default implementation, which renders MathML
//! with `pulldown-latex`. [`typeset_fragment`] adapts a typesetter's output
//! into a [`Node`] ready to be substituted into a document tree.

use crate::dom::{self, Element, Node};
use pulldown_latex::config::{DisplayMode, RenderConfig};
use pulldown_latex::{mathml::push_mathml, Parser, Storage};
use std::fmt;

/// The class appended to display math fragments.
pub const POST_MATH: &str = "post-math";

/// The class which replaces the second class token of inline math fragments.
pub const POST_MATH_INLINE: &str = "post-math-inline";

/// Whether an expression is typeset as a block or inline with the text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MathMode {
    Display,
    Inline,
}

impl MathMode {
    fn class(self) -> &'static str {
        match self {
            MathMode::Display => "math-display",
            MathMode::Inline => "math-inline",
        }
    }
}

/// Converts a single math expression into markup. Each call completes before
/// the caller moves on; implementations don't need to be reentrant.
pub trait Typesetter {
    fn typeset(
        &self,
        expression: &str,
        mode: MathMode,
    ) -> Result<String, TypesetError>;
}

/// Typesets TeX into MathML, wrapped in a `span` with the classes `math` and
/// `math-display` or `math-inline`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LatexTypesetter;

impl Typesetter for LatexTypesetter {
    fn typeset(
        &self,
        expression: &str,
        mode: MathMode,
    ) -> Result<String, TypesetError> {
        let storage = Storage::new();
        let parser = Parser::new(expression, &storage);
        let config = RenderConfig {
            display_mode: match mode {
                MathMode::Display => DisplayMode::Block,
                MathMode::Inline => DisplayMode::Inline,
            },
            ..Default::default()
        };

        let events: Vec<_> = parser.collect();
        let errors: Vec<String> = events
            .iter()
            .filter_map(|e| e.as_ref().err().map(|err| err.to_string()))
            .collect();
        if !errors.is_empty() {
            return Err(TypesetError::Render {
                expression: expression.to_owned(),
                message: errors.join("; "),
            });
        }

        let mut mathml = String::new();
        push_mathml(&mut mathml, events.into_iter(), config).map_err(|e| {
            TypesetError::Render {
                expression: expression.to_owned(),
                message: e.to_string(),
            }
        })?;
        Ok(format!(
            r#"<span class="math {}">{}</span>"#,
            mode.class(),
            mathml
        ))
    }
}

/// Typesets `expression` and parses the result into a fragment. The first
/// element of the output becomes the fragment, and its class list is adjusted
/// so themes can style it: display math gets [`POST_MATH`] appended (once),
/// and inline math has its second class replaced by [`POST_MATH_INLINE`].
pub fn typeset_fragment(
    typesetter: &dyn Typesetter,
    expression: &str,
    mode: MathMode,
) -> Result<Node, TypesetError> {
    let markup = typesetter.typeset(expression, mode)?;
    let mut fragment: Element = dom::parse_fragment(&markup)
        .into_iter()
        .find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
        .ok_or_else(|| TypesetError::Malformed {
            expression: expression.to_owned(),
        })?;

    let mut classes: Vec<String> =
        fragment.classes().into_iter().map(str::to_owned).collect();
    match mode {
        MathMode::Display => {
            if !classes.iter().any(|class| class == POST_MATH) {
                classes.push(POST_MATH.to_owned());
            }
        }
        MathMode::Inline => match classes.get_mut(1) {
            Some(second) => *second = POST_MATH_INLINE.to_owned(),
            None => classes.push(POST_MATH_INLINE.to_owned()),
        },
    }
    fragment.set_classes(classes.as_slice());
    Ok(Node::Element(fragment))
}

/// Represents a failure to typeset an expression.
#[derive(Debug)]
pub enum TypesetError {
    /// Returned when the typesetter rejects the expression.
    Render { expression: String, message: String },

    /// Returned when the typesetter's output contains no element to
    /// substitute into the document.
    Malformed { expression: String },
}

impl fmt::Display for TypesetError {
    /// Displays a [`TypesetError`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypesetError::Render {
                expression,
                message,
            } => write!(f, "typesetting `{}`: {}", expression, message),
            TypesetError::Malformed { expression } => write!(
                f,
                "typesetting `{}`: output contains no element",
                expression
            ),
        }
    }
}

impl std::error::Error for TypesetError {}
