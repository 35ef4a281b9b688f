//! Renders page values through theme templates. Templates use Go template
//! syntax ([`gtmpl`]). The rendered page is post-processed as a document
//! tree: pages with math get the math stylesheet linked from their `<head>`,
//! and whitespace is collapsed when minifying.

use crate::dom::{self, Element, Node};
use gtmpl::{Context, Template, Value};
use log::debug;
use regex::Regex;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;
use std::sync::LazyLock;
use url::Url;

/// Elements whose whitespace is significant.
const PRESERVE_WHITESPACE: &[&str] =
    &["pre", "code", "textarea", "script", "style"];

/// Elements which start a new block; whitespace next to them is dropped.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "dd",
    "details", "div", "dl", "dt", "figcaption", "figure", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hr", "html", "li",
    "link", "main", "meta", "nav", "ol", "option", "p", "pre", "script",
    "section", "style", "summary", "table", "tbody", "td", "tfoot", "th",
    "thead", "title", "tr", "ul",
];

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Loads the template files, concatenates them, and parses the result into a
/// single template. Later files can refer to templates defined by earlier
/// ones.
pub fn parse_template<P: AsRef<Path>>(
    template_files: impl Iterator<Item = P>,
) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        let template_file = template_file.as_ref();
        File::open(template_file)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map_err(|err| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err,
            })?;
        contents.push(' ');
    }

    let mut template = Template::default();
    template
        .parse(&contents)
        .map_err(|err| Error::ParseTemplate(err.to_string()))?;
    Ok(template)
}

/// Executes templates and post-processes their output.
#[derive(Clone, Debug, Default)]
pub struct Renderer {
    /// Whether to collapse insignificant whitespace in the output.
    pub minify: bool,

    /// The stylesheet linked from pages with typeset math.
    pub math_stylesheet: Option<Url>,
}

impl Renderer {
    /// Renders `value` through `template`. `has_math` says whether the page
    /// contains typeset math and therefore needs the math stylesheet.
    pub fn render(
        &self,
        template: &Template,
        value: Value,
        has_math: bool,
    ) -> Result<String> {
        let context = Context::from(value)
            .map_err(|err| Error::Execute(err.to_string()))?;
        let mut output = Vec::new();
        template
            .execute(&mut output, &context)
            .map_err(|err| Error::Execute(err.to_string()))?;
        let output = String::from_utf8(output)?;

        let stylesheet = self.math_stylesheet.as_ref().filter(|_| has_math);
        if !self.minify && stylesheet.is_none() {
            return Ok(output);
        }

        let mut nodes = dom::parse_document(&output);
        if let Some(stylesheet) = stylesheet {
            debug!("Linking {} from the page", stylesheet);
            link_stylesheet(&mut nodes, stylesheet);
        }
        if self.minify {
            collapse_whitespace(&mut nodes, true);
        }
        Ok(dom::serialize(&nodes))
    }
}

/// Appends a stylesheet link to the first `<head>` element. Returns whether
/// one was found (the document parser implies one if the template has none).
fn link_stylesheet(nodes: &mut [Node], stylesheet: &Url) -> bool {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.name.eq_ignore_ascii_case("head") {
                el.children.push(Node::Element(
                    Element::new("link")
                        .with_attr("rel", "stylesheet")
                        .with_attr("type", "text/css")
                        .with_attr("href", stylesheet.as_str()),
                ));
                return true;
            }
            if link_stylesheet(&mut el.children, stylesheet) {
                return true;
            }
        }
    }
    false
}

fn is_block(node: Option<&Node>) -> bool {
    match node {
        None => false,
        Some(Node::Element(el)) => BLOCK_ELEMENTS
            .iter()
            .any(|name| el.name.eq_ignore_ascii_case(name)),
        Some(Node::Doctype(_)) => true,
        Some(_) => false,
    }
}

/// Collapses runs of whitespace in text to a single space and trims text
/// next to block boundaries, dropping text that ends up empty. `block` says
/// whether the parent of `nodes` is a block (or the document root).
fn collapse_whitespace(nodes: &mut Vec<Node>, block: bool) {
    for node in nodes.iter_mut() {
        let child_block = is_block(Some(&*node));
        if let Node::Element(el) = node {
            let preserve = PRESERVE_WHITESPACE
                .iter()
                .any(|name| el.name.eq_ignore_ascii_case(name));
            if !preserve {
                collapse_whitespace(&mut el.children, child_block);
            }
        }
    }

    let mut index = 0;
    while index < nodes.len() {
        let boundary_before = match index.checked_sub(1) {
            Some(prev) => is_block(nodes.get(prev)),
            None => block,
        };
        let boundary_after = match nodes.get(index + 1) {
            Some(next) => is_block(Some(next)),
            None => block,
        };
        if let Node::Text(text) = &mut nodes[index] {
            let mut collapsed = WHITESPACE.replace_all(text, " ").into_owned();
            if boundary_before {
                collapsed = collapsed.trim_start().to_owned();
            }
            if boundary_after {
                collapsed = collapsed.trim_end().to_owned();
            }
            if collapsed.is_empty() {
                nodes.remove(index);
                continue;
            }
            *text = collapsed;
        }
        index += 1;
    }
}

/// The result of a fallible templating operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or rendering a template.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate(String),

    /// Returned for errors executing a template.
    Execute(String),

    /// Returned when a template produces invalid UTF-8.
    Utf8(FromUtf8Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenTemplateFile { path, err } => write!(
                f,
                "opening template file '{}': {}",
                path.display(),
                err
            ),
            Error::ParseTemplate(err) => write!(f, "parsing template: {}", err),
            Error::Execute(err) => write!(f, "executing template: {}", err),
            Error::Utf8(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Execute(_) => None,
            Error::Utf8(err) => Some(err),
        }
    }
}

impl From<FromUtf8Error> for Error {
    /// Converts [`FromUtf8Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: FromUtf8Error) -> Error {
        Error::Utf8(err)
    }
}
