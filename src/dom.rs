//! Defines the document tree ([`Node`], [`Element`]) that rendered post bodies
//! and page templates are post-processed as, along with its serializer
//! ([`serialize`]).
//!
//! Markup is parsed with [`html5ever`], so optional end tags, implied
//! elements and foreign content (MathML, SVG) are handled the way a browser
//! handles them. The resulting DOM is lowered into the owned [`Node`] tree,
//! which the transformer and the page post-processor can edit in place.

use html5ever::tendril::TendrilSink;
use html5ever::ParseOpts;
use markup5ever::{local_name, namespace_url, ns, Attribute, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::borrow::Cow;

/// Elements which never have children or a close tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Elements whose contents are not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "noscript", "script", "style", "xmp",
];

/// Elements which drop a newline directly after their start tag when parsed.
const LEADING_NEWLINE_ELEMENTS: &[&str] = &["listing", "pre", "textarea"];

/// A node in a document tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Text content. Entities are decoded, so this is the text as the reader
    /// would see it (except inside raw text elements, which are verbatim).
    Text(String),

    /// A tagged node with attributes and children.
    Element(Element),

    /// The body of an HTML comment (`<!--{}-->`).
    Comment(String),

    /// The body of a doctype declaration (`<!DOCTYPE {}>`).
    Doctype(String),
}

/// An element node. Attribute order is preserved. Names are as the HTML
/// parser reports them, so SVG and MathML names keep their case (e.g.,
/// `viewBox`) and namespaced attributes keep their prefix (`xlink:href`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Constructs an element with no attributes and no children.
    pub fn new<S: Into<String>>(name: S) -> Element {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style variant of [`Element::set_attr`].
    pub fn with_attr<V: Into<String>>(
        mut self,
        name: &str,
        value: V,
    ) -> Element {
        self.set_attr(name, value);
        self
    }

    /// Returns the value of the attribute called `name`, if any.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing an existing value in place or appending a
    /// new attribute.
    pub fn set_attr<V: Into<String>>(&mut self, name: &str, value: V) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(attr) => attr.1 = value,
            None => self.attributes.push((name.to_owned(), value)),
        }
    }

    /// The whitespace-separated tokens of the `class` attribute. Empty if the
    /// attribute is missing.
    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|class| class.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Replaces the `class` attribute with `classes` joined by spaces.
    pub fn set_classes<S: AsRef<str>>(&mut self, classes: &[S]) {
        let joined = classes
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<&str>>()
            .join(" ");
        self.set_attr("class", joined);
    }

    /// Whether this element is a void element (e.g., `br`, `img`).
    pub fn is_void(&self) -> bool {
        is_one_of(&self.name, VOID_ELEMENTS)
    }

    fn is_raw_text(&self) -> bool {
        is_one_of(&self.name, RAW_TEXT_ELEMENTS)
    }

    /// Returns the first child which is an element, skipping text (usually
    /// whitespace) and comments.
    pub fn first_element_child(&self) -> Option<&Element> {
        self.children.iter().find_map(Node::as_element)
    }

    /// Concatenates the text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        push_text_content(&mut out, &self.children);
        out
    }
}

fn push_text_content(out: &mut String, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => push_text_content(out, &el.children),
            Node::Comment(_) | Node::Doctype(_) => {}
        }
    }
}

impl Node {
    /// Shorthand for constructing a [`Node::Text`].
    pub fn text<S: Into<String>>(text: S) -> Node {
        Node::Text(text.into())
    }

    /// Returns the element if this is an element node.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Mutable variant of [`Node::as_element`].
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// Parses a complete page. Missing `html`, `head` and `body` elements are
/// implied, as are missing end tags.
pub fn parse_document(markup: &str) -> Vec<Node> {
    let dom = html5ever::parse_document(RcDom::default(), ParseOpts::default())
        .one(markup);
    let mut nodes = Vec::new();
    lower_children(&dom.document, &mut nodes);
    nodes
}

/// Parses markup as the contents of a `<body>` element (e.g., a rendered
/// post body or a highlighted code fragment).
pub fn parse_fragment(markup: &str) -> Vec<Node> {
    let context = QualName::new(None, ns!(html), local_name!("body"));
    let dom = html5ever::parse_fragment(
        RcDom::default(),
        ParseOpts::default(),
        context,
        Vec::new(),
    )
    .one(markup);

    // The fragment's nodes hang off a synthetic `html` root.
    let mut nodes = Vec::new();
    if let Some(root) = dom.document.children.borrow().first() {
        lower_children(root, &mut nodes);
    }
    nodes
}

fn lower_children(handle: &Handle, out: &mut Vec<Node>) {
    for child in handle.children.borrow().iter() {
        lower(child, out);
    }
}

fn lower(handle: &Handle, out: &mut Vec<Node>) {
    match &handle.data {
        NodeData::Document => lower_children(handle, out),
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => out.push(Node::Doctype(doctype(name, public_id, system_id))),
        NodeData::Text { contents } => {
            out.push(Node::Text(contents.borrow().to_string()))
        }
        NodeData::Comment { contents } => {
            out.push(Node::Comment(contents.to_string()))
        }
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let mut children = Vec::new();
            match template_contents.borrow().as_ref() {
                Some(contents) => lower_children(contents, &mut children),
                None => lower_children(handle, &mut children),
            }
            out.push(Node::Element(Element {
                name: name.local.to_string(),
                attributes: attrs.borrow().iter().map(attribute).collect(),
                children,
            }));
        }
        NodeData::ProcessingInstruction { .. } => {}
    }
}

fn attribute(attr: &Attribute) -> (String, String) {
    let name = match &attr.name.prefix {
        Some(prefix) => format!("{}:{}", prefix, attr.name.local),
        None => attr.name.local.to_string(),
    };
    (name, attr.value.to_string())
}

fn doctype(name: &str, public_id: &str, system_id: &str) -> String {
    match (public_id.is_empty(), system_id.is_empty()) {
        (true, true) => name.to_owned(),
        (true, false) => format!(r#"{} SYSTEM "{}""#, name, system_id),
        (false, true) => format!(r#"{} PUBLIC "{}""#, name, public_id),
        (false, false) => {
            format!(r#"{} PUBLIC "{}" "{}""#, name, public_id, system_id)
        }
    }
}

/// Counts every node in the forest, including descendants.
pub fn count_nodes(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::Element(el) => 1 + count_nodes(&el.children),
            _ => 1,
        })
        .sum()
}

/// Returns the element names of the forest in document (pre-)order.
pub fn tag_sequence(nodes: &[Node]) -> Vec<&str> {
    fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a str>) {
        for node in nodes {
            if let Node::Element(el) = node {
                out.push(&el.name);
                walk(&el.children, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(nodes, &mut out);
    out
}

/// Serializes a forest of nodes back into markup.
pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node, false);
    }
    out
}

fn write_node(out: &mut String, node: &Node, raw: bool) {
    match node {
        Node::Text(text) if raw => out.push_str(text),
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype);
            out.push('>');
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (name, value) in &el.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(value));
                out.push('"');
            }
            if el.is_void() {
                out.push_str(" />");
                return;
            }
            out.push('>');

            // The parser eats one newline after these start tags, so a
            // leading newline in the content has to be doubled.
            if is_one_of(&el.name, LEADING_NEWLINE_ELEMENTS) {
                if let Some(Node::Text(text)) = el.children.first() {
                    if text.starts_with('\n') {
                        out.push('\n');
                    }
                }
            }

            let raw = el.is_raw_text();
            for child in &el.children {
                write_node(out, child, raw);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}

/// Escapes text content for inclusion in markup.
pub fn escape_text(text: &str) -> Cow<str> {
    escape(text, |c| matches!(c, '&' | '<' | '>'))
}

/// Escapes an attribute value for inclusion in a double-quoted attribute.
pub fn escape_attribute(value: &str) -> Cow<str> {
    escape(value, |c| matches!(c, '&' | '<' | '>' | '"'))
}

fn escape(input: &str, needs_escape: impl Fn(char) -> bool) -> Cow<str> {
    if !input.chars().any(&needs_escape) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '&' if needs_escape(c) => out.push_str("&amp;"),
            '<' if needs_escape(c) => out.push_str("&lt;"),
            '>' if needs_escape(c) => out.push_str("&gt;"),
            '"' if needs_escape(c) => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn is_one_of(name: &str, names: &[&str]) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested_elements() {
        let nodes =
            parse_fragment(r#"<p class="intro">Hello, <em>world</em>!</p>"#);
        let em = Element {
            children: vec![Node::text("world")],
            ..Element::new("em")
        };
        let p = Element {
            children: vec![
                Node::text("Hello, "),
                Node::Element(em),
                Node::text("!"),
            ],
            ..Element::new("p").with_attr("class", "intro")
        };
        assert_eq!(vec![Node::Element(p)], nodes);
    }

    #[test]
    fn test_parse_void_and_foreign_self_closing() {
        let nodes = parse_fragment(
            r#"<p>a<br>b<math><mspace width="1em"/></math>c</p>"#,
        );
        assert_eq!(vec!["p", "br", "math", "mspace"], tag_sequence(&nodes));
        assert_eq!(7, count_nodes(&nodes));
    }

    #[test]
    fn test_parse_decodes_entities() {
        let nodes = parse_fragment(
            "<code>a &lt; b &amp;&amp; c &#62; d &#x41; &bogus;</code>",
        );
        let code = nodes[0].as_element().map(Element::text_content);
        assert_eq!(Some("a < b && c > d A &bogus;".to_owned()), code);
    }

    #[test]
    fn test_parse_optional_end_tags() {
        let nodes = parse_fragment(concat!(
            "<ul><li>one<li>two</ul>",
            "<p>para<div>block</div>",
            "<div><p>three</span><p>four",
        ));
        assert_eq!(
            vec!["ul", "li", "li", "p", "div", "div", "p", "p"],
            tag_sequence(&nodes)
        );
        assert_eq!(
            concat!(
                "<ul><li>one</li><li>two</li></ul>",
                "<p>para</p><div>block</div>",
                "<div><p>three</p><p>four</p></div>",
            ),
            serialize(&nodes)
        );
    }

    #[test]
    fn test_parse_raw_text() {
        let markup = "<script>if (a < b && c) {}</script><p>x</p>";
        let nodes = parse_fragment(markup);
        assert_eq!(vec!["script", "p"], tag_sequence(&nodes));
        assert_eq!(markup, serialize(&nodes));
    }

    #[test]
    fn test_parse_document() {
        let nodes = parse_document("<!DOCTYPE html><html><!-- more --></html>");
        assert_eq!(Node::Doctype("html".to_owned()), nodes[0]);
        assert_eq!(
            concat!(
                "<!DOCTYPE html><html><!-- more -->",
                "<head></head><body></body></html>",
            ),
            serialize(&nodes)
        );
    }

    #[test]
    fn test_foreign_names_keep_case() {
        let nodes =
            parse_fragment(r#"<svg viewBox="0 0 10 10" hidden></svg>"#);
        let svg = nodes[0].as_element();
        assert_eq!(Some("0 0 10 10"), svg.and_then(|el| el.attr("viewBox")));
        assert_eq!(Some(""), svg.and_then(|el| el.attr("hidden")));
    }

    #[test]
    fn test_literal_less_than_is_text() {
        let nodes = parse_fragment("1 < 2");
        assert_eq!(vec![Node::text("1 < 2")], nodes);
        assert_eq!("1 &lt; 2", serialize(&nodes));
    }

    #[test]
    fn test_unterminated_markup_recovers() {
        assert_eq!(vec!["p"], tag_sequence(&parse_fragment("<p><a href=x")));
        assert_eq!(
            vec!["p"],
            tag_sequence(&parse_fragment("<p>ok<!-- never closed"))
        );
    }

    #[test]
    fn test_pre_leading_newline_survives() {
        let nodes = parse_fragment("<pre>\n\nx</pre>");
        assert_eq!("<pre>\n\nx</pre>", serialize(&nodes));
        assert_eq!(nodes, parse_fragment(&serialize(&nodes)));
    }

    #[test]
    fn test_round_trip_preserves_shape() {
        let input = concat!(
            r#"<h3 id="intro">Intro</h3><p>Some <code>x &lt; y</code> and "#,
            r#"<a href="/a?b=1&amp;c=2" title="">a link</a>.</p>"#,
            "<pre><code class=\"lang-js\">let a = \"&lt;b&gt;\";\n",
            "</code></pre>",
            r#"<ul><li><input disabled="" type="checkbox" />done</li></ul>"#,
        );
        let nodes = parse_fragment(input);
        let reparsed = parse_fragment(&serialize(&nodes));
        assert_eq!(count_nodes(&nodes), count_nodes(&reparsed));
        assert_eq!(tag_sequence(&nodes), tag_sequence(&reparsed));
        assert_eq!(nodes, reparsed);
    }

    #[test]
    fn test_classes() {
        let mut el =
            Element::new("span").with_attr("class", "  math  math-inline ");
        assert_eq!(vec!["math", "math-inline"], el.classes());
        el.set_classes(&["math", "post-math-inline"][..]);
        assert_eq!(Some("math post-math-inline"), el.attr("class"));
        assert!(Element::new("span").classes().is_empty());
    }
}
