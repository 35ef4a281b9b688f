//! Implements a custom HTML renderer for markdown events.
//! [`pulldown_cmark::html::push_html`] doesn't do what we need in a few
//! places:
//!
//! * footnote links need a prefix: the footnote definition is on the post
//!   page, but the reference may appear above the fold in a post summary on an
//!   index page.
//! * fenced code blocks are emitted as `<pre><code class="lang-{lang}">` which
//!   is the convention [`crate::transform`] keys off of.
//! * headings get a slug `id` so they can be linked to.

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use pulldown_cmark::{Alignment, CodeBlockKind, CowStr, Event, LinkType, Tag};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::io;

struct Adaptor<'a, T> {
    formatter: &'a mut T,
    result: fmt::Result,
}

impl<T> Adaptor<'_, T> {
    fn handle_result(&mut self, result: fmt::Result) -> io::Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.result = result;
                Err(io::Error::new(io::ErrorKind::Other, e))
            }
        }
    }
}

impl<T: fmt::Write> StrWrite for Adaptor<'_, T> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let result = self.formatter.write_str(s);
        self.handle_result(result)
    }

    fn write_fmt(&mut self, args: fmt::Arguments) -> io::Result<()> {
        let result = self.formatter.write_fmt(args);
        self.handle_result(result)
    }
}

struct EscapeHref<'a>(CowStr<'a>);

impl<'a> Display for EscapeHref<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_href(&mut adaptor, &self.0);
        adaptor.result
    }
}

struct EscapeHtml<'a>(CowStr<'a>);

impl<'a> Display for EscapeHtml<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };

        let _ = escape_html(&mut adaptor, &self.0);
        adaptor.result
    }
}

enum TableState {
    Head,
    Body,
}

/// Markup which can't be written until its closing event because it depends
/// on the text inside of it.
enum Pending<'a> {
    /// A heading; its `id` is the slug of its text.
    Heading { level: u32, html: String, text: String },

    /// An image; its text becomes the `alt` attribute.
    Image {
        dest: CowStr<'a>,
        title: CowStr<'a>,
        alt: String,
    },
}

/// Renders markdown [`Event`]s into HTML. This is largely modeled after
/// [`pulldown_cmark`]'s private [`HtmlWriter`
/// struct](https://github.com/raphlinus/pulldown-cmark/blob/bf0a1a4938dbd2ec41c3add069b3d361d11731f4/src/html.rs#L36-L50).
pub(crate) struct HtmlRenderer<'a> {
    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,

    /// The prefix to prepend onto footnote links.
    footnote_prefix: String,

    pending: Option<Pending<'a>>,

    /// Heading ids handed out so far, so duplicates get a numeric suffix.
    heading_ids: HashMap<String, usize>,
}

impl<'a> HtmlRenderer<'a> {
    pub(crate) fn with_footnote_prefix(footnote_prefix: &str) -> Self {
        HtmlRenderer {
            table_alignments: Vec::default(),
            table_state: TableState::Head,
            table_cell_index: usize::default(),
            footnote_prefix: footnote_prefix.to_owned(),
            pending: None,
            heading_ids: HashMap::new(),
        }
    }

    pub(crate) fn on_event<W: StrWrite>(
        &mut self,
        w: &mut W,
        event: Event<'a>,
    ) -> io::Result<()> {
        match (self.pending.take(), event) {
            (None, Event::Start(Tag::Heading(level))) => {
                self.pending = Some(Pending::Heading {
                    level,
                    html: String::new(),
                    text: String::new(),
                });
                Ok(())
            }
            (None, Event::Start(Tag::Image(_, dest, title))) => {
                self.pending = Some(Pending::Image {
                    dest,
                    title,
                    alt: String::new(),
                });
                Ok(())
            }
            (
                Some(Pending::Heading { level, html, text }),
                Event::End(Tag::Heading(_)),
            ) => {
                let id = self.heading_id(&text);
                write!(w, r#"<h{} id="{}">{}</h{}>"#, level, id, html, level)
            }
            (
                Some(Pending::Image { dest, title, alt }),
                Event::End(Tag::Image(..)),
            ) => write!(
                w,
                r#"<img src="{}" alt="{}" title="{}" />"#,
                EscapeHref(dest),
                EscapeHtml(CowStr::from(alt)),
                EscapeHtml(title),
            ),
            (
                Some(Pending::Heading {
                    level,
                    mut html,
                    mut text,
                }),
                event,
            ) => {
                if let Event::Text(s) | Event::Code(s) = &event {
                    text.push_str(s);
                }
                let result = self.render(&mut html, event);
                self.pending = Some(Pending::Heading { level, html, text });
                result
            }
            (Some(Pending::Image { dest, title, mut alt }), event) => {
                if let Event::Text(s) | Event::Code(s) = &event {
                    alt.push_str(s);
                }
                self.pending = Some(Pending::Image { dest, title, alt });
                Ok(())
            }
            (None, event) => self.render(w, event),
        }
    }

    fn heading_id(&mut self, text: &str) -> String {
        let slug = slug::slugify(text);
        let count = self.heading_ids.entry(slug.clone()).or_insert(0);
        *count += 1;
        match *count {
            1 => slug,
            n => format!("{}-{}", slug, n - 1),
        }
    }

    fn render<W: StrWrite>(
        &mut self,
        w: &mut W,
        event: Event<'a>,
    ) -> io::Result<()> {
        match event {
            Event::Start(tag) => self.on_start(w, tag),
            Event::End(tag) => self.on_end(w, tag),
            Event::Code(code) => self.on_code(w, code),
            Event::FootnoteReference(name) => write!(
                w,
                concat!(
                    r#"<sup class="footnote-reference">"#,
                    r##"<a href="{}#{}">{}</a></sup>"##,
                ),
                EscapeHtml(CowStr::from(self.footnote_prefix.as_str())),
                name,
                name,
            ),
            Event::HardBreak => w.write_str("<br />"),
            Event::Html(html) => w.write_str(&html),
            Event::Rule => w.write_str("<hr />"),
            Event::SoftBreak => w.write_str("\n"),
            Event::TaskListMarker(checked) => {
                self.on_task_list_marker(w, checked)
            }
            Event::Text(text) => escape_html(w, &text),
        }
    }

    fn on_start<W: StrWrite>(
        &mut self,
        w: &mut W,
        tag: Tag<'a>,
    ) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("<blockquote>"),
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
                match info.split_whitespace().next() {
                    None => w.write_str("<pre><code>"),
                    Some(lang) => write!(
                        w,
                        r#"<pre><code class="lang-{}">"#,
                        EscapeHtml(CowStr::from(lang))
                    ),
                }
            }
            Tag::CodeBlock(CodeBlockKind::Indented) => {
                w.write_str("<pre><code>")
            }
            Tag::Emphasis => w.write_str("<em>"),
            Tag::FootnoteDefinition(name) => {
                let name = EscapeHtml(name);
                write!(
                    w,
                    r#"<div class="footnote-definition" id="{}">{}. &nbsp;"#,
                    &name, &name,
                )
            }
            Tag::Heading(level) => write!(w, "<h{}>", level),
            // Only reached for images nested in a heading.
            Tag::Image(_, dest, title) => write!(
                w,
                r#"<img src="{}" alt="" title="{}" />"#,
                EscapeHref(dest),
                EscapeHtml(title),
            ),
            Tag::Item => w.write_str("<li>"),
            Tag::Link(LinkType::Email, dest, title) => write!(
                w,
                r#"<a href="mailto:{}" title="{}">"#,
                EscapeHref(dest),
                EscapeHtml(title),
            ),
            Tag::Link(_link_type, dest, title) => write!(
                w,
                r#"<a href="{}" title="{}">"#,
                EscapeHref(dest),
                EscapeHtml(title),
            ),
            Tag::List(None) => w.write_str("<ul>"),
            Tag::List(Some(1)) => w.write_str("<ol>"),
            Tag::List(Some(start)) => write!(w, r#"<ol start="{}">"#, start),
            Tag::Paragraph => w.write_str("<p>"),
            Tag::Strikethrough => w.write_str("<del>"),
            Tag::Strong => w.write_str("<strong>"),
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                w.write_str("<table>")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                w.write_str("<thead><tr>")
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                w.write_str("<tr>")
            }
            Tag::TableCell => write!(
                w,
                "<{}{}>",
                match self.table_state {
                    TableState::Head => "th",
                    TableState::Body => "td",
                },
                match self.table_alignments.get(self.table_cell_index) {
                    Some(Alignment::Left) => r#" align="left""#,
                    Some(Alignment::Right) => r#" align="right""#,
                    Some(Alignment::Center) => r#" align="center""#,
                    _ => "",
                }
            ),
        }
    }

    fn on_end<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("</blockquote>"),
            Tag::CodeBlock(_) => w.write_str("</code></pre>"),
            Tag::Emphasis => w.write_str("</em>"),
            Tag::FootnoteDefinition(_) => w.write_str("</div>"),
            Tag::Heading(level) => write!(w, "</h{}>", level),
            Tag::Image(..) => Ok(()),
            Tag::Item => w.write_str("</li>"),
            Tag::Link(_, _, _) => w.write_str("</a>"),
            Tag::List(Some(_)) => w.write_str("</ol>"),
            Tag::List(None) => w.write_str("</ul>"),
            Tag::Paragraph => w.write_str("</p>"),
            Tag::Strikethrough => w.write_str("</del>"),
            Tag::Strong => w.write_str("</strong>"),
            Tag::Table(_) => w.write_str("</tbody></table>"),
            Tag::TableHead => {
                self.table_state = TableState::Body;
                w.write_str("</tr></thead><tbody>")
            }
            Tag::TableRow => w.write_str("</tr>"),
            Tag::TableCell => {
                self.table_cell_index += 1;
                w.write_str(match self.table_state {
                    TableState::Head => "</th>",
                    TableState::Body => "</td>",
                })
            }
        }
    }

    fn on_code<W: StrWrite>(&mut self, w: &mut W, s: CowStr) -> io::Result<()> {
        write!(w, "<code>{}</code>", EscapeHtml(s))
    }

    fn on_task_list_marker<W: StrWrite>(
        &mut self,
        w: &mut W,
        checked: bool,
    ) -> io::Result<()> {
        write!(
            w,
            r#"<input disabled="" type="checkbox" {}/>"#,
            match checked {
                true => r#"checked="" "#,
                false => "",
            }
        )
    }
}
