//! Converts post markdown into HTML. The HTML is not yet transformed; code and
//! math are left as `<pre><code class="lang-{lang}">` and `<code>` elements for
//! [`crate::transform`] to pick up.

use crate::htmlrenderer::HtmlRenderer;
use crate::url::Converter;
use pulldown_cmark::escape::StrWrite;
use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag};
use std::fmt;
use std::io;
use url::{ParseError as UrlParseError, Url};

/// The number of levels headings in a post are demoted by: the site title is
/// `h1` and the post title is `h2`, so `#` becomes `h3`.
const HEADING_OFFSET: u32 = 2;

/// The deepest heading level HTML has.
const MAX_HEADING_LEVEL: u32 = 6;

/// Where a piece of markdown lives, which determines how its relative links
/// resolve.
pub struct Source<'a> {
    /// The prefix for post URLs (e.g., `https://example.org/posts/`). This
    /// should end in a trailing slash.
    pub posts_url: &'a Url,

    /// The path of the source file relative to the posts directory.
    pub path: &'a str,

    /// The prefix to prepend onto footnote links, usually the URL of the post
    /// page.
    pub footnote_prefix: &'a str,
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Converts `markdown` to HTML, writing the result into `w`.
pub fn to_html<W: StrWrite>(
    w: &mut W,
    source: &Source,
    markdown: &str,
) -> Result<(), Error> {
    let links = Converter::new(source.posts_url, source.path)?;
    let mut renderer =
        HtmlRenderer::with_footnote_prefix(source.footnote_prefix);
    for event in Parser::new_ext(markdown, options()) {
        renderer.on_event(w, adjust(&links, event)?)?;
    }
    Ok(())
}

/// Demotes headings and rewrites links and images between posts so they
/// point at the rendered pages rather than the markdown sources.
fn adjust<'b>(
    links: &Converter,
    event: Event<'b>,
) -> Result<Event<'b>, UrlParseError> {
    Ok(match event {
        Event::Start(Tag::Heading(level)) => {
            Event::Start(Tag::Heading(demote(level)))
        }
        Event::End(Tag::Heading(level)) => {
            Event::End(Tag::Heading(demote(level)))
        }
        Event::Start(Tag::Link(kind, dest, title))
            if !matches!(kind, LinkType::Email) =>
        {
            Event::Start(Tag::Link(
                kind,
                CowStr::from(links.convert(&dest)?),
                title,
            ))
        }
        Event::Start(Tag::Image(kind, dest, title)) => Event::Start(Tag::Image(
            kind,
            CowStr::from(links.convert(&dest)?),
            title,
        )),
        event => event,
    })
}

fn demote(level: u32) -> u32 {
    (level + HEADING_OFFSET).min(MAX_HEADING_LEVEL)
}

/// Represents an error converting markdown to HTML.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O errors while writing the output.
    Io(io::Error),

    /// Returned when a link in the markdown isn't a valid URL.
    UrlParse(UrlParseError),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::UrlParse(err) => write!(f, "converting link: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::UrlParse(err) => Some(err),
        }
    }
}

impl From<UrlParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing and joining functions.
    fn from(err: UrlParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<io::Error> for Error {
    /// Converts a [`io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for IO operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn render(
        path: &str,
        markdown: &str,
    ) -> Result<String, Box<dyn std::error::Error>> {
        let posts_url = Url::parse("https://example.org/posts/")?;
        let source = Source {
            posts_url: &posts_url,
            path,
            footnote_prefix: "https://example.org/posts/hello.html",
        };
        let mut html = String::new();
        to_html(&mut html, &source, markdown)?;
        Ok(html)
    }

    #[test]
    fn test_headings_are_demoted() -> TestResult {
        assert_eq!(
            r#"<h3 id="intro">Intro</h3><h4 id="details">Details</h4>"#,
            render("hello.md", "# Intro\n\n## Details")?
        );
        Ok(())
    }

    #[test]
    fn test_deep_headings_stop_at_h6() -> TestResult {
        assert_eq!(
            concat!(
                r#"<h6 id="four">Four</h6><h6 id="five">Five</h6>"#,
                r#"<h6 id="six">Six</h6>"#,
            ),
            render("hello.md", "#### Four\n\n##### Five\n\n###### Six")?
        );
        Ok(())
    }

    #[test]
    fn test_links_to_posts_are_converted() -> TestResult {
        assert_eq!(
            concat!(
                r#"<p><a href="https://example.org/posts/other.html" "#,
                r#"title="">other</a> "#,
                r#"<a href="https://example.org/posts/hello/cat.jpg" "#,
                r#"title="">cat</a></p>"#,
            ),
            render("hello/index.md", "[other](../other.md) [cat](cat.jpg)")?
        );
        Ok(())
    }

    #[test]
    fn test_footnotes_are_prefixed() -> TestResult {
        let html = render("hello.md", "Hi[^1]\n\n[^1]: There")?;
        assert!(html.contains(
            r##"<a href="https://example.org/posts/hello.html#1">1</a>"##
        ));
        Ok(())
    }

    #[test]
    fn test_code_and_math_left_for_transform() -> TestResult {
        assert_eq!(
            concat!(
                "<pre><code class=\"lang-math\">E = mc^2\n</code></pre>",
                "<p>where <code>$c$</code> is the speed of light</p>",
            ),
            render(
                "hello.md",
                "```math\nE = mc^2\n```\n\nwhere `$c$` is the speed of light"
            )?
        );
        Ok(())
    }

    #[test]
    fn test_invalid_link() {
        assert!(render("hello.md", "[bad](http://:80/)").is_err());
    }
}
