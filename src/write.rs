//! Turns [`Post`]s into output files: one page per post plus a paginated
//! index of published posts. Every page is rendered through the
//! [`Renderer`] so it gets the same post-processing.

use crate::post::Post;
use crate::template::{self, Renderer};
use gtmpl::{Template, Value};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

const INDEX_PAGE: &str = "index.html";

/// Responsible for indexing, templating, and writing HTML pages to disk from
/// [`Post`] sources.
pub struct Writer<'a> {
    /// The template for post pages.
    pub posts_template: &'a Template,

    /// The template for index pages.
    pub index_template: &'a Template,

    /// The base URL for index pages. The index pages will be located at
    /// `{index_base_url}/index.html`, `{index_base_url}/1.html`, etc. This
    /// should end in a trailing slash.
    pub index_base_url: &'a Url,

    /// The directory in which the index HTML files will be written.
    pub index_output_directory: &'a Path,

    /// The number of posts per index page.
    pub index_page_size: usize,

    /// The URL for the site's home page. This is made available to both post
    /// and index templates, typically as the destination for the site-header
    /// link.
    pub home_page: &'a Url,

    /// The URL for the static assets. This is made available to both post and
    /// index templates, typically for the theme's stylesheet.
    pub static_url: &'a Url,

    /// Site-wide values (title, description, feeds) made available to
    /// templates as `site`.
    pub site: Value,

    /// Executes and post-processes the templates.
    pub renderer: &'a Renderer,

    /// Whether drafts appear in the index and in prev/next links.
    pub include_drafts: bool,
}

impl Writer<'_> {
    /// Templates a single [`Page`] and writes it to disk.
    fn write_page(&self, page: &Page) -> Result<()> {
        let mut value = page.to_value();
        if let Value::Object(obj) = &mut value {
            obj.insert(
                "home_page".to_owned(),
                Value::String(self.home_page.to_string()),
            );
            obj.insert(
                "static_url".to_owned(),
                Value::String(self.static_url.to_string()),
            );
            obj.insert("site".to_owned(), self.site.clone());
        }
        let html = self.renderer.render(page.template, value, page.has_math)?;
        std::fs::write(&page.file_path, html).map_err(|err| Error::WritePage {
            path: page.file_path.clone(),
            err,
        })
    }

    /// Writes a page for every post and the index pages for the published
    /// ones.
    pub fn write_posts(&self, posts: &[Post]) -> Result<()> {
        let published: Vec<&Post> = posts
            .iter()
            .filter(|post| post.published(self.include_drafts))
            .collect();

        let index = Index {
            url: self.index_base_url,
            output_directory: self.index_output_directory,
            posts: &published,
        };
        let index_pages =
            index.to_pages(self.index_page_size, self.index_template)?;
        let post_pages = post_pages(posts, &published, self.posts_template);
        info!(
            "Writing {} post pages and {} index pages",
            posts.len(),
            index_pages.len()
        );

        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
        for page in index_pages.iter().chain(post_pages.iter()) {
            if let Some(dir) = page.file_path.parent() {
                if seen_dirs.insert(dir.to_owned()) {
                    std::fs::create_dir_all(dir)?;
                }
            }
            debug!("Writing {}", page.file_path.display());
            self.write_page(page)?;
        }
        Ok(())
    }
}

/// An object representing an output HTML file. A [`Page`] can be converted to
/// a [`Value`] and thus rendered in a template via [`Page::to_value`].
struct Page<'a> {
    /// The main item for the page.
    item: Value,

    /// The target location on disk for the output file.
    file_path: PathBuf,

    /// The URL for the previous page, if any.
    prev: Option<Url>,

    /// The URL for the next page, if any.
    next: Option<Url>,

    /// The template with which the page will be rendered.
    template: &'a Template,

    /// Whether any of the page's content has typeset math.
    has_math: bool,
}

impl Page<'_> {
    /// Converts a [`Page`] into a [`Value`]. The result is a [`Value::Object`]
    /// with fields `item`, `prev`, and `next` (see [`Page`] for descriptions).
    fn to_value(&self) -> Value {
        let url_to_value = |opt: &Option<Url>| match opt {
            Some(url) => Value::String(url.to_string()),
            None => Value::Nil,
        };

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("item".to_owned(), self.item.clone());
        m.insert("prev".to_owned(), url_to_value(&self.prev));
        m.insert("next".to_owned(), url_to_value(&self.next));
        Value::Object(m)
    }
}

/// Creates a [`Page`] for every post. Only published posts link to their
/// neighbours; `prev` is the newer post and `next` the older one.
fn post_pages<'a>(
    posts: &[Post],
    published: &[&Post],
    template: &'a Template,
) -> Vec<Page<'a>> {
    posts
        .iter()
        .map(|post| {
            let position =
                published.iter().position(|p| std::ptr::eq(*p, post));
            let neighbour = |offset: isize| {
                position
                    .and_then(|i| i.checked_add_signed(offset))
                    .and_then(|i| published.get(i))
                    .map(|p| p.url.clone())
            };
            Page {
                item: post.to_value(),
                file_path: post.file_path.clone(),
                prev: neighbour(-1),
                next: neighbour(1),
                template,
                has_math: post.has_math,
            }
        })
        .collect()
}

/// `Index` represents the collection of published [`Post`]s which is
/// paginated into index pages.
struct Index<'a> {
    /// The base URL for the index pages.
    url: &'a Url,

    /// The output directory for the index pages.
    output_directory: &'a Path,

    /// The posts in the index, newest first.
    posts: &'a [&'a Post],
}

impl Index<'_> {
    fn page_url(&self, page: usize) -> Result<Url> {
        Ok(self.url.join(&page_file_name(page))?)
    }

    /// Converts the index to a list of index pages. `index_page_size` and
    /// `index_template` represent the number of posts per page and the template
    /// to apply to the pages respectively. An empty index still gets one
    /// (empty) page so the site has a landing page.
    fn to_pages<'t>(
        &self,
        index_page_size: usize,
        index_template: &'t Template,
    ) -> Result<Vec<Page<'t>>> {
        let chunks: Vec<&[&Post]> = match self.posts.is_empty() {
            true => vec![self.posts],
            false => self.posts.chunks(index_page_size.max(1)).collect(),
        };
        let total_pages = chunks.len();

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| -> Result<Page<'t>> {
                let summaries = chunk.iter().map(|p| p.summarize()).collect();
                Ok(Page {
                    item: Value::Array(summaries),
                    file_path: self.output_directory.join(page_file_name(i)),
                    prev: match i {
                        0 => None,
                        _ => Some(self.page_url(i - 1)?),
                    },
                    next: match i + 1 < total_pages {
                        false => None,
                        true => Some(self.page_url(i + 1)?),
                    },
                    template: index_template,
                    has_math: chunk.iter().any(|p| p.has_math),
                })
            })
            .collect()
    }
}

fn page_file_name(page: usize) -> String {
    match page {
        0 => INDEX_PAGE.to_owned(),
        _ => format!("{}.html", page),
    }
}

/// The result of a fallible page-writing operation.
type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error during templating.
    Template(template::Error),

    /// An error joining page URLs.
    UrlParse(url::ParseError),

    /// An error writing a page file.
    WritePage { path: PathBuf, err: io::Error },

    /// An error creating the output directories.
    Io(io::Error),
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<template::Error> for Error {
    /// Converts a [`template::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator for fallible template operations.
    fn from(err: template::Error) -> Error {
        Error::Template(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. This allows us to use
    /// the `?` operator when joining URLs.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
            Error::WritePage { path, err } => {
                write!(f, "writing page '{}': {}", path.display(), err)
            }
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::WritePage { path: _, err } => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn post(
        output: &Path,
        name: &str,
        draft: bool,
    ) -> std::result::Result<Post, url::ParseError> {
        let url = format!("https://example.org/posts/{}.html", name);
        Ok(Post {
            file_path: output.join("posts").join(format!("{}.html", name)),
            url: Url::parse(&url)?,
            title: name.to_uppercase(),
            description: None,
            date: None,
            draft,
            has_math: false,
            body: format!("<p>{}</p><!-- more --><p>rest</p>", name),
        })
    }

    fn template(
        source: &str,
    ) -> std::result::Result<Template, Box<dyn std::error::Error>> {
        let mut template = Template::default();
        template.parse(source).map_err(|err| err.to_string())?;
        Ok(template)
    }

    #[test]
    fn test_write_posts() -> TestResult {
        let output = TempDir::new()?;
        let posts = vec![
            post(output.path(), "c", false)?,
            post(output.path(), "b", true)?,
            post(output.path(), "a", false)?,
        ];

        let posts_template = template(concat!(
            "{{ .item.title }}|",
            "{{ if .prev }}{{ .prev }}{{ end }}|",
            "{{ if .next }}{{ .next }}{{ end }}|",
            "{{ .site }}",
        ))?;
        let index_template = template(concat!(
            "{{ range .item }}{{ .title }}:{{ .summary }};{{ end }}|",
            "{{ if .next }}{{ .next }}{{ end }}",
        ))?;
        let index_base_url = Url::parse("https://example.org/pages/")?;
        let home_page = Url::parse("https://example.org/pages/index.html")?;
        let static_url = Url::parse("https://example.org/static/")?;
        let index_output_directory = output.path().join("pages");
        let renderer = Renderer::default();
        let writer = Writer {
            posts_template: &posts_template,
            index_template: &index_template,
            index_base_url: &index_base_url,
            index_output_directory: &index_output_directory,
            index_page_size: 1,
            home_page: &home_page,
            static_url: &static_url,
            site: Value::String("kiln".to_owned()),
            renderer: &renderer,
            include_drafts: false,
        };
        writer.write_posts(&posts)?;

        let read =
            |path: &str| std::fs::read_to_string(output.path().join(path));
        assert_eq!(
            "C||https://example.org/posts/a.html|kiln",
            read("posts/c.html")?
        );
        assert_eq!(
            "A|https://example.org/posts/c.html||kiln",
            read("posts/a.html")?
        );
        assert_eq!("B|||kiln", read("posts/b.html")?);
        assert_eq!(
            "C:<p>c</p>;|https://example.org/pages/1.html",
            read("pages/index.html")?
        );
        assert_eq!("A:<p>a</p>;|", read("pages/1.html")?);
        assert!(!output.path().join("pages/2.html").exists());
        Ok(())
    }

    #[test]
    fn test_empty_index_has_one_page() -> TestResult {
        let template = template("")?;
        let url = Url::parse("https://example.org/pages/")?;
        let posts: Vec<&Post> = Vec::new();
        let index = Index {
            url: &url,
            output_directory: Path::new("/out/pages"),
            posts: &posts,
        };
        let pages = index.to_pages(10, &template)?;
        assert_eq!(1, pages.len());
        assert_eq!(PathBuf::from("/out/pages/index.html"), pages[0].file_path);
        assert_eq!(None, pages[0].prev);
        assert_eq!(None, pages[0].next);
        Ok(())
    }

    #[test]
    fn test_index_pagination_links() -> TestResult {
        let template = template("")?;
        let url = Url::parse("https://example.org/pages/")?;
        let owned = vec![
            post(Path::new("/out"), "e", false)?,
            post(Path::new("/out"), "d", false)?,
            post(Path::new("/out"), "c", false)?,
            post(Path::new("/out"), "b", false)?,
            post(Path::new("/out"), "a", false)?,
        ];
        let posts: Vec<&Post> = owned.iter().collect();
        let index = Index {
            url: &url,
            output_directory: Path::new("/out/pages"),
            posts: &posts,
        };
        let pages = index.to_pages(2, &template)?;
        let links: Vec<(Option<&str>, Option<&str>)> = pages
            .iter()
            .map(|p| {
                (
                    p.prev.as_ref().map(Url::as_str),
                    p.next.as_ref().map(Url::as_str),
                )
            })
            .collect();
        assert_eq!(
            vec![
                (None, Some("https://example.org/pages/1.html")),
                (
                    Some("https://example.org/pages/index.html"),
                    Some("https://example.org/pages/2.html")
                ),
                (Some("https://example.org/pages/1.html"), None),
            ],
            links
        );
        Ok(())
    }
}
