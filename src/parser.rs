//! Defines the [`Parser`] and [`Error`] types, which load [`Post`]s from the
//! file system into memory. Each post's markdown is converted to HTML and then
//! run through the [`Transformer`] so math and code are rendered before the
//! post ever reaches a template.

use std::{
    fmt,
    fs::{read_dir, DirEntry},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use url::Url;
use walkdir::WalkDir;

use crate::markdown::{self, Source};
use crate::math::{LatexTypesetter, Typesetter};
use crate::post::{Frontmatter, Post};
use crate::transform::{self, transform_html, TransformOptions, Transformer};

const MARKDOWN_EXTENSION: &str = "md";
const BUNDLE_INDEX: &str = "index.md";
const FENCE: &str = "---";

/// Parses [`Post`] objects from source files.
pub struct Parser<'a> {
    /// `posts_url` is the base URL for post pages. It's used to prefix post
    /// page URLs (i.e., the URL for a post is `{posts_url}/{post_id}.html`).
    posts_url: &'a Url,

    /// `posts_directory` is the directory in which post pages will be
    /// rendered.
    posts_directory: &'a Path,

    /// The language inline code is highlighted as.
    inline_language: &'a str,

    typesetter: &'a dyn Typesetter,
}

impl<'a> Parser<'a> {
    /// Constructs a new parser which typesets math with [`LatexTypesetter`].
    /// See fields on [`Parser`] for argument descriptions.
    pub fn new(
        posts_url: &'a Url,
        posts_directory: &'a Path,
        inline_language: &'a str,
    ) -> Parser<'a> {
        Parser {
            posts_url,
            posts_directory,
            inline_language,
            typesetter: &LatexTypesetter,
        }
    }

    /// Replaces the math typesetter.
    pub fn with_typesetter(
        self,
        typesetter: &'a dyn Typesetter,
    ) -> Parser<'a> {
        Parser { typesetter, ..self }
    }

    /// Searches a provided `source_directory` for post files (extension =
    /// `.md`) and bundles (directories containing an `index.md`) and returns
    /// the posts sorted by date (most recent first) along with the bundle
    /// assets which need to be copied next to the post pages. Each post file
    /// must be structured as follows:
    ///
    /// 1. Initial frontmatter fence (`---`)
    /// 2. YAML frontmatter with `title` and optionally `description`,
    ///    `date`, `draft` and `math`
    /// 3. Terminal frontmatter fence (`---`)
    /// 4. Post body
    ///
    /// For example:
    ///
    /// ```md
    /// ---
    /// title: Hello, world!
    /// date: 2021-04-16
    /// math: true
    /// ---
    /// # Hello
    ///
    /// `$e^{i\pi} = -1$`
    /// ```
    pub fn parse_posts(&self, source_directory: &Path) -> Result<Posts> {
        let mut posts = Vec::new();
        let mut static_files = Vec::new();
        for result in read_dir(source_directory)? {
            let entry = result?;
            let file_name = entry.file_name();
            let relative_path = Path::new(&file_name);
            if is_bundle(&entry)? {
                posts.push(self.parse_bundle(
                    source_directory,
                    relative_path,
                    &mut static_files,
                )?);
            } else if is_markdown(relative_path) {
                posts.push(self.parse_post(source_directory, relative_path)?);
            }
        }

        posts.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
        Ok((posts, static_files))
    }

    fn parse_bundle(
        &self,
        source_directory: &Path,
        relative_path: &Path,
        static_files: &mut Vec<StaticFile>,
    ) -> Result<Post> {
        // Only collect assets once the post itself parsed.
        let index = relative_path.join(BUNDLE_INDEX);
        let post = self.parse_post(source_directory, &index)?;

        let bundle = source_directory.join(relative_path);
        let output = self.posts_directory.join(relative_path);
        let bundle_index = bundle.join(BUNDLE_INDEX);
        for result in WalkDir::new(&bundle) {
            let entry = result?;
            let path = entry.path();
            if entry.file_type().is_file() && path != bundle_index {
                let asset = path
                    .strip_prefix(&bundle)
                    .map_err(|_| InvalidFileNameError(path.to_owned()))?;
                static_files.push((path.to_owned(), output.join(asset)));
            }
        }
        Ok(post)
    }

    /// Parses a single [`Post`] from the file at `relative_path` (relative to
    /// `source_directory`). Errors are annotated with the path.
    fn parse_post(
        &self,
        source_directory: &Path,
        relative_path: &Path,
    ) -> Result<Post> {
        self.parse_post_file(source_directory, relative_path)
            .map_err(|e| {
                Error::Annotated(
                    format!("parsing post `{}`", relative_path.display()),
                    Box::new(e),
                )
            })
    }

    fn parse_post_file(
        &self,
        source_directory: &Path,
        relative_path: &Path,
    ) -> Result<Post> {
        let contents =
            std::fs::read_to_string(source_directory.join(relative_path))?;
        let (yaml, body) = split_frontmatter(&contents)?;
        let frontmatter: Frontmatter = serde_yaml::from_str(yaml)?;

        let in_bundle = relative_path.components().count() > 1
            && relative_path.ends_with(BUNDLE_INDEX);
        let page = match in_bundle {
            true => relative_path.parent().unwrap_or(relative_path),
            false => relative_path,
        }
        .with_extension("html");
        let file_name = page
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| InvalidFileNameError(relative_path.to_owned()))?;
        let source_path = relative_path
            .to_str()
            .ok_or_else(|| InvalidFileNameError(relative_path.to_owned()))?
            .replace(std::path::MAIN_SEPARATOR, "/");

        let url = self.posts_url.join(file_name)?;
        let mut html = String::new();
        markdown::to_html(
            &mut html,
            &Source {
                posts_url: self.posts_url,
                path: &source_path,
                footnote_prefix: url.as_str(),
            },
            body,
        )?;

        let transformer = Transformer::new(
            self.typesetter,
            TransformOptions {
                math: frontmatter.math,
                inline_language: self.inline_language.to_owned(),
            },
        );
        let (body, summary) = transform_html(&html, &transformer)?;
        debug!(
            concat!(
                "{}: {} display math, {} inline math, {} code blocks, ",
                "{} inline code, {} skipped",
            ),
            relative_path.display(),
            summary.display_math,
            summary.inline_math,
            summary.code_blocks,
            summary.inline_code,
            summary.skipped,
        );
        if frontmatter.date.is_none() {
            warn!(
                "{}: no date; treating it as the newest post",
                relative_path.display()
            );
        }

        Ok(Post {
            file_path: self.posts_directory.join(file_name),
            url,
            title: frontmatter.title,
            description: frontmatter.description,
            date: frontmatter.date,
            draft: frontmatter.draft,
            has_math: summary.has_math(),
            body,
        })
    }
}

/// Splits a post source into its YAML frontmatter and its markdown body.
fn split_frontmatter(input: &str) -> Result<(&str, &str)> {
    let rest = input
        .strip_prefix(FENCE)
        .ok_or(Error::FrontmatterMissingStartFence)?;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if offset > 0 && line.trim_end() == FENCE {
            return Ok((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err(Error::FrontmatterMissingEndFence)
}

/// Newest first: undated posts sort as the newest, and posts on the same day
/// order by reverse file name.
fn sort_key(post: &Post) -> (bool, Option<&str>, &Path) {
    (post.date.is_none(), post.date.as_deref(), &post.file_path)
}

fn is_bundle(entry: &DirEntry) -> std::io::Result<bool> {
    Ok(entry.file_type()?.is_dir()
        && entry.path().join(BUNDLE_INDEX).is_file())
}

fn is_markdown(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == MARKDOWN_EXTENSION)
}

#[derive(Debug)]
pub struct InvalidFileNameError(PathBuf);

impl fmt::Display for InvalidFileNameError {
    /// Displays an [`InvalidFileNameError`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid file name: {:?}", &self.0)
    }
}

impl std::error::Error for InvalidFileNameError {
    /// Implements the [`std::error::Error`] trait for
    /// [`InvalidFileNameError`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// The parsed posts along with the bundle assets to copy.
pub type Posts = (Vec<Post>, Vec<StaticFile>);

/// A `(source, destination)` pair of file paths.
pub type StaticFile = (PathBuf, PathBuf);

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Post`] object.
#[derive(Debug)]
pub enum Error {
    /// Returned when a post source file is missing its starting frontmatter
    /// fence (`---`).
    FrontmatterMissingStartFence,

    /// Returned when a post source file is missing its terminal frontmatter
    /// fence (`---` i.e., the starting fence was found but the ending one was
    /// missing).
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the frontmatter as YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when there is a problem parsing URLs.
    UrlParse(url::ParseError),

    /// Returned when the rendered markdown couldn't be transformed.
    Transform(transform::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),

    /// Returned for WalkDir I/O errors.
    WalkDir(walkdir::Error),

    /// Returned when a source file name isn't valid UTF-8.
    InvalidFileName(InvalidFileNameError),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingStartFence => {
                write!(f, "post must begin with `---`")
            }
            Error::FrontmatterMissingEndFence => {
                write!(f, "missing closing `---`")
            }
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
            Error::Transform(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
            Error::InvalidFileName(err) => err.fmt(f),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FrontmatterMissingStartFence => None,
            Error::FrontmatterMissingEndFence => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Transform(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::InvalidFileName(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<InvalidFileNameError> for Error {
    /// Converts an [`InvalidFileNameError`] into an [`Error`].
    fn from(err: InvalidFileNameError) -> Error {
        Error::InvalidFileName(err)
    }
}

impl From<markdown::Error> for Error {
    /// Converts a [`markdown::Error`] into an [`Error`] by unwrapping the
    /// underlying I/O or URL error.
    fn from(err: markdown::Error) -> Error {
        match err {
            markdown::Error::Io(e) => Error::Io(e),
            markdown::Error::UrlParse(e) => Error::UrlParse(e),
        }
    }
}

impl From<transform::Error> for Error {
    /// Converts a [`transform::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when transforming post bodies.
    fn from(err: transform::Error) -> Error {
        Error::Transform(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing and joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{MathMode, TypesetError};
    use std::fs;
    use tempfile::TempDir;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    struct Boxed;

    impl Typesetter for Boxed {
        fn typeset(
            &self,
            expression: &str,
            mode: MathMode,
        ) -> std::result::Result<String, TypesetError> {
            Ok(format!(
                r#"<span class="tex {:?}">{}</span>"#,
                mode, expression
            ))
        }
    }

    fn write(
        dir: &Path,
        relative: &str,
        contents: &str,
    ) -> std::io::Result<()> {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }

    #[test]
    fn test_split_frontmatter() -> Result<()> {
        assert_eq!(
            ("\ntitle: a --- b\n", "body\n---\n"),
            split_frontmatter("---\ntitle: a --- b\n---\nbody\n---\n")?
        );
        assert!(matches!(
            split_frontmatter("title: x\n"),
            Err(Error::FrontmatterMissingStartFence)
        ));
        assert!(matches!(
            split_frontmatter("---\ntitle: x\n"),
            Err(Error::FrontmatterMissingEndFence)
        ));
        Ok(())
    }

    #[test]
    fn test_parse_posts() -> TestResult {
        let source = TempDir::new()?;
        write(
            source.path(),
            "older.md",
            concat!(
                "---\ntitle: Older\ndate: 2021-01-01\n---\n",
                "See [newer](newer/index.md).\n",
            ),
        )?;
        write(
            source.path(),
            "newer/index.md",
            concat!(
                "---\nTitle: Newer\nDate: 2021-02-01\nmath: true\n---\n",
                "![cat](cat.png)\n\n`$x^2$`\n",
            ),
        )?;
        write(source.path(), "newer/cat.png", "meow")?;
        write(source.path(), "notes.txt", "ignored")?;

        let posts_url = Url::parse("https://example.org/posts/")?;
        let output = Path::new("/out/posts");
        let parser =
            Parser::new(&posts_url, output, "text").with_typesetter(&Boxed);
        let (posts, static_files) = parser.parse_posts(source.path())?;

        let titles: Vec<&str> =
            posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(vec!["Newer", "Older"], titles);

        let newer = &posts[0];
        assert_eq!("https://example.org/posts/newer.html", newer.url.as_str());
        assert_eq!(output.join("newer.html"), newer.file_path);
        assert!(newer.has_math);
        assert!(newer
            .body
            .contains(r#"<span class="tex post-math-inline">x^2</span>"#));
        assert!(newer
            .body
            .contains("https://example.org/posts/newer/cat.png"));

        let older = &posts[1];
        assert!(!older.has_math);
        assert!(older
            .body
            .contains(r#"href="https://example.org/posts/newer.html""#));

        assert_eq!(
            vec![(
                source.path().join("newer/cat.png"),
                output.join("newer/cat.png"),
            )],
            static_files
        );
        Ok(())
    }

    #[test]
    fn test_math_requires_flag() -> TestResult {
        let source = TempDir::new()?;
        write(source.path(), "plain.md", "---\ntitle: Plain\n---\n`$x$`\n")?;

        let posts_url = Url::parse("https://example.org/posts/")?;
        let parser = Parser::new(&posts_url, Path::new("/out/posts"), "text")
            .with_typesetter(&Boxed);
        let (posts, _) = parser.parse_posts(source.path())?;
        assert!(!posts[0].has_math);
        assert!(posts[0].body.contains("<code>$x$</code>"));
        Ok(())
    }

    #[test]
    fn test_sort_ties_and_undated() -> TestResult {
        let source = TempDir::new()?;
        write(source.path(), "a.md", "---\ntitle: A\ndate: 2021-01-01\n---\n")?;
        write(source.path(), "b.md", "---\ntitle: B\ndate: 2021-01-01\n---\n")?;
        write(source.path(), "c.md", "---\ntitle: C\n---\n")?;

        let posts_url = Url::parse("https://example.org/posts/")?;
        let parser = Parser::new(&posts_url, Path::new("/out/posts"), "text");
        let (posts, _) = parser.parse_posts(source.path())?;
        let titles: Vec<&str> =
            posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(vec!["C", "B", "A"], titles);
        Ok(())
    }

    #[test]
    fn test_errors_name_the_post() -> TestResult {
        let source = TempDir::new()?;
        write(source.path(), "broken.md", "no frontmatter")?;

        let posts_url = Url::parse("https://example.org/posts/")?;
        let parser = Parser::new(&posts_url, Path::new("/out/posts"), "text");
        match parser.parse_posts(source.path()) {
            Err(err @ Error::Annotated(..)) => assert_eq!(
                "parsing post `broken.md`: post must begin with `---`",
                err.to_string()
            ),
            other => panic!(
                "expected an annotated error, got {:?}",
                other.map(|_| ())
            ),
        }
        Ok(())
    }
}
