//! Resolves links found in post markdown. Links to other posts' markdown
//! sources are rewritten to point at the rendered post pages; everything else
//! is made absolute relative to the post that contains it.

use url::{ParseError, Url};

const MARKDOWN_EXTENSION: &str = ".md";
const HTML_EXTENSION: &str = ".html";
const BUNDLE_INDEX: &str = "/index.md";

/// Rewrites link targets for a single source file.
pub struct Converter<'a> {
    posts_root: &'a Url,
    base: Url,
}

impl<'a> Converter<'a> {
    /// Constructs a new `Converter`
    ///
    /// # Arguments
    ///
    /// * `posts_root` - the URL prefix for posts.
    /// * `source_path` - the path of the source file relative to
    ///   `posts_root`; relative links resolve against it.
    pub fn new(
        posts_root: &'a Url,
        source_path: &str,
    ) -> Result<Converter<'a>> {
        Ok(Converter {
            posts_root,
            base: posts_root.join(source_path)?,
        })
    }

    /// Returns the bundle name for `foo/index.md`, or [`None`] if `relative`
    /// isn't the index of a bundle directly under the posts root.
    fn bundle_name(relative: &str) -> Option<&str> {
        relative
            .strip_suffix(BUNDLE_INDEX)
            .filter(|name| !name.contains('/'))
    }

    /// Maps a markdown source under the posts root onto its rendered page.
    /// Anything else is returned unchanged.
    fn to_page(&self, absolute: Url) -> Result<Url> {
        let relative = match self.posts_root.make_relative(&absolute) {
            Some(relative) if !relative.starts_with("../") => relative,
            _ => return Ok(absolute),
        };
        let stem = match Self::bundle_name(&relative) {
            Some(name) => name,
            None => match relative.strip_suffix(MARKDOWN_EXTENSION) {
                Some(stem) => stem,
                None => return Ok(absolute),
            },
        };
        self.posts_root.join(&format!("{}{}", stem, HTML_EXTENSION))
    }

    /// Converts a link target into an absolute URL string.
    pub fn convert(&self, target: &str) -> Result<String> {
        let absolute = match Url::parse(target) {
            Ok(absolute) => absolute,
            Err(ParseError::RelativeUrlWithoutBase) => self.base.join(target)?,
            Err(e) => return Err(e),
        };
        Ok(self.to_page(absolute)?.to_string())
    }
}

type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_convert_relative_post() -> Result<()> {
        fixture_basic("https://example.org/posts/relative.html", "relative.md")
    }

    #[test]
    fn test_convert_relative_post_leading_dotslash() -> Result<()> {
        fixture_basic(
            "https://example.org/posts/relative.html",
            "./relative.md",
        )
    }

    #[test]
    fn test_convert_relative_post_redundancies() -> Result<()> {
        fixture_basic(
            "https://example.org/posts/relative.html",
            "../posts/relative.md",
        )
    }

    #[test]
    fn test_convert_relative_asset() -> Result<()> {
        fixture_basic("https://example.org/posts/relative.jpg", "relative.jpg")
    }

    #[test]
    fn test_convert_relative_bundle() -> Result<()> {
        fixture_basic(
            "https://example.org/posts/relative.html",
            "relative/index.md",
        )
    }

    #[test]
    fn test_convert_nested_index_is_not_a_bundle() -> Result<()> {
        fixture_basic(
            "https://example.org/posts/a/b/index.html",
            "a/b/index.md",
        )
    }

    #[test]
    fn test_convert_bundle_asset() -> Result<()> {
        fixture(
            "relative/index.md",
            "https://example.org/posts/relative/image.jpg",
            "./image.jpg",
        )
    }

    #[test]
    fn test_convert_bundle_sibling_post() -> Result<()> {
        fixture(
            "relative/index.md",
            "https://example.org/posts/sibling.html",
            "../sibling/index.md",
        )
    }

    #[test]
    fn test_convert_absolute_post() -> Result<()> {
        fixture_basic(
            "https://example.org/posts/absolute.html",
            "https://example.org/posts/absolute.md",
        )
    }

    #[test]
    fn test_convert_absolute_asset_redundancies() -> Result<()> {
        fixture_basic(
            "https://example.org/posts/absolute.jpg",
            "https://example.org/posts/../posts/absolute.jpg",
        )
    }

    #[test]
    fn test_convert_remote_markdown() -> Result<()> {
        fixture_basic(
            "https://remote.org/posts/absolute.md",
            "https://remote.org/posts/../posts/absolute.md",
        )
    }

    #[test]
    fn test_convert_fragment() -> Result<()> {
        fixture_basic("https://example.org/posts/index.html#notes", "#notes")
    }

    fn fixture_basic(wanted: &str, target: &str) -> Result<()> {
        fixture("index.html", wanted, target)
    }

    fn fixture(source_path: &str, wanted: &str, target: &str) -> Result<()> {
        let posts_root = Url::parse("https://example.org/posts/")?;
        assert_eq!(
            wanted,
            Converter::new(&posts_root, source_path)?.convert(target)?,
        );
        Ok(())
    }
}
