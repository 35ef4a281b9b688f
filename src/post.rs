//! Defines the [`Post`] type and its conversions into template values. See
//! [`crate::parser`] for how posts are loaded from disk.

use gtmpl::Value;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

/// Separates the summary of a post from the rest of its body.
const FOLD_TAG: &str = "<!-- more -->";

/// The YAML block at the top of a post source file.
#[derive(Deserialize, Clone, Debug)]
pub(crate) struct Frontmatter {
    /// The title of the post.
    #[serde(alias = "Title")]
    pub title: String,

    /// A short description, shown on index pages and in feeds.
    #[serde(default, alias = "Description")]
    pub description: Option<String>,

    /// The publication date, formatted `YYYY-MM-DD`.
    #[serde(default, alias = "Date")]
    pub date: Option<String>,

    /// Drafts get a post page but are left out of indices and feeds.
    #[serde(default, alias = "Draft")]
    pub draft: bool,

    /// Whether math in the post should be typeset.
    #[serde(default, alias = "Math")]
    pub math: bool,
}

/// Represents a blog post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    /// The output path where the final post file will be written.
    pub file_path: PathBuf,

    /// The address of the post page.
    pub url: Url,

    /// The title of the post.
    pub title: String,

    /// A short description of the post.
    pub description: Option<String>,

    /// The publication date (`YYYY-MM-DD`), if any.
    pub date: Option<String>,

    /// Whether the post is a draft.
    pub draft: bool,

    /// Whether the transformed body contains typeset math. Pages with math
    /// link the math stylesheet.
    pub has_math: bool,

    /// The transformed HTML body of the post.
    pub body: String,
}

impl Post {
    /// Returns the part of the body above the fold and whether the body was
    /// actually folded. A post without `<!-- more -->` summarizes to its
    /// whole body.
    pub fn summary(&self) -> (&str, bool) {
        match self.body.find(FOLD_TAG) {
            Some(i) => (&self.body[..i], true),
            None => (&self.body, false),
        }
    }

    /// Whether the post appears in indices, feeds and prev/next links.
    pub fn published(&self, include_drafts: bool) -> bool {
        include_drafts || !self.draft
    }

    fn fields(&self) -> HashMap<String, Value> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(self.title.clone()));
        m.insert("url".to_owned(), Value::String(self.url.to_string()));
        m.insert("description".to_owned(), optional(&self.description));
        m.insert("date".to_owned(), optional(&self.date));
        m.insert("draft".to_owned(), Value::Bool(self.draft));
        m.insert("math".to_owned(), Value::Bool(self.has_math));
        m
    }

    /// Converts the post into a template-renderable [`Value`] for post
    /// pages. The object has the fields `title`, `url`, `description`,
    /// `date`, `draft`, `math` and `body`.
    pub fn to_value(&self) -> Value {
        let mut m = self.fields();
        m.insert("body".to_owned(), Value::String(self.body.clone()));
        Value::Object(m)
    }

    /// Converts the post into a template-renderable [`Value`] for index
    /// pages. Like [`Post::to_value`] except that `body` is replaced by
    /// `summary` and `summarized`, which tells the template whether to link
    /// to the rest of the post.
    pub fn summarize(&self) -> Value {
        let (summary, summarized) = self.summary();
        let mut m = self.fields();
        m.insert("summary".to_owned(), Value::String(summary.to_owned()));
        m.insert("summarized".to_owned(), Value::Bool(summarized));
        Value::Object(m)
    }
}

fn optional(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::String(s.clone()),
        None => Value::Nil,
    }
}
