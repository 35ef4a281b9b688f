//! Support for creating Atom and JSON feeds from a list of posts.

use crate::config::Author;
use crate::post::Post;
use atom_syndication::{
    Content, Entry, Error as AtomError, Feed, Link, Person, Text,
};
use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveTime, ParseError, TimeZone, Utc,
};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use url::Url;

const DATE_FORMAT: &str = "%Y-%m-%d";
const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub description: Option<String>,
    pub id: String,
    pub author: Option<Author>,
    pub home_page: Url,

    /// Where the JSON feed is published; JSON feeds refer to themselves.
    pub json_feed_url: Url,

    /// The time of the build. Used as the feed's `updated` time and as the
    /// date of undated posts.
    pub build_time: DateTime<FixedOffset>,
}

/// Creates an Atom feed from some configuration ([`FeedConfig`]) and a list
/// of [`Post`]s and writes the result to a [`std::io::Write`].
pub fn write_atom<W: Write>(
    config: &FeedConfig,
    posts: &[&Post],
    w: W,
) -> Result<()> {
    atom_feed(config, posts)?.write_to(w)?;
    Ok(())
}

/// Creates a [JSON Feed](https://jsonfeed.org/version/1.1) from some
/// configuration ([`FeedConfig`]) and a list of [`Post`]s and writes the
/// result to a [`std::io::Write`].
pub fn write_json<W: Write>(
    config: &FeedConfig,
    posts: &[&Post],
    w: W,
) -> Result<()> {
    serde_json::to_writer_pretty(w, &json_feed(config, posts)?)?;
    Ok(())
}

/// Returns the publication time of a post (midnight UTC on its date).
fn post_date(
    config: &FeedConfig,
    post: &Post,
) -> Result<DateTime<FixedOffset>> {
    match &post.date {
        None => Ok(config.build_time),
        Some(date) => {
            let naive = NaiveDate::parse_from_str(date, DATE_FORMAT)
                .map_err(|err| Error::DateTimeParse {
                    post: post.url.to_string(),
                    err,
                })?
                .and_time(NaiveTime::MIN);
            Ok(Utc.from_utc_datetime(&naive).into())
        }
    }
}

fn alternate(href: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel("alternate");
    link
}

fn people(author: &Option<Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name.clone());
            person.set_email(author.email.clone());
            vec![person]
        }
        None => Vec::new(),
    }
}

fn atom_feed(config: &FeedConfig, posts: &[&Post]) -> Result<Feed> {
    let mut entries = Vec::with_capacity(posts.len());
    for post in posts {
        let date = post_date(config, post)?;
        let (summary, _) = post.summary();

        let mut content = Content::default();
        content.set_content_type(Some("html".to_owned()));
        content.set_value(Some(post.body.clone()));

        let mut entry = Entry::default();
        entry.set_id(post.url.to_string());
        entry.set_title(post.title.clone());
        entry.set_updated(date);
        entry.set_published(Some(date));
        entry.set_authors(people(&config.author));
        entry.set_links(vec![alternate(post.url.as_str())]);
        entry.set_summary(Some(Text::html(summary.to_owned())));
        entry.set_content(Some(content));
        entries.push(entry);
    }

    let mut feed = Feed::default();
    feed.set_title(config.title.clone());
    if let Some(description) = &config.description {
        feed.set_subtitle(Some(Text::plain(description.clone())));
    }
    feed.set_id(config.id.clone());
    feed.set_updated(config.build_time);
    feed.set_authors(people(&config.author));
    feed.set_links(vec![alternate(config.home_page.as_str())]);
    feed.set_entries(entries);
    Ok(feed)
}

#[derive(Serialize)]
struct JsonFeed<'a> {
    version: &'static str,
    title: &'a str,
    home_page_url: &'a str,
    feed_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    authors: Vec<JsonAuthor<'a>>,
    items: Vec<JsonItem<'a>>,
}

#[derive(Serialize)]
struct JsonAuthor<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct JsonItem<'a> {
    id: &'a str,
    url: &'a str,
    title: &'a str,
    content_html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    date_published: String,
}

fn json_feed<'a>(
    config: &'a FeedConfig,
    posts: &[&'a Post],
) -> Result<JsonFeed<'a>> {
    let items = posts
        .iter()
        .map(|&post| {
            Ok(JsonItem {
                id: post.url.as_str(),
                url: post.url.as_str(),
                title: &post.title,
                content_html: &post.body,
                summary: post.description.as_deref(),
                date_published: post_date(config, post)?.to_rfc3339(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(JsonFeed {
        version: JSON_FEED_VERSION,
        title: &config.title,
        home_page_url: config.home_page.as_str(),
        feed_url: config.json_feed_url.as_str(),
        description: config.description.as_deref(),
        authors: config
            .author
            .iter()
            .map(|author| JsonAuthor { name: &author.name })
            .collect(),
        items,
    })
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants inlude I/O, Atom, JSON and
/// date-time parsing issues.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when there is an Atom-related error.
    Atom(AtomError),

    /// Returned when the JSON feed can't be serialized.
    Json(serde_json::Error),

    /// Returned when there is an issue parsing a post's date.
    DateTimeParse { post: String, err: ParseError },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Atom(err) => err.fmt(f),
            Error::Json(err) => err.fmt(f),
            Error::DateTimeParse { post, err } => {
                write!(f, "parsing date of post `{}`: {}", post, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Atom(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::DateTimeParse { post: _, err } => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

impl From<serde_json::Error> for Error {
    /// Converts [`serde_json::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator in fallible feed operations.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn config() -> std::result::Result<FeedConfig, Box<dyn std::error::Error>> {
        Ok(FeedConfig {
            title: "Blog".to_owned(),
            description: Some("Notes".to_owned()),
            id: "https://example.org/".to_owned(),
            author: Some(Author {
                name: "Ada".to_owned(),
                email: None,
            }),
            home_page: Url::parse("https://example.org/")?,
            json_feed_url: Url::parse("https://example.org/feed.json")?,
            build_time: DateTime::parse_from_rfc3339(
                "2022-03-04T05:06:07+00:00",
            )?,
        })
    }

    fn post(
        name: &str,
        date: Option<&str>,
    ) -> std::result::Result<Post, url::ParseError> {
        let url = format!("https://example.org/posts/{}.html", name);
        Ok(Post {
            file_path: PathBuf::from(format!("/out/posts/{}.html", name)),
            url: Url::parse(&url)?,
            title: name.to_uppercase(),
            description: Some(format!("about {}", name)),
            date: date.map(str::to_owned),
            draft: false,
            has_math: false,
            body: format!("<p>{}</p>", name),
        })
    }

    #[test]
    fn test_atom_feed() -> TestResult {
        let first = post("first", Some("2021-04-16"))?;
        let undated = post("undated", None)?;
        let feed = atom_feed(&config()?, &[&first, &undated])?;

        assert_eq!("Blog", feed.title().as_str());
        assert_eq!(2, feed.entries().len());
        let entry = &feed.entries()[0];
        assert_eq!("https://example.org/posts/first.html", entry.id());
        assert_eq!("2021-04-16T00:00:00+00:00", entry.updated().to_rfc3339());
        assert_eq!(
            "2022-03-04T05:06:07+00:00",
            feed.entries()[1].updated().to_rfc3339()
        );

        let mut out = Vec::new();
        write_atom(&config()?, &[&first], &mut out)?;
        let xml = String::from_utf8(out)?;
        assert!(xml.contains("<name>Ada</name>"));
        assert!(xml.contains(r#"href="https://example.org/posts/first.html""#));
        Ok(())
    }

    #[test]
    fn test_json_feed() -> TestResult {
        let first = post("first", Some("2021-04-16"))?;
        let mut out = Vec::new();
        write_json(&config()?, &[&first], &mut out)?;
        let feed: serde_json::Value = serde_json::from_slice(&out)?;

        assert_eq!(JSON_FEED_VERSION, feed["version"]);
        assert_eq!("Blog", feed["title"]);
        assert_eq!("https://example.org/", feed["home_page_url"]);
        assert_eq!("https://example.org/feed.json", feed["feed_url"]);
        assert_eq!("Ada", feed["authors"][0]["name"]);
        let item = &feed["items"][0];
        assert_eq!("https://example.org/posts/first.html", item["url"]);
        assert_eq!("<p>first</p>", item["content_html"]);
        assert_eq!("about first", item["summary"]);
        assert_eq!("2021-04-16T00:00:00+00:00", item["date_published"]);
        Ok(())
    }

    #[test]
    fn test_bad_date() -> TestResult {
        let bad = post("bad", Some("April 16th"))?;
        match atom_feed(&config()?, &[&bad]) {
            Err(Error::DateTimeParse { post, .. }) => {
                assert_eq!("https://example.org/posts/bad.html", post)
            }
            other => {
                panic!("expected a date error, got {:?}", other.map(|_| ()))
            }
        }
        Ok(())
    }
}
