//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: parsing and transforming the
//! posts ([`crate::parser`]), rendering index and post pages
//! ([`crate::write`]), copying bundle assets and the static source directory
//! into the output directory, and generating the feeds ([`crate::feed`]).

use crate::config::Config;
use crate::feed::{self, FeedConfig};
use crate::parser::{self, Parser as PostParser, StaticFile};
use crate::post::Post;
use crate::template::{self, parse_template, Renderer};
use crate::write::{self, Writer};
use chrono::Utc;
use gtmpl::Value;
use log::info;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Builds the site from a [`Config`] object. This calls into
/// [`PostParser::parse_posts`], [`Writer::write_posts`], and the feed writers
/// which do the heavy-lifting.
pub fn build_site(config: &Config) -> Result<()> {
    let post_parser = PostParser::new(
        &config.posts_url,
        &config.posts_output_directory,
        &config.inline_code_language,
    );

    let posts_source = &config.posts_source_directory;
    info!("Parsing posts in '{}'", posts_source.display());
    let (posts, static_files) = post_parser.parse_posts(posts_source)?;

    info!("Parsing templates");
    let index_template = parse_template(config.index_template.iter())?;
    let posts_template = parse_template(config.posts_template.iter())?;

    // Blow away the old output directories so we don't have any collisions.
    // The root output directory itself is left alone in case the user passed
    // the wrong directory.
    rmdir(&config.posts_output_directory)?;
    rmdir(&config.index_output_directory)?;
    rmdir(&config.static_output_directory)?;

    let renderer = Renderer {
        minify: config.minify,
        math_stylesheet: Some(config.math_stylesheet.clone()),
    };
    let writer = Writer {
        posts_template: &posts_template,
        index_template: &index_template,
        index_page_size: config.index_page_size,
        index_base_url: &config.index_url,
        index_output_directory: &config.index_output_directory,
        home_page: &config.home_page,
        static_url: &config.static_url,
        site: site_value(config),
        renderer: &renderer,
        include_drafts: config.include_drafts,
    };
    writer.write_posts(&posts)?;

    info!("Copying {} bundle assets", static_files.len());
    copy_static_files(&static_files)?;

    info!("Copying '{}'", config.static_source_directory.display());
    if config.static_source_directory.is_dir() {
        copy_dir(
            &config.static_source_directory,
            &config.static_output_directory,
        )?;
    }

    // copy /pages/index.html to /index.html
    std::fs::copy(
        config.index_output_directory.join("index.html"),
        config.root_output_directory.join("index.html"),
    )?;

    info!("Writing feeds");
    let published: Vec<&Post> = posts
        .iter()
        .filter(|post| post.published(config.include_drafts))
        .collect();
    let feed_config = FeedConfig {
        title: config.title.clone(),
        description: config.description.clone(),
        id: config.home_page.to_string(),
        author: config.author.clone(),
        home_page: config.home_page.clone(),
        json_feed_url: config.json_feed_url.clone(),
        build_time: Utc::now().into(),
    };
    feed::write_atom(
        &feed_config,
        &published,
        File::create(config.root_output_directory.join("feed.atom"))?,
    )?;
    feed::write_json(
        &feed_config,
        &published,
        File::create(config.root_output_directory.join("feed.json"))?,
    )?;

    info!(
        "Built {} posts into '{}'",
        posts.len(),
        config.root_output_directory.display()
    );
    Ok(())
}

/// Site-wide template values, available to every page as `site`.
fn site_value(config: &Config) -> Value {
    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("title".to_owned(), Value::String(config.title.clone()));
    m.insert(
        "description".to_owned(),
        match &config.description {
            Some(description) => Value::String(description.clone()),
            None => Value::Nil,
        },
    );
    m.insert("atom_url".to_owned(), Value::String(config.atom_url.to_string()));
    m.insert(
        "json_feed_url".to_owned(),
        Value::String(config.json_feed_url.to_string()),
    );
    Value::Object(m)
}

fn copy_static_files(static_files: &[StaticFile]) -> Result<()> {
    for (src, dst) in static_files {
        if let Some(dir) = dst.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::copy(src, dst).map_err(|err| Error::Copy {
            path: src.to_owned(),
            err,
        })?;
    }
    Ok(())
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let (from, to) = (entry.path(), dst.join(entry.file_name()));
        if entry.file_type()?.is_dir() {
            copy_dir(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)
                .map_err(|err| Error::Copy { path: from, err })?;
        }
    }

    Ok(())
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during parsing, writing,
/// cleaning output directories, templating, feeds, and other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors during parsing.
    Parse(parser::Error),

    /// Returned for errors loading templates.
    Template(template::Error),

    /// Returned for errors writing [`crate::post::Post`]s to disk as HTML
    /// files.
    Write(write::Error),

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while copying static files.
    Copy { path: PathBuf, err: std::io::Error },

    /// Returned for errors writing the feeds.
    Feed(feed::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => err.fmt(f),
            Error::Template(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::Clean { path, err } => {
                write!(f, "cleaning directory '{}': {}", path.display(), err)
            }
            Error::Copy { path, err } => {
                write!(f, "copying '{}': {}", path.display(), err)
            }
            Error::Feed(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(err) => Some(err),
            Error::Template(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::Copy { path: _, err } => Some(err),
            Error::Feed(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<parser::Error> for Error {
    /// Converts [`parser::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: parser::Error) -> Error {
        Error::Parse(err)
    }
}

impl From<template::Error> for Error {
    /// Converts [`template::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: template::Error) -> Error {
        Error::Template(err)
    }
}

impl From<write::Error> for Error {
    /// Converts [`write::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: write::Error) -> Error {
        Error::Write(err)
    }
}

impl From<feed::Error> for Error {
    /// Converts [`feed::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: feed::Error) -> Error {
        Error::Feed(err)
    }
}
