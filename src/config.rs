//! Loads the project configuration. A project is a directory containing a
//! `kiln.yaml` file alongside `posts/`, `static/` and `theme/` directories.
//! The theme is described by `theme/theme.yaml`, which lists the template
//! files for index and post pages.

use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "kiln.yaml";

const THEME_DIRECTORY: &str = "theme";
const THEME_FILE: &str = "theme.yaml";
const MATH_STYLESHEET: &str = "post-math.css";

/// The author of the site, credited in feeds.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

fn default_home_page() -> String {
    String::from("pages/index.html")
}

fn default_index_page_size() -> usize {
    10
}

fn default_minify() -> bool {
    true
}

fn default_inline_code_language() -> String {
    String::from("text")
}

#[derive(Deserialize)]
struct Project {
    title: String,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    author: Option<Author>,

    site_root: Url,

    #[serde(default = "default_home_page")]
    home_page: String,

    #[serde(default = "default_index_page_size")]
    index_page_size: usize,

    #[serde(default = "default_minify")]
    minify: bool,

    #[serde(default = "default_inline_code_language")]
    inline_code_language: String,

    #[serde(default)]
    include_drafts: bool,
}

#[derive(Deserialize)]
struct Theme {
    index_template: Vec<PathBuf>,
    posts_template: Vec<PathBuf>,
}

/// The resolved configuration for a build. Every path and URL the build
/// touches is spelled out here.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<Author>,

    pub home_page: Url,
    pub index_url: Url,
    pub posts_url: Url,
    pub static_url: Url,
    pub atom_url: Url,
    pub json_feed_url: Url,
    pub math_stylesheet: Url,

    pub posts_source_directory: PathBuf,
    pub static_source_directory: PathBuf,
    pub index_template: Vec<PathBuf>,
    pub posts_template: Vec<PathBuf>,

    pub root_output_directory: PathBuf,
    pub index_output_directory: PathBuf,
    pub posts_output_directory: PathBuf,
    pub static_output_directory: PathBuf,

    pub index_page_size: usize,
    pub minify: bool,
    pub inline_code_language: String,
    pub include_drafts: bool,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a project file and
    /// loads the first one found.
    pub fn from_directory(
        dir: &Path,
        output_directory: &Path,
    ) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let path = dir.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path, output_directory);
            }
            current = dir.parent();
        }
        Err(Error::ProjectNotFound(dir.to_owned()))
    }

    /// Loads the project file at `path` and the theme next to it.
    pub fn from_project_file(
        path: &Path,
        output_directory: &Path,
    ) -> Result<Config> {
        let project: Project = load(path)?;
        let project_root = path
            .parent()
            .ok_or_else(|| Error::NoProjectDirectory(path.to_owned()))?;
        let theme_dir = project_root.join(THEME_DIRECTORY);
        let theme: Theme = load(&theme_dir.join(THEME_FILE))?;

        let site_root = directory_url(project.site_root);
        let static_url = site_root.join("static/")?;
        Ok(Config {
            title: project.title,
            description: project.description,
            author: project.author,

            home_page: site_root.join(&project.home_page)?,
            index_url: site_root.join("pages/")?,
            posts_url: site_root.join("posts/")?,
            atom_url: site_root.join("feed.atom")?,
            json_feed_url: site_root.join("feed.json")?,
            math_stylesheet: static_url.join(MATH_STYLESHEET)?,
            static_url,

            posts_source_directory: project_root.join("posts"),
            static_source_directory: project_root.join("static"),
            index_template: theme
                .index_template
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect(),
            posts_template: theme
                .posts_template
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect(),

            root_output_directory: output_directory.to_owned(),
            index_output_directory: output_directory.join("pages"),
            posts_output_directory: output_directory.join("posts"),
            static_output_directory: output_directory.join("static"),

            index_page_size: project.index_page_size.max(1),
            minify: project.minify,
            inline_code_language: project.inline_code_language,
            include_drafts: project.include_drafts,
        })
    }
}

/// Makes sure `url` ends in a slash so joining resolves beneath it rather
/// than beside it.
fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn load<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| Error::Open {
        path: path.to_owned(),
        err,
    })?;
    serde_yaml::from_reader(file).map_err(|err| Error::DeserializeYaml {
        path: path.to_owned(),
        err,
    })
}

/// The result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when no project file exists in the directory or its
    /// ancestors.
    ProjectNotFound(PathBuf),

    /// Returned when the project file path has no parent directory.
    NoProjectDirectory(PathBuf),

    /// Returned when a configuration file can't be opened.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned when a configuration file isn't valid.
    DeserializeYaml { path: PathBuf, err: serde_yaml::Error },

    /// Returned when a configured URL can't be joined.
    UrlParse(url::ParseError),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ProjectNotFound(dir) => write!(
                f,
                "could not find `{}` in '{}' or any parent directory",
                PROJECT_FILE,
                dir.display()
            ),
            Error::NoProjectDirectory(path) => {
                write!(f, "can't get parent directory of '{}'", path.display())
            }
            Error::Open { path, err } => {
                write!(f, "opening '{}': {}", path.display(), err)
            }
            Error::DeserializeYaml { path, err } => {
                write!(f, "loading '{}': {}", path.display(), err)
            }
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ProjectNotFound(_) => None,
            Error::NoProjectDirectory(_) => None,
            Error::Open { path: _, err } => Some(err),
            Error::DeserializeYaml { path: _, err } => Some(err),
            Error::UrlParse(err) => Some(err),
        }
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}
