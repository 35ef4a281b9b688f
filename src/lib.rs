//! The library code for the `kiln` static site generator. The architecture
//! can be generally broken down into three steps:
//!
//! 1. Parsing posts from source files on disk ([`crate::parser`]). Each post's
//!    markdown is rendered to HTML ([`crate::markdown`]) and then transformed
//!    ([`crate::transform`]): fenced math blocks and `$...$` inline code are
//!    typeset ([`crate::math`]) and other code is highlighted
//!    ([`crate::highlight`]).
//! 2. Converting the posts into output files on disk ([`crate::write`]). Every
//!    page goes through the theme's templates and is then post-processed
//!    ([`crate::template`]).
//! 3. Writing the Atom and JSON feeds ([`crate::feed`]).
//!
//! [`crate::build::build_site`] runs the steps in order for a
//! [`crate::config::Config`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod dom;
pub mod feed;
pub mod highlight;
mod htmlrenderer;
pub mod markdown;
pub mod math;
pub mod parser;
pub mod post;
pub mod template;
pub mod transform;
pub mod url;
pub mod write;
