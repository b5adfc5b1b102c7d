#![doc = include_str!("../README.md")]

/// Articles projected from NZB segments
pub mod article;
/// Combine, extract and get operations over documents
pub mod compose;
mod config;
mod error;
/// Order-preserving mirror pipeline
pub mod mirror;
/// NZB document model, streaming parser and writer
pub mod nzb;
/// yEnc-style subject decoding
pub mod subject;
/// Subject and message-id templates
pub mod template;
/// NZB integrity checks
pub mod validation;

pub use article::{Article, ArticleHeaders, Articles, HeaderOverrides};
pub use compose::{combine, extract, get, FilePattern};
pub use config::{ServerConfig, DEFAULT_CONNECTIONS};
pub use error::{NzbError, Result};
pub use mirror::{ApplyOverrides, Mirror, MirrorOptions, MirrorProgress, MirrorReport, Transform};
pub use nzb::{parse_nzb, Nzb, NzbFile, NzbParser, NzbSegment, NzbWriter};
pub use template::{render, ParamValue, TemplateParams};
pub use validation::{check, CheckMethod, ValidationReport};
