//! Order-preserving mirror pipeline
//!
//! [`Mirror::run`] hands every article of a document to a [`Transform`]
//! (typically a re-post or a verification against another server) with at
//! most `connections` calls in flight, and streams the transformed
//! articles into a new NZB in source order.
//!
//! # Example
//!
//! ```
//! use nzb_toolkit::mirror::{ApplyOverrides, Mirror, MirrorOptions};
//! use nzb_toolkit::{parse_nzb, ServerConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> nzb_toolkit::Result<()> {
//! let nzb = parse_nzb(r#"<nzb><file poster="p" date="1600000000" subject="&quot;a.bin&quot; yEnc (1/2)">
//!   <groups><group>alt.binaries.test</group></groups>
//!   <segments>
//!     <segment bytes="10" number="1">a1@x</segment>
//!     <segment bytes="20" number="2">a2@x</segment>
//!   </segments>
//! </file></nzb>"#)?;
//!
//! let options = MirrorOptions {
//!     message_id: Some("{filenum}.{part}.${rand(8)}@mirror".to_string()),
//!     ..Default::default()
//! };
//! let mut mirror = Mirror::new(ServerConfig::tls("news.example.com", "", ""), options)?;
//!
//! let mut out = Vec::new();
//! let report = mirror.run(&nzb, &ApplyOverrides, &mut out).await?;
//! assert_eq!(report.articles, 2);
//! assert_eq!(mirror.progress().completed_bytes(), 30);
//!
//! let mirrored = parse_nzb(std::str::from_utf8(&out).unwrap())?;
//! assert_eq!(mirrored.head.get("server").map(String::as_str), Some("news.example.com"));
//! assert!(mirrored.files()[0].segments[1].message_id.starts_with("1.2."));
//! # Ok(())
//! # }
//! ```

mod reorder;

pub use reorder::ReorderBuffer;

use crate::article::{format_article_date, Article, HeaderOverrides};
use crate::config::ServerConfig;
use crate::error::{NzbError, Result};
use crate::nzb::{Nzb, NzbFile, NzbWriter};
use crate::template::{render, TemplateParams};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::{debug, info, trace, warn};

/// Per-article operation run by the pipeline
///
/// Called exactly once per source article. `overrides` holds the headers
/// the result should carry; the returned article's `number` is replaced
/// by the source number before it is written.
///
/// Closures `Fn(Article, HeaderOverrides) -> impl Future<Output = Result<Article>>`
/// implement this trait.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, article: Article, overrides: HeaderOverrides) -> Result<Article>;
}

#[async_trait]
impl<F, Fut> Transform for F
where
    F: Fn(Article, HeaderOverrides) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Article>> + Send + 'static,
{
    async fn transform(&self, article: Article, overrides: HeaderOverrides) -> Result<Article> {
        self(article, overrides).await
    }
}

/// Transform that talks to no server: the result is the source article
/// with the overrides applied
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOverrides;

#[async_trait]
impl Transform for ApplyOverrides {
    async fn transform(&self, article: Article, overrides: HeaderOverrides) -> Result<Article> {
        Ok(Article {
            headers: overrides.apply(&article.headers),
            number: article.number,
        })
    }
}

/// Header rewrites for a mirror run
///
/// Unset fields keep the source article's value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MirrorOptions {
    /// Subject template (see [`crate::template`])
    pub subject: Option<String>,
    /// Message-id template, wrapped in `<>` when the result is not
    pub message_id: Option<String>,
    /// Value of `{comment}`
    pub comment: String,
    /// Value of `{comment2}`
    pub comment2: String,
    /// Replacement poster
    pub from: Option<String>,
    /// Replacement newsgroups, comma separated
    pub groups: Option<String>,
    /// Replacement date header; `now` is the time the run starts
    pub date: Option<String>,
}

impl MirrorOptions {
    fn resolved_date(&self) -> Option<String> {
        match self.date.as_deref() {
            Some(date) if date.trim().eq_ignore_ascii_case("now") => {
                Some(format_article_date(Utc::now().timestamp_millis()))
            }
            other => other.map(str::to_string),
        }
    }
}

/// Progress of a mirror run, shareable with another task
///
/// Bytes are counted when an article is written to the output, not when
/// its transform completes.
#[derive(Debug, Clone, Default)]
pub struct MirrorProgress {
    total_bytes: Arc<AtomicU64>,
    completed_bytes: Arc<AtomicU64>,
    articles_written: Arc<AtomicU64>,
}

impl MirrorProgress {
    fn reset(&self, total_bytes: u64) {
        self.total_bytes.store(total_bytes, Ordering::Relaxed);
        self.completed_bytes.store(0, Ordering::Relaxed);
        self.articles_written.store(0, Ordering::Relaxed);
    }

    fn record_written(&self, bytes: u64) {
        self.completed_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.articles_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Total size of the document being mirrored
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Declared bytes of every article written so far
    pub fn completed_bytes(&self) -> u64 {
        self.completed_bytes.load(Ordering::Relaxed)
    }

    pub fn articles_written(&self) -> u64 {
        self.articles_written.load(Ordering::Relaxed)
    }

    /// Get the percentage of bytes written (0-100)
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        let total = self.total_bytes();
        if total == 0 {
            return 0.0;
        }
        (self.completed_bytes() as f64 / total as f64) * 100.0
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MirrorReport {
    /// `<file>` blocks written
    pub files: usize,
    /// Segments written
    pub articles: usize,
    /// Declared bytes written
    pub bytes: u64,
}

/// Mirror pipeline bound to one server configuration
#[derive(Debug)]
pub struct Mirror {
    server: ServerConfig,
    options: MirrorOptions,
    progress: MirrorProgress,
}

impl Mirror {
    /// Create a pipeline; the server configuration must validate
    pub fn new(server: ServerConfig, options: MirrorOptions) -> Result<Self> {
        server.validate()?;
        Ok(Self {
            server,
            options,
            progress: MirrorProgress::default(),
        })
    }

    /// Number of transforms allowed in flight
    pub fn concurrency(&self) -> usize {
        self.server.connections
    }

    /// Handle on this pipeline's progress counters
    pub fn progress(&self) -> MirrorProgress {
        self.progress.clone()
    }

    /// Mirror every article of `nzb` through `transform` into `output`
    ///
    /// Runs on one pipeline are sequential; each run resets the progress
    /// counters. On the first failure (transform, template or write) no
    /// further articles are dispatched, the ones in flight are awaited and
    /// discarded, and that error is returned. Whatever was already written
    /// stays in `output`.
    pub async fn run<T, W>(&mut self, nzb: &Nzb, transform: &T, output: W) -> Result<MirrorReport>
    where
        T: Transform + ?Sized,
        W: AsyncWrite + Unpin,
    {
        let this: &Self = self;
        let concurrency = this.concurrency();
        let files = nzb.files().len();
        let date = this.options.resolved_date();
        this.progress.reset(nzb.total_size());

        let mut head = nzb.head.clone();
        head.insert("server".to_string(), this.server.host.clone());
        if this.server.tls {
            head.insert("ssl".to_string(), "true".to_string());
        }
        let mut writer = NzbWriter::begin(output, &head, &nzb.processing_instructions).await?;

        info!(
            files,
            articles = nzb.total_segments(),
            bytes = nzb.total_size(),
            connections = concurrency,
            "Mirroring NZB"
        );

        let stop = AtomicBool::new(false);
        let (stop_ref, date_ref) = (&stop, date.as_deref());
        let mut cursor = nzb.articles();
        let dispatch = std::iter::from_fn(move || cursor.next_with_file())
            .take_while(move |_| !stop_ref.load(Ordering::Acquire))
            .enumerate()
            .map(move |(slot, (file_index, file, article))| {
                let overrides = this.overrides(files, file_index, file, &article, date_ref);
                let number = article.number;
                trace!(slot, message_id = %article.headers.message_id, "Dispatching article");
                async move {
                    let result = match overrides {
                        Ok(overrides) => transform.transform(article, overrides).await,
                        Err(err) => Err(err),
                    };
                    (slot, number, result)
                }
            });

        let mut completions = stream::iter(dispatch).buffer_unordered(concurrency);
        let mut reorder = ReorderBuffer::new();
        let mut failure: Option<NzbError> = None;
        let mut written_bytes = 0u64;

        while let Some((slot, number, result)) = completions.next().await {
            if failure.is_some() {
                continue;
            }
            let mut article = match result {
                Ok(article) => article,
                Err(err) => {
                    warn!(slot, error = %err, "Transform failed, draining in-flight articles");
                    stop.store(true, Ordering::Release);
                    failure = Some(err);
                    continue;
                }
            };
            article.number = number;

            for ready in reorder.insert(slot, article) {
                if let Err(err) = writer.write_article(&ready).await {
                    warn!(error = %err, "Writing mirrored NZB failed, draining in-flight articles");
                    stop.store(true, Ordering::Release);
                    failure = Some(err);
                    break;
                }
                written_bytes += ready.bytes();
                this.progress.record_written(ready.bytes());
            }
        }

        if let Some(err) = failure {
            if let Err(flush_err) = writer.flush().await {
                debug!(error = %flush_err, "Could not flush partial output");
            }
            return Err(err);
        }

        let report = MirrorReport {
            files: writer.files_written(),
            articles: writer.articles_written(),
            bytes: written_bytes,
        };
        writer.finish().await?;

        info!(
            files = report.files,
            articles = report.articles,
            bytes = report.bytes,
            "Mirror complete"
        );
        Ok(report)
    }

    fn overrides(
        &self,
        files: usize,
        file_index: usize,
        file: &NzbFile,
        article: &Article,
        date: Option<&str>,
    ) -> Result<HeaderOverrides> {
        let mut overrides = HeaderOverrides {
            from: self.options.from.clone(),
            date: date.map(str::to_string),
            newsgroups: self.options.groups.clone(),
            bytes: article.headers.bytes.clone(),
            ..Default::default()
        };

        if self.options.subject.is_none() && self.options.message_id.is_none() {
            return Ok(overrides);
        }

        let mut params = TemplateParams::for_article(files, file_index, file, article);
        params
            .insert("comment", self.options.comment.as_str())
            .insert("comment2", self.options.comment2.as_str());

        if let Some(template) = &self.options.subject {
            overrides.subject = Some(render(template, &params)?);
        }
        if let Some(template) = &self.options.message_id {
            overrides.message_id = Some(wrap_message_id(render(template, &params)?));
        }
        Ok(overrides)
    }
}

fn wrap_message_id(id: String) -> String {
    if id.len() >= 2 && id.starts_with('<') && id.ends_with('>') {
        id
    } else {
        format!("<{id}>")
    }
}
