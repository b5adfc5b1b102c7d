//! Integration tests for NZB parsing and serialization
//!
//! These tests go through the public API only.

use nzb_toolkit::{check, parse_nzb, CheckMethod, Nzb, NzbError};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, BufReader, ReadBuf};
use tracing_subscriber::EnvFilter;

const RELEASE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nzb PUBLIC "-//newzBin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd">
<?xml-stylesheet type="text/xsl" href="nzb.xsl"?>
<nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
  <head>
    <meta type="title">Big Buck Bunny</meta>
    <meta type="category">Movies</meta>
  </head>
  <!-- generated by a poster -->
  <file poster="Poster &lt;poster@example.com&gt;" date="1700000000" subject="[1/2] - &quot;bbb.part1.rar&quot; yEnc (1/3)">
    <groups>
      <group>alt.binaries.movies</group>
      <group>alt.binaries.test</group>
    </groups>
    <segments>
      <segment bytes="400" number="1">bbb1.1@example.com</segment>
      <segment bytes="400" number="2">bbb1.2@example.com</segment>
      <segment bytes="200" number="3">bbb1.3@example.com</segment>
    </segments>
  </file>
  <file poster="Poster &lt;poster@example.com&gt;" date="1700000100" subject="=?UTF-8?Q?[2/2]_-_=22bbb.par2=22_yEnc_(1/1)?=">
    <groups>
      <group>alt.binaries.movies</group>
    </groups>
    <segments>
      <segment bytes="50" number="1">bbb2.1@example.com</segment>
    </segments>
  </file>
</nzb>"#;

/// Route library logs to the test output; `RUST_LOG` raises the level
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Reader that hands out at most `chunk` bytes per read
struct Trickle<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl AsyncRead for Trickle<'_> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let n = self.chunk.min(self.data.len()).min(buf.remaining());
        let (head, tail) = self.data.split_at(n);
        buf.put_slice(head);
        self.data = tail;
        Poll::Ready(Ok(()))
    }
}

/// Reader that fails after some bytes
struct Broken<'a> {
    data: &'a [u8],
}

impl AsyncRead for Broken<'_> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.data.is_empty() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        let n = self.data.len().min(buf.remaining());
        let (head, tail) = self.data.split_at(n);
        buf.put_slice(head);
        self.data = tail;
        Poll::Ready(Ok(()))
    }
}

fn structure(nzb: &Nzb) -> (usize, usize, u64) {
    (nzb.files().len(), nzb.total_segments(), nzb.total_size())
}

#[test]
fn test_parse_release() {
    let nzb = parse_nzb(RELEASE).unwrap();

    assert_eq!(nzb.head.len(), 2);
    assert_eq!(nzb.head.get("title").map(String::as_str), Some("Big Buck Bunny"));
    assert_eq!(
        nzb.processing_instructions["xml-stylesheet"].get("href").map(String::as_str),
        Some("nzb.xsl")
    );

    let first = &nzb.files()[0];
    assert_eq!(first.poster, "Poster <poster@example.com>");
    assert_eq!(first.name, "bbb.part1.rar");
    assert_eq!(first.last_modified, 1_700_000_000_000);
    assert_eq!(first.groups.len(), 2);
    assert_eq!(first.segments.len(), 3);

    let second = &nzb.files()[1];
    assert_eq!(second.name, "bbb.par2");
    assert_eq!(second.size, 1);
    assert_eq!(second.subject, "=?UTF-8?Q?[2/2]_-_=22bbb.par2=22_yEnc_(1/1)?=");
}

#[test]
fn test_totals_match_files() {
    let nzb = parse_nzb(RELEASE).unwrap();
    let size: u64 = nzb.files().iter().map(|f| f.size).sum();
    let segments: usize = nzb.files().iter().map(|f| f.segments.len()).sum();
    assert_eq!(size, nzb.total_size());
    assert_eq!(segments, nzb.total_segments());
}

#[test]
fn test_round_trip_keeps_structure() {
    let nzb = parse_nzb(RELEASE).unwrap();
    let reparsed = parse_nzb(&nzb.to_xml()).unwrap();

    assert_eq!(structure(&reparsed), structure(&nzb));
    assert_eq!(reparsed.head, nzb.head);
    assert_eq!(reparsed.processing_instructions, nzb.processing_instructions);
    for (a, b) in nzb.files().iter().zip(reparsed.files()) {
        assert_eq!(**a, **b);
    }

    let again = parse_nzb(&reparsed.to_xml()).unwrap();
    assert_eq!(again.to_xml(), reparsed.to_xml());
}

#[test]
fn test_blocking_reader_matches_str() {
    let from_reader = Nzb::from_reader(io::Cursor::new(RELEASE), Some("bbb.nzb".to_string())).unwrap();
    let from_str = parse_nzb(RELEASE).unwrap();
    assert_eq!(structure(&from_reader), structure(&from_str));
    assert_eq!(from_reader.name.as_deref(), Some("bbb.nzb"));
}

#[tokio::test]
async fn test_async_reader_small_chunks() {
    init_logging();
    for chunk in [1, 7, 64] {
        let reader = BufReader::with_capacity(
            16,
            Trickle {
                data: RELEASE.as_bytes(),
                chunk,
            },
        );
        let nzb = Nzb::from_async_reader(reader, None).await.unwrap();
        assert_eq!(structure(&nzb), (2, 4, 3 + 1), "chunk size {chunk}");
        assert_eq!(nzb.files()[0].segments[2].message_id, "bbb1.3@example.com");
    }
}

#[tokio::test]
async fn test_read_failure_is_an_error() {
    init_logging();
    let reader = BufReader::new(Broken {
        data: &RELEASE.as_bytes()[..300],
    });
    let err = Nzb::from_async_reader(reader, None).await.unwrap_err();
    match err {
        NzbError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
        other => panic!("expected IO error, got {other:?}"),
    }
}

#[test]
fn test_tolerates_garbage_after_files() {
    init_logging();
    let truncated = format!("{}<file subject=\"broken", &RELEASE[..RELEASE.find("</nzb>").unwrap()]);
    let nzb = parse_nzb(&truncated).unwrap();
    assert_eq!(nzb.files().len(), 2);
}

#[test]
fn test_checks_on_parsed_document() {
    let nzb = parse_nzb(RELEASE).unwrap();
    assert!(check(&nzb, CheckMethod::Quick).valid);

    // Counter totals are size hints, not byte counts
    let full = check(&nzb, CheckMethod::Full);
    assert!(!full.valid);
    assert_eq!(
        full.issues,
        vec![
            "Size mismatch in file bbb.part1.rar: expected 3, got 1000",
            "Size mismatch in file bbb.par2: expected 1, got 50",
        ]
    );
}
