//! Serialization of configuration, options and reports
//!
//! Only built with the `serde` feature.

#![cfg(feature = "serde")]

use nzb_toolkit::{
    Article, ArticleHeaders, CheckMethod, MirrorOptions, MirrorReport, ServerConfig,
    ValidationReport, DEFAULT_CONNECTIONS,
};
use std::time::Duration;

#[test]
fn test_server_config_serde() {
    let config = ServerConfig::tls("news.example.com", "user", "pass").connections(8);

    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("news.example.com"));
    assert!(json.contains("\"port\":563"));
    assert!(json.contains("\"tls\":true"));
    assert!(json.contains("\"connections\":8"));

    let deserialized: ServerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.host, config.host);
    assert_eq!(deserialized.port, config.port);
    assert_eq!(deserialized.tls, config.tls);
    assert_eq!(deserialized.connections, 8);
    assert_eq!(deserialized.reconnect_delay, config.reconnect_delay);
}

#[test]
fn test_server_config_serde_defaults() {
    let json = r#"{"host":"news.example.com","port":119}"#;
    let config: ServerConfig = serde_json::from_str(json).unwrap();

    assert!(!config.tls);
    assert_eq!(config.username, "");
    assert_eq!(config.password, "");
    assert_eq!(config.connections, DEFAULT_CONNECTIONS);
    assert_eq!(config.connect_retries, 3);
    assert_eq!(config.request_retries, 3);
    assert_eq!(config.reconnect_delay, Duration::from_secs(1));
    assert_eq!(config.post_retry_delay, Duration::from_secs(1));
    assert!(config.validate().is_ok());
}

#[test]
fn test_mirror_options_serde_defaults() {
    let options: MirrorOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(options, MirrorOptions::default());

    let options: MirrorOptions =
        serde_json::from_str(r#"{"subject":"{filename} ({part}/{parts})","date":"now"}"#).unwrap();
    assert_eq!(options.subject.as_deref(), Some("{filename} ({part}/{parts})"));
    assert_eq!(options.date.as_deref(), Some("now"));
    assert_eq!(options.comment, "");

    let json = serde_json::to_string(&options).unwrap();
    assert_eq!(serde_json::from_str::<MirrorOptions>(&json).unwrap(), options);
}

#[test]
fn test_check_method_lowercase() {
    assert_eq!(serde_json::to_string(&CheckMethod::Full).unwrap(), "\"full\"");
    assert_eq!(serde_json::to_string(&CheckMethod::Quick).unwrap(), "\"quick\"");
    assert_eq!(
        serde_json::from_str::<CheckMethod>("\"full\"").unwrap(),
        CheckMethod::Full
    );
    assert!(serde_json::from_str::<CheckMethod>("\"Full\"").is_err());
}

#[test]
fn test_reports_round_trip() {
    let report = ValidationReport {
        valid: false,
        issues: vec!["Size mismatch in file a.bin: expected 400, got 300".to_string()],
    };
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"valid\":false"));
    assert_eq!(serde_json::from_str::<ValidationReport>(&json).unwrap(), report);

    let mirrored = MirrorReport {
        files: 2,
        articles: 5,
        bytes: 500,
    };
    let json = serde_json::to_string(&mirrored).unwrap();
    assert_eq!(serde_json::from_str::<MirrorReport>(&json).unwrap(), mirrored);
}

#[test]
fn test_article_round_trip() {
    let article = Article {
        headers: ArticleHeaders {
            from: "poster@example.com".to_string(),
            date: "Sun, 13 Sep 2020 12:26:40 GMT".to_string(),
            subject: "\"a.bin\" yEnc (2/3)".to_string(),
            newsgroups: "alt.binaries.a,alt.binaries.b".to_string(),
            message_id: "<a2@example.com>".to_string(),
            bytes: "500".to_string(),
        },
        number: 2,
    };

    let json = serde_json::to_string(&article).unwrap();
    assert!(json.contains("\"number\":2"));
    assert_eq!(serde_json::from_str::<Article>(&json).unwrap(), article);
}
