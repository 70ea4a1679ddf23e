//! SMTP backend tests against an in-process relay
//!
//! The relay speaks just enough SMTP for lettre's client: greeting, EHLO,
//! AUTH PLAIN, MAIL, RCPT, DATA and QUIT. Recipients containing "reject" get
//! a 550, and only the `relay`/`secret` credentials are accepted.
//!
//! Run with: cargo test --test smtp_integration

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use relaymail_core::config::EmailConfig;
use relaymail_core::mail::{FreshConnectionBackend, MailBackend, OutgoingMessage, SmtpBackend};
use relaymail_core::Error;

/// Base64 of "\0relay\0secret"
const VALID_PLAIN_AUTH: &str = "AHJlbGF5AHNlY3JldA==";

/// Commands received, one list per accepted connection
type Transcript = Arc<Mutex<Vec<Vec<String>>>>;

struct FakeRelay {
    port: u16,
    transcript: Transcript,
}

impl FakeRelay {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let transcript: Transcript = Arc::default();

        let sessions = transcript.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let index = {
                    let mut sessions = sessions.lock().await;
                    sessions.push(Vec::new());
                    sessions.len() - 1
                };
                tokio::spawn(serve(stream, sessions.clone(), index));
            }
        });

        Self { port, transcript }
    }

    async fn sessions(&self) -> Vec<Vec<String>> {
        self.transcript.lock().await.clone()
    }

    fn config(&self) -> EmailConfig {
        EmailConfig {
            host: "127.0.0.1".to_string(),
            port: self.port,
            hello_name: Some("relaymail.test".to_string()),
            from_email: "noreply@example.com".to_string(),
            timeout_seconds: Some(5),
            ..EmailConfig::default()
        }
    }
}

async fn serve(stream: tokio::net::TcpStream, transcript: Transcript, index: usize) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    if writer.write_all(b"220 relay.test ESMTP\r\n").await.is_err() {
        return;
    }

    while let Ok(Some(line)) = lines.next_line().await {
        let verb = line
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        transcript.lock().await[index].push(verb.clone());

        let reply: &[u8] = match verb.as_str() {
            "EHLO" => b"250-relay.test\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n",
            "AUTH" if line.ends_with(VALID_PLAIN_AUTH) => b"235 2.7.0 Authentication successful\r\n",
            "AUTH" => b"535 5.7.8 Authentication credentials invalid\r\n",
            "RCPT" if line.contains("reject") => b"550 5.1.1 No such user\r\n",
            "DATA" => {
                if writer
                    .write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n")
                    .await
                    .is_err()
                {
                    return;
                }
                // Swallow the message body up to the terminating dot
                while let Ok(Some(body_line)) = lines.next_line().await {
                    if body_line == "." {
                        break;
                    }
                }
                b"250 2.0.0 Queued\r\n"
            }
            "QUIT" => {
                let _ = writer.write_all(b"221 2.0.0 Bye\r\n").await;
                return;
            }
            _ => b"250 2.0.0 OK\r\n",
        };

        if writer.write_all(reply).await.is_err() {
            return;
        }
    }
}

fn message(to: &str) -> OutgoingMessage {
    OutgoingMessage::new()
        .to(to)
        .subject("Build finished")
        .text("All green.")
}

#[tokio::test]
async fn test_each_batch_uses_its_own_connection() {
    let relay = FakeRelay::start().await;
    let mut backend = FreshConnectionBackend::new(SmtpBackend::new(relay.config()).unwrap());

    let first = backend
        .send_messages(&[message("a@example.com"), message("b@example.com")])
        .await
        .unwrap();
    let second = backend.send_messages(&[message("c@example.com")]).await.unwrap();

    assert_eq!(first, 2);
    assert_eq!(second, 1);
    assert!(!backend.inner().is_connected());

    let sessions = relay.sessions().await;
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].iter().filter(|c| *c == "DATA").count(), 2);
    assert_eq!(sessions[1].iter().filter(|c| *c == "DATA").count(), 1);
    for session in &sessions {
        assert_eq!(session.first().map(String::as_str), Some("EHLO"));
        assert_eq!(session.last().map(String::as_str), Some("QUIT"));
    }
}

#[tokio::test]
async fn test_connection_opened_by_caller_is_replaced() {
    let relay = FakeRelay::start().await;
    let mut backend = FreshConnectionBackend::new(SmtpBackend::new(relay.config()).unwrap());

    assert!(backend.open().await.unwrap());
    backend.send_messages(&[message("a@example.com")]).await.unwrap();

    let sessions = relay.sessions().await;
    assert_eq!(sessions.len(), 2);
    // The pre-existing connection was closed without sending anything
    assert_eq!(sessions[0], ["EHLO", "QUIT"]);
    assert!(sessions[1].contains(&"DATA".to_string()));
}

#[tokio::test]
async fn test_rejected_recipient_propagates_and_releases_connection() {
    let relay = FakeRelay::start().await;
    let mut backend = FreshConnectionBackend::new(SmtpBackend::new(relay.config()).unwrap());

    let err = backend
        .send_messages(&[message("reject@example.com")])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Smtp(_)));
    assert!(err.is_permanent());
    assert!(!backend.inner().is_connected());

    // The next batch starts on a new connection and succeeds
    let sent = backend.send_messages(&[message("a@example.com")]).await.unwrap();
    assert_eq!(sent, 1);
    assert_eq!(relay.sessions().await.len(), 2);
}

#[tokio::test]
async fn test_plain_backend_keeps_connection_after_failure() {
    let relay = FakeRelay::start().await;
    let mut backend = SmtpBackend::new(relay.config()).unwrap();

    assert!(backend
        .send_messages(&[message("reject@example.com")])
        .await
        .is_err());

    // Without the wrapper the failed batch leaves its connection behind
    assert!(backend.is_connected());
    backend.close().await.unwrap();
    assert!(!backend.is_connected());
}

#[tokio::test]
async fn test_fail_silently_counts_only_delivered_messages() {
    let relay = FakeRelay::start().await;
    let config = EmailConfig {
        fail_silently: true,
        ..relay.config()
    };
    let mut backend = FreshConnectionBackend::new(SmtpBackend::new(config).unwrap());

    let sent = backend
        .send_messages(&[message("a@example.com"), message("reject@example.com")])
        .await
        .unwrap();

    assert_eq!(sent, 1);
    assert!(!backend.inner().is_connected());
}

#[tokio::test]
async fn test_fail_silently_continues_after_rejected_recipient() {
    let relay = FakeRelay::start().await;
    let config = EmailConfig {
        fail_silently: true,
        ..relay.config()
    };
    let mut backend = FreshConnectionBackend::new(SmtpBackend::new(config).unwrap());

    let sent = backend
        .send_messages(&[
            message("reject@example.com"),
            message("a@example.com"),
            message("b@example.com"),
        ])
        .await
        .unwrap();

    assert_eq!(sent, 2);
    assert!(!backend.inner().is_connected());

    // The rejected transaction broke the first connection, the rest of the
    // batch went out on a replacement
    let sessions = relay.sessions().await;
    assert_eq!(sessions.len(), 2);
    assert!(!sessions[0].contains(&"DATA".to_string()));
    assert_eq!(sessions[1].iter().filter(|c| *c == "DATA").count(), 2);
    assert_eq!(sessions[1].last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn test_fail_silently_still_reports_invalid_addresses() {
    let relay = FakeRelay::start().await;
    let config = EmailConfig {
        fail_silently: true,
        ..relay.config()
    };
    let mut backend = FreshConnectionBackend::new(SmtpBackend::new(config).unwrap());

    let err = backend
        .send_messages(&[message("not an address"), message("a@example.com")])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Address(_)));
    assert!(!backend.inner().is_connected());
}

#[tokio::test]
async fn test_starttls_required_but_not_offered() {
    let relay = FakeRelay::start().await;
    let config = EmailConfig {
        use_tls: true,
        ..relay.config()
    };
    let mut backend = SmtpBackend::new(config).unwrap();

    let err = backend.open().await.unwrap_err();

    assert!(matches!(err, Error::Smtp(_)));
    assert!(!backend.is_connected());
}

#[tokio::test]
async fn test_implicit_tls_against_plain_relay_fails() {
    let relay = FakeRelay::start().await;
    let config = EmailConfig {
        use_ssl: true,
        ..relay.config()
    };
    let mut backend = SmtpBackend::new(config).unwrap();

    let err = backend.open().await.unwrap_err();

    assert!(matches!(err, Error::Smtp(_)));
    assert!(!backend.is_connected());
}

#[tokio::test]
async fn test_authenticates_with_credentials() {
    let relay = FakeRelay::start().await;
    let config = EmailConfig {
        username: "relay".to_string(),
        password: "secret".to_string(),
        ..relay.config()
    };
    let mut backend = FreshConnectionBackend::new(SmtpBackend::new(config).unwrap());

    let sent = backend.send_messages(&[message("a@example.com")]).await.unwrap();

    assert_eq!(sent, 1);
    let sessions = relay.sessions().await;
    assert_eq!(&sessions[0][..2], ["EHLO", "AUTH"]);
}

#[tokio::test]
async fn test_rejected_credentials_fail_open() {
    let relay = FakeRelay::start().await;
    let config = EmailConfig {
        username: "relay".to_string(),
        password: "wrong".to_string(),
        ..relay.config()
    };
    let mut backend = SmtpBackend::new(config).unwrap();

    let err = backend.open().await.unwrap_err();

    assert!(err.is_permanent());
    assert!(!backend.is_connected());
}
