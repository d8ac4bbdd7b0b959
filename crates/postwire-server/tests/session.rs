//! Session scenarios driven through the sans-I/O connection.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use postwire_server::{
    Connection, ConnectionInfo, HookError, HookResult, Handler, Mail, SaslMechanism,
    ServerConfig, ServerError, Session, TransferMethod, User,
};
use postwire_smtp::{Address, EnhancedStatusCode, ReplyCode};

#[derive(Debug, Default)]
struct Recorder {
    mails: Vec<Mail>,
    fail_delivery: bool,
}

impl Handler for Recorder {
    fn validate_rcpt(&mut self, _session: &Session, to: &Address) -> HookResult<Address> {
        if to.local_part() == "blocked" {
            return Err(HookError::reject(
                ReplyCode::MAILBOX_UNAVAILABLE,
                EnhancedStatusCode::new(5, 1, 1),
                "No such user",
            ));
        }
        Ok(to.clone())
    }

    fn verify_name(&mut self, _session: &Session, name: &str) -> HookResult<Vec<Address>> {
        Ok(match name {
            "alice" => vec![Address::new("alice@example.com").unwrap()],
            "smith" => vec![
                Address::new("john.smith@example.com").unwrap(),
                Address::new("jane.smith@example.com").unwrap(),
            ],
            _ => Vec::new(),
        })
    }

    fn handle_mail(&mut self, _session: &Session, mail: Mail) -> HookResult<()> {
        if self.fail_delivery {
            return Err(HookError::internal("spool unavailable"));
        }
        self.mails.push(mail);
        Ok(())
    }

    fn verify_password(
        &mut self,
        _session: &Session,
        username: &str,
        password: &str,
    ) -> HookResult<Option<User>> {
        Ok((username == "alice" && password == "secret").then(|| User::new(username)))
    }
}

fn connection(config: ServerConfig) -> Connection<Recorder> {
    Connection::with_config(
        config,
        Recorder::default(),
        ConnectionInfo::new(
            "198.51.100.7:51000".parse().unwrap(),
            "198.51.100.1:25".parse().unwrap(),
        ),
    )
}

fn send(connection: &mut Connection<Recorder>, input: &str) -> Vec<String> {
    connection.handle_input(input.as_bytes()).unwrap();
    replies(connection)
}

fn replies(connection: &mut Connection<Recorder>) -> Vec<String> {
    let mut out = String::new();
    while let Some(transmit) = connection.poll_transmit() {
        out.push_str(transmit.as_str().unwrap());
    }
    out.lines().map(str::to_string).collect()
}

fn introduced(config: ServerConfig) -> Connection<Recorder> {
    let mut connection = connection(config);
    send(&mut connection, "EHLO client.example.org\r\n");
    connection
}

fn config() -> ServerConfig {
    ServerConfig::builder("mx.example.com").build()
}

#[test]
fn test_esmtp_transaction_with_dot_stuffing() {
    let mut connection = introduced(config());

    assert_eq!(
        send(&mut connection, "MAIL FROM:<sender@example.org>\r\n"),
        ["250 2.1.0 Sender OK"]
    );
    assert_eq!(
        send(&mut connection, "RCPT TO:<rcpt@example.com>\r\n"),
        ["250 2.1.5 Recipient OK"]
    );
    assert_eq!(
        send(&mut connection, "DATA\r\n"),
        ["354 End data with <CR><LF>.<CR><LF>"]
    );
    assert_eq!(
        send(
            &mut connection,
            "Subject: hi\r\n\r\n..leading dot\r\nbody\r\n.\r\n"
        ),
        ["250 2.0.0 Message accepted for delivery"]
    );

    let mail = &connection.handler().mails[0];
    assert_eq!(&mail.content[..], b"Subject: hi\r\n\r\n.leading dot\r\nbody\r\n");
    assert_eq!(mail.from.as_ref().unwrap().as_str(), "sender@example.org");
    assert_eq!(mail.to.len(), 1);
    assert_eq!(mail.domain, "client.example.org");
    assert_eq!(mail.transfer, TransferMethod::Data);

    let session = connection.session();
    assert!(session.flags().is_introduced());
    assert!(!session.flags().has_from());
    assert!(session.recipients().is_empty());
}

#[test]
fn test_empty_data_block() {
    let mut connection = introduced(config());
    send(
        &mut connection,
        "MAIL FROM:<>\r\nRCPT TO:<rcpt@example.com>\r\nDATA\r\n",
    );

    assert_eq!(
        send(&mut connection, ".\r\n"),
        ["250 2.0.0 Message accepted for delivery"]
    );
    let mail = &connection.handler().mails[0];
    assert!(mail.content.is_empty());
    assert!(mail.from.is_none());
}

#[test]
fn test_duplicate_recipient() {
    let mut connection = introduced(config());
    send(&mut connection, "MAIL FROM:<sender@example.org>\r\n");
    send(&mut connection, "RCPT TO:<rcpt@example.com>\r\n");

    let replies = send(&mut connection, "RCPT TO:<rcpt@example.com>\r\n");
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("501 5.5.4"), "{replies:?}");
    assert!(replies[0].contains("already a recipient"));
    assert_eq!(connection.session().recipients().len(), 1);
}

#[test]
fn test_oversized_data_closes_without_delivery() {
    let config = ServerConfig::builder("mx.example.com")
        .max_message_size(Some(64))
        .build();
    let mut connection = introduced(config);
    send(
        &mut connection,
        "MAIL FROM:<sender@example.org>\r\nRCPT TO:<rcpt@example.com>\r\nDATA\r\n",
    );

    let body = format!("{}\r\n.\r\n", "x".repeat(200));
    assert_eq!(
        send(&mut connection, &body),
        ["552 5.3.4 Message size exceeds fixed maximum message size"]
    );
    assert!(connection.is_closed());
    assert!(connection.handler().mails.is_empty());
}

#[test]
fn test_oversized_data_without_terminator() {
    let config = ServerConfig::builder("mx.example.com")
        .max_message_size(Some(64))
        .build();
    let mut connection = introduced(config);
    send(
        &mut connection,
        "MAIL FROM:<sender@example.org>\r\nRCPT TO:<rcpt@example.com>\r\nDATA\r\n",
    );

    let replies = send(&mut connection, &"y".repeat(100));
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("552 5.3.4"));
    assert!(connection.is_closed());
    assert!(connection.handler().mails.is_empty());
}

#[test]
fn test_declared_size_over_limit() {
    let config = ServerConfig::builder("mx.example.com")
        .max_message_size(Some(1000))
        .build();
    let mut connection = introduced(config);

    assert_eq!(
        send(&mut connection, "MAIL FROM:<sender@example.org> SIZE=5000\r\n"),
        ["552 5.3.4 Message size exceeds fixed maximum message size"]
    );
    assert_eq!(
        send(&mut connection, "MAIL FROM:<sender@example.org> SIZE=500 BODY=8BITMIME\r\n"),
        ["250 2.1.0 Sender OK"]
    );
    assert_eq!(connection.session().declared_size(), Some(500));
}

#[test]
fn test_unknown_mail_parameter() {
    let mut connection = introduced(config());
    let replies = send(&mut connection, "MAIL FROM:<sender@example.org> RET=HDRS\r\n");
    assert!(replies[0].starts_with("555 5.5.4"), "{replies:?}");
    assert!(!connection.session().flags().has_from());
}

#[test]
fn test_ordering_invariants() {
    let mut connection = connection(config());

    let replies = send(&mut connection, "MAIL FROM:<sender@example.org>\r\n");
    assert!(replies[0].starts_with("503 5.5.1"), "{replies:?}");

    send(&mut connection, "HELO client.example.org\r\n");
    let replies = send(&mut connection, "RCPT TO:<rcpt@example.com>\r\n");
    assert!(replies[0].starts_with("503 5.5.1"), "{replies:?}");

    send(&mut connection, "MAIL FROM:<sender@example.org>\r\n");
    let replies = send(&mut connection, "MAIL FROM:<other@example.org>\r\n");
    assert!(replies[0].starts_with("503 5.5.1"), "{replies:?}");

    let replies = send(&mut connection, "DATA\r\n");
    assert!(replies[0].starts_with("503 5.5.1"), "{replies:?}");

    // RSET drops the transaction but not the introduction.
    assert_eq!(send(&mut connection, "RSET\r\n"), ["250 2.0.0 Flushed"]);
    assert!(connection.session().flags().is_introduced());
    assert!(!connection.session().flags().has_from());
}

#[test]
fn test_pipelined_commands_answered_in_order() {
    let mut connection = introduced(config());

    let replies = send(
        &mut connection,
        "MAIL FROM:<sender@example.org>\r\n\
         RCPT TO:<a@example.com>\r\n\
         RCPT TO:<blocked@example.com>\r\n\
         RCPT TO:<b@example.com>\r\n\
         DATA\r\n",
    );
    assert_eq!(
        replies,
        [
            "250 2.1.0 Sender OK",
            "250 2.1.5 Recipient OK",
            "550 5.1.1 No such user",
            "250 2.1.5 Recipient OK",
            "354 End data with <CR><LF>.<CR><LF>",
        ]
    );
    assert_eq!(connection.session().recipients().len(), 2);
}

#[test]
fn test_relay_refused() {
    let mut connection = introduced(config());
    send(&mut connection, "MAIL FROM:<sender@example.org>\r\n");

    assert_eq!(
        send(&mut connection, "RCPT TO:<@relay.example.net:rcpt@example.com>\r\n"),
        ["550 5.7.1 Relaying denied"]
    );
    assert_eq!(
        send(&mut connection, "RCPT TO:<rcpt%elsewhere.net@example.com>\r\n"),
        ["550 5.7.1 Relaying denied"]
    );
    assert!(connection.session().recipients().is_empty());
}

#[test]
fn test_recipient_limit() {
    let config = ServerConfig::builder("mx.example.com")
        .max_recipients(Some(1))
        .build();
    let mut connection = introduced(config);
    send(&mut connection, "MAIL FROM:<sender@example.org>\r\n");
    send(&mut connection, "RCPT TO:<a@example.com>\r\n");

    assert_eq!(
        send(&mut connection, "RCPT TO:<b@example.com>\r\n"),
        ["452 4.5.3 Too many recipients"]
    );
}

#[test]
fn test_bdat_chunk_accounting() {
    let mut connection = introduced(config());
    send(
        &mut connection,
        "MAIL FROM:<sender@example.org>\r\nRCPT TO:<rcpt@example.com>\r\n",
    );

    assert_eq!(
        send(&mut connection, "BDAT 5\r\nhello"),
        ["250 2.0.0 5 octets received"]
    );
    assert_eq!(connection.session().buffered_len(), 5);

    // Chunk split across reads.
    connection.handle_input(b"BDAT 6 LAST\r\n wo").unwrap();
    assert!(replies(&mut connection).is_empty());
    assert_eq!(
        send(&mut connection, "rld"),
        ["250 2.0.0 6 octets received, message accepted"]
    );

    let mail = &connection.handler().mails[0];
    assert_eq!(&mail.content[..], b"hello world");
    assert_eq!(mail.transfer, TransferMethod::Bdat);
    assert_eq!(connection.session().buffered_len(), 0);
    assert!(!connection.session().flags().has_from());
}

#[test]
fn test_bdat_chunk_keeps_dots_and_crlf() {
    let mut connection = introduced(config());
    send(
        &mut connection,
        "MAIL FROM:<sender@example.org>\r\nRCPT TO:<rcpt@example.com>\r\n",
    );

    send(&mut connection, "BDAT 7 LAST\r\n.\r\n.\r\n.");
    assert_eq!(&connection.handler().mails[0].content[..], b".\r\n.\r\n.");
}

#[test]
fn test_refused_bdat_chunk_is_discarded() {
    let mut connection = introduced(config());

    let replies = send(&mut connection, "BDAT 4\r\nNOOPNOOP\r\n");
    assert_eq!(replies.len(), 2);
    assert!(replies[0].starts_with("503 5.5.1"), "{replies:?}");
    assert_eq!(replies[1], "250 2.0.0 OK");
}

#[test]
fn test_data_after_bdat_refused() {
    let mut connection = introduced(config());
    send(
        &mut connection,
        "MAIL FROM:<sender@example.org>\r\nRCPT TO:<rcpt@example.com>\r\nBDAT 2\r\nab",
    );

    let replies = send(&mut connection, "DATA\r\n");
    assert!(replies[0].starts_with("503 5.5.1"), "{replies:?}");
}

#[test]
fn test_bdat_over_limit_closes() {
    let config = ServerConfig::builder("mx.example.com")
        .max_message_size(Some(8))
        .build();
    let mut connection = introduced(config);
    send(
        &mut connection,
        "MAIL FROM:<sender@example.org>\r\nRCPT TO:<rcpt@example.com>\r\n",
    );

    assert_eq!(
        send(&mut connection, "BDAT 100 LAST\r\n"),
        ["552 5.3.4 Message size exceeds fixed maximum message size"]
    );
    assert!(connection.is_closed());
    assert!(connection.handler().mails.is_empty());
}

#[test]
fn test_refused_bdat_over_limit_closes() {
    let config = ServerConfig::builder("mx.example.com")
        .max_message_size(Some(8))
        .build();
    let mut connection = introduced(config);

    assert_eq!(
        send(&mut connection, "BDAT 1000000000\r\n"),
        ["552 5.3.4 Message size exceeds fixed maximum message size"]
    );
    assert!(connection.is_closed());

    connection.handle_input(&[b'x'; 64]).unwrap();
    assert!(replies(&mut connection).is_empty());
}

#[test]
fn test_bdat_without_chunking_reads_chunk_as_commands() {
    let config = ServerConfig::builder("mx.example.com")
        .chunking(false)
        .build();
    let mut connection = introduced(config);
    send(
        &mut connection,
        "MAIL FROM:<sender@example.org>\r\nRCPT TO:<rcpt@example.com>\r\n",
    );

    let replies = send(&mut connection, "BDAT 8 LAST\r\nab\r\ncd\r\n");
    assert_eq!(replies.len(), 3, "{replies:?}");
    assert!(replies[0].starts_with("502 5.5.1"), "{replies:?}");
    assert!(replies[1].starts_with("500 5.5.1"), "{replies:?}");
    assert!(replies[2].starts_with("500 5.5.1"), "{replies:?}");
    assert_eq!(connection.session().invalid_commands(), 2);
    assert!(connection.handler().mails.is_empty());
}

#[test]
fn test_internal_hook_failure_ends_connection() {
    let mut connection = introduced(config());
    connection.handler_mut().fail_delivery = true;
    send(
        &mut connection,
        "MAIL FROM:<sender@example.org>\r\nRCPT TO:<rcpt@example.com>\r\nDATA\r\n",
    );

    let result = connection.handle_input(b"hello\r\n.\r\n");
    assert!(matches!(result, Err(ServerError::Hook(_))));
    assert_eq!(
        replies(&mut connection),
        ["421 4.3.0 Local error, closing transmission channel"]
    );
    assert!(connection.is_closed());
}

fn auth_config() -> ServerConfig {
    ServerConfig::builder("mx.example.com")
        .auth_mechanisms([SaslMechanism::Plain, SaslMechanism::XOAuth2])
        .require_auth(true)
        .build()
}

fn plain(authzid: &str, authcid: &str, password: &str) -> String {
    STANDARD.encode(format!("{authzid}\0{authcid}\0{password}"))
}

#[test]
fn test_auth_required_for_mail() {
    let mut connection = introduced(auth_config());
    assert_eq!(
        send(&mut connection, "MAIL FROM:<sender@example.org>\r\n"),
        ["530 5.7.0 Authentication required"]
    );
}

#[test]
fn test_auth_plain_initial_response() {
    let mut connection = introduced(auth_config());

    let replies = send(
        &mut connection,
        &format!("AUTH PLAIN {}\r\n", plain("", "alice", "wrong")),
    );
    assert_eq!(replies, ["535 5.7.8 Authentication credentials invalid"]);

    let replies = send(
        &mut connection,
        &format!("AUTH PLAIN {}\r\n", plain("", "alice", "secret")),
    );
    assert_eq!(replies, ["235 2.7.0 Authentication successful"]);
    assert_eq!(connection.session().user(), Some(&User::new("alice")));

    let replies = send(&mut connection, "AUTH PLAIN\r\n");
    assert!(replies[0].starts_with("503 5.5.1"), "{replies:?}");

    // Authentication survives a new EHLO.
    send(&mut connection, "EHLO again.example.org\r\n");
    assert!(connection.session().flags().is_authenticated());
    assert_eq!(
        send(&mut connection, "MAIL FROM:<sender@example.org>\r\n"),
        ["250 2.1.0 Sender OK"]
    );
}

#[test]
fn test_auth_plain_challenge() {
    let mut connection = introduced(auth_config());

    assert_eq!(send(&mut connection, "AUTH PLAIN\r\n"), ["334 "]);
    let replies = send(&mut connection, &format!("{}\r\n", plain("", "alice", "secret")));
    assert_eq!(replies, ["235 2.7.0 Authentication successful"]);
}

#[test]
fn test_auth_cancelled() {
    let mut connection = introduced(auth_config());

    assert_eq!(send(&mut connection, "AUTH PLAIN\r\n"), ["334 "]);
    assert_eq!(
        send(&mut connection, "*\r\nNOOP\r\n"),
        ["501 5.7.0 Authentication cancelled", "250 2.0.0 OK"]
    );
    assert!(!connection.session().flags().is_authenticated());
}

#[test]
fn test_auth_unknown_mechanism() {
    let mut connection = introduced(auth_config());
    assert_eq!(
        send(&mut connection, "AUTH CRAM-MD5\r\n"),
        ["504 5.5.4 Unrecognized authentication type"]
    );
}

#[test]
fn test_auth_xoauth2_failure_challenge() {
    let mut connection = introduced(auth_config());
    let response = STANDARD.encode("user=alice\x01auth=Bearer expired\x01\x01");

    let replies = send(&mut connection, &format!("AUTH XOAUTH2 {response}\r\n"));
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("334 "));
    let challenge = STANDARD.decode(&replies[0][4..]).unwrap();
    assert_eq!(challenge, br#"{"status":"401","schemes":"bearer"}"#);

    assert_eq!(
        send(&mut connection, "\r\n"),
        ["535 5.7.8 Authentication credentials invalid"]
    );
}

#[test]
fn test_vrfy() {
    let config = ServerConfig::builder("mx.example.com").vrfy(true).build();
    let mut connection = introduced(config);

    assert_eq!(
        send(&mut connection, "VRFY alice\r\n"),
        ["250 2.1.5 <alice@example.com>"]
    );
    assert_eq!(
        send(&mut connection, "VRFY smith\r\n"),
        ["550 5.1.4 User ambiguous"]
    );
    assert_eq!(
        send(&mut connection, "VRFY nobody\r\n"),
        ["550 5.1.1 No such user"]
    );
    let replies = send(&mut connection, "VRFY\r\n");
    assert!(replies[0].starts_with("501 5.5.4"), "{replies:?}");
}

#[test]
fn test_help() {
    let mut connection = introduced(config());
    let replies = send(&mut connection, "HELP\r\n");

    assert!(replies.len() > 1);
    assert!(replies[0].starts_with("214-2.0.0 "));
    assert!(replies.last().unwrap().starts_with("214 2.0.0 "));
}
