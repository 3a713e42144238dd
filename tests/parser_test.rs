use mail_insight::*;

fn ctx() -> ParseContext<'static> {
    ParseContext::new("INBOX", "1.eml")
}

#[test]
fn test_parse_plain_message() {
    let raw = b"Subject: Hello\r\n\
                From: a@x.com\r\n\
                To: b@x.com\r\n\
                \r\n\
                Hi";

    let message = parse_message(raw, &ctx()).unwrap();

    assert_eq!(message.subject(), "Hello");
    assert_eq!(message.from().address, "a@x.com");
    assert_eq!(message.to_line(), "b@x.com");
    assert_eq!(message.body(), "Hi");
    assert!(message.attachments().is_empty());
    assert_eq!(message.folder(), Some("INBOX"));
    assert!(!message.is_read());
}

#[test]
fn test_parse_headers() {
    let raw = b"From: John Doe <john@example.com>\r\n\
                To: one@example.com, Two <two@example.com>\r\n\
                Subject: Test Email\r\n\
                Date: Wed, 01 Jan 2025 12:00:00 +0000\r\n\
                Message-ID: <test123@example.com>\r\n\
                \r\n\
                Hello, this is a test email.\r\n";

    let message = parse_message(raw, &ctx()).unwrap();

    assert_eq!(message.id(), "test123@example.com");
    assert_eq!(message.from().name.as_deref(), Some("John Doe"));
    assert_eq!(message.to().len(), 2);
    assert_eq!(message.to()[1].address, "two@example.com");
    assert_eq!(message.date().to_rfc3339(), "2025-01-01T12:00:00+00:00");
    assert_eq!(message.body(), "Hello, this is a test email.");
}

#[test]
fn test_parse_encoded_subject() {
    let raw = b"From: a@x.com\r\n\
                Subject: =?UTF-8?B?Q2Fmw6k=?=\r\n\
                \r\n\
                Body";

    let message = parse_message(raw, &ctx()).unwrap();
    assert_eq!(message.subject(), "Caf\u{e9}");
}

#[test]
fn test_parse_multipart_with_pdf() {
    let raw = b"From: a@x.com\r\n\
                To: b@x.com\r\n\
                Subject: Report\r\n\
                Date: Wed, 01 Jan 2025 12:00:00 +0000\r\n\
                MIME-Version: 1.0\r\n\
                Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
                \r\n\
                --XYZ\r\n\
                Content-Type: text/plain; charset=utf-8\r\n\
                \r\n\
                Hi\r\n\
                --XYZ\r\n\
                Content-Type: application/pdf; name=\"doc.pdf\"\r\n\
                Content-Disposition: attachment; filename=\"doc.pdf\"\r\n\
                Content-Transfer-Encoding: base64\r\n\
                \r\n\
                JVBERi0xLjQgZmFrZSBwZGY=\r\n\
                --XYZ--\r\n";

    let message = parse_message(raw, &ctx()).unwrap();

    assert_eq!(message.body(), "Hi");
    assert_eq!(message.attachments().len(), 1);

    let attachment = &message.attachments()[0];
    assert_eq!(attachment.filename(), "doc.pdf");
    assert_eq!(attachment.content_type(), "application/pdf");
    assert_eq!(attachment.content(), b"%PDF-1.4 fake pdf");
    assert_eq!(attachment.size(), 17);
}

#[test]
fn test_parse_html_fallback() {
    let raw = b"From: a@x.com\r\n\
                Subject: Newsletter\r\n\
                Content-Type: multipart/alternative; boundary=\"ALT\"\r\n\
                \r\n\
                --ALT\r\n\
                Content-Type: text/html; charset=utf-8\r\n\
                \r\n\
                <html><head><style>p { color: red; }</style></head>\
                <body><h1>Hello</h1><p>World &amp; friends</p></body></html>\r\n\
                --ALT--\r\n";

    let message = parse_message(raw, &ctx()).unwrap();

    assert_eq!(message.body(), "Hello\nWorld & friends");
    assert!(message.attachments().is_empty());
}

#[test]
fn test_parse_prefers_plain_over_html() {
    let raw = b"From: a@x.com\r\n\
                Subject: Both\r\n\
                Content-Type: multipart/alternative; boundary=\"ALT\"\r\n\
                \r\n\
                --ALT\r\n\
                Content-Type: text/html\r\n\
                \r\n\
                <p>Rich</p>\r\n\
                --ALT\r\n\
                Content-Type: text/plain\r\n\
                \r\n\
                Plain\r\n\
                --ALT--\r\n";

    let message = parse_message(raw, &ctx()).unwrap();
    assert_eq!(message.body(), "Plain");
}

#[test]
fn test_parse_quoted_printable_body() {
    let raw = b"From: a@x.com\r\n\
                Subject: QP\r\n\
                Content-Type: text/plain; charset=utf-8\r\n\
                Content-Transfer-Encoding: quoted-printable\r\n\
                \r\n\
                Caf=C3=A9 ok";

    let message = parse_message(raw, &ctx()).unwrap();
    assert_eq!(message.body(), "Caf\u{e9} ok");
}

#[test]
fn test_parse_nested_parts_keep_attachment_order() {
    let raw = b"From: a@x.com\r\n\
                Subject: Photos\r\n\
                Content-Type: multipart/mixed; boundary=\"OUTER\"\r\n\
                \r\n\
                --OUTER\r\n\
                Content-Type: multipart/alternative; boundary=\"INNER\"\r\n\
                \r\n\
                --INNER\r\n\
                Content-Type: text/plain\r\n\
                \r\n\
                Two files\r\n\
                --INNER--\r\n\
                --OUTER\r\n\
                Content-Type: image/png\r\n\
                Content-Transfer-Encoding: base64\r\n\
                \r\n\
                iVBORw0KGgo=\r\n\
                --OUTER\r\n\
                Content-Type: text/csv; name=\"data.csv\"\r\n\
                \r\n\
                a,b\r\n\
                --OUTER--\r\n";

    let message = parse_message(raw, &ctx()).unwrap();

    assert_eq!(message.body(), "Two files");
    let names: Vec<&str> = message.attachments().iter().map(Attachment::filename).collect();
    assert_eq!(names, ["attachment_0", "data.csv"]);

    let png = &message.attachments()[0];
    assert_eq!(png.content_type(), "image/png");
    assert_eq!(png.content(), b"\x89PNG\r\n\x1a\n");
    for attachment in message.attachments() {
        assert_eq!(attachment.size(), attachment.content().len());
    }
}

#[test]
fn test_parse_undecodable_attachment_does_not_fail_message() {
    let raw = b"From: a@x.com\r\n\
                Subject: Broken\r\n\
                Content-Type: multipart/mixed; boundary=\"B\"\r\n\
                \r\n\
                --B\r\n\
                Content-Type: text/plain\r\n\
                \r\n\
                Still readable\r\n\
                --B\r\n\
                Content-Type: application/octet-stream; name=\"blob.bin\"\r\n\
                Content-Transfer-Encoding: base64\r\n\
                \r\n\
                !!!not base64!!!\r\n\
                --B--\r\n";

    let message = parse_message(raw, &ctx()).unwrap();

    assert_eq!(message.body(), "Still readable");
    assert_eq!(message.attachments().len(), 1);
    let blob = &message.attachments()[0];
    assert_eq!(blob.filename(), "blob.bin");
    assert!(blob.content().is_empty());
    assert_eq!(blob.size(), 0);
}

#[test]
fn test_parse_undecodable_body_becomes_empty() {
    let raw = b"From: a@x.com\r\n\
                Subject: Garbled\r\n\
                Content-Type: text/plain; charset=utf-8\r\n\
                Content-Transfer-Encoding: base64\r\n\
                \r\n\
                !!!not base64!!!\r\n";

    let message = parse_message(raw, &ctx()).unwrap();

    assert_eq!(message.subject(), "Garbled");
    assert_eq!(message.body(), "");
    assert!(message.attachments().is_empty());
}

#[test]
fn test_parse_quoted_commas_in_addresses() {
    let raw = b"From: \"Doe, John\" <john@x.com>\r\n\
                To: \"Roe, Jane\" <jane@x.com>, bob@x.com\r\n\
                Subject: Names\r\n\
                \r\n\
                Body";

    let message = parse_message(raw, &ctx()).unwrap();

    assert_eq!(message.from().name.as_deref(), Some("Doe, John"));
    assert_eq!(message.from().address, "john@x.com");
    assert_eq!(message.to().len(), 2);
    assert_eq!(message.to()[0].name.as_deref(), Some("Roe, Jane"));
    assert_eq!(message.to()[1].address, "bob@x.com");
    assert_eq!(message.to_line(), "\"Roe, Jane\" <jane@x.com>, bob@x.com");
}

#[test]
fn test_missing_message_id_is_deterministic() {
    let raw = b"From: a@x.com\r\nSubject: No id\r\n\r\nBody";

    let first = parse_message(raw, &ctx()).unwrap();
    let second = parse_message(raw, &ctx()).unwrap();

    assert_eq!(first.id(), second.id());
    assert!(first.id().starts_with("synthetic-"));
    assert_eq!(first.id(), synthetic_id(raw));
    assert_ne!(first.id(), synthetic_id(b"From: a@x.com\r\n\r\nOther"));
}

#[test]
fn test_missing_date_uses_sentinel() {
    let raw = b"From: a@x.com\r\nSubject: Undated\r\n\r\nBody";
    let message = parse_message(raw, &ctx()).unwrap();
    assert_eq!(message.date(), missing_date_sentinel());
    assert_eq!(message.date().timestamp(), 0);
}

#[test]
fn test_read_markers() {
    let raw = b"From: a@x.com\r\n\r\nBody";
    assert!(!parse_message(raw, &ctx()).unwrap().is_read());
    assert!(parse_message(raw, &ctx().seen(true)).unwrap().is_read());

    let raw = b"From: a@x.com\r\nStatus: RO\r\n\r\nBody";
    assert!(parse_message(raw, &ctx()).unwrap().is_read());
}

#[test]
fn test_malformed_sources_are_parsing_errors() {
    let no_from = b"Subject: Orphan\r\n\r\nNobody sent this";
    let err = parse_message(no_from, &ctx()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    assert!(matches!(err, MailError::Parsing { ref source_id, .. } if source_id == "1.eml"));

    let empty = b"  \r\n";
    assert_eq!(
        parse_message(empty, &ctx()).unwrap_err().kind(),
        ErrorKind::Parsing
    );

    let bad_from = b"From: undisclosed\r\n\r\nBody";
    assert_eq!(
        parse_message(bad_from, &ctx()).unwrap_err().kind(),
        ErrorKind::Parsing
    );
}

#[test]
fn test_strip_html() {
    let text = strip_html(
        "<div>Line one<br>Line two</div><script>alert('x')</script>\
         <p>&lt;tag&gt; &quot;quoted&quot;</p>",
    );
    assert_eq!(text, "Line one\nLine two\n<tag> \"quoted\"");
}

#[test]
fn test_strip_html_keeps_bare_angle_brackets() {
    let text = strip_html("<p>if a < b then</p><p>x &#8217; y</p>");
    assert_eq!(text, "if a < b then\nx \u{2019} y");
}

#[test]
fn test_strip_html_numeric_entities() {
    assert_eq!(strip_html("caf&#233; &#x41;&#X42; &amp;lt;"), "caf\u{e9} AB &lt;");
    assert_eq!(strip_html("fish &chips; &#xZZ; & more"), "fish &chips; &#xZZ; & more");
}
