// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Original-format exports with header rewriting.

#[cfg(test)]
mod rewriting_tests {
    use mailsift::extract::headers::{split_raw_message, HeaderBlock};
    use mailsift::extract::rewrite::RewriteOptions;
    use mailsift::extract::{ExtractionRequest, Extractor, OutputMode};

    use crate::common::FakeMailbox;
    use crate::{credentials, zip_entries};

    const SIGNED: &[u8] = b"Received: from mx1.example.net by mx2.example.net\r\n\
Received: from relay\r\n\tby mx1.example.net; Tue, 2 Jan 2024 09:29:58 +0000\r\n\
ARC-Seal: i=1; a=rsa-sha256; cv=none\r\n\
DKIM-Signature: v=1; a=rsa-sha256; d=sender.example.com; s=sel\r\n\
Authentication-Results: mx2.example.net; dkim=pass\r\n\
Message-ID: <20240102.abc@sender.example.com>\r\n\
From: \"Sales Team\" <sales@sender.example.com>\r\n\
To: customer@example.org\r\n\
Date: Tue, 2 Jan 2024 09:30:00 +0000\r\n\
Subject: Your invoice\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Total: 12 =80\r\n\
Merci =E0 vous\r\n";

    #[tokio::test]
    async fn test_full_rewrite_preserves_body_bytes() {
        let mailbox = FakeMailbox::new("INBOX").with_messages(vec![SIGNED.to_vec()]);
        let request = ExtractionRequest {
            mode: OutputMode::Original(RewriteOptions {
                replace_domain: Some("relay.test".to_string()),
                standardize_headers: true,
                custom_headers: Some("X-Campaign: q1\nReply-To: noreply@relay.test".to_string()),
                tag_message_id: true,
                strip_auth_headers: true,
            }),
            ..Default::default()
        };

        let outcome = Extractor::new(mailbox.connector())
            .run(&credentials(), &request)
            .await
            .unwrap();

        let entries = zip_entries(&outcome.payload);
        assert_eq!(entries.len(), 1);
        let (name, content) = &entries[0];
        assert_eq!(name, "1_Your_invoice.txt");

        let headers = HeaderBlock::from_raw_message(content);
        assert_eq!(headers.get("From").as_deref(), Some("\"Sales Team\" <sales@relay.test>"));
        assert_eq!(headers.get("To").as_deref(), Some("[*to]"));
        assert_eq!(headers.get("Date").as_deref(), Some("[*date]"));
        assert_eq!(headers.get("X-Campaign").as_deref(), Some("q1"));
        assert_eq!(headers.get("Reply-To").as_deref(), Some("noreply@relay.test"));
        assert_eq!(
            headers.get("Message-ID").as_deref(),
            Some("<20240102.abc[EID]@sender.example.com>")
        );
        for stripped in ["Received", "ARC-Seal", "DKIM-Signature", "Authentication-Results"] {
            assert!(!headers.contains(stripped), "{} should be stripped", stripped);
        }
        assert_eq!(headers.get("Subject").as_deref(), Some("Your invoice"));
        assert_eq!(
            headers.get("Content-Transfer-Encoding").as_deref(),
            Some("quoted-printable")
        );

        // Encoded body is neither decoded nor re-encoded.
        assert_eq!(split_raw_message(content).body, split_raw_message(SIGNED).body);
    }

    #[tokio::test]
    async fn test_subject_for_naming_comes_from_original_headers() {
        let mailbox = FakeMailbox::new("INBOX").with_messages(vec![SIGNED.to_vec()]);
        let request = ExtractionRequest {
            mode: OutputMode::Original(RewriteOptions {
                custom_headers: Some("Subject: Replaced".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let outcome = Extractor::new(mailbox.connector())
            .run(&credentials(), &request)
            .await
            .unwrap();

        let entries = zip_entries(&outcome.payload);
        assert_eq!(entries[0].0, "1_Your_invoice.txt");
        let headers = HeaderBlock::from_raw_message(&entries[0].1);
        assert_eq!(headers.get("Subject").as_deref(), Some("Replaced"));
        assert_eq!(headers.count("Subject"), 1);
    }
}
