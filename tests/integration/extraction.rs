// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Happy-path extraction runs.

#[cfg(test)]
mod extraction_tests {
    use tokio::sync::mpsc;

    use mailsift::extract::archive::Payload;
    use mailsift::extract::dedupe::DuplicateReason;
    use mailsift::extract::{
        ExportShape, ExtractionEvent, ExtractionRequest, Extractor, MessageRange, OutputMode, RunState,
    };

    use crate::common::{message, FakeMailbox};
    use crate::{credentials, drain, entry_names, progress, states, zip_entries};

    fn numbered(count: usize) -> Vec<Vec<u8>> {
        (1..=count)
            .map(|i| {
                message(
                    &format!("<m{}@example.com>", i),
                    &format!("Report {}", i),
                    "ann@example.com",
                    &format!("body {}", i),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_default_range_is_clamped_to_folder() {
        let raws = numbered(5);
        let mailbox = FakeMailbox::new("INBOX").with_messages(raws.clone());
        let extractor = Extractor::new(mailbox.connector());

        let outcome = extractor
            .run(&credentials(), &ExtractionRequest::default())
            .await
            .unwrap();

        assert_eq!(outcome.file_name, "emails_raw_pack.zip");
        assert_eq!(outcome.summary.folder_total, 5);
        assert_eq!(outcome.summary.selected, 5);
        assert_eq!(outcome.summary.written, 5);
        assert_eq!(outcome.summary.duplicates_removed, 0);
        assert!(!outcome.summary.cancelled);

        let entries = zip_entries(&outcome.payload);
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["1_Report_1.txt", "2_Report_2.txt", "3_Report_3.txt", "4_Report_4.txt", "5_Report_5.txt"]
        );
        // No rewrite options: the server's bytes, untouched.
        for ((_, content), raw) in entries.iter().zip(raws.iter()) {
            assert_eq!(content, raw);
        }

        let state = mailbox.state();
        assert_eq!(state.logouts, 1);
        assert_eq!(state.header_fetches.len(), 5);
        assert_eq!(state.full_fetches, vec![101, 102, 103, 104, 105]);
    }

    #[tokio::test]
    async fn test_sub_range_fetches_only_selected_positions() {
        let mailbox = FakeMailbox::new("INBOX").with_messages(numbered(5));
        let request = ExtractionRequest {
            range: MessageRange::new(2, 3),
            remove_duplicates: false,
            ..Default::default()
        };

        let outcome = Extractor::new(mailbox.connector())
            .run(&credentials(), &request)
            .await
            .unwrap();

        assert_eq!(outcome.summary.selected, 2);
        assert_eq!(entry_names(&outcome.payload), vec!["1_Report_2.txt", "2_Report_3.txt"]);
        assert_eq!(mailbox.state().full_fetches, vec![102, 103]);
        assert!(mailbox.state().header_fetches.is_empty());
    }

    #[tokio::test]
    async fn test_merged_plain_text() {
        let mailbox = FakeMailbox::new("INBOX").with_messages(vec![
            message("<a@x>", "One", "a@x", "first body"),
            message("<b@x>", "Two", "a@x", "second body"),
            message("<c@x>", "Three", "a@x", "third body"),
        ]);
        let request = ExtractionRequest {
            mode: OutputMode::PlainText(ExportShape::Merged),
            ..Default::default()
        };

        let outcome = Extractor::new(mailbox.connector())
            .run(&credentials(), &request)
            .await
            .unwrap();

        assert_eq!(outcome.file_name, "emails_bodies_merged.txt");
        assert_eq!(
            outcome.payload,
            Payload::MergedText("first body\n__SEP__\nsecond body\n__SEP__\nthird body".to_string())
        );
        assert_eq!(outcome.summary.message, "Extracted 3 emails into 1 merged file!");
    }

    #[tokio::test]
    async fn test_separate_plain_text_named_by_decoded_subject() {
        let mailbox = FakeMailbox::new("INBOX").with_messages(vec![
            message("<a@x>", "=?UTF-8?B?w4ljaG8gZHUgam91cg==?=", "a@x", "bonjour"),
            message("<b@x>", "", "a@x", "no subject here"),
        ]);
        let request = ExtractionRequest {
            mode: OutputMode::PlainText(ExportShape::Separate),
            ..Default::default()
        };

        let outcome = Extractor::new(mailbox.connector())
            .run(&credentials(), &request)
            .await
            .unwrap();

        assert_eq!(outcome.file_name, "emails_bodies_separate.zip");
        assert_eq!(
            zip_entries(&outcome.payload),
            vec![
                ("1_Écho_du_jour.txt".to_string(), b"bonjour".to_vec()),
                ("2_no_subject.txt".to_string(), b"no subject here".to_vec()),
            ]
        );
        assert_eq!(outcome.summary.message, "Extracted 2 emails into separate files!");
    }

    #[tokio::test]
    async fn test_duplicates_removed_before_processing() {
        let mailbox = FakeMailbox::new("INBOX").with_messages(vec![
            message("<a@x>", "Alpha", "ann@x", "alpha"),
            message("<a@x>", "Alpha again", "bob@x", "alpha copy"),
            message("", "Beta", "carl@x", "beta"),
            message("", "Beta", "carl@x", "beta copy"),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = ExtractionRequest {
            mode: OutputMode::PlainText(ExportShape::Separate),
            name_by_subject: false,
            ..Default::default()
        };

        let outcome = Extractor::new(mailbox.connector())
            .with_events(tx)
            .run(&credentials(), &request)
            .await
            .unwrap();

        assert_eq!(outcome.summary.duplicates_removed, 2);
        assert_eq!(outcome.summary.written, 2);
        assert_eq!(
            zip_entries(&outcome.payload),
            vec![
                ("email_1.txt".to_string(), b"alpha".to_vec()),
                ("email_2.txt".to_string(), b"beta".to_vec()),
            ]
        );
        assert_eq!(mailbox.state().full_fetches, vec![101, 103]);

        let events = drain(&mut rx);
        let (unique, duplicates) = events
            .iter()
            .find_map(|e| match e {
                ExtractionEvent::Duplicates { unique, duplicates } => Some((*unique, duplicates.clone())),
                _ => None,
            })
            .expect("duplicate report");
        assert_eq!(unique, 2);
        assert_eq!(duplicates.len(), 2);
        assert_eq!((duplicates[0].position, duplicates[0].reason), (2, DuplicateReason::MessageId));
        assert_eq!((duplicates[1].position, duplicates[1].reason), (4, DuplicateReason::SubjectFrom));
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_numbering_gap() {
        let mailbox = FakeMailbox::new("INBOX")
            .with_messages(numbered(3))
            .failing(102);
        let request = ExtractionRequest {
            mode: OutputMode::PlainText(ExportShape::Separate),
            remove_duplicates: false,
            name_by_subject: false,
            ..Default::default()
        };

        let outcome = Extractor::new(mailbox.connector())
            .run(&credentials(), &request)
            .await
            .unwrap();

        assert_eq!(entry_names(&outcome.payload), vec!["email_1.txt", "email_3.txt"]);
        assert_eq!(outcome.summary.failed, 1);
        assert_eq!(outcome.summary.written, 2);
        assert_eq!(outcome.summary.processed, 3);
    }

    #[tokio::test]
    async fn test_message_without_text_is_skipped() {
        let image_only = concat!(
            "Subject: picture\r\n",
            "Content-Type: image/png\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "iVBORw0KGgo="
        );
        let mailbox = FakeMailbox::new("INBOX").with_messages(vec![
            message("<a@x>", "Text", "a@x", "words"),
            image_only.as_bytes().to_vec(),
        ]);
        let request = ExtractionRequest {
            mode: OutputMode::PlainText(ExportShape::Merged),
            ..Default::default()
        };

        let outcome = Extractor::new(mailbox.connector())
            .run(&credentials(), &request)
            .await
            .unwrap();

        assert_eq!(outcome.payload, Payload::MergedText("words".to_string()));
        assert_eq!(outcome.summary.empty_bodies, 1);
        assert_eq!(outcome.summary.written, 1);
    }

    #[tokio::test]
    async fn test_state_and_progress_events() {
        let mailbox = FakeMailbox::new("INBOX").with_messages(numbered(4));
        let (tx, mut rx) = mpsc::unbounded_channel();

        Extractor::new(mailbox.connector())
            .with_events(tx)
            .run(&credentials(), &ExtractionRequest::default())
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            states(&events),
            vec![
                RunState::Connected,
                RunState::FolderSelected,
                RunState::Listed,
                RunState::Deduplicating,
                RunState::Processing,
                RunState::Finalized,
            ]
        );

        let fractions = progress(&events);
        assert_eq!(fractions.len(), 8);
        assert!(fractions.windows(2).all(|w| w[0] < w[1]));
        assert!((fractions[3] - 0.3).abs() < 1e-5);
        assert!((fractions[7] - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_single_message_skips_duplicate_scan() {
        let mailbox = FakeMailbox::new("INBOX").with_messages(numbered(1));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = Extractor::new(mailbox.connector())
            .with_events(tx)
            .run(&credentials(), &ExtractionRequest::default())
            .await
            .unwrap();

        assert_eq!(outcome.summary.written, 1);
        assert!(mailbox.state().header_fetches.is_empty());
        let events = drain(&mut rx);
        assert!(!states(&events).contains(&RunState::Deduplicating));
        assert_eq!(progress(&events), vec![1.0]);
    }

    #[tokio::test]
    async fn test_write_to_directory() {
        let mailbox = FakeMailbox::new("INBOX").with_messages(numbered(2));
        let request = ExtractionRequest {
            mode: OutputMode::PlainText(ExportShape::Merged),
            ..Default::default()
        };
        let outcome = Extractor::new(mailbox.connector())
            .run(&credentials(), &request)
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = outcome.write_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("emails_bodies_merged.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "body 1\n__SEP__\nbody 2");
    }
}
