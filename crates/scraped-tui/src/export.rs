// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use scraped_app::{Record, email_hint, visible_fields};

pub const EXPORT_MIME: &str = "text/plain";
const FILE_PREFIX: &str = "leak_result_";
const FALLBACK_STEM: &str = "data";

/// Plain-text rendition of the visible fields, one `key: value` per line, in
/// display order.
pub fn export_document(record: &Record) -> String {
    visible_fields(record)
        .into_iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn export_file_name(record: &Record) -> String {
    let stem = email_hint(record)
        .map(sanitize_file_stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| FALLBACK_STEM.to_owned());
    format!("{FILE_PREFIX}{stem}.txt")
}

fn sanitize_file_stem(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{export_document, export_file_name};
    use scraped_app::Record;
    use scraped_testkit::{raw_only_record, sample_record};

    #[test]
    fn document_follows_display_order_and_skips_raw() {
        let mut record = sample_record();
        record.insert("raw", Some("E-mail: alice@x.com".to_owned()));
        record.insert("Ville", Some("Lyon".to_owned()));
        record.insert("Pseudo", Some(String::new()));
        assert_eq!(
            export_document(&record),
            "Source: Leak1\nE-mail: alice@x.com\nVille: Lyon"
        );
    }

    #[test]
    fn raw_only_record_exports_an_empty_document() {
        assert_eq!(export_document(&raw_only_record()), "");
    }

    #[test]
    fn file_name_uses_email_or_fallback() {
        assert_eq!(export_file_name(&sample_record()), "leak_result_alice@x.com.txt");
        assert_eq!(export_file_name(&Record::new()), "leak_result_data.txt");

        let lowercase: Record = [("email", "bob@y.org")].into_iter().collect();
        assert_eq!(export_file_name(&lowercase), "leak_result_bob@y.org.txt");
    }

    #[test]
    fn file_name_cannot_escape_the_export_directory() {
        let hostile: Record = [("E-mail", "../../etc/passwd")].into_iter().collect();
        assert_eq!(export_file_name(&hostile), "leak_result_.._.._etc_passwd.txt");
    }
}
