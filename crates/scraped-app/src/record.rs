// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use icu_collator::{Collator, CollatorOptions, Strength};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Unstructured fallback text, shown only when nothing structured was parsed.
pub const RAW_FIELD: &str = "raw";

/// Fields boosted to the top of the display, in this order.
pub const PRIORITY_FIELDS: [&str; 6] = [
    "Source",
    "E-mail",
    "Mot de passe crypté",
    "Nom",
    "Prénom",
    "Téléphone",
];

/// Keys consulted, in order, when naming an export file.
pub const EMAIL_FIELDS: [&str; 2] = ["E-mail", "email"];

/// Schema-less result record. A key holding `None` or an empty string is
/// treated as absent everywhere except raw equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Option<String>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.fields.insert(key.into(), value);
    }

    /// Present value for `key`, skipping empty and null entries.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(present)
    }

    pub fn raw(&self) -> Option<&str> {
        self.get(RAW_FIELD)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), Some(value.into())))
                .collect(),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Right-biased sparse merge. Every present value in `incoming` overwrites or
/// adds to `base`; missing or empty incoming values never erase what `base`
/// already knows.
pub fn merge(base: &Record, incoming: &Record) -> Record {
    let mut merged = base.clone();
    for (key, value) in &incoming.fields {
        let Some(value) = present(value) else {
            continue;
        };
        merged.fields.insert(key.clone(), Some(value.to_owned()));
    }
    merged
}

/// Keys whose displayed value would change if `incoming` were merged into
/// `base`, in key order.
pub fn changed_keys(base: &Record, incoming: &Record) -> Vec<String> {
    incoming
        .fields
        .iter()
        .filter_map(|(key, value)| {
            let value = present(value)?;
            (base.get(key) != Some(value)).then(|| key.clone())
        })
        .collect()
}

/// Display-ready fields: raw and empty entries dropped, priority fields first
/// in `PRIORITY_FIELDS` order, then everything else in collation order.
pub fn visible_fields(record: &Record) -> Vec<(&str, &str)> {
    let mut fields: Vec<(&str, &str)> = record
        .fields
        .iter()
        .filter(|(key, _)| key.as_str() != RAW_FIELD)
        .filter_map(|(key, value)| present(value).map(|value| (key.as_str(), value)))
        .collect();
    fields.sort_by(|(a, _), (b, _)| {
        match (priority_rank(a), priority_rank(b)) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => compare_keys(a, b),
        }
    });
    fields
}

thread_local! {
    static KEY_COLLATOR: Option<Collator> = root_collator();
}

/// Root-locale collator at tertiary strength: accents and case only break
/// ties between otherwise equal keys.
fn root_collator() -> Option<Collator> {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Tertiary);
    Collator::try_new(&Default::default(), options).ok()
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    KEY_COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b).then_with(|| a.cmp(b)),
        None => a.cmp(b),
    })
}

fn priority_rank(key: &str) -> Option<usize> {
    PRIORITY_FIELDS.iter().position(|field| *field == key)
}

/// True when only the unstructured fallback text is available.
pub fn is_raw_only(record: &Record) -> bool {
    record.raw().is_some() && visible_fields(record).is_empty()
}

pub fn email_hint(record: &Record) -> Option<&str> {
    EMAIL_FIELDS.iter().find_map(|key| record.get(key))
}

#[cfg(test)]
mod tests {
    use super::{
        RAW_FIELD, Record, changed_keys, email_hint, is_raw_only, merge, visible_fields,
    };

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    #[test]
    fn merge_with_empty_incoming_is_identity() {
        let base = record(&[("Nom", "Doe"), ("E-mail", "a@x.com")]);
        assert_eq!(merge(&base, &Record::new()), base);
    }

    #[test]
    fn empty_string_does_not_overwrite() {
        let base = record(&[("Nom", "Doe")]);
        assert_eq!(merge(&base, &record(&[("Nom", "")])), base);
        assert_eq!(merge(&base, &record(&[("Prénom", "")])), base);
    }

    #[test]
    fn null_does_not_overwrite() {
        let base = record(&[("Nom", "Doe")]);
        let mut incoming = Record::new();
        incoming.insert("Nom", None);
        assert_eq!(merge(&base, &incoming), base);
    }

    #[test]
    fn merge_is_right_biased_and_adds_new_keys() {
        let merged = merge(&record(&[("a", "1")]), &record(&[("a", "2"), ("b", "3")]));
        assert_eq!(merged, record(&[("a", "2"), ("b", "3")]));
    }

    #[test]
    fn merge_keeps_keys_the_server_omitted() {
        let base = record(&[("Source", "Leak1"), ("E-mail", "a@x.com")]);
        let merged = merge(&base, &record(&[("Téléphone", "0600000000")]));
        assert_eq!(merged.get("Source"), Some("Leak1"));
        assert_eq!(merged.get("E-mail"), Some("a@x.com"));
        assert_eq!(merged.get("Téléphone"), Some("0600000000"));
    }

    #[test]
    fn changed_keys_reports_new_and_updated_values_only() {
        let base = record(&[("a", "1"), ("b", "2")]);
        let incoming = record(&[("a", "1"), ("b", "9"), ("c", "3"), ("d", "")]);
        assert_eq!(changed_keys(&base, &incoming), vec!["b", "c"]);
    }

    #[test]
    fn visible_fields_drop_raw_and_empty_values() {
        let mut rec = record(&[(RAW_FIELD, "blob"), ("Nom", ""), ("Ville", "Lyon")]);
        rec.insert("Pseudo", None);
        assert_eq!(visible_fields(&rec), vec![("Ville", "Lyon")]);
    }

    #[test]
    fn priority_fields_come_first_then_lexicographic() {
        let rec = record(&[("Téléphone", "x"), ("E-mail", "y"), ("Zeta", "z")]);
        let keys: Vec<&str> = visible_fields(&rec).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["E-mail", "Téléphone", "Zeta"]);
    }

    #[test]
    fn non_priority_keys_collate_with_case_as_tie_breaker() {
        let rec = record(&[("beta", "1"), ("Alpha", "2"), ("alpha", "3"), ("Source", "s")]);
        let keys: Vec<&str> = visible_fields(&rec).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Source", "alpha", "Alpha", "beta"]);
    }

    #[test]
    fn lowercase_and_accented_keys_interleave_with_capitalized_ones() {
        let rec = record(&[
            ("Ville", "Lyon"),
            ("Âge", "42"),
            ("adresse", "1 rue X"),
            ("Zone", "B"),
            ("État", "actif"),
            ("email", "a@x.com"),
        ]);
        let keys: Vec<&str> = visible_fields(&rec).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["adresse", "Âge", "email", "État", "Ville", "Zone"]);
    }

    #[test]
    fn raw_only_requires_raw_and_no_visible_fields() {
        assert!(is_raw_only(&record(&[(RAW_FIELD, "blob")])));
        assert!(is_raw_only(&record(&[(RAW_FIELD, "blob"), ("Nom", "")])));
        assert!(!is_raw_only(&record(&[(RAW_FIELD, "blob"), ("Nom", "Doe")])));
        assert!(!is_raw_only(&record(&[(RAW_FIELD, "")])));
        assert!(!is_raw_only(&Record::new()));
    }

    #[test]
    fn email_hint_prefers_display_key_then_lowercase() {
        assert_eq!(
            email_hint(&record(&[("E-mail", "a@x.com"), ("email", "b@x.com")])),
            Some("a@x.com")
        );
        assert_eq!(email_hint(&record(&[("email", "b@x.com")])), Some("b@x.com"));
        assert_eq!(email_hint(&record(&[("E-mail", "")])), None);
    }

    #[test]
    fn record_deserializes_nulls_as_absent() -> anyhow::Result<()> {
        let rec: Record = serde_json::from_str(r#"{"Nom":"Doe","phone":null}"#)?;
        assert_eq!(rec.iter().find(|(key, _)| *key == "phone"), Some(("phone", None)));
        assert_eq!(rec.get("phone"), None);
        assert_eq!(visible_fields(&rec), vec![("Nom", "Doe")]);
        Ok(())
    }
}
