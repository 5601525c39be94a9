//! Post-processing of raw extracted records into canonical datasets.
//!
//! The steps run in a fixed order: locale unflattening, date cleaning,
//! temporal ranges, structural wrapping (publishers, contacts, relations),
//! vocabulary mapping (keywords, groups, periodicity) and defaulting. A
//! field that fails to clean degrades to its empty representation; nothing
//! in here aborts the record.

use chrono::{NaiveDate, Utc};
use unicode_normalization::UnicodeNormalization;

use crate::mapping::RawRecord;
use crate::types::{
    ContactPoint, Dataset, Group, Locale, LocaleMap, Localized, Publisher, Relation, Temporal,
};

/// The keyword that marks records for harvesting; it is never republished.
pub const SENTINEL_KEYWORD: &str = "opendata.swiss";

/// ISO topic category code → portal group name. Unmapped codes fall back to
/// `territory`; `geography` is always present regardless.
const GROUP_MAPPING: &[(&str, &str)] = &[
    ("biota", "agriculture"),
    ("health", "health"),
    ("transportation", "mobility"),
    ("intelligenceMilitary", "public-order"),
    ("farming", "agriculture"),
    ("economy", "national-economy"),
    ("utilitiesCommunication_Energy", "energy"),
    ("society", "culture"),
];

/// ISO maintenance frequency code → Dublin Core frequency URI.
const FREQUENCY_MAPPING: &[(&str, &str)] = &[
    ("continual", "http://purl.org/cld/freq/continuous"),
    ("daily", "http://purl.org/cld/freq/daily"),
    ("weekly", "http://purl.org/cld/freq/weekly"),
    ("fortnightly", "http://purl.org/cld/freq/biweekly"),
    ("monthly", "http://purl.org/cld/freq/monthly"),
    ("quarterly", "http://purl.org/cld/freq/quarterly"),
    ("biannually", "http://purl.org/cld/freq/semiannual"),
    ("annually", "http://purl.org/cld/freq/annual"),
    ("asNeeded", "http://purl.org/cld/freq/completelyIrregular"),
    ("irregular", "http://purl.org/cld/freq/completelyIrregular"),
];

/// ISO 639-2 bibliographic code → portal two-letter code.
const LANGUAGE_MAPPING: &[(&str, &str)] =
    &[("ger", "de"), ("fra", "fr"), ("eng", "en"), ("ita", "it")];

const MIN_TAG_LENGTH: usize = 2;
const MAX_TAG_LENGTH: usize = 100;

/// Normalize a raw dataset record into the canonical representation.
///
/// The returned dataset carries the unqualified source identifier and no
/// resources yet; both are filled in by the import step.
pub fn normalize_dataset(record: &RawRecord) -> Dataset {
    let issued = clean_datetime(record.text("issued"));
    Dataset {
        identifier: record.text("identifier").to_string(),
        title: locale_map(record, "title"),
        description: locale_map(record, "description"),
        // every dataset gets a valid issue date, at worst the harvest time
        issued: issued.unwrap_or_else(|| Utc::now().timestamp()),
        modified: clean_datetime(record.text("modified")),
        publishers: record
            .list("publishers")
            .into_iter()
            .map(|label| Publisher { label })
            .collect(),
        contact_points: record
            .list("contact_points")
            .into_iter()
            .map(|email| ContactPoint {
                name: email.clone(),
                email,
            })
            .collect(),
        relations: clean_relations(&record.rows("relations")),
        keywords: clean_keywords(&locale_lists(record, "keywords")),
        groups: clean_groups(&record.list("groups")),
        language: clean_language(record.text("language")),
        url: record.text("url").to_string(),
        spatial: record.text("spatial").to_string(),
        coverage: record.text("coverage").to_string(),
        temporals: clean_temporals(record),
        accrual_periodicity: clean_accrual_periodicity(record.text("accrual_periodicity")),
        see_alsos: record.list("see_alsos"),
        resources: Vec::new(),
    }
}

/// Merge `<prefix>_de` .. `<prefix>_en` fields into a locale map. All four
/// slots are materialized even if the mapping produced only some of them.
pub fn locale_map(record: &RawRecord, prefix: &str) -> LocaleMap {
    let mut map = LocaleMap::default();
    for locale in Locale::ALL {
        let field = format!("{prefix}_{locale}");
        map.set(locale, record.text(&field).to_string());
    }
    map
}

/// Like [`locale_map`], for list-valued fields (keywords).
pub fn locale_lists(record: &RawRecord, prefix: &str) -> Localized<Vec<String>> {
    let mut map = Localized::<Vec<String>>::default();
    for locale in Locale::ALL {
        let field = format!("{prefix}_{locale}");
        map.set(locale, record.list(&field));
    }
    map
}

/// Parse the leading `YYYY-MM-DD` of a date value into epoch seconds UTC.
///
/// The offset is computed with date arithmetic, so years before 1900 yield a
/// valid (negative) timestamp. Unparseable input is `None`, never an error.
pub fn clean_datetime(value: &str) -> Option<i64> {
    let prefix: String = value.chars().take(10).collect();
    let date = NaiveDate::parse_from_str(&prefix, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

/// A single temporal range when both ends are present and parseable.
fn clean_temporals(record: &RawRecord) -> Vec<Temporal> {
    let start = clean_datetime(record.text("temporals_start"));
    let end = clean_datetime(record.text("temporals_end"));
    match (start, end) {
        (Some(start_date), Some(end_date)) => vec![Temporal {
            start_date,
            end_date,
        }],
        _ => Vec::new(),
    }
}

/// Wrap `(url)` / `(url, label)` rows; the label falls back to the URL.
fn clean_relations(rows: &[Vec<String>]) -> Vec<Relation> {
    rows.iter()
        .map(|row| {
            let url = row.first().cloned().unwrap_or_default();
            let label = row
                .get(1)
                .filter(|label| !label.is_empty())
                .cloned()
                .unwrap_or_else(|| url.clone());
            Relation { url, label }
        })
        .collect()
}

/// Slug every keyword per locale, dropping the harvesting sentinel.
fn clean_keywords(raw: &Localized<Vec<String>>) -> Localized<Vec<String>> {
    let mut keywords = Localized::<Vec<String>>::default();
    for (locale, tags) in raw.iter() {
        keywords.set(
            locale,
            tags.iter()
                .filter(|tag| tag.as_str() != SENTINEL_KEYWORD)
                .map(|tag| munge_tag(tag))
                .collect(),
        );
    }
    keywords
}

/// Map topic category codes to groups. Geodata always belongs to the
/// `geography` group; unmapped codes land in `territory`.
fn clean_groups(topic_categories: &[String]) -> Vec<Group> {
    let mut groups = vec![Group {
        name: "geography".to_string(),
    }];
    for category in topic_categories {
        let name = GROUP_MAPPING
            .iter()
            .find(|(code, _)| code == category)
            .map(|(_, group)| *group)
            .unwrap_or("territory");
        groups.push(Group {
            name: name.to_string(),
        });
    }
    groups
}

fn clean_language(raw: &str) -> Vec<String> {
    LANGUAGE_MAPPING
        .iter()
        .find(|(code, _)| *code == raw)
        .map(|(_, lang)| vec![lang.to_string()])
        .unwrap_or_default()
}

fn clean_accrual_periodicity(raw: &str) -> String {
    FREQUENCY_MAPPING
        .iter()
        .find(|(code, _)| *code == raw)
        .map(|(_, uri)| uri.to_string())
        .unwrap_or_default()
}

/// Slug-normalize a keyword the way the portal does: transliterate to
/// ASCII, lowercase, keep alphanumerics and dashes, clamp the length.
pub fn munge_tag(tag: &str) -> String {
    let ascii: String = tag
        .nfkd()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_lowercase();
    let mut slug: String = ascii
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ' ')
        .collect::<String>()
        .replace(' ', "-");
    slug.truncate(MAX_TAG_LENGTH);
    while slug.len() < MIN_TAG_LENGTH {
        slug.push('_');
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RawValue;
    use pretty_assertions::assert_eq;

    fn record(pairs: &[(&str, RawValue)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn text(value: &str) -> RawValue {
        RawValue::Text(value.to_string())
    }

    #[test]
    fn test_locale_map_materializes_all_slots() {
        let rec = record(&[
            ("title_de", text("Titel")),
            ("title_fr", text("Titre")),
        ]);
        let map = locale_map(&rec, "title");
        assert_eq!(map.de, "Titel");
        assert_eq!(map.fr, "Titre");
        assert_eq!(map.it, "");
        assert_eq!(map.en, "");
    }

    #[test]
    fn test_clean_datetime_date_and_datetime() {
        assert_eq!(clean_datetime("2011-12-31"), Some(1325289600));
        assert_eq!(clean_datetime("2011-12-31T10:55:51"), Some(1325289600));
    }

    #[test]
    fn test_clean_datetime_pre_1900() {
        // epoch arithmetic, not platform time conversion
        let epoch = clean_datetime("1899-12-31").unwrap();
        assert!(epoch < 0);
        assert_eq!(epoch, -2208988800);
    }

    #[test]
    fn test_clean_datetime_garbage_is_none() {
        assert_eq!(clean_datetime(""), None);
        assert_eq!(clean_datetime("unknown"), None);
        assert_eq!(clean_datetime("31.12.2011"), None);
    }

    #[test]
    fn test_issued_defaults_to_now() {
        let rec = record(&[("identifier", text("id"))]);
        let before = Utc::now().timestamp();
        let dataset = normalize_dataset(&rec);
        let after = Utc::now().timestamp();
        assert!(dataset.issued >= before && dataset.issued <= after);
    }

    #[test]
    fn test_revision_only_dates() {
        let rec = record(&[
            ("issued", text("2011-12-31")),
            ("modified", text("2011-12-31")),
        ]);
        let dataset = normalize_dataset(&rec);
        assert_eq!(dataset.issued, 1325289600);
        assert_eq!(dataset.modified, Some(1325289600));
    }

    #[test]
    fn test_unparseable_modified_is_dropped_not_zeroed() {
        let rec = record(&[("modified", text("gestern"))]);
        let dataset = normalize_dataset(&rec);
        assert_eq!(dataset.modified, None);
    }

    #[test]
    fn test_temporals_require_both_ends() {
        let both = record(&[
            ("temporals_start", text("2000-01-01")),
            ("temporals_end", text("2010-01-01")),
        ]);
        let dataset = normalize_dataset(&both);
        assert_eq!(
            dataset.temporals,
            vec![Temporal {
                start_date: 946684800,
                end_date: 1262304000,
            }]
        );

        let only_start = record(&[("temporals_start", text("2000-01-01"))]);
        assert!(normalize_dataset(&only_start).temporals.is_empty());
    }

    #[test]
    fn test_publishers_and_contact_points_wrapping() {
        let rec = record(&[
            ("publishers", RawValue::List(vec!["Bundesamt".to_string()])),
            (
                "contact_points",
                RawValue::List(vec!["geo@example.ch".to_string()]),
            ),
        ]);
        let dataset = normalize_dataset(&rec);
        assert_eq!(
            dataset.publishers,
            vec![Publisher {
                label: "Bundesamt".to_string()
            }]
        );
        assert_eq!(
            dataset.contact_points,
            vec![ContactPoint {
                name: "geo@example.ch".to_string(),
                email: "geo@example.ch".to_string(),
            }]
        );
    }

    #[test]
    fn test_relation_label_falls_back_to_url() {
        let rec = record(&[(
            "relations",
            RawValue::Rows(vec![
                vec!["https://a.ch".to_string(), "Portal".to_string()],
                vec!["https://b.ch".to_string(), String::new()],
            ]),
        )]);
        let dataset = normalize_dataset(&rec);
        assert_eq!(
            dataset.relations,
            vec![
                Relation {
                    url: "https://a.ch".to_string(),
                    label: "Portal".to_string()
                },
                Relation {
                    url: "https://b.ch".to_string(),
                    label: "https://b.ch".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_sentinel_keyword_never_appears() {
        let rec = record(&[
            (
                "keywords_de",
                RawValue::List(vec![
                    "opendata.swiss".to_string(),
                    "Zeitreihen".to_string(),
                ]),
            ),
            (
                "keywords_fr",
                RawValue::List(vec!["opendata.swiss".to_string()]),
            ),
        ]);
        let dataset = normalize_dataset(&rec);
        assert_eq!(dataset.keywords.de, vec!["zeitreihen".to_string()]);
        assert!(dataset.keywords.fr.is_empty());
        for (_, tags) in dataset.keywords.iter() {
            assert!(!tags.iter().any(|t| t.contains("opendata")));
        }
    }

    #[test]
    fn test_groups_always_contain_geography() {
        let empty = record(&[]);
        assert_eq!(
            normalize_dataset(&empty).groups,
            vec![Group {
                name: "geography".to_string()
            }]
        );

        let rec = record(&[(
            "groups",
            RawValue::List(vec![
                "biota".to_string(),
                "somethingObscure".to_string(),
                "health".to_string(),
            ]),
        )]);
        let names: Vec<_> = normalize_dataset(&rec)
            .groups
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["geography", "agriculture", "territory", "health"]);
    }

    #[test]
    fn test_language_mapping() {
        let rec = record(&[("language", text("ger"))]);
        assert_eq!(normalize_dataset(&rec).language, vec!["de".to_string()]);

        let unknown = record(&[("language", text("spa"))]);
        assert!(normalize_dataset(&unknown).language.is_empty());
    }

    #[test]
    fn test_accrual_periodicity_mapping() {
        let rec = record(&[("accrual_periodicity", text("monthly"))]);
        assert_eq!(
            normalize_dataset(&rec).accrual_periodicity,
            "http://purl.org/cld/freq/monthly"
        );

        let unmapped = record(&[("accrual_periodicity", text("sometimes"))]);
        assert_eq!(normalize_dataset(&unmapped).accrual_periodicity, "");
    }

    #[test]
    fn test_munge_tag() {
        assert_eq!(munge_tag("Zeitreihen"), "zeitreihen");
        assert_eq!(munge_tag("Laerm und Ruhe "), "laerm-und-ruhe");
        assert_eq!(munge_tag("Zäune & Wege"), "zaune--wege");
        assert_eq!(munge_tag("x"), "x_");
    }
}
