//! Canonical output types for harvested datasets and distributions.
//!
//! These types approximate the DCAT-AP-CH dataset dict consumed by the
//! opendata.swiss persistence layer; all human-readable text is carried in
//! fixed four-language locale maps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four portal locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    De,
    Fr,
    It,
    En,
}

impl Locale {
    pub const ALL: [Locale; 4] = [Locale::De, Locale::Fr, Locale::It, Locale::En];

    /// Two-letter lowercase code.
    pub fn code(&self) -> &'static str {
        match self {
            Locale::De => "de",
            Locale::Fr => "fr",
            Locale::It => "it",
            Locale::En => "en",
        }
    }

    /// The `locale` attribute value used in geocat documents (`#DE` etc.).
    pub fn locale_ref(&self) -> &'static str {
        match self {
            Locale::De => "#DE",
            Locale::Fr => "#FR",
            Locale::It => "#IT",
            Locale::En => "#EN",
        }
    }

    /// Parse a `_de`/`_fr`/`_it`/`_en` field suffix.
    pub fn from_suffix(suffix: &str) -> Option<Locale> {
        match suffix {
            "de" => Some(Locale::De),
            "fr" => Some(Locale::Fr),
            "it" => Some(Locale::It),
            "en" => Some(Locale::En),
            _ => None,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A value per locale. All four slots always exist; unset text slots are
/// `''`, never absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Localized<T> {
    pub de: T,
    pub fr: T,
    pub it: T,
    pub en: T,
}

impl<T> Localized<T> {
    pub fn get(&self, locale: Locale) -> &T {
        match locale {
            Locale::De => &self.de,
            Locale::Fr => &self.fr,
            Locale::It => &self.it,
            Locale::En => &self.en,
        }
    }

    pub fn set(&mut self, locale: Locale, value: T) {
        match locale {
            Locale::De => self.de = value,
            Locale::Fr => self.fr = value,
            Locale::It => self.it = value,
            Locale::En => self.en = value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Locale, &T)> {
        Locale::ALL.iter().map(|l| (*l, self.get(*l)))
    }
}

impl Localized<String> {
    /// The same string in all four locales.
    pub fn uniform(value: &str) -> Self {
        Self {
            de: value.to_string(),
            fr: value.to_string(),
            it: value.to_string(),
            en: value.to_string(),
        }
    }
}

/// A multilingual text field.
pub type LocaleMap = Localized<String>;

/// A dataset publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    pub label: String,
}

/// A dataset contact point. The source only carries an email address, which
/// doubles as the display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPoint {
    pub name: String,
    pub email: String,
}

/// A related link; the label falls back to the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub url: String,
    pub label: String,
}

/// A portal group (theme).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
}

/// A temporal coverage range, in epoch seconds UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Temporal {
    pub start_date: i64,
    pub end_date: i64,
}

/// One canonical dataset, ready for the persistence collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Qualified as `<source-id>@<organization-slug>` before publishing.
    pub identifier: String,
    pub title: LocaleMap,
    pub description: LocaleMap,
    /// Epoch seconds UTC; defaulted to harvest time when the source has no
    /// publication, creation or revision date.
    pub issued: i64,
    /// Epoch seconds UTC of the last revision, if any.
    pub modified: Option<i64>,
    pub publishers: Vec<Publisher>,
    pub contact_points: Vec<ContactPoint>,
    pub relations: Vec<Relation>,
    /// Slugged keywords per locale; the harvesting sentinel keyword is
    /// always excluded.
    pub keywords: Localized<Vec<String>>,
    /// Always contains at least the `geography` group.
    pub groups: Vec<Group>,
    /// Two-letter language codes.
    pub language: Vec<String>,
    pub url: String,
    pub spatial: String,
    pub coverage: String,
    pub temporals: Vec<Temporal>,
    /// Dublin Core frequency URI, or `''`.
    pub accrual_periodicity: String,
    /// Identifiers of aggregated sibling datasets.
    pub see_alsos: Vec<String>,
    pub resources: Vec<Distribution>,
}

/// One accessible resource (download or service endpoint) of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub title: LocaleMap,
    pub description: LocaleMap,
    /// Locales for which the source declares a localized URL.
    pub language: Vec<String>,
    pub url: String,
    pub download_url: String,
    /// Inherited from the dataset.
    pub issued: i64,
    /// Inherited from the dataset.
    pub modified: Option<i64>,
    pub media_type: String,
    pub format: String,
    // currently unpopulated placeholders, kept for the output contract
    pub license: String,
    pub identifier: String,
    pub byte_size: String,
    pub coverage: String,
}
