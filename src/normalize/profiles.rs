//! Per-dataset rule sets and the placeholder records they use.
//!
//! A [`DatasetProfile`] is plain data: an ordered list of [`Rule`]s. Supporting
//! a new dataset type means adding a profile here, not new branches in the
//! normalizer.

use super::rules::Rule;
use super::{AbstractEncoding, NormalizeOptions};
use clap::ValueEnum;
use serde_json::{Value, json};
use std::fmt;

/// Dataset types with a built-in rule set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum DatasetKind {
    Works,
    Institutions,
    Concepts,
    Sources,
}

impl DatasetKind {
    /// Directory name of this dataset under a version root.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Works => "works",
            Self::Institutions => "institutions",
            Self::Concepts => "concepts",
            Self::Sources => "sources",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// An ordered rule set for one dataset type.
#[derive(Clone, Debug)]
pub struct DatasetProfile {
    pub kind: DatasetKind,
    pub rules: Vec<Rule>,
}

impl DatasetProfile {
    /// Build the built-in profile for `kind`, honoring `options`.
    #[must_use]
    pub fn builtin(kind: DatasetKind, options: &NormalizeOptions) -> Self {
        let rules = match kind {
            DatasetKind::Works => works_rules(options),
            DatasetKind::Institutions | DatasetKind::Concepts => vec![
                Rule::RenameHyphenKeys,
                Rule::DropField {
                    field: "international".into(),
                },
            ],
            DatasetKind::Sources => vec![Rule::NullArrays {
                fields: [
                    "apc_prices",
                    "alternate_titles",
                    "issn",
                    "societies",
                    "counts_by_year",
                    "topics",
                    "topic_share",
                    "host_organization_lineage",
                    "host_organization_lineage_names",
                ]
                .map(String::from)
                .to_vec(),
            }],
        };
        Self { kind, rules }
    }
}

fn works_rules(options: &NormalizeOptions) -> Vec<Rule> {
    let mut rules = vec![
        Rule::fill_empty("host_venue", empty_host_venue()),
        Rule::fill_empty("counts_by_year", empty_counts_by_year()),
        Rule::fill_empty("mesh", empty_mesh()),
        Rule::fill_empty("alternate_host_venues", empty_alternate_host_venue()),
        Rule::fill_empty("concepts", empty_concept()),
        Rule::WrapSingle {
            field: "apc_list".into(),
            placeholder: empty_apc(),
        },
        Rule::fill_empty("locations", empty_location()),
        Rule::fill_missing("best_oa_location", empty_location()),
        Rule::fill_missing("primary_location", empty_location()),
        Rule::SourceIssn {
            field: "locations".into(),
        },
        Rule::SourceIssn {
            field: "best_oa_location".into(),
        },
        Rule::SourceIssn {
            field: "primary_location".into(),
        },
        Rule::Authorships {
            field: "authorships".into(),
            institution: empty_institution(),
        },
        Rule::EmptyIfNull {
            fields: [
                "corresponding_author_ids",
                "corresponding_institution_ids",
                "indexed_in",
                "referenced_works",
                "related_works",
            ]
            .map(String::from)
            .to_vec(),
        },
        Rule::Abstract {
            field: "abstract_inverted_index".into(),
            encoding: options.abstract_encoding,
        },
    ];

    // Drops run after the fills: the replacement is always populated by then,
    // so a second pass sees the same record.
    if options.drop_legacy {
        rules.push(Rule::DropSuperseded {
            field: "host_venue".into(),
            replacement: "primary_location".into(),
        });
        rules.push(Rule::DropSuperseded {
            field: "alternate_host_venues".into(),
            replacement: "locations".into(),
        });
    }

    if options.abstract_encoding == AbstractEncoding::Keep {
        rules.retain(|r| !matches!(r, Rule::Abstract { .. }));
    }
    rules
}

// ----------------------------------------------------------------------------
// Placeholders
// ----------------------------------------------------------------------------

#[must_use]
pub fn empty_institution() -> Value {
    json!({
        "id": null,
        "display_name": null,
        "ror": null,
        "country_code": null,
        "type": null
    })
}

#[must_use]
pub fn empty_counts_by_year() -> Value {
    json!({ "year": null, "cited_by_count": null })
}

#[must_use]
pub fn empty_mesh() -> Value {
    json!({
        "is_major_topic": null,
        "descriptor_ui": null,
        "descriptor_name": null,
        "qualifier_ui": null,
        "qualifier_name": null
    })
}

#[must_use]
pub fn empty_alternate_host_venue() -> Value {
    json!({
        "id": null,
        "display_name": null,
        "type": null,
        "url": null,
        "is_oa": null,
        "version": null,
        "license": null
    })
}

#[must_use]
pub fn empty_concept() -> Value {
    json!({
        "id": null,
        "wikidata": null,
        "display_name": null,
        "level": null,
        "score": null
    })
}

#[must_use]
pub fn empty_host_venue() -> Value {
    json!({
        "license": null,
        "issn": null,
        "issn_l": null,
        "publisher": null,
        "is_oa": null,
        "id": null,
        "display_name": null,
        "type": null,
        "version": null,
        "url": null
    })
}

#[must_use]
pub fn empty_apc() -> Value {
    json!({
        "provenance": null,
        "value_usd": null,
        "currency": null,
        "value": null
    })
}

/// Placeholder for a location object. Boolean flags default to `false` and
/// identifier lists to `[]`, everything else is null.
#[must_use]
pub fn empty_location() -> Value {
    json!({
        "license": null,
        "pdf_url": null,
        "is_oa": false,
        "source": {
            "publisher_id": null,
            "host_organization_lineage": [],
            "host_organization_lineage_names": [],
            "is_in_doaj": false,
            "publisher_lineage": [],
            "issn_l": null,
            "publisher_lineage_names": [],
            "display_name": null,
            "type": null,
            "host_organization_name": null,
            "issn": [],
            "publisher": null,
            "host_institution_lineage_names": [],
            "is_oa": false,
            "id": null,
            "host_institution_lineage": [],
            "host_organization": null
        },
        "landing_page_url": null,
        "version": null,
        "doi": null,
        "issn": []
    })
}
