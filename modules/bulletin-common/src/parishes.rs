//! Parish directory and per-source scrape configuration.

#[derive(Debug, Clone, Copy)]
pub struct Church {
    pub code: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Parish {
    pub id: &'static str,
    pub name: &'static str,
    pub churches: &'static [Church],
}

/// How bulletins for a source are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStrategy {
    /// Bulletins live at `{base_url}{YYYYMMDD}B.pdf`, one per Sunday.
    ParishesOnline { base_url: &'static str },
    /// A parish page listing current and archived bulletins as links.
    DiscoverMass { url: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct SourceProfile {
    /// Source id written into events and cursors.
    pub id: &'static str,
    /// Parish whose churches the extraction prompt offers as locations.
    pub parish: &'static str,
    pub strategy: ScrapeStrategy,
}

pub const PARISHES: &[Parish] = &[
    Parish {
        id: "epi",
        name: "Epiphany",
        churches: &[Church { code: "epi", name: "Epiphany" }],
    },
    Parish {
        id: "hspht",
        name: "Historic St Pats / Holy Trinity",
        churches: &[
            Church { code: "hsp", name: "Historic St Patrick's" },
            Church { code: "ht", name: "Holy Trinity" },
        ],
    },
    Parish {
        id: "mhe",
        name: "Most Holy Eucharist",
        churches: &[
            Church { code: "spm", name: "St Patrick's of Merna" },
            Church { code: "smd", name: "St Mary's of Downs" },
        ],
    },
    Parish {
        id: "smb",
        name: "St Mary's of Bloomington",
        churches: &[Church { code: "smb", name: "St Mary's of Bloomington" }],
    },
];

pub const SOURCES: &[SourceProfile] = &[
    SourceProfile {
        id: "epi",
        parish: "epi",
        strategy: ScrapeStrategy::ParishesOnline {
            base_url: "https://container.parishesonline.com/bulletins/01/0382/",
        },
    },
    SourceProfile {
        id: "hspht",
        parish: "hspht",
        strategy: ScrapeStrategy::DiscoverMass {
            url: "https://discovermass.com/church/st-patrick-bloomington-il/",
        },
    },
    SourceProfile {
        id: "spm",
        parish: "mhe",
        strategy: ScrapeStrategy::DiscoverMass {
            url: "https://discovermass.com/church/st-patrick-church-of-merna-bloomington-il/",
        },
    },
    SourceProfile {
        id: "smb",
        parish: "smb",
        strategy: ScrapeStrategy::DiscoverMass {
            url: "https://discovermass.com/church/st-mary-bloomington-il/",
        },
    },
];

/// Location code for events whose church couldn't be identified.
pub const UNKNOWN_LOCATION: &str = "unk";

pub fn parish(id: &str) -> Option<&'static Parish> {
    PARISHES.iter().find(|p| p.id == id)
}

pub fn source_profile(id: &str) -> Option<&'static SourceProfile> {
    SOURCES.iter().find(|s| s.id == id)
}

/// The parish a source's bulletins belong to. Sources without a profile are
/// looked up as parish ids directly.
pub fn parish_for_source(source: &str) -> Option<&'static Parish> {
    match source_profile(source) {
        Some(profile) => parish(profile.parish),
        None => parish(source),
    }
}

/// Indented church list for the extraction prompt:
///
/// ```text
///     - Historic St Patrick's: "hsp"
///     - Holy Trinity: "ht"
/// ```
pub fn format_churches(source: &str) -> String {
    match parish_for_source(source) {
        Some(parish) => parish
            .churches
            .iter()
            .map(|c| format!("    - {}: \"{}\"", c.name, c.code))
            .collect::<Vec<_>>()
            .join("\n"),
        None => "    - (unknown parish)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_source_points_at_a_known_parish() {
        for source in SOURCES {
            assert!(
                parish(source.parish).is_some(),
                "source {} references unknown parish {}",
                source.id,
                source.parish
            );
        }
    }

    #[test]
    fn merna_source_lists_most_holy_eucharist_churches() {
        let listing = format_churches("spm");
        assert!(listing.contains("St Patrick's of Merna: \"spm\""));
        assert!(listing.contains("St Mary's of Downs: \"smd\""));
    }

    #[test]
    fn unknown_source_falls_back() {
        assert_eq!(format_churches("nowhere"), "    - (unknown parish)");
    }
}
