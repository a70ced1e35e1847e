use issue_indexer_core::{EntryStatus, LibraryEntry};

/// View filter for `list`. Section, system and type compare case-insensitively
/// against the extracted metadata; entries without metadata never match them.
#[derive(Debug, Default, Clone)]
pub struct EntryFilter {
    pub section: Option<String>,
    pub system: Option<String>,
    pub content_type: Option<String>,
    pub search: Option<String>,
    pub include_pending: bool,
}

impl EntryFilter {
    pub fn matches(&self, entry: &LibraryEntry) -> bool {
        if !self.include_pending && entry.status == EntryStatus::Pending {
            return false;
        }

        let facets = [
            (&self.section, entry.metadata.as_ref().map(|m| m.magazine_section.as_str())),
            (&self.system, entry.metadata.as_ref().map(|m| m.rpg_system.as_str())),
            (&self.content_type, entry.metadata.as_ref().map(|m| m.content_type.as_str())),
        ];
        for (wanted, actual) in facets {
            if let Some(wanted) = wanted {
                match actual {
                    Some(actual) if actual.eq_ignore_ascii_case(wanted) => {}
                    _ => return false,
                }
            }
        }

        match &self.search {
            Some(term) if !term.trim().is_empty() => search_matches(entry, &term.to_lowercase()),
            _ => true,
        }
    }
}

fn search_matches(entry: &LibraryEntry, term: &str) -> bool {
    let mut haystack = vec![entry.original_name.as_str(), entry.suggested_name.as_str()];
    if let Some(meta) = &entry.metadata {
        haystack.extend([
            meta.official_title.as_str(),
            meta.summary.as_str(),
            meta.magazine_edition.as_str(),
        ]);
    }
    haystack.iter().any(|field| field.to_lowercase().contains(term))
}
