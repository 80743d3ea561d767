use serde::Deserialize;
use std::collections::HashMap;

/// Maps URL slugs to the page codes stored in the content store.
///
/// Slugs and codes are compared lower-cased. A slug always stands for
/// itself as well as for its alias, so `/catalogue/offices` matches a page
/// stored as `offices` or as `prochaines_offices`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<String, String>")]
pub struct SlugAliases {
    aliases: HashMap<String, String>,
}

impl SlugAliases {
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    pub fn with_alias(mut self, slug: &str, page_code: &str) -> Self {
        self.insert(slug, page_code);
        self
    }

    pub fn insert(&mut self, slug: &str, page_code: &str) {
        self.aliases
            .insert(slug.trim().to_lowercase(), page_code.trim().to_lowercase());
    }

    /// Page codes a URL slug may refer to, the slug itself first.
    pub fn candidates(&self, slug: &str) -> Vec<String> {
        let slug = slug.to_lowercase();
        let mut candidates = vec![slug.clone()];
        if let Some(code) = self.aliases.get(&slug) {
            if *code != slug {
                candidates.push(code.clone());
            }
        }
        candidates
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// The portal's built-in slug table.
impl Default for SlugAliases {
    fn default() -> Self {
        Self::new()
            .with_alias("all", "catalogue_all")
            .with_alias("offices", "prochaines_offices")
    }
}

impl From<HashMap<String, String>> for SlugAliases {
    fn from(map: HashMap<String, String>) -> Self {
        map.iter()
            .fold(Self::new(), |aliases, (slug, code)| aliases.with_alias(slug, code))
    }
}
