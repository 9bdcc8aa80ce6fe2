use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use super::{FilterCriteria, SortDirection, SortKey};
use crate::models::{Asset, AssetCollection};
use crate::utils::{cmp_ignore_case, contains_ignore_case};

/// Case-insensitive literal matcher for the search term.
enum Matcher {
    All,
    Pattern(Regex),
    /// Used if the escaped pattern cannot be compiled (size limits).
    Lowercase(String),
}

impl Matcher {
    /// A blank term matches everything. Any other term is matched as typed,
    /// surrounding whitespace included.
    fn new(term: &str) -> Self {
        if term.trim().is_empty() {
            return Matcher::All;
        }
        match RegexBuilder::new(&regex::escape(term))
            .case_insensitive(true)
            .build()
        {
            Ok(re) => Matcher::Pattern(re),
            Err(e) => {
                warn!(error = %e, "Search pattern rejected, falling back to plain matching");
                Matcher::Lowercase(term.to_lowercase())
            }
        }
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Pattern(re) => re.is_match(text),
            Matcher::Lowercase(term) => contains_ignore_case(text, term),
        }
    }

    /// An asset matches if any searchable field or any tag matches.
    fn matches_asset(&self, asset: &Asset) -> bool {
        if matches!(self, Matcher::All) {
            return true;
        }
        [&asset.filename, &asset.title, &asset.alt_text, &asset.caption]
            .into_iter()
            .any(|field| self.is_match(field))
            || asset.tags.iter().any(|tag| self.is_match(tag))
    }
}

fn compare(a: &Asset, b: &Asset, key: SortKey) -> Ordering {
    match key {
        SortKey::Date => a.uploaded_at.cmp(&b.uploaded_at),
        SortKey::Name => cmp_ignore_case(&a.filename, &b.filename),
        SortKey::Size => a.byte_size.cmp(&b.byte_size),
        SortKey::Type => cmp_ignore_case(&a.mime_type, &b.mime_type),
    }
}

/// Filter and sort the collection. Always returns a new vector; the sort is
/// stable, so equal keys keep collection order in either direction.
pub fn apply(collection: &AssetCollection, criteria: &FilterCriteria, now: DateTime<Utc>) -> Vec<Asset> {
    let matcher = Matcher::new(&criteria.search);

    let mut filtered: Vec<Asset> = collection
        .iter()
        .filter(|a| criteria.date_range.admits(a.uploaded_at, now))
        .filter(|a| matcher.matches_asset(a))
        .cloned()
        .collect();

    filtered.sort_by(|a, b| {
        let cmp = compare(a, b, criteria.sort_key);
        match criteria.direction {
            SortDirection::Ascending => cmp,
            SortDirection::Descending => cmp.reverse(),
        }
    });

    filtered
}

/// Memoizing wrapper around `apply`.
///
/// The output is keyed on the collection version and the criteria. The
/// current time only feeds the date buckets and is not part of the key.
#[derive(Default)]
pub struct FilterPipeline {
    last_key: Option<(u64, FilterCriteria)>,
    output: Arc<Vec<Asset>>,
    recomputations: u64,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(
        &mut self,
        collection: &AssetCollection,
        criteria: &FilterCriteria,
        now: DateTime<Utc>,
    ) -> Arc<Vec<Asset>> {
        let unchanged = matches!(
            &self.last_key,
            Some((version, last)) if *version == collection.version() && last == criteria
        );
        if !unchanged {
            self.output = Arc::new(apply(collection, criteria, now));
            self.last_key = Some((collection.version(), criteria.clone()));
            self.recomputations += 1;
            debug!(
                total = collection.len(),
                matched = self.output.len(),
                search = %criteria.search,
                "Filter pipeline recomputed"
            );
        }
        Arc::clone(&self.output)
    }

    pub fn recompute_count(&self) -> u64 {
        self.recomputations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DateRange;
    use chrono::Duration;

    fn asset(id: &str, filename: &str) -> Asset {
        Asset::local(id, format!("https://cdn.example.com/{filename}"), filename)
    }

    fn ids(assets: &[Asset]) -> Vec<&str> {
        assets.iter().map(|a| a.id.as_str()).collect()
    }

    fn search(term: &str) -> FilterCriteria {
        FilterCriteria {
            search: term.to_string(),
            ..Default::default()
        }
    }

    fn cat_collection() -> AssetCollection {
        let cat = asset("1", "cat.png");
        let mut dog = asset("2", "dog.png");
        dog.tags.insert("cat-lover".to_string());
        let bird = asset("3", "bird.png");
        AssetCollection::from_assets(vec![cat, dog, bird])
    }

    #[test]
    fn test_search_matches_filename_or_tag_case_insensitively() {
        let c = cat_collection();
        let now = Utc::now();

        let mut lower = ids(&apply(&c, &search("cat"), now)).into_iter().map(String::from).collect::<Vec<_>>();
        let mut upper = ids(&apply(&c, &search("CAT"), now)).into_iter().map(String::from).collect::<Vec<_>>();
        lower.sort();
        upper.sort();

        assert_eq!(lower, vec!["1", "2"]);
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_search_covers_title_alt_and_caption() {
        let mut a = asset("a", "x.png");
        a.title = "Lighthouse".to_string();
        let mut b = asset("b", "y.png");
        b.alt_text = "lighthouse at dusk".to_string();
        let mut c = asset("c", "z.png");
        c.caption = "LIGHTHOUSE".to_string();
        let mut d = asset("d", "w.png");
        d.description = "lighthouse (description is not searched)".to_string();
        let collection = AssetCollection::from_assets(vec![a, b, c, d]);

        let mut found = ids(&apply(&collection, &search("lighthouse"), Utc::now()))
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        found.sort();
        assert_eq!(found, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_and_regex_metachar_terms() {
        let c = AssetCollection::from_assets(vec![asset("1", "a+b.png"), asset("2", "aab.png")]);
        assert_eq!(apply(&c, &search("   "), Utc::now()).len(), 2);

        let found = apply(&c, &search("a+b"), Utc::now());
        assert_eq!(ids(&found), vec!["1"]);
    }

    #[test]
    fn test_surrounding_whitespace_is_part_of_the_term() {
        let c = AssetCollection::from_assets(vec![asset("1", "cat nap.png"), asset("2", "cat.png")]);

        let found = apply(&c, &search("cat "), Utc::now());
        assert_eq!(ids(&found), vec!["1"]);

        let found = apply(&c, &search(" nap"), Utc::now());
        assert_eq!(ids(&found), vec!["1"]);
    }

    #[test]
    fn test_date_filter() {
        let now = Utc::now();
        let mut fresh = asset("fresh", "f.png");
        fresh.uploaded_at = now - Duration::hours(2);
        let mut old = asset("old", "o.png");
        old.uploaded_at = now - Duration::days(10);
        let c = AssetCollection::from_assets(vec![fresh, old]);

        let criteria = FilterCriteria {
            date_range: DateRange::Week,
            ..Default::default()
        };
        assert_eq!(ids(&apply(&c, &criteria, now)), vec!["fresh"]);
    }

    #[test]
    fn test_sort_is_stable_in_both_directions() {
        let mut a = asset("a", "same.png");
        a.byte_size = 10;
        let mut b = asset("b", "SAME.png");
        b.byte_size = 30;
        let mut c = asset("c", "same.png");
        c.byte_size = 10;
        let collection = AssetCollection::from_assets(vec![a, b, c]);

        let by_name = FilterCriteria {
            sort_key: SortKey::Name,
            direction: SortDirection::Ascending,
            ..Default::default()
        };
        assert_eq!(ids(&apply(&collection, &by_name, Utc::now())), vec!["a", "b", "c"]);

        let by_size_desc = FilterCriteria {
            sort_key: SortKey::Size,
            direction: SortDirection::Descending,
            ..Default::default()
        };
        assert_eq!(ids(&apply(&collection, &by_size_desc, Utc::now())), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_default_sort_is_newest_first() {
        let now = Utc::now();
        let mut older = asset("older", "a.png");
        older.uploaded_at = now - Duration::days(2);
        let mut newer = asset("newer", "b.png");
        newer.uploaded_at = now - Duration::days(1);
        let c = AssetCollection::from_assets(vec![older, newer]);

        assert_eq!(ids(&apply(&c, &FilterCriteria::default(), now)), vec!["newer", "older"]);
    }

    #[test]
    fn test_pipeline_recomputes_only_on_input_change() {
        let mut collection = cat_collection();
        let mut pipeline = FilterPipeline::new();
        let criteria = search("cat");
        let now = Utc::now();

        let first = pipeline.run(&collection, &criteria, now);
        let second = pipeline.run(&collection, &criteria, now);
        assert_eq!(pipeline.recompute_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));

        pipeline.run(&collection, &search("dog"), now);
        assert_eq!(pipeline.recompute_count(), 2);

        collection.insert(asset("4", "catalog.png"));
        let third = pipeline.run(&collection, &search("dog"), now);
        assert_eq!(pipeline.recompute_count(), 3);

        // Earlier outputs are untouched by later runs
        assert_eq!(first.len(), 2);
        assert_eq!(third.len(), 1);
    }
}
