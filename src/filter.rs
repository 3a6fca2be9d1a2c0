//! Filtering of assembled metrics before export.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, AhoCorasickKind};

use crate::kind::{MetricKind, MetricKindMask};

/// Filters and discards metrics matching certain patterns.
///
/// Uses [Aho-Corasick][ahocorasick] automatons to efficiently match context
/// and metric names against multiple patterns at once.  Patterns are matched
/// as substrings across the entire name; a name matching any pattern is
/// rejected.  Kinds outside the configured mask are rejected as well.
///
/// An empty filter accepts everything.
///
/// [ahocorasick]: https://en.wikipedia.org/wiki/Aho–Corasick_algorithm
pub struct MetricsFilter {
    context_automaton: Option<AhoCorasick>,
    name_automaton: Option<AhoCorasick>,
    mask: MetricKindMask,
}

impl MetricsFilter {
    /// A filter that accepts every context, name, and kind.
    pub fn accept_all() -> Self {
        MetricsFilter { context_automaton: None, name_automaton: None, mask: MetricKindMask::ALL }
    }

    /// Starts building a filter.
    pub fn builder() -> MetricsFilterBuilder {
        MetricsFilterBuilder::default()
    }

    /// Whether metrics in the named context survive the filter.
    pub fn accepts_context(&self, context: &str) -> bool {
        !matches!(&self.context_automaton, Some(automaton) if automaton.is_match(context))
    }

    /// Whether the named metric survives the filter.
    pub fn accepts_name(&self, name: &str) -> bool {
        !matches!(&self.name_automaton, Some(automaton) if automaton.is_match(name))
    }

    /// Whether metrics of `kind` survive the filter.
    pub fn accepts_kind(&self, kind: MetricKind) -> bool {
        self.mask.matches(kind)
    }
}

/// Builder for [`MetricsFilter`].
#[derive(Default)]
pub struct MetricsFilterBuilder {
    context_patterns: Vec<String>,
    name_patterns: Vec<String>,
    case_insensitive: bool,
    mask: Option<MetricKindMask>,
}

impl MetricsFilterBuilder {
    /// Rejects contexts whose name contains `pattern`.
    pub fn reject_context(mut self, pattern: impl AsRef<str>) -> Self {
        self.context_patterns.push(pattern.as_ref().to_string());
        self
    }

    /// Rejects metrics whose name contains `pattern`.
    pub fn reject_name(mut self, pattern: impl AsRef<str>) -> Self {
        self.name_patterns.push(pattern.as_ref().to_string());
        self
    }

    /// Sets the case sensitivity used for pattern matching.
    ///
    /// Defaults to `false` i.e. searches are case sensitive.
    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    /// Restricts the filter to the given kinds; everything else is rejected.
    ///
    /// Defaults to all kinds.
    pub fn kinds(mut self, mask: MetricKindMask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Builds the filter.
    pub fn build(self) -> MetricsFilter {
        let build_automaton = |patterns: &[String], case_insensitive: bool| {
            if patterns.is_empty() {
                return None;
            }
            let automaton = AhoCorasickBuilder::new()
                .ascii_case_insensitive(case_insensitive)
                .kind(Some(AhoCorasickKind::DFA))
                .build(patterns)
                // Per the `AhoCorasickBuilder::build` documentation, failure
                // means exceeding internal automaton limits far beyond any
                // realistic pattern set.
                .expect("should not fail to build filter automaton");
            Some(automaton)
        };

        MetricsFilter {
            context_automaton: build_automaton(&self.context_patterns, self.case_insensitive),
            name_automaton: build_automaton(&self.name_patterns, self.case_insensitive),
            mask: self.mask.unwrap_or(MetricKindMask::ALL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MetricsFilter;
    use crate::data::{MetricValue, MetricsData};
    use crate::kind::{MetricKind, MetricKindMask};
    use crate::values::CounterValue;

    fn tree() -> MetricsData {
        let mut root = MetricsData::new("app");
        root.add_entry("requests", MetricValue::Counter(CounterValue::default()));
        root.add_entry("hit_ratio", MetricValue::Gauge(0.5));

        let mut db = MetricsData::new("db");
        db.add_entry("queries", MetricValue::Counter(CounterValue::default()));
        root.add_child(db);

        let mut cache = MetricsData::new("cache");
        cache.add_entry("evictions", MetricValue::Counter(CounterValue::default()));
        root.add_child(cache);

        root
    }

    #[test]
    fn accept_all_accepts_everything() {
        let filter = MetricsFilter::accept_all();
        assert!(filter.accepts_context("anything"));
        assert!(filter.accepts_name("at.all"));
        assert!(filter.accepts_kind(MetricKind::Timer));
    }

    #[test]
    fn rejected_context_disappears_others_are_untouched() {
        let filter = MetricsFilter::builder().reject_context("db").build();
        let filtered = tree().filtered(&filter);

        assert_eq!(filtered.context, "app");
        assert_eq!(filtered.entries.len(), 2);
        assert_eq!(filtered.children.len(), 1);
        assert_eq!(filtered.children[0].context, "cache");
        assert_eq!(filtered.children[0].entries.len(), 1);
    }

    #[test]
    fn name_patterns_drop_matching_entries() {
        let filter = MetricsFilter::builder().reject_name("requests").build();
        let filtered = tree().filtered(&filter);

        assert_eq!(filtered.entries.len(), 1);
        assert_eq!(filtered.entries[0].name, "hit_ratio");
        // Children untouched.
        assert_eq!(filtered.children.len(), 2);
    }

    #[test]
    fn kind_mask_drops_other_kinds() {
        let filter = MetricsFilter::builder().kinds(MetricKindMask::GAUGE).build();
        let filtered = tree().filtered(&filter);

        assert_eq!(filtered.entries.len(), 1);
        assert_eq!(filtered.entries[0].name, "hit_ratio");
        assert!(filtered.children.iter().all(|child| child.entries.is_empty()));
    }

    #[test]
    fn case_insensitive_matching() {
        let filter =
            MetricsFilter::builder().reject_name("REQUESTS").case_insensitive(true).build();
        assert!(!filter.accepts_name("app.requests.total"));

        let sensitive = MetricsFilter::builder().reject_name("REQUESTS").build();
        assert!(sensitive.accepts_name("app.requests.total"));
    }
}
