//! Statistical methods mentioned in foundational papers.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::model::{FoundationalPaper, LiteratureContext, PaperSummary};

static METHOD_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)t-test|t test", "t-test"),
        (r"(?i)anova|analysis of variance", "ANOVA"),
        (r"(?i)chi-square|chi square|χ2|χ²", "Chi-square"),
        (r"(?i)fisher", "Fisher's exact test"),
        (r"(?i)regression", "Regression"),
        (r"(?i)\bcox\b|proportional hazard", "Cox regression"),
        (r"(?i)kaplan|survival", "Kaplan-Meier"),
        (r"(?i)log-rank|logrank|log rank", "Log-rank test"),
        (r"(?i)wilcoxon|mann-whitney", "Non-parametric test"),
        (r"(?i)correlation|pearson|spearman", "Correlation analysis"),
    ]
    .into_iter()
    .filter_map(|(pattern, method)| Regex::new(pattern).ok().map(|re| (re, method)))
    .collect()
});

static FIRST_INTEGER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(\d+)").expect("Hard-coded regex pattern should be valid")
});

const MAX_COMMON_APPROACHES: usize = 5;

/// Methods a paper reports, falling back to what its design implies.
pub fn extract_methods(paper: &FoundationalPaper) -> Vec<String> {
    let approach = paper
        .protocol_elements
        .statistical_approach
        .as_deref()
        .unwrap_or_default();

    let mut methods: Vec<String> = METHOD_PATTERNS
        .iter()
        .filter(|(re, _)| re.is_match(approach))
        .map(|(_, method)| method.to_string())
        .collect();

    if methods.is_empty() {
        if let Some(design) = paper.study_design.as_deref().map(str::to_lowercase) {
            if design.contains("rct") || design.contains("randomized") || design.contains("randomised") {
                methods.extend(["t-test", "ANOVA"].map(String::from));
            }
            if design.contains("survival") || design.contains("time-to-event") {
                methods.extend(["Kaplan-Meier", "Log-rank test"].map(String::from));
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    methods.retain(|m| seen.insert(m.clone()));
    methods
}

/// First integer in a free-text sample size ("n = 240 randomised" yields 240).
pub fn parse_sample_size(text: Option<&str>) -> Option<u64> {
    FIRST_INTEGER
        .captures(text?)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Summarises papers and ranks the methods they share.
pub fn summarize_papers(papers: &[FoundationalPaper]) -> LiteratureContext {
    let summaries: Vec<PaperSummary> = papers
        .iter()
        .map(|p| PaperSummary {
            title: p.title.clone(),
            authors: p.authors.clone(),
            year: p.year.clone(),
            statistical_methods: extract_methods(p),
            sample_size: parse_sample_size(p.protocol_elements.sample_size.as_deref()),
            primary_endpoint: p.protocol_elements.primary_endpoint.clone(),
        })
        .collect();

    // Count, remembering first appearance to break ties deterministically
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut order = 0;
    for method in summaries.iter().flat_map(|s| s.statistical_methods.iter()) {
        let entry = counts.entry(method.as_str()).or_insert_with(|| {
            order += 1;
            (0, order)
        });
        entry.0 += 1;
    }
    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

    let common_approaches: Vec<String> = ranked
        .into_iter()
        .take(MAX_COMMON_APPROACHES)
        .map(|(m, _)| m.to_string())
        .collect();

    let synthesized_methods = (!common_approaches.is_empty()).then(|| {
        format!(
            "Common methods in foundational literature: {}",
            common_approaches.join(", ")
        )
    });

    LiteratureContext {
        papers: summaries,
        common_approaches,
        synthesized_methods,
    }
}
