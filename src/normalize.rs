// Copyright 2026 EduBase Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Normalization of untrusted listing parameters.
//!
//! Every request parameter is clamped or defaulted here before any SQL is
//! built; this module never fails. Free text is reduced to a sanitized FTS5
//! match expression of prefix terms, so downstream query execution cannot hit
//! a query-syntax error regardless of input.

use unicode_normalization::UnicodeNormalization;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 100;
pub const MAX_OFFSET: i64 = 10_000;

const MAX_QUERY_CHARS: usize = 200;
const MAX_FIELD_CHARS: usize = 100;
const MAX_MATCH_TERMS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    New,
    Popular,
    Relevance,
}

impl SortMode {
    /// Unknown or absent values resolve to `New`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("popular") => SortMode::Popular,
            Some("relevance") => SortMode::Relevance,
            _ => SortMode::New,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::New => "new",
            SortMode::Popular => "popular",
            SortMode::Relevance => "relevance",
        }
    }
}

/// Raw listing parameters as they arrive from the boundary. All fields are
/// optional strings except the authenticated favorites filter, which the
/// caller resolves to a user id before handing it over.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub q: Option<String>,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub sort: Option<String>,
    pub favorite_of: Option<i64>,
}

/// The validated, clamped form of a listing request. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    pub match_expr: String,
    pub subject: String,
    pub grade: String,
    pub kind: String,
    pub limit: i64,
    pub offset: i64,
    pub sort: SortMode,
    pub favorite_of: Option<i64>,
}

impl NormalizedQuery {
    pub fn from_request(req: &ListRequest) -> Self {
        Self {
            match_expr: match_expression(req.q.as_deref().unwrap_or("")),
            subject: clip_field(req.subject.as_deref()),
            grade: clip_field(req.grade.as_deref()),
            kind: clip_field(req.kind.as_deref()),
            limit: parse_clamped(req.limit.as_deref(), MIN_LIMIT, MAX_LIMIT, DEFAULT_LIMIT),
            offset: parse_clamped(req.offset.as_deref(), 0, MAX_OFFSET, 0),
            sort: SortMode::parse(req.sort.as_deref()),
            favorite_of: req.favorite_of,
        }
    }

    /// True when the sanitizer kept at least one search term.
    pub fn text_search_active(&self) -> bool {
        !self.match_expr.is_empty()
    }
}

/// Total numeric coercion: parse `raw` as a finite number, clamp into
/// `[min, max]`, truncate to an integer. Absent, empty, or non-numeric input
/// yields `default`. Never fails.
pub fn parse_clamped(raw: Option<&str>, min: i64, max: i64, default: i64) -> i64 {
    let Some(value) = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
    else {
        return default;
    };
    value.clamp(min as f64, max as f64) as i64
}

fn clip_field(raw: Option<&str>) -> String {
    raw.unwrap_or("").chars().take(MAX_FIELD_CHARS).collect()
}

/// Reduce free text to an FTS5 match expression of prefix terms.
///
/// The input is truncated to 200 characters, canonically composed (NFC), and
/// stripped of non-whitespace control characters; each whitespace-separated
/// token keeps only Unicode letters, digits, `_`, and `-`, and at most the
/// first six non-empty tokens survive. Each term is emitted as `"term"*`: the
/// quoting is what keeps hyphenated terms valid FTS5 (a bare interior `-` is
/// a query-syntax error), and the trailing `*` gives prefix-match semantics.
/// Returns an empty string when nothing survives, which disables text search
/// for the request.
pub fn match_expression(raw: &str) -> String {
    let truncated: String = raw.chars().take(MAX_QUERY_CHARS).collect();
    let composed: String = truncated.nfc().collect();
    let cleaned: String = composed
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    let mut terms: Vec<String> = Vec::new();
    for token in cleaned.split_whitespace() {
        let term: String = token
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if term.is_empty() {
            continue;
        }
        terms.push(format!("\"{term}\"*"));
        if terms.len() == MAX_MATCH_TERMS {
            break;
        }
    }
    terms.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_clamps_and_defaults() {
        assert_eq!(parse_clamped(Some("0"), 1, 100, 20), 1);
        assert_eq!(parse_clamped(Some("-5"), 1, 100, 20), 1);
        assert_eq!(parse_clamped(Some("101"), 1, 100, 20), 100);
        assert_eq!(parse_clamped(Some("999999"), 1, 100, 20), 100);
        assert_eq!(parse_clamped(Some("50"), 1, 100, 20), 50);
        assert_eq!(parse_clamped(Some("20.7"), 1, 100, 20), 20);
        assert_eq!(parse_clamped(Some("abc"), 1, 100, 20), 20);
        assert_eq!(parse_clamped(Some(""), 1, 100, 20), 20);
        assert_eq!(parse_clamped(Some("NaN"), 1, 100, 20), 20);
        assert_eq!(parse_clamped(Some("inf"), 1, 100, 20), 20);
        assert_eq!(parse_clamped(None, 1, 100, 20), 20);
    }

    #[test]
    fn offset_clamps_and_defaults() {
        assert_eq!(parse_clamped(Some("-1"), 0, 10_000, 0), 0);
        assert_eq!(parse_clamped(Some("10001"), 0, 10_000, 0), 10_000);
        assert_eq!(parse_clamped(Some("40"), 0, 10_000, 0), 40);
        assert_eq!(parse_clamped(Some("x"), 0, 10_000, 0), 0);
        assert_eq!(parse_clamped(None, 0, 10_000, 0), 0);
    }

    #[test]
    fn sort_falls_back_to_new() {
        assert_eq!(SortMode::parse(Some("popular")), SortMode::Popular);
        assert_eq!(SortMode::parse(Some("relevance")), SortMode::Relevance);
        assert_eq!(SortMode::parse(Some("new")), SortMode::New);
        assert_eq!(SortMode::parse(Some("newest")), SortMode::New);
        assert_eq!(SortMode::parse(Some("POPULAR")), SortMode::New);
        assert_eq!(SortMode::parse(Some("")), SortMode::New);
        assert_eq!(SortMode::parse(None), SortMode::New);
    }

    #[test]
    fn categorical_fields_truncate_to_100_chars() {
        let long = "x".repeat(250);
        let req = ListRequest {
            subject: Some(long),
            ..Default::default()
        };
        let nq = NormalizedQuery::from_request(&req);
        assert_eq!(nq.subject.chars().count(), 100);
        assert!(nq.grade.is_empty());
    }

    #[test]
    fn match_expression_strips_special_syntax() {
        let expr = match_expression("\"; DROP TABLE material; --");
        assert_eq!(expr, "\"DROP\"* \"TABLE\"* \"material\"* \"--\"*");

        let expr = match_expression("NEAR(a b) OR \"unbalanced");
        assert_eq!(expr, "\"NEARa\"* \"b\"* \"OR\"* \"unbalanced\"*");
    }

    #[test]
    fn match_expression_keeps_word_chars_and_hyphens() {
        assert_eq!(
            match_expression("well-known snake_case"),
            "\"well-known\"* \"snake_case\"*"
        );
    }

    #[test]
    fn match_expression_truncates_before_tokenizing() {
        let raw = format!("{} osmosis", "a".repeat(200));
        let expr = match_expression(&raw);
        // The 200-char cut leaves only the leading run; "osmosis" is gone.
        assert_eq!(expr, format!("\"{}\"*", "a".repeat(200)));
    }

    #[test]
    fn match_expression_caps_at_six_terms() {
        let expr = match_expression("one two three four five six seven eight");
        assert_eq!(
            expr,
            "\"one\"* \"two\"* \"three\"* \"four\"* \"five\"* \"six\"*"
        );
    }

    #[test]
    fn match_expression_composes_unicode() {
        // "e" + combining acute composes to a single char.
        let expr = match_expression("cafe\u{301}");
        assert_eq!(expr, "\"caf\u{e9}\"*");
    }

    #[test]
    fn match_expression_drops_controls_and_empty_tokens() {
        assert_eq!(match_expression("a\u{0}b\u{7}c"), "\"abc\"*");
        assert_eq!(match_expression("!!! ??? ..."), "");
        assert_eq!(match_expression("   "), "");
        assert_eq!(match_expression(""), "");
    }

    #[test]
    fn normalized_query_applies_all_defaults() {
        let nq = NormalizedQuery::from_request(&ListRequest::default());
        assert_eq!(nq.limit, DEFAULT_LIMIT);
        assert_eq!(nq.offset, 0);
        assert_eq!(nq.sort, SortMode::New);
        assert!(nq.match_expr.is_empty());
        assert!(!nq.text_search_active());
        assert!(nq.subject.is_empty());
        assert_eq!(nq.favorite_of, None);
    }
}
