//! Channel and category selection.
//!
//! Pure functions of their inputs: the returned iterator is lazy, finite
//! and restartable, and preserves the listing order of the channels.

use std::collections::HashSet;

use crate::models::{Category, Channel};

/// Case-insensitive substring check without allocation.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }

    haystack
        .as_bytes()
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Select channels whose category name contains `category_term` and whose
/// own name contains `name_term`, both case-insensitive substrings.
/// An absent or empty term matches everything.
pub fn select<'a>(
    channels: &'a [Channel],
    categories: &'a [Category],
    name_term: Option<&'a str>,
    category_term: Option<&'a str>,
) -> impl Iterator<Item = &'a Channel> + 'a {
    // Resolve the category term to the set of matching category ids once.
    let matching_ids: Option<HashSet<&'a str>> = category_term
        .filter(|term| !term.is_empty())
        .map(|term| {
            categories
                .iter()
                .filter(move |cat| contains_ignore_case(&cat.category_name, term))
                .map(|cat| cat.category_id.as_str())
                .collect()
        });

    channels.iter().filter(move |channel| {
        if let Some(ids) = &matching_ids {
            match &channel.category_id {
                Some(id) if ids.contains(id.as_str()) => {}
                _ => return false,
            }
        }
        match name_term {
            Some(term) if !term.is_empty() => contains_ignore_case(&channel.name, term),
            _ => true,
        }
    })
}
