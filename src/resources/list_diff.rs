// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ordered-merge comparison of nested resource collections.

/// Change required to turn the current collection into the desired one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange<'a, T> {
    /// Present in desired only
    Added(&'a T),
    /// Present in current only
    Removed(&'a T),
    /// Same key on both sides but different content
    Changed { current: &'a T, desired: &'a T },
}

/// Compare two collections by logical key.
///
/// Both sides are sorted by `key` and walked together; changes are returned in
/// key order. Elements sharing a key and comparing equal produce nothing.
/// Duplicate keys within one side are compared pairwise in sorted order.
pub fn compare_lists<'a, T, K, F>(current: &'a [T], desired: &'a [T], key: F) -> Vec<ListChange<'a, T>>
where
    T: PartialEq,
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut current_sorted: Vec<&T> = current.iter().collect();
    let mut desired_sorted: Vec<&T> = desired.iter().collect();
    current_sorted.sort_by_key(|item| key(item));
    desired_sorted.sort_by_key(|item| key(item));

    let mut changes = Vec::new();
    let mut c = current_sorted.into_iter().peekable();
    let mut d = desired_sorted.into_iter().peekable();

    loop {
        match (c.peek(), d.peek()) {
            (None, None) => break,
            (Some(_), None) => {
                if let Some(item) = c.next() {
                    changes.push(ListChange::Removed(item));
                }
            }
            (None, Some(_)) => {
                if let Some(item) = d.next() {
                    changes.push(ListChange::Added(item));
                }
            }
            (Some(cur), Some(des)) => match key(cur).cmp(&key(des)) {
                std::cmp::Ordering::Less => {
                    if let Some(item) = c.next() {
                        changes.push(ListChange::Removed(item));
                    }
                }
                std::cmp::Ordering::Greater => {
                    if let Some(item) = d.next() {
                        changes.push(ListChange::Added(item));
                    }
                }
                std::cmp::Ordering::Equal => {
                    if let (Some(current), Some(desired)) = (c.next(), d.next()) {
                        if current != desired {
                            changes.push(ListChange::Changed { current, desired });
                        }
                    }
                }
            },
        }
    }

    changes
}

#[cfg(test)]
#[path = "list_diff_tests.rs"]
mod list_diff_tests;
