// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `list_diff.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Share {
        name: &'static str,
        quota: u32,
    }

    fn share(name: &'static str, quota: u32) -> Share {
        Share { name, quota }
    }

    #[test]
    fn test_identical_lists_have_no_changes() {
        let current = vec![share("a", 1), share("b", 2)];
        let desired = vec![share("b", 2), share("a", 1)];
        assert!(compare_lists(&current, &desired, |s| s.name).is_empty());
    }

    #[test]
    fn test_add_remove_and_change_in_key_order() {
        let current = vec![share("c", 1), share("a", 1), share("b", 5)];
        let desired = vec![share("d", 1), share("b", 10), share("a", 1)];

        let changes = compare_lists(&current, &desired, |s| s.name);
        assert_eq!(
            changes,
            vec![
                ListChange::Changed {
                    current: &current[2],
                    desired: &desired[1],
                },
                ListChange::Removed(&current[0]),
                ListChange::Added(&desired[0]),
            ]
        );
    }

    #[test]
    fn test_empty_current_adds_everything() {
        let current: Vec<Share> = Vec::new();
        let desired = vec![share("x", 1), share("y", 1)];
        let changes = compare_lists(&current, &desired, |s| s.name);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| matches!(c, ListChange::Added(_))));
    }

    #[test]
    fn test_empty_desired_removes_everything() {
        let current = vec![share("x", 1)];
        let desired: Vec<Share> = Vec::new();
        assert_eq!(
            compare_lists(&current, &desired, |s| s.name),
            vec![ListChange::Removed(&current[0])]
        );
    }

    #[test]
    fn test_string_lists_by_value() {
        let current = vec!["www.example.com".to_string()];
        let desired = vec!["api.example.com".to_string(), "www.example.com".to_string()];
        let changes = compare_lists(&current, &desired, Clone::clone);
        assert_eq!(changes, vec![ListChange::Added(&desired[0])]);
    }
}
