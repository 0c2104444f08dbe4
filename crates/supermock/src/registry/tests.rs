use super::*;
use crate::config::Config;
use crate::routing::RouteCompiler;
use crate::store::{Database, MemoryPersistence};
use crate::strategy::StrategyContext;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Registry whose route refreshes run inline.
fn registry() -> RuleRegistry {
    let db = Arc::new(Mutex::new(Database::default()));
    let ctx = Arc::new(StrategyContext::new(&Config::default()).unwrap());
    let compiler = RouteCompiler::new(Arc::clone(&db), ctx, Duration::ZERO);
    RuleRegistry::new(db, compiler, Box::new(MemoryPersistence::new()))
}

fn static_rule(path: &str) -> Rule {
    Rule {
        data: Some(r#"{"ok":true}"#.to_string()),
        ..Rule::with_path(path)
    }
}

/// Space with one group, returning (space id, group id).
fn seeded(reg: &RuleRegistry, path: &str) -> (String, String) {
    let space = reg.add_space(path, None).unwrap();
    let group = reg.add_group(&space.id, "default", None).unwrap();
    (space.id, group.id)
}

// ---------------------------------------------------------------------------
// Spaces
// ---------------------------------------------------------------------------

#[test]
fn test_add_space_strips_slashes_and_assigns_ids() {
    let reg = registry();
    let a = reg.add_space("//api", Some("public".into())).unwrap();
    let b = reg.add_space("admin", None).unwrap();

    assert_eq!(a.id, "1");
    assert_eq!(a.path, "api");
    assert_eq!(a.description.as_deref(), Some("public"));
    assert_eq!(b.id, "2");
    assert_eq!(reg.list_spaces().len(), 2);
}

#[test]
fn test_add_space_rejects_duplicate_and_empty_paths() {
    let reg = registry();
    reg.add_space("/api", None).unwrap();

    assert!(matches!(
        reg.add_space("api", None),
        Err(RegistryError::Conflict(_))
    ));
    assert!(matches!(
        reg.add_space("///", None),
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        reg.add_space("", None),
        Err(RegistryError::Validation(_))
    ));
    assert_eq!(reg.list_spaces().len(), 1);
}

#[test]
fn test_update_space_keeps_group_order() {
    let reg = registry();
    let (space_id, group_id) = seeded(&reg, "api");
    reg.add_space("other", None).unwrap();

    let conflict = reg.update_space(SpaceUpdate {
        id: Some(space_id.clone()),
        path: Some("/other".into()),
        description: None,
    });
    assert!(matches!(conflict, Err(RegistryError::Conflict(_))));

    // Keeping its own path is not a collision
    let updated = reg
        .update_space(SpaceUpdate {
            id: Some(space_id.clone()),
            path: Some("api".into()),
            description: Some("renamed".into()),
        })
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("renamed"));
    assert_eq!(updated.group_ids, vec![group_id]);
}

#[test]
fn test_update_space_requires_id_and_path() {
    let reg = registry();
    let missing_id = reg.update_space(SpaceUpdate {
        path: Some("x".into()),
        ..Default::default()
    });
    assert!(matches!(missing_id, Err(RegistryError::Validation(_))));

    let missing_path = reg.update_space(SpaceUpdate {
        id: Some("1".into()),
        ..Default::default()
    });
    assert!(matches!(missing_path, Err(RegistryError::Validation(_))));

    let unknown = reg.update_space(SpaceUpdate {
        id: Some("42".into()),
        path: Some("x".into()),
        description: None,
    });
    assert!(matches!(unknown, Err(RegistryError::NotFound { .. })));
}

#[test]
fn test_remove_space_cascades() {
    let reg = registry();
    let (space_id, group_id) = seeded(&reg, "api");
    let rule = reg.add_rule(&group_id, static_rule("users"), None).unwrap();

    let removed = reg.remove_space(&space_id).unwrap();
    assert_eq!(removed.id, space_id);
    assert!(reg.get_group(&group_id).is_none());
    assert!(reg.get_rule(&rule.id).is_none());
    assert!(reg.compiler().current().is_empty());

    assert!(matches!(
        reg.remove_space(&space_id),
        Err(RegistryError::NotFound { kind: "space", .. })
    ));
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[test]
fn test_add_group_validates_and_inserts_at_index() {
    let reg = registry();
    let space = reg.add_space("api", None).unwrap();

    assert!(matches!(
        reg.add_group("99", "g", None),
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        reg.add_group(&space.id, "  ", None),
        Err(RegistryError::Validation(_))
    ));

    let first = reg.add_group(&space.id, "first", None).unwrap();
    let second = reg.add_group(&space.id, "second", None).unwrap();
    let front = reg.add_group(&space.id, "front", Some(0)).unwrap();
    let clamped = reg.add_group(&space.id, "end", Some(100)).unwrap();

    let order = reg.get_space(&space.id).unwrap().group_ids;
    assert_eq!(order, vec![front.id, first.id, second.id, clamped.id]);
}

#[test]
fn test_update_group_renames_only() {
    let reg = registry();
    let (_, group_id) = seeded(&reg, "api");
    let rule = reg.add_rule(&group_id, static_rule("a"), None).unwrap();

    let group = reg
        .update_group(GroupUpdate {
            id: Some(group_id.clone()),
            name: Some("renamed".into()),
        })
        .unwrap();
    assert_eq!(group.name, "renamed");
    assert_eq!(group.rule_ids, vec![rule.id]);
}

#[test]
fn test_remove_group_cascades_and_unlinks() {
    let reg = registry();
    let (space_id, group_id) = seeded(&reg, "api");
    let keep = reg.add_group(&space_id, "keep", None).unwrap();
    let rule = reg.add_rule(&group_id, static_rule("a"), None).unwrap();

    assert!(matches!(
        reg.remove_group(&group_id, "99"),
        Err(RegistryError::NotFound { kind: "space", .. })
    ));
    assert!(matches!(
        reg.remove_group(&keep.id, "99"),
        Err(RegistryError::NotFound { .. })
    ));

    reg.remove_group(&group_id, &space_id).unwrap();
    assert_eq!(reg.get_space(&space_id).unwrap().group_ids, vec![keep.id]);
    assert!(reg.get_rule(&rule.id).is_none());
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[test]
fn test_add_rule_applies_defaults() {
    let reg = registry();
    let (_, group_id) = seeded(&reg, "api");

    let rule = reg
        .add_rule(&group_id, Rule::with_path("//users/:id"), None)
        .unwrap();
    assert_eq!(rule.id, "1");
    assert_eq!(rule.path, "users/:id");
    assert_eq!(rule.method, METHOD_ALL);
    assert_eq!(rule.rule_type, DEFAULT_RULE_TYPE);

    let post = reg
        .add_rule(
            &group_id,
            Rule {
                method: "POST".into(),
                rule_type: "Proxy".into(),
                ..Rule::with_path("orders")
            },
            Some(0),
        )
        .unwrap();
    assert_eq!(post.method, "post");
    assert_eq!(post.rule_type, "proxy");
    assert_eq!(
        reg.get_group(&group_id).unwrap().rule_ids,
        vec![post.id, rule.id]
    );
}

#[test]
fn test_add_rule_validation() {
    let reg = registry();
    let (_, group_id) = seeded(&reg, "api");

    assert!(matches!(
        reg.add_rule("99", static_rule("a"), None),
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        reg.add_rule(&group_id, Rule::with_path(""), None),
        Err(RegistryError::Validation(_))
    ));
    assert!(reg.get_group(&group_id).unwrap().rule_ids.is_empty());
}

#[test]
fn test_update_rule_keeps_position() {
    let reg = registry();
    let (_, group_id) = seeded(&reg, "api");
    let a = reg.add_rule(&group_id, static_rule("a"), None).unwrap();
    let b = reg.add_rule(&group_id, static_rule("b"), None).unwrap();

    let updated = reg
        .update_rule(Rule {
            id: a.id.clone(),
            method: "GET".into(),
            status_code: Some(201),
            ..static_rule("/renamed")
        })
        .unwrap();
    assert_eq!(updated.path, "renamed");
    assert_eq!(updated.method, "get");
    assert_eq!(reg.get_rule(&a.id).unwrap().status_code, Some(201));
    assert_eq!(reg.get_group(&group_id).unwrap().rule_ids, vec![a.id, b.id]);

    assert!(matches!(
        reg.update_rule(Rule {
            id: "99".into(),
            ..static_rule("x")
        }),
        Err(RegistryError::NotFound { kind: "rule", .. })
    ));
    assert!(matches!(
        reg.update_rule(static_rule("x")),
        Err(RegistryError::Validation(_))
    ));
}

#[test]
fn test_remove_rule_requires_membership() {
    let reg = registry();
    let (space_id, group_id) = seeded(&reg, "api");
    let other = reg.add_group(&space_id, "other", None).unwrap();
    let rule = reg.add_rule(&group_id, static_rule("a"), None).unwrap();

    assert!(matches!(
        reg.remove_rule(&rule.id, &other.id),
        Err(RegistryError::NotFound { kind: "rule", .. })
    ));
    assert!(reg.get_rule(&rule.id).is_some());

    reg.remove_rule(&rule.id, &group_id).unwrap();
    assert!(reg.get_rule(&rule.id).is_none());
    assert!(reg.get_group(&group_id).unwrap().rule_ids.is_empty());
}

#[test]
fn test_ids_are_never_reused() {
    let reg = registry();
    let (_, group_id) = seeded(&reg, "api");
    let a = reg.add_rule(&group_id, static_rule("a"), None).unwrap();
    reg.remove_rule(&a.id, &group_id).unwrap();
    let b = reg.add_rule(&group_id, static_rule("b"), None).unwrap();

    assert_eq!(a.id, "1");
    assert_eq!(b.id, "2");
}

#[test]
fn test_move_rule_between_groups() {
    let reg = registry();
    let (space_id, from) = seeded(&reg, "api");
    let to = reg.add_group(&space_id, "to", None).unwrap();
    let existing = reg.add_rule(&to.id, static_rule("x"), None).unwrap();
    let rule = reg.add_rule(&from, static_rule("a"), None).unwrap();

    let moved = reg.move_rule(&rule.id, &from, &to.id, Some(0), false).unwrap();
    assert_eq!(moved.id, rule.id);
    assert!(reg.get_group(&from).unwrap().rule_ids.is_empty());
    assert_eq!(
        reg.get_group(&to.id).unwrap().rule_ids,
        vec![rule.id.clone(), existing.id]
    );
}

#[test]
fn test_copy_rule_across_spaces() {
    let reg = registry();
    let (_, from) = seeded(&reg, "api");
    let (other_space, to) = seeded(&reg, "v2");
    let rule = reg.add_rule(&from, static_rule("a"), None).unwrap();

    let copy = reg.move_rule(&rule.id, &from, &to, None, true).unwrap();
    assert_ne!(copy.id, rule.id);
    assert_eq!(copy.path, rule.path);
    assert_eq!(reg.get_group(&from).unwrap().rule_ids, vec![rule.id]);
    assert_eq!(reg.get_group(&to).unwrap().rule_ids, vec![copy.id]);

    // Both spaces were recompiled
    let tree = reg.compiler().current();
    assert_eq!(tree.space(&other_space).map(|s| s.len()), Some(1));
    assert_eq!(tree.len(), 2);
}

#[test]
fn test_move_rule_rejects_unknown_ids() {
    let reg = registry();
    let (_, from) = seeded(&reg, "api");
    let rule = reg.add_rule(&from, static_rule("a"), None).unwrap();

    assert!(matches!(
        reg.move_rule(&rule.id, &from, "99", None, false),
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        reg.move_rule("99", &from, &from, None, false),
        Err(RegistryError::NotFound { .. })
    ));
    assert_eq!(reg.get_group(&from).unwrap().rule_ids, vec![rule.id]);
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn test_sort_group_requires_exact_permutation() {
    let reg = registry();
    let space = reg.add_space("api", None).unwrap();
    let a = reg.add_group(&space.id, "a", None).unwrap().id;
    let b = reg.add_group(&space.id, "b", None).unwrap().id;

    let sorted = reg.sort_group(&space.id, &[b.clone(), a.clone()]).unwrap();
    assert_eq!(sorted.group_ids, vec![b.clone(), a.clone()]);

    for bad in [
        vec![a.clone()],
        vec![a.clone(), a.clone()],
        vec![a.clone(), "99".to_string()],
        vec![a.clone(), b.clone(), "99".to_string()],
    ] {
        assert!(matches!(
            reg.sort_group(&space.id, &bad),
            Err(RegistryError::Conflict(_))
        ));
    }
    assert_eq!(reg.get_space(&space.id).unwrap().group_ids, vec![b, a]);
}

#[test]
fn test_sort_rule_changes_precedence() {
    let reg = registry();
    let (_, group_id) = seeded(&reg, "api");
    let first = reg.add_rule(&group_id, static_rule("same"), None).unwrap();
    let second = reg.add_rule(&group_id, static_rule("same"), None).unwrap();

    let tree = reg.compiler().current();
    let winner = &tree.candidates(&hyper::Method::GET, "/api/same")[0];
    assert_eq!(winner.dispatcher.rule().id, second.id);

    reg.sort_rule(&group_id, &[second.id.clone(), first.id.clone()])
        .unwrap();
    let tree = reg.compiler().current();
    let winner = &tree.candidates(&hyper::Method::GET, "/api/same")[0];
    assert_eq!(winner.dispatcher.rule().id, first.id);

    assert!(matches!(
        reg.sort_rule(&group_id, &[first.id]),
        Err(RegistryError::Conflict(_))
    ));
}

#[test]
fn test_space_detail_in_routing_order() {
    let reg = registry();
    let (space_id, g1) = seeded(&reg, "api");
    let g2 = reg.add_group(&space_id, "second", None).unwrap().id;
    let r2 = reg.add_rule(&g2, static_rule("b"), None).unwrap();
    let r1 = reg.add_rule(&g1, static_rule("a"), None).unwrap();

    let detail = reg.space_detail(&space_id).unwrap();
    assert_eq!(detail.groups.len(), 2);
    let ids: Vec<_> = detail.rules.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![r1.id, r2.id]);
    assert!(reg.space_detail("99").is_none());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn prop_sort_accepts_only_permutations(
        count in 1usize..6,
        order in proptest::collection::vec(0usize..8, 0..8),
    ) {
        let reg = registry();
        let (_, group_id) = seeded(&reg, "api");
        let ids: Vec<String> = (0..count)
            .map(|i| reg.add_rule(&group_id, static_rule(&format!("r{i}")), None).unwrap().id)
            .collect();
        let before = reg.get_group(&group_id).unwrap().rule_ids;

        let requested: Vec<String> = order.iter().map(|i| (i + 1).to_string()).collect();
        let mut sorted_req = requested.clone();
        sorted_req.sort();
        let mut sorted_ids = ids.clone();
        sorted_ids.sort();
        let is_permutation = sorted_req == sorted_ids;

        match reg.sort_rule(&group_id, &requested) {
            Ok(group) => {
                prop_assert!(is_permutation);
                prop_assert_eq!(group.rule_ids, requested);
            }
            Err(RegistryError::Conflict(_)) => {
                prop_assert!(!is_permutation);
                prop_assert_eq!(reg.get_group(&group_id).unwrap().rule_ids, before);
            }
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }

    #[test]
    fn prop_order_lists_track_surviving_children(
        ops in proptest::collection::vec((0u8..4, 0usize..8, any::<bool>()), 1..40)
    ) {
        let reg = registry();
        let space = reg.add_space("api", None).unwrap();
        let mut groups: Vec<String> = Vec::new();
        let mut rules: HashMap<String, Vec<String>> = HashMap::new();

        for (op, pos, at_index) in ops {
            let index = at_index.then_some(pos);
            match op {
                0 => {
                    let group = reg.add_group(&space.id, "g", index).unwrap();
                    let at = index.map_or(groups.len(), |i| i.min(groups.len()));
                    groups.insert(at, group.id.clone());
                    rules.insert(group.id, Vec::new());
                }
                1 if !groups.is_empty() => {
                    let id = groups.remove(pos % groups.len());
                    reg.remove_group(&id, &space.id).unwrap();
                    rules.remove(&id);
                }
                2 if !groups.is_empty() => {
                    let group_id = &groups[pos % groups.len()];
                    let rule = reg.add_rule(group_id, static_rule("r"), index).unwrap();
                    let list = rules.get_mut(group_id).unwrap();
                    let at = index.map_or(list.len(), |i| i.min(list.len()));
                    list.insert(at, rule.id);
                }
                3 => {
                    let Some((group_id, list)) = rules
                        .iter_mut()
                        .filter(|(_, list)| !list.is_empty())
                        .min_by_key(|(id, _)| id.parse::<u64>().unwrap_or(0))
                    else {
                        continue;
                    };
                    let id = list.remove(pos % list.len());
                    reg.remove_rule(&id, group_id).unwrap();
                }
                _ => continue,
            }

            prop_assert_eq!(&reg.get_space(&space.id).unwrap().group_ids, &groups);
            for (group_id, expected) in &rules {
                prop_assert_eq!(&reg.get_group(group_id).unwrap().rule_ids, expected);
            }
        }
    }

    #[test]
    fn prop_ids_increase_monotonically(
        ops in proptest::collection::vec((0u8..3, any::<bool>()), 1..40)
    ) {
        let reg = registry();
        let (space_id, group_id) = seeded(&reg, "api");
        // [spaces, groups, rules]
        let mut live: [Vec<String>; 3] = [vec![space_id], vec![group_id.clone()], Vec::new()];
        let mut last = [1u64, 1, 0];
        let mut spaces_made = 0;

        for (kind, add) in ops {
            let kind = kind as usize;
            // The seeded space and group stay so rules always have a parent
            let removable = match kind {
                0 | 1 => live[kind].len() > 1,
                _ => !live[kind].is_empty(),
            };
            if add || !removable {
                let id = match kind {
                    0 => {
                        spaces_made += 1;
                        reg.add_space(&format!("s{spaces_made}"), None).unwrap().id
                    }
                    1 => reg.add_group(&live[0][0], "g", None).unwrap().id,
                    _ => reg.add_rule(&group_id, static_rule("r"), None).unwrap().id,
                };
                let n: u64 = id.parse().unwrap();
                prop_assert!(n > last[kind]);
                last[kind] = n;
                live[kind].push(id);
            } else {
                let id = live[kind].remove(live[kind].len() - 1);
                match kind {
                    0 => {
                        reg.remove_space(&id).unwrap();
                    }
                    1 => {
                        reg.remove_group(&id, &live[0][0]).unwrap();
                    }
                    _ => {
                        reg.remove_rule(&id, &group_id).unwrap();
                    }
                }
            }
        }
    }
}
