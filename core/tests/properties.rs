use std::cmp::Ordering;

use proptest::prelude::*;
use ptree_core::classify::compare_siblings;
use ptree_core::{
    classify_entity, fix, load_effective_config, merge, parse, parse_with_options, print,
    validate, Config, EntityKind,
};
use serde_json::{json, Value};

/// One generated node: requested depth, base name, directory flag, comment flag.
type Entry = (usize, String, bool, bool);

fn entry() -> impl Strategy<Value = Entry> {
    (
        0usize..3,
        "[a-zA-Z0-9][a-zA-Z0-9_-]{0,6}(\\.[a-zA-Z]{1,3}){0,2}",
        any::<bool>(),
        any::<bool>(),
    )
}

/// Tree documents without depth jumps, optionally carrying spec headers.
fn tree_text() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just(""), Just("@ptree: spec\n"), Just("@ptree: 1.0\n# layout\n\n")],
        prop_oneof![
            Just("ROOT//"),
            Just("APP_0.1.0//"),
            Just("PTREE-2.0.0//"),
            Just("./some/path")
        ],
        prop::collection::vec(entry(), 0..12),
    )
        .prop_map(|(header, root, entries)| {
            let mut lines = vec![format!("{header}{root}")];
            let mut previous: Option<usize> = None;
            for (depth, name, dir, comment) in entries {
                let depth = previous.map_or(0, |prev| depth.min(prev + 1));
                previous = Some(depth);
                let mut line = format!("{}├── {name}", "│   ".repeat(depth));
                if dir {
                    line.push('/');
                }
                if comment {
                    line.push_str("  # note");
                }
                lines.push(line);
            }
            lines.join("\n")
        })
}

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-5i64..5).prop_map(Value::from),
        "[a-z]{0,3}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
            prop::collection::btree_map("[a-c]", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn sorting_config() -> Config {
    load_effective_config(None, Some(&json!({ "RULES": { "PT009": true } }))).unwrap()
}

proptest! {
    #[test]
    fn parse_is_total_and_prints_back(
        lines in prop::collection::vec("\\PC{0,24}", 0..8),
        ending in prop_oneof![Just(""), Just("\n"), Just("\n\n"), Just("\n\n\n")],
    ) {
        let text = format!("{}{ending}", lines.join("\n"));
        let doc = parse(&text);
        prop_assert_eq!(parse(&print(&doc)), doc);
    }

    #[test]
    fn generated_trees_round_trip(text in tree_text()) {
        let doc = parse(&text);
        let reparsed = parse(&print(&doc));
        prop_assert_eq!(&reparsed, &doc);
        prop_assert_eq!(print(&doc), text);
    }

    #[test]
    fn fixing_is_idempotent(text in tree_text()) {
        let cfg = sorting_config();
        let first = fix(&text, &parse_with_options(&text, &cfg.parse_options()), &cfg);
        let doc = parse_with_options(&first.fixed_text, &cfg.parse_options());
        let second = fix(&first.fixed_text, &doc, &cfg);
        prop_assert!(second.applied.is_empty(), "{:?}", second.applied);
        prop_assert_eq!(&second.fixed_text, &first.fixed_text);

        let before = parse(&text);
        prop_assert_eq!(doc.nodes.len(), before.nodes.len());
        let comments = |d: &ptree_core::Document| {
            d.nodes.iter().filter(|n| n.inline_metadata.is_some()).count()
        };
        prop_assert_eq!(comments(&doc), comments(&before));
    }

    #[test]
    fn validation_is_deterministic(text in tree_text()) {
        let cfg = sorting_config();
        let doc = parse_with_options(&text, &cfg.parse_options());
        let first = validate(&doc, &cfg);
        prop_assert_eq!(validate(&doc, &cfg), first.clone());
        let mut sorted = first.clone();
        sorted.sort_by(|a, b| (a.line, a.start_col, a.code).cmp(&(b.line, b.start_col, b.code)));
        prop_assert_eq!(sorted, first);
    }

    #[test]
    fn sibling_comparator_is_a_weak_order(
        a in "[a-zA-Z0-9._-]{1,6}/{0,2}",
        b in "[a-zA-Z0-9._-]{1,6}/{0,2}",
        c in "[a-zA-Z0-9._-]{1,6}/{0,2}",
        case_sensitive in any::<bool>(),
    ) {
        prop_assert_eq!(compare_siblings(&a, &a, case_sensitive), Ordering::Equal);
        prop_assert_eq!(
            compare_siblings(&a, &b, case_sensitive),
            compare_siblings(&b, &a, case_sensitive).reverse()
        );
        if compare_siblings(&a, &b, case_sensitive) != Ordering::Greater
            && compare_siblings(&b, &c, case_sensitive) != Ordering::Greater
        {
            prop_assert_ne!(compare_siblings(&a, &c, case_sensitive), Ordering::Greater);
        }
        if classify_entity(&a).is_container() && !classify_entity(&b).is_container() {
            prop_assert_eq!(compare_siblings(&a, &b, case_sensitive), Ordering::Less);
        }
    }

    #[test]
    fn merge_is_associative(a in json_value(), b in json_value(), c in json_value()) {
        prop_assert_eq!(merge(&merge(&a, &b), &c), merge(&a, &merge(&b, &c)));
    }

    #[test]
    fn empty_object_is_merge_identity(
        map in prop::collection::btree_map("[a-c]", json_value(), 0..4)
    ) {
        let doc = Value::Object(map.into_iter().collect());
        let empty = json!({});
        prop_assert_eq!(merge(&doc, &empty), doc.clone());
        prop_assert_eq!(merge(&empty, &doc), doc);
    }

    #[test]
    fn classification_depends_only_on_trailing_slashes(
        stem in "[a-zA-Z0-9._ -]{0,8}[a-zA-Z0-9._-]"
    ) {
        prop_assert_eq!(classify_entity(&stem), EntityKind::File);
        prop_assert_eq!(classify_entity(&format!("{stem}/")), EntityKind::Dir);
        prop_assert_eq!(classify_entity(&format!("{stem}//")), EntityKind::Meta);
        prop_assert_eq!(classify_entity(&stem), classify_entity(&stem));
    }
}

#[test]
fn scenario_flat_tree() {
    let doc = parse("ROOT//\n├── file.txt\n└── dir/");
    assert_eq!(doc.nodes.len(), 2);
    assert!(doc.nodes.iter().all(|n| n.depth == 0));
    assert!(!doc.nodes[1].has_children);
    assert!(doc.errors.is_empty());
}

#[test]
fn scenario_depth_jump() {
    let doc = parse("ROOT//\n├── top.txt\n│       └── deep.txt");
    assert_eq!(doc.errors.len(), 1);
    assert_eq!(doc.errors[0].line, 3);
}
