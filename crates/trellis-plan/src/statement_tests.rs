use crate::statement::AliasMap;

#[test]
fn aliases_are_unique_and_reversible() {
    let mut aliases = AliasMap::new();
    let a = aliases.alias(0, "ID", 63);
    let b = aliases.alias(0, "name", 63);
    let c = aliases.alias(1, "ID", 63);
    assert_ne!(a, b);
    assert_ne!(a, c);

    assert_eq!(aliases.resolve(&a), Some((0, "ID")));
    assert_eq!(aliases.resolve(&c), Some((1, "ID")));
    assert_eq!(aliases.resolve("nope"), None);
}

#[test]
fn alias_allocation_is_idempotent() {
    let mut aliases = AliasMap::new();
    let a = aliases.alias(0, "name", 63);
    let again = aliases.alias(0, "name", 63);
    assert_eq!(a, again);
    assert_eq!(aliases.len(), 1);
}

#[test]
fn non_identifier_characters_are_sanitized() {
    let mut aliases = AliasMap::new();
    let fk = aliases.alias(1, "public.person__O", 63);
    assert!(fk.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    assert_eq!(aliases.resolve(&fk), Some((1, "public.person__O")));
}

#[test]
fn aliases_are_bounded_and_still_unique() {
    let mut aliases = AliasMap::new();
    // Two long columns whose sanitized names collide once truncated.
    let long_a = "x".repeat(100) + "a";
    let long_b = "x".repeat(100) + "b";
    let a = aliases.alias(0, &long_a, 16);
    let b = aliases.alias(0, &long_b, 16);
    assert!(a.len() <= 16);
    assert!(b.len() <= 16);
    assert_ne!(a, b);
    assert_eq!(aliases.resolve(&b), Some((0, long_b.as_str())));
}

#[test]
fn clear_resets_the_map() {
    let mut aliases = AliasMap::new();
    aliases.alias(0, "ID", 63);
    assert!(!aliases.is_empty());
    aliases.clear();
    assert!(aliases.is_empty());
    assert_eq!(aliases.resolve("a0_ID"), None);
}
