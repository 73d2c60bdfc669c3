//! Tests for type pattern resolution

use lens_core::catalog::Pattern;
use lens_core::prelude::*;

fn resolve(name: &str) -> Option<(&'static str, Binding)>
{
    Catalog::runtime().resolve(name).map(|entry| (entry.label, entry.binding))
}

#[test]
fn test_resolves_containers_by_base_name()
{
    assert_eq!(resolve("Vector<int>"), Some(("Vector", Binding::Shape(ShapeKind::Vector))));
    assert_eq!(resolve("HashMap<String, int>"), Some(("HashMap", Binding::Shape(ShapeKind::HashMap))));
    assert_eq!(resolve("List<Ref<Resource>>"), Some(("List", Binding::Shape(ShapeKind::List))));
    assert_eq!(resolve("Dictionary"), Some(("Dictionary", Binding::Shape(ShapeKind::Dictionary))));
    assert_eq!(resolve("TypedArray<Node>"), Some(("TypedArray", Binding::Shape(ShapeKind::Array))));
}

#[test]
fn test_nested_element_types_win_over_their_owner()
{
    assert_eq!(
        resolve("RBMap<int, String>::Element"),
        Some(("RBMap::Element", Binding::Summary(SummaryKind::RBMapElement)))
    );
    assert_eq!(resolve("VMap<String, int>::Pair"), Some(("VMap::Pair", Binding::Summary(SummaryKind::VMapPair))));
    assert_eq!(resolve("RBMap<int, String>"), Some(("RBMap", Binding::Shape(ShapeKind::RBMap))));
}

#[test]
fn test_names_are_normalized_before_matching()
{
    assert_eq!(resolve("const ::engine::Vector<int>").map(|(label, _)| label), Some("Vector"));
    assert_eq!(resolve("  String ").map(|(label, _)| label), Some("String"));
}

#[test]
fn test_exact_names_do_not_match_similar_types()
{
    assert_eq!(resolve("Vector2"), Some(("Vector2", Binding::Summary(SummaryKind::Vector2))));
    assert_eq!(resolve("Vector2i"), Some(("Vector2i", Binding::Summary(SummaryKind::Vector2i))));
    assert!(resolve("Vector").is_none());
    assert!(resolve("Vector<int, int>").is_none());
    assert!(resolve("Node").is_none());
    assert!(resolve("").is_none());
}

#[test]
fn test_first_matching_entry_wins()
{
    let catalog = Catalog::builder()
        .entry("first", Pattern::template("Vector", 1, 1), Binding::Shape(ShapeKind::Vector))
        .entry("second", Pattern::template("Vector", 1, 1), Binding::Shape(ShapeKind::LocalVector))
        .build();
    let entry = catalog.resolve("Vector<float>").unwrap();
    assert_eq!(entry.label, "first");
    assert_eq!(catalog.position("Vector<float>"), Some(0));
    assert_eq!(catalog.entries().len(), 2);
}

#[test]
fn test_session_memoizes_resolution()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let a = rt.new_vector("a", int, [1]).unwrap();
    let b = rt.new_vector("b", int, [2]).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(session.resolved_types(), 0);
    assert_eq!(cx.binding_for("Vector<int>"), Some(Binding::Shape(ShapeKind::Vector)));
    let _ = cx.summary(&a);
    let _ = cx.summary(&b);
    let after_two = session.resolved_types();
    let _ = cx.summary(&a);
    assert_eq!(session.resolved_types(), after_two);
    assert!(cx.binding_for("Unbound").is_none());
}
