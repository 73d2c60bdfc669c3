//! Tests for builtin summaries and the recursion and length bounds

use lens_core::prelude::*;

fn session_with(pairs: &[(&str, &str)]) -> Session
{
    Session::new(Options::from_pairs(pairs.iter().copied()).unwrap())
}

#[test]
fn test_string_summaries()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let hello = rt.new_string("hello", "hello").unwrap();
    let empty = rt.new_string("empty", "").unwrap();
    let ty = rt.char_string();
    let narrow = rt.new_item("narrow", ty, &Item::Str("abc".to_string())).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&hello), "\"hello\"");
    assert_eq!(cx.summary(&empty), EMPTY);
    assert_eq!(cx.summary(&narrow), "\"abc\"");
}

#[test]
fn test_string_sanitizing()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let text = rt.new_string("text", "line\nbreak").unwrap();

    let sanitized = Session::new(Options::default());
    assert_eq!(sanitized.inspector(&image).summary(&text), "\"line\\nbreak\"");

    let raw = session_with(&[("sanitizeStringOutput", "false")]);
    assert_eq!(raw.inspector(&image).summary(&text), "\"line\nbreak\"");
}

#[test]
fn test_long_strings_are_clipped()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let long = rt.new_string("long", &"x".repeat(200)).unwrap();

    let session = Session::new(Options::default());
    let summary = session.inspector(&image).summary(&long);
    assert_eq!(summary, format!("\"{}...\"", "x".repeat(100)));
}

#[test]
fn test_oversized_string_is_annotated()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let text = rt.new_string("text", "abc").unwrap();
    let cow = image.member(&text, "_cowdata._ptr").unwrap();
    let base = Remote::new(&image).pointer_value(&cow).unwrap();
    image.write_unsigned(base - lens_core::remote::COW_SIZE_OFFSET, 0x8000_0000, 8).unwrap();

    let session = Session::new(Options::default());
    assert_eq!(session.inspector(&image).summary(&text), "<invalid> (String.summary)");
}

#[test]
fn test_string_names()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let dynamic = rt.new_string_name("dynamic", "Player").unwrap();
    let ty = rt.string_name();
    let fixed = rt.new_item("fixed", ty, &Item::StaticName("ready".to_string())).unwrap();
    let unset = image.new_value("unset", ty).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&dynamic), "\"Player\"");
    assert_eq!(cx.summary(&fixed), "\"ready\"");
    assert_eq!(cx.summary(&unset), NULL);
}

#[test]
fn test_node_paths()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let absolute = rt.new_node_path("absolute", "/root/Player:position:x").unwrap();
    let relative = rt.new_node_path("relative", "Level/Enemy").unwrap();
    let ty = rt.node_path();
    let unset = image.new_value("unset", ty).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&absolute), "/root/Player:position:x");
    assert_eq!(cx.summary(&relative), "Level/Enemy");
    assert_eq!(cx.summary(&unset), NULL);
}

#[test]
fn test_math_types()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let velocity = rt.new_math("velocity", "Vector2", &[3.5, -1.0]).unwrap();
    let cell = rt.new_math("cell", "Vector3i", &[1.0, 2.0, 3.0]).unwrap();
    let area = rt.new_math("area", "Rect2", &[1.0, 2.0, 3.0, 4.0]).unwrap();
    let xform = rt.new_math("xform", "Transform2D", &[1.0, 0.0, 0.0, 1.0, 5.0, 6.0]).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&velocity), "(3.5, -1.0)");
    assert_eq!(cx.summary(&cell), "(1, 2, 3)");
    assert_eq!(cx.summary(&area), "{position: (1.0, 2.0), size: (3.0, 4.0)}");
    assert_eq!(cx.summary(&xform), "{x: (1.0, 0.0), y: (0.0, 1.0), o: (5.0, 6.0)}");
}

#[test]
fn test_colors_with_and_without_names()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    rt.define_named_colors(&[("RED", [1.0, 0.0, 0.0, 1.0])]).unwrap();
    let red = rt.new_math("red", "Color", &[1.0, 0.0, 0.0, 1.0]).unwrap();
    let gray = rt.new_math("gray", "Color", &[0.5, 0.5, 0.5, 1.0]).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&red), "{<RED> r:1.000, g:0.000, b:0.000, a:1.000}");
    assert_eq!(cx.summary(&gray), "{<#808080ff> r:0.500, g:0.500, b:0.500, a:1.000}");

    let plain = session_with(&[("namedColorAnnotation", "false")]);
    assert_eq!(plain.inspector(&image).summary(&red), "{<#ff0000ff> r:1.000, g:0.000, b:0.000, a:1.000}");
}

#[test]
fn test_identifiers()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let rid_ty = rt.rid();
    let id_ty = rt.object_id();
    let rid = image.new_value("rid", rid_ty).unwrap();
    image.set_unsigned(&rid, "_id", 42).unwrap();
    let id = image.new_value("id", id_ty).unwrap();
    let unset = image.new_value("unset", id_ty).unwrap();
    image.set_unsigned(&id, "id", 9).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&rid), "<RID=42>");
    assert_eq!(cx.summary(&id), "<ObjectID=9>");
    assert_eq!(cx.summary(&unset), "<ObjectID=<null>>");
}

#[test]
fn test_enums_print_names_or_flags()
{
    let mut image = MemoryImage::new();
    let access = image.define_enum("Access", BasicKind::Int, &[("READ", 1), ("WRITE", 2)]);
    let single = image.new_value("single", access).unwrap();
    let both = image.new_value("both", access).unwrap();
    image.write_unsigned(single.address(), 2, 4).unwrap();
    image.write_unsigned(both.address(), 3, 4).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&single), "WRITE");
    assert_eq!(cx.summary(&both), "READ | WRITE");
}

#[test]
fn test_objects_are_never_expanded()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let object = rt.new_object("node", 7).unwrap();

    let session = Session::new(Options::default());
    assert_eq!(session.inspector(&image).summary(&object), TRUNCATED);
}

#[test]
fn test_references_show_their_target()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let counted = rt.ref_counted();
    let int = rt.int();
    let resource = rt.image().define("Resource").base(counted).field("path", int).build();
    let ref_ty = rt.reference(resource);

    let target = image.new_value("target", resource).unwrap();
    image.set_signed(&target, "path", 5).unwrap();
    let held = image.new_value("held", ref_ty).unwrap();
    image.set_pointer(&held, "reference", target.address()).unwrap();
    let empty = image.new_value("empty", ref_ty).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&held), "{[Resource]:{path:5, ...}}");
    assert_eq!(cx.summary(&empty), "{<null>}");
}

#[test]
fn test_self_referential_struct_terminates()
{
    let mut image = MemoryImage::new();
    let int = image.basic(BasicKind::Int);
    let node = image.declare("Node");
    let next = image.pointer_to(node);
    image.complete(node).field("next", next).field("value", int).build();

    let head = image.new_value("head", node).unwrap();
    image.set_pointer(&head, "next", head.address()).unwrap();
    image.set_signed(&head, "value", 1).unwrap();

    let session = Session::new(Options::default());
    assert_eq!(
        session.inspector(&image).summary(&head),
        "{next:{next:{next:{...}, value:1}, value:1}, value:1}"
    );
}

#[test]
fn test_nesting_stops_at_the_depth_limit()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let nested = Item::Array(vec![Item::Array(vec![Item::Int(1)])]);
    let array = rt.new_array("nested", [nested]).unwrap();

    let session = Session::new(Options::default());
    assert_eq!(session.inspector(&image).summary(&array), "Array[1]{Array[1]{Array[1]{{...}}}}");

    let deeper = session_with(&[("maxRecursionDepth", "4")]);
    assert_eq!(deeper.inspector(&image).summary(&array), "Array[1]{Array[1]{Array[1]{1}}}");
}

#[test]
fn test_children_stop_at_the_length_limit()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let numbers = rt.new_vector("numbers", int, 0..50).unwrap();

    let session = Session::new(Options::default());
    assert_eq!(session.inspector(&image).summary(&numbers), "Vector[50]{0, 1, 2, 3, 4, 5, ...}");

    let short = session_with(&[("maxSummaryLength", "20")]);
    assert_eq!(short.inspector(&image).summary(&numbers), "Vector[50]{0, 1, 2, 3, ...}");

    let wide = session_with(&[("maxChildrenInSummary", "2")]);
    assert_eq!(wide.inspector(&image).summary(&numbers), "Vector[50]{0, 1, ...}");
}

#[test]
fn test_summaries_stay_within_the_slack()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let string = rt.string();
    let words: Vec<String> = (0..10).map(|i| format!("{i}{}", "w".repeat(60))).collect();
    let list = rt.new_list("words", string, words).unwrap();

    for max in ["10", "40", "100"] {
        let session = session_with(&[("maxSummaryLength", max)]);
        let summary = session.inspector(&image).summary(&list);
        let limit = max.parse::<usize>().unwrap() + SUMMARY_SLACK;
        assert!(summary.chars().count() <= limit, "{summary}");
        assert!(summary.starts_with("List[10]{"));
    }
}

#[test]
fn test_summaries_are_idempotent()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let string = rt.string();
    let int = rt.int();
    let map = rt.new_hash_map("map", string, int, [("a", 1), ("b", 2)]).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    let first = cx.summary(&map);
    assert_eq!(cx.summary(&map), first);
    assert_eq!(cx.summary(&map), first);
}
