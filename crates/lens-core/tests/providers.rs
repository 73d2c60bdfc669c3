//! Tests for the container providers

use lens_core::prelude::*;

fn summary_of(image: &MemoryImage, value: &RemoteValue) -> String
{
    let session = Session::new(Options::default());
    session.inspector(image).summary(value)
}

fn keyed_session() -> Session
{
    let mut session = Session::new(Options::default());
    session.set_option("mapDisplayStyle", "keyed").unwrap();
    session
}

fn names(children: &[RemoteValue]) -> Vec<&str>
{
    children.iter().map(RemoteValue::name).collect()
}

/// First and last node of a `List<T>`
fn list_ends(image: &MemoryImage, list: &RemoteValue) -> (RemoteValue, RemoteValue)
{
    let remote = Remote::new(image);
    let block = remote.deref(&remote.field(list, "_data").unwrap()).unwrap();
    let first = remote.deref(&remote.field(&block, "first").unwrap()).unwrap();
    let last = remote.deref(&remote.field(&block, "last").unwrap()).unwrap();
    (first, last)
}

fn cow_base(image: &MemoryImage, value: &RemoteValue, path: &[&str]) -> Address
{
    let remote = Remote::new(image);
    remote.pointer_value(&remote.field_path(value, path).unwrap()).unwrap()
}

// ---- linked lists ---------------------------------------------------------

#[test]
fn test_list_summary_and_children()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let list = rt.new_list("numbers", int, [1, 2, 3]).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&list), "List[3]{1, 2, 3}");

    let handle = cx.open(&list).unwrap();
    assert!(handle.is_valid());
    assert_eq!(handle.child_count(), 3);
    let children = handle.children(&cx);
    assert_eq!(names(&children), ["[0]", "[1]", "[2]"]);
    assert_eq!(cx.summary(&children[2]), "3");
    assert_eq!(handle.index_of_child(&cx, "[1]"), Some(1));
    assert_eq!(handle.index_of_child(&cx, "[3]"), None);
}

#[test]
fn test_empty_list_is_valid()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let list = rt.new_list("empty", int, Vec::<i32>::new()).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&list), "List[0]{}");
    let handle = cx.open(&list).unwrap();
    assert!(handle.is_valid());
    assert_eq!(handle.child_count(), 0);
}

#[test]
fn test_list_with_broken_head_is_invalid()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let list = rt.new_list("numbers", int, [1, 2, 3]).unwrap();
    let (first, last) = list_ends(&image, &list);
    image.set_pointer(&first, "prev_ptr", last.address()).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&list), INVALID);
    let handle = cx.open(&list).unwrap();
    assert!(!handle.is_valid());
    assert_eq!(handle.child_count(), 0);
    assert!(handle.children(&cx).is_empty());
}

#[test]
fn test_list_with_broken_tail_is_invalid()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let list = rt.new_list("numbers", int, [1, 2]).unwrap();
    let (first, last) = list_ends(&image, &list);
    image.set_pointer(&last, "next_ptr", first.address()).unwrap();
    assert_eq!(summary_of(&image, &list), INVALID);
}

#[test]
fn test_list_with_freed_node_is_invalid()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let list = rt.new_list("numbers", int, [1, 2, 3]).unwrap();
    let (_, last) = list_ends(&image, &list);
    assert!(image.unmap(last.address()));
    assert_eq!(summary_of(&image, &list), INVALID);
}

#[test]
fn test_list_beyond_the_cache_ceiling()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let list = rt.new_list("numbers", int, 1..=10).unwrap();

    let options = Options::from_pairs([("cacheFetchWindow", "4"), ("cachePrefetch", "2")]).unwrap();
    let session = Session::new(options);
    let cx = session.inspector(&image);
    let handle = cx.open(&list).unwrap();
    assert_eq!(handle.child_count(), 10);
    let last = handle.child_at(&cx, 9).unwrap();
    assert_eq!(last.name(), "[9]");
    assert_eq!(cx.summary(&last), "10");
    assert!(handle.child_at(&cx, 10).is_none());
}

#[test]
fn test_list_shorter_than_its_count_is_invalid()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let list = rt.new_list("numbers", int, [1, 2, 3]).unwrap();
    let remote = Remote::new(&image);
    let block = remote.deref(&remote.field(&list, "_data").unwrap()).unwrap();
    image.set_unsigned(&block, "size_cache", 3_000_000).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&list), INVALID);
    let handle = cx.open(&list).unwrap();
    assert!(!handle.is_valid());
    assert_eq!(handle.child_count(), 0);
    assert!(handle.children(&cx).is_empty());
}

#[test]
fn test_list_walk_stops_where_the_chain_ends()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let list = rt.new_list("numbers", int, [1, 2, 3]).unwrap();
    let remote = Remote::new(&image);
    let block = remote.deref(&remote.field(&list, "_data").unwrap()).unwrap();
    image.set_unsigned(&block, "size_cache", 3_000_000).unwrap();

    // A prefetch this small only finds the break while walking
    let options = Options::from_pairs([("cacheFetchWindow", "2"), ("cachePrefetch", "1")]).unwrap();
    let session = Session::new(options);
    let cx = session.inspector(&image);
    let handle = cx.open(&list).unwrap();
    assert_eq!(handle.child_count(), 3_000_000);

    let children = handle.children(&cx);
    assert_eq!(names(&children), ["[0]", "[1]", "[2]"]);
    assert!(!handle.is_valid());
    assert_eq!(handle.child_count(), 0);
}

// ---- maps -----------------------------------------------------------------

#[test]
fn test_hash_map_indexed_style()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let (string, int) = (rt.string(), rt.int());
    let map = rt.new_hash_map("m", string, int, [("k1", 1), ("k2", 2)]).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&map), r#"HashMap[2]{["k1"]: 1, ["k2"]: 2}"#);

    let children = cx.children(&map);
    assert_eq!(names(&children), ["[0]", "[1]"]);
    assert_eq!(cx.summary(&children[1]), r#""k2": 2"#);
}

#[test]
fn test_hash_map_keyed_style()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let (string, int) = (rt.string(), rt.int());
    let pairs = [("k1", 1), ("k2", 2), ("k3", 3), ("k4", 4), ("k5", 5)];
    let map = rt.new_hash_map("m", string, int, pairs).unwrap();

    let session = keyed_session();
    let cx = session.inspector(&image);
    let handle = cx.open(&map).unwrap();
    assert_eq!(handle.child_count(), 5);

    assert_eq!(handle.lookup_by_key(&cx, "k3"), Some(2));
    assert_eq!(handle.lookup_by_key(&cx, r#""k3""#), Some(2));
    assert_eq!(handle.index_of_child(&cx, r#"["k2"]"#), Some(1));

    let children = handle.children(&cx);
    assert_eq!(
        names(&children),
        [r#"["k1"]"#, r#"["k2"]"#, r#"["k3"]"#, r#"["k4"]"#, r#"["k5"]"#]
    );
    assert_eq!(cx.summary(&children[0]), "1");

    // Every key is indexed by now, so a miss is a real absence
    assert_eq!(handle.lookup_by_key(&cx, "k9"), None);
    assert_eq!(handle.lookup_by_key(&cx, "k5"), Some(4));

    // The summary keeps the pair form in both styles
    assert_eq!(
        handle.summary(&cx),
        r#"HashMap[5]{["k1"]: 1, ["k2"]: 2, ["k3"]: 3, ["k4"]: 4, ["k5"]: 5}"#
    );
}

#[test]
fn test_map_styles_agree_on_children()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let (string, int) = (rt.string(), rt.int());
    let map = rt.new_hash_map("m", string, int, [("a", 1), ("b", 2), ("c", 3)]).unwrap();

    let indexed = Session::new(Options::default());
    let keyed = keyed_session();
    let indexed_cx = indexed.inspector(&image);
    let keyed_cx = keyed.inspector(&image);
    let by_index = indexed_cx.open(&map).unwrap();
    let by_key = keyed_cx.open(&map).unwrap();

    assert_eq!(by_index.child_count(), by_key.child_count());
    let indexed_children = by_index.children(&indexed_cx);
    let keyed_children = by_key.children(&keyed_cx);
    assert_eq!(indexed_children.len(), keyed_children.len());
    let remote = Remote::new(&image);
    for (pair, named) in indexed_children.iter().zip(&keyed_children) {
        let value = remote.field(pair, "value").unwrap();
        assert_eq!(indexed_cx.summary(&value), keyed_cx.summary(named));
    }
    assert_eq!(by_index.summary(&indexed_cx), by_key.summary(&keyed_cx));
}

#[test]
fn test_lookup_walks_past_the_first_window()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let (int, string) = (rt.int(), rt.string());
    let pairs: Vec<(i32, String)> = (0..20).map(|i| (i, format!("v{i}"))).collect();
    let map = rt.new_hash_map("m", int, string, pairs).unwrap();

    let mut session = Session::new(Options::from_pairs([("cacheFetchWindow", "3"), ("cachePrefetch", "1")]).unwrap());
    session.set_option("mapDisplayStyle", "keyed").unwrap();
    let cx = session.inspector(&image);
    let handle = cx.open(&map).unwrap();
    assert_eq!(handle.lookup_by_key(&cx, "17"), Some(17));
    assert_eq!(cx.summary(&handle.child_at(&cx, 17).unwrap()), r#""v17""#);
}

#[test]
fn test_hash_map_with_broken_head_is_invalid()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let (string, int) = (rt.string(), rt.int());
    let map = rt.new_hash_map("m", string, int, [("a", 1), ("b", 2)]).unwrap();

    let remote = Remote::new(&image);
    let head = remote.deref(&remote.field(&map, "head_element").unwrap()).unwrap();
    let tail = remote.pointer_value(&remote.field(&map, "tail_element").unwrap()).unwrap();
    image.set_pointer(&head, "prev", tail).unwrap();

    let session = keyed_session();
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&map), INVALID);
    let handle = cx.open(&map).unwrap();
    assert_eq!(handle.child_count(), 0);
    assert_eq!(handle.lookup_by_key(&cx, "a"), None);
}

#[test]
fn test_rb_map_in_key_order()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let (int, string) = (rt.int(), rt.string());
    let pairs = [(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")];
    let map = rt.new_rb_map("tree", int, string, pairs).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&map), r#"RBMap[5]{[1]: "a", [2]: "b", [3]: "c", [4]: "d", [5]: "e"}"#);
    let children = cx.children(&map);
    assert_eq!(children.len(), 5);
    assert_eq!(cx.summary(&children[3]), r#"4: "d""#);

    let session = keyed_session();
    let cx = session.inspector(&image);
    let handle = cx.open(&map).unwrap();
    assert_eq!(names(&handle.children(&cx)), ["[1]", "[2]", "[3]", "[4]", "[5]"]);
    assert_eq!(handle.lookup_by_key(&cx, "4"), Some(3));
}

#[test]
fn test_empty_rb_map()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let (int, string) = (rt.int(), rt.string());
    let map = rt.new_rb_map("tree", int, string, Vec::<(i32, &str)>::new()).unwrap();
    assert_eq!(summary_of(&image, &map), "RBMap[0]{}");
}

#[test]
fn test_vmap_pairs()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let map = rt.new_vmap("sorted", int, int, [(1, 10), (2, 20)]).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&map), "VMap[2]{[1]: 10, [2]: 20}");
    let children = cx.children(&map);
    assert_eq!(cx.summary(&children[0]), "[1]: 10");

    let session = keyed_session();
    let cx = session.inspector(&image);
    let children = cx.children(&map);
    assert_eq!(names(&children), ["[1]", "[2]"]);
    assert_eq!(cx.summary(&children[1]), "20");
}

// ---- contiguous arrays ----------------------------------------------------

#[test]
fn test_vector_summary()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let full = rt.new_vector("v", int, [1, 2, 3]).unwrap();
    let empty = rt.new_vector("e", int, Vec::<i32>::new()).unwrap();

    assert_eq!(summary_of(&image, &full), "Vector[3]{1, 2, 3}");
    assert_eq!(summary_of(&image, &empty), "Vector[0]{}");
}

#[test]
fn test_vector_elements_are_strided_from_the_base()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int64 = rt.int64();
    let vector = rt.new_vector("v", int64, [7, 8, 9, 10]).unwrap();
    let base = cow_base(&image, &vector, &["_cowdata", "_ptr"]);

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    let handle = cx.open(&vector).unwrap();
    assert_eq!(handle.child_count(), 4);
    for i in 0..4 {
        let child = handle.child_at(&cx, i).unwrap();
        assert_eq!(child.address(), base + 8 * i as u64);
    }
    assert!(handle.child_at(&cx, 4).is_none());
}

#[test]
fn test_vector_with_negative_size_is_invalid()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let vector = rt.new_vector("v", int, [1, 2, 3]).unwrap();
    let base = cow_base(&image, &vector, &["_cowdata", "_ptr"]);
    image.write_unsigned(base - 8, u64::MAX, 8).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&vector), INVALID);
    let handle = cx.open(&vector).unwrap();
    assert!(!handle.is_valid());
    assert_eq!(handle.child_count(), 0);
    assert!(handle.child_at(&cx, 0).is_none());
}

#[test]
fn test_local_vector_checks_capacity()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let good = rt.new_local_vector("good", int, [1, 2], 2).unwrap();
    let bad = rt.new_local_vector("bad", int, [1, 2, 3], 0).unwrap();
    image.set_unsigned(&bad, "capacity", 1).unwrap();

    assert_eq!(summary_of(&image, &good), "LocalVector[2]{1, 2}");
    assert_eq!(summary_of(&image, &bad), INVALID);
}

#[test]
fn test_hash_set_and_vset()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let set = rt.new_hash_set("set", int, [5, 6, 7]).unwrap();
    let sorted = rt.new_vset("sorted", int, [1, 2, 3]).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&set), "HashSet[3]{5, 6, 7}");
    assert_eq!(cx.summary(&sorted), "VSet[3]{1, 2, 3}");
    assert_eq!(cx.children(&sorted).len(), 3);
}

#[test]
fn test_paged_array_spans_pages()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let paged = rt.new_paged_array("paged", int, 0..5, 1).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&paged), "PagedArray[5]{0, 1, 2, 3, 4}");
    let handle = cx.open(&paged).unwrap();
    let last = handle.child_at(&cx, 4).unwrap();
    assert_eq!(last.name(), "[4]");
    assert_eq!(cx.summary(&last), "4");
}

#[test]
fn test_paged_array_with_bad_mask_is_invalid()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let paged = rt.new_paged_array("paged", int, 0..5, 1).unwrap();
    image.set_unsigned(&paged, "page_size_mask", 7).unwrap();
    assert_eq!(summary_of(&image, &paged), INVALID);
}

#[test]
fn test_ring_buffer_cursors()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let ring = rt.new_ring_buffer("ring", int, [10, 20, 30, 40], 1, 3).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&ring), "RingBuffer[4]{<read_pos:1> <write_pos:3> 10, 20, 30, 40}");

    let handle = cx.open(&ring).unwrap();
    assert_eq!(handle.child_count(), 6);
    let children = handle.children(&cx);
    assert_eq!(names(&children)[..2], ["[read_pos 1]", "[write_pos 3]"]);
    assert_eq!(cx.summary(&children[0]), "20");
    assert_eq!(cx.summary(&children[5]), "40");
    assert_eq!(handle.index_of_child(&cx, "[2]"), Some(4));
}

#[test]
fn test_ring_buffer_cursor_past_the_data_is_null()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let ring = rt.new_ring_buffer("ring", int, [10, 20, 30, 40], 1, 3).unwrap();
    image.set_unsigned(&ring, "size_mask", 7).unwrap();
    image.set_unsigned(&ring, "read_pos", 5).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&ring), "RingBuffer[4]{<read_pos:5> <write_pos:3> 10, 20, 30, 40}");

    let handle = cx.open(&ring).unwrap();
    assert!(handle.is_valid());
    assert_eq!(handle.child_count(), 6);
    let read = handle.child_at(&cx, 0).unwrap();
    assert_eq!(read.name(), "[read_pos 5]");
    assert_eq!(cx.summary(&read), NULL);
    let write = handle.child_at(&cx, 1).unwrap();
    assert_eq!(cx.summary(&write), "40");
    assert_eq!(cx.summary(&handle.child_at(&cx, 2).unwrap()), "10");
}

#[test]
fn test_empty_ring_buffer_hides_cursors()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let ring = rt.new_ring_buffer("ring", int, Vec::<i32>::new(), 0, 0).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&ring), "RingBuffer[0]{}");
    let handle = cx.open(&ring).unwrap();
    assert!(handle.is_valid());
    let cursor = handle.child_at(&cx, 0).unwrap();
    assert_eq!(cx.summary(&cursor), NULL);
}

// ---- variants and proxies -------------------------------------------------

#[test]
fn test_variant_scalars()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.new_variant("i", 42).unwrap();
    let flag = rt.new_variant("b", true).unwrap();
    let real = rt.new_variant("f", 2.5).unwrap();
    let text = rt.new_variant("s", "hi").unwrap();
    let nil = rt.new_variant("n", Item::Nil).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&int), "42");
    assert_eq!(cx.summary(&flag), "true");
    assert_eq!(cx.summary(&real), "2.5");
    assert_eq!(cx.summary(&text), r#""hi""#);
    assert_eq!(cx.summary(&nil), NIL);

    let handle = cx.open(&nil).unwrap();
    assert!(handle.is_valid());
    assert_eq!(handle.child_count(), 0);

    let handle = cx.open(&int).unwrap();
    let payload = handle.child_at(&cx, 0).unwrap();
    assert_eq!(payload.name(), "[value]");
    assert_eq!(cx.summary(&payload), "42");
}

#[test]
fn test_variant_child_is_found_only_by_its_name()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.new_variant("i", 42).unwrap();
    let nil = rt.new_variant("n", Item::Nil).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    let handle = cx.open(&int).unwrap();
    assert_eq!(handle.index_of_child(&cx, "[value]"), Some(0));
    assert_eq!(handle.index_of_child(&cx, "other"), None);
    assert_eq!(handle.index_of_child(&cx, "[0]"), None);

    let empty = cx.open(&nil).unwrap();
    assert_eq!(empty.index_of_child(&cx, "[value]"), None);
}

#[test]
fn test_variant_with_bad_discriminant_is_invalid()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let variant = rt.new_variant("v", 1).unwrap();
    image.set_unsigned(&variant, "type", 99).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&variant), INVALID);
    let handle = cx.open(&variant).unwrap();
    assert!(!handle.is_valid());
    assert_eq!(handle.child_count(), 0);
}

#[test]
fn test_variant_objects_are_not_expanded()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let object = rt.new_object("node", 7).unwrap();
    let live = rt.new_variant("live", Item::Object(object.address())).unwrap();
    let gone = rt.new_variant("gone", Item::Object(Address::ZERO)).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&live), "{Object*:{...}}");
    assert_eq!(cx.summary(&gone), "{Object*:<null>}");
}

#[test]
fn test_variant_packed_array()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let packed = rt.new_variant("p", Item::PackedInt32(vec![1, 2, 3])).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&packed), "Vector[3]{1, 2, 3}");
    let payload = cx.open(&packed).unwrap().child_at(&cx, 0).unwrap();
    assert_eq!(cx.children(&payload).len(), 3);
}

#[test]
fn test_array_of_variants()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let array = rt.new_array("a", [Item::Int(1), Item::from("two"), Item::Float(3.5), Item::Nil]).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&array), r#"Array[4]{1, "two", 3.5, <nil>}"#);
    let handle = cx.open(&array).unwrap();
    assert_eq!(handle.child_count(), 4);
    assert_eq!(cx.summary(&handle.child_at(&cx, 1).unwrap()), r#""two""#);
}

#[test]
fn test_dictionary_lookup()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let dict = rt
        .new_dictionary("d", [("volume", Item::Float(1.5)), ("fullscreen", Item::Bool(true))])
        .unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&dict), r#"Dictionary[2]{["volume"]: 1.5, ["fullscreen"]: true}"#);
    let handle = cx.open(&dict).unwrap();
    assert_eq!(handle.lookup_by_key(&cx, "fullscreen"), Some(1));
    assert_eq!(handle.lookup_by_key(&cx, "missing"), None);
}

#[test]
fn test_proxy_without_inner_container_is_invalid()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let array = rt.new_array("a", [1, 2]).unwrap();
    image.set_pointer(&array, "_p", Address::ZERO).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    assert_eq!(cx.summary(&array), INVALID);
    let handle = cx.open(&array).unwrap();
    assert!(!handle.is_valid());
    assert_eq!(handle.child_count(), 0);
}

#[test]
fn test_keys_only_shapes_reject_lookup()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let vector = rt.new_vector("v", int, [1]).unwrap();

    let session = Session::new(Options::default());
    let cx = session.inspector(&image);
    let handle = cx.open(&vector).unwrap();
    assert_eq!(handle.lookup_by_key(&cx, "1"), None);
}
