//! Tests for the remote value accessor

use lens_core::prelude::*;
use lens_core::remote::COW_SIZE_OFFSET;

#[test]
fn test_follows_pointers_and_reads_fields()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let list = rt.new_list("numbers", int, [4, 5]).unwrap();

    let remote = Remote::new(&image);
    let data = remote.field(&list, "_data").unwrap();
    assert!(remote.is_valid_pointer(Some(&data)));

    let block = remote.deref(&data).unwrap();
    assert_eq!(remote.field_signed(&block, "size_cache").unwrap(), 2);

    let first = remote.deref(&remote.field(&block, "first").unwrap()).unwrap();
    assert_eq!(remote.field_signed(&first, "value").unwrap(), 4);

    // read_child looks through one pointer level
    let value = remote.read_child(&remote.field(&first, "next_ptr").unwrap(), "value").unwrap();
    assert_eq!(remote.read_signed(&value).unwrap(), 5);
}

#[test]
fn test_null_pointers_are_strict()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let empty = rt.new_list("empty", int, Vec::<i32>::new()).unwrap();

    let remote = Remote::new(&image);
    let data = remote.read_child(&empty, "_data");
    assert!(remote.is_null_pointer(data.as_ref()));
    assert!(!remote.is_valid_pointer(data.as_ref()));
    assert!(remote.deref(data.as_ref().unwrap()).is_err());

    // A missing member is neither null nor valid
    let missing = remote.read_child(&empty, "no_such_member");
    assert!(missing.is_none());
    assert!(!remote.is_null_pointer(missing.as_ref()));
    assert!(!remote.is_valid_pointer(missing.as_ref()));
}

#[test]
fn test_non_pointer_is_rejected()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let vector = rt.new_vector("v", int, [1]).unwrap();

    let remote = Remote::new(&image);
    let cow = remote.field(&vector, "_cowdata").unwrap();
    assert!(matches!(remote.pointer_value(&cow), Err(InspectError::NotAPointer(_))));
    assert!(!remote.is_null_pointer(Some(&cow)));
}

#[test]
fn test_peek_container_size()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let empty = rt.new_vector("empty", int, Vec::<i32>::new()).unwrap();
    let full = rt.new_vector("full", int, [1, 2, 3]).unwrap();

    let remote = Remote::new(&image);
    let empty_cow = remote.field(&empty, "_cowdata").unwrap();
    let full_cow = remote.field(&full, "_cowdata").unwrap();
    assert_eq!(remote.peek_container_size(&empty_cow), Some(0));
    assert_eq!(remote.peek_container_size(&full_cow), Some(3));

    let base = remote.pointer_value(&remote.field(&full_cow, "_ptr").unwrap()).unwrap();
    image.write_unsigned(base - COW_SIZE_OFFSET, u64::MAX, 8).unwrap();

    let remote = Remote::new(&image);
    assert_eq!(remote.peek_container_size(&full_cow), None);
}

#[test]
fn test_peek_rejects_size_past_the_buffer()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let vector = rt.new_vector("v", int, [1, 2]).unwrap();

    let remote = Remote::new(&image);
    let cow = remote.field(&vector, "_cowdata").unwrap();
    let base = remote.pointer_value(&remote.field(&cow, "_ptr").unwrap()).unwrap();
    image.write_unsigned(base - COW_SIZE_OFFSET, 1_000_000, 8).unwrap();

    let remote = Remote::new(&image);
    assert_eq!(remote.peek_container_size(&cow), None);
}

#[test]
fn test_read_c_string()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let text = rt.c_string("hello").unwrap();

    let remote = Remote::new(&image);
    assert_eq!(remote.read_c_string(text, 64).unwrap(), (b"hello".to_vec(), true));
    assert_eq!(remote.read_c_string(text, 3).unwrap(), (b"hel".to_vec(), false));
    assert!(remote.read_c_string(Address::new(0x10), 8).is_err());
}

#[test]
fn test_casts_and_template_arguments()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let string = rt.string();
    let map = rt.new_hash_map("m", string, int, [("a", 1)]).unwrap();

    let remote = Remote::new(&image);
    assert_eq!(remote.template_arg(&map, 0), Some(string));
    assert_eq!(remote.template_arg(&map, 1), Some(int));
    assert_eq!(remote.template_arg(&map, 7), None);

    assert!(remote.cast_to(&map, "String").is_some());
    assert!(remote.cast_to(&map, "NoSuchType").is_none());
    assert!(remote.value_at("nowhere", Address::new(0x10), int).is_none());
}

#[test]
fn test_unmapped_memory_is_unreadable()
{
    let mut image = MemoryImage::new();
    let mut rt = RuntimeBuilder::new(&mut image);
    let int = rt.int();
    let list = rt.new_list("numbers", int, [1]).unwrap();

    let remote = Remote::new(&image);
    let block = remote.pointer_value(&remote.field(&list, "_data").unwrap()).unwrap();
    assert!(image.unmap(block));

    let remote = Remote::new(&image);
    let data = remote.field(&list, "_data").unwrap();
    assert!(!remote.is_readable(block, 1));
    assert!(!remote.is_valid_pointer(Some(&data)));
    assert!(matches!(remote.deref(&data), Err(InspectError::Unreadable { .. })));
}
