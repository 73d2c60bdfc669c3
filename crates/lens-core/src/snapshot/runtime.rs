//! Runtime container layouts over a [`MemoryImage`].
//!
//! Type constructors are memoized by name, so asking twice for
//! `Vector<int>` returns the same handle. Value constructors allocate and
//! fill complete containers the way the runtime itself lays them out:
//! copy-on-write buffers carry a refcount and a size word in front of the
//! elements, lists and maps own separately allocated nodes.

use tracing::trace;

use super::MemoryImage;
use crate::error::{InspectError, Result};
use crate::host::Introspection;
use crate::types::{Address, BasicKind, RemoteValue, TypeHandle, TypeKind};

/// Bytes in front of a copy-on-write buffer: refcount, then size
const COW_HEADER: u64 = 16;

/// Variant discriminants written by [`RuntimeBuilder`]
mod tag
{
    pub const NIL: u64 = 0;
    pub const BOOL: u64 = 1;
    pub const INT: u64 = 2;
    pub const FLOAT: u64 = 3;
    pub const STRING: u64 = 4;
    pub const VECTOR2: u64 = 5;
    pub const COLOR: u64 = 20;
    pub const STRING_NAME: u64 = 21;
    pub const OBJECT: u64 = 24;
    pub const DICTIONARY: u64 = 27;
    pub const ARRAY: u64 = 28;
    pub const PACKED_INT32_ARRAY: u64 = 30;
}

const VARIANT_TYPES: [&str; 38] = [
    "NIL",
    "BOOL",
    "INT",
    "FLOAT",
    "STRING",
    "VECTOR2",
    "VECTOR2I",
    "RECT2",
    "RECT2I",
    "VECTOR3",
    "VECTOR3I",
    "TRANSFORM2D",
    "VECTOR4",
    "VECTOR4I",
    "PLANE",
    "QUATERNION",
    "AABB",
    "BASIS",
    "TRANSFORM3D",
    "PROJECTION",
    "COLOR",
    "STRING_NAME",
    "NODE_PATH",
    "RID",
    "OBJECT",
    "CALLABLE",
    "SIGNAL",
    "DICTIONARY",
    "ARRAY",
    "PACKED_BYTE_ARRAY",
    "PACKED_INT32_ARRAY",
    "PACKED_INT64_ARRAY",
    "PACKED_FLOAT32_ARRAY",
    "PACKED_FLOAT64_ARRAY",
    "PACKED_STRING_ARRAY",
    "PACKED_VECTOR2_ARRAY",
    "PACKED_VECTOR3_ARRAY",
    "PACKED_COLOR_ARRAY",
];

/// A value to store into a typed location
///
/// The destination type decides the encoding: `Int(3)` becomes four bytes
/// in an `int`, eight in a `long long` and a tagged payload in a `Variant`.
#[derive(Debug, Clone, PartialEq)]
pub enum Item
{
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Text for `String`, `CharString` and `NodePath`
    Str(String),
    /// Interned name stored in the name table entry
    Name(String),
    /// Interned name pointing at a static C string
    StaticName(String),
    Vector2([f64; 2]),
    Color([f64; 4]),
    /// Leaf values of a plain struct, in declaration order
    Floats(Vec<f64>),
    /// Pointer to an object, or a null object pointer
    Object(Address),
    Array(Vec<Item>),
    Dictionary(Vec<(Item, Item)>),
    PackedInt32(Vec<i32>),
}

impl Item
{
    fn as_int(&self) -> Result<i64>
    {
        match self {
            Item::Int(n) => Ok(*n),
            Item::Bool(b) => Ok(i64::from(*b)),
            _ => Err(self.mismatch("an integer")),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_float(&self) -> Result<f64>
    {
        match self {
            Item::Float(x) => Ok(*x),
            Item::Int(n) => Ok(*n as f64),
            _ => Err(self.mismatch("a number")),
        }
    }

    fn as_text(&self) -> Result<&str>
    {
        match self {
            Item::Str(text) | Item::Name(text) | Item::StaticName(text) => Ok(text),
            _ => Err(self.mismatch("text")),
        }
    }

    fn leaves(&self) -> Result<Vec<f64>>
    {
        match self {
            Item::Vector2(v) => Ok(v.to_vec()),
            Item::Color(c) => Ok(c.to_vec()),
            Item::Floats(values) => Ok(values.clone()),
            _ => Err(self.mismatch("struct components")),
        }
    }

    fn mismatch(&self, wanted: &str) -> InspectError
    {
        InspectError::Corrupt(format!("{self:?} is not {wanted}"))
    }
}

impl From<bool> for Item
{
    fn from(value: bool) -> Self
    {
        Item::Bool(value)
    }
}

impl From<i32> for Item
{
    fn from(value: i32) -> Self
    {
        Item::Int(i64::from(value))
    }
}

impl From<i64> for Item
{
    fn from(value: i64) -> Self
    {
        Item::Int(value)
    }
}

impl From<f64> for Item
{
    fn from(value: f64) -> Self
    {
        Item::Float(value)
    }
}

impl From<&str> for Item
{
    fn from(value: &str) -> Self
    {
        Item::Str(value.to_string())
    }
}

impl From<String> for Item
{
    fn from(value: String) -> Self
    {
        Item::Str(value)
    }
}

fn collect<I: Into<Item>>(items: impl IntoIterator<Item = I>) -> Vec<Item>
{
    items.into_iter().map(Into::into).collect()
}

fn collect_pairs<K: Into<Item>, V: Into<Item>>(pairs: impl IntoIterator<Item = (K, V)>) -> Vec<(Item, Item)>
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Builds runtime types and values inside a [`MemoryImage`]
///
/// ## Example
///
/// ```rust
/// use lens_core::snapshot::{MemoryImage, RuntimeBuilder};
///
/// let mut image = MemoryImage::new();
/// let mut rt = RuntimeBuilder::new(&mut image);
/// let int = rt.int();
/// let scores = rt.new_vector("scores", int, [10, 20, 30]).unwrap();
/// assert_eq!(image.name_of(scores.type_handle()), "Vector<int>");
/// ```
#[derive(Debug)]
pub struct RuntimeBuilder<'a>
{
    image: &'a mut MemoryImage,
}

impl<'a> RuntimeBuilder<'a>
{
    #[must_use]
    pub fn new(image: &'a mut MemoryImage) -> Self
    {
        RuntimeBuilder { image }
    }

    /// The underlying image, for raw edits
    pub fn image(&mut self) -> &mut MemoryImage
    {
        self.image
    }

    // ---- basic types ------------------------------------------------------

    #[must_use]
    pub fn int(&self) -> TypeHandle
    {
        self.image.basic(BasicKind::Int)
    }

    #[must_use]
    pub fn int64(&self) -> TypeHandle
    {
        self.image.basic(BasicKind::LongLong)
    }

    #[must_use]
    pub fn uint32(&self) -> TypeHandle
    {
        self.image.basic(BasicKind::UnsignedInt)
    }

    #[must_use]
    pub fn uint64(&self) -> TypeHandle
    {
        self.image.basic(BasicKind::UnsignedLongLong)
    }

    #[must_use]
    pub fn real(&self) -> TypeHandle
    {
        self.image.basic(BasicKind::Float)
    }

    #[must_use]
    pub fn double(&self) -> TypeHandle
    {
        self.image.basic(BasicKind::Double)
    }

    #[must_use]
    pub fn boolean(&self) -> TypeHandle
    {
        self.image.basic(BasicKind::Bool)
    }

    // ---- type constructors ------------------------------------------------

    fn named<F>(&mut self, name: &str, build: F) -> TypeHandle
    where
        F: FnOnce(&mut Self, &str) -> TypeHandle,
    {
        if let Some(handle) = self.image.by_name.get(name) {
            return *handle;
        }
        trace!(name, "defining runtime type");
        build(self, name)
    }

    fn name(&self, ty: TypeHandle) -> String
    {
        self.image.name_of(ty).to_string()
    }

    fn ptr(&mut self, ty: TypeHandle) -> TypeHandle
    {
        self.image.pointer_to(ty)
    }

    /// `CowData<T>`: a single `_ptr` to the first element
    pub fn cow_data(&mut self, element: TypeHandle) -> TypeHandle
    {
        let name = format!("CowData<{}>", self.name(element));
        self.named(&name, |rt, name| {
            let ptr = rt.ptr(element);
            rt.image.define(name).field("_ptr", ptr).template_arg(element).build()
        })
    }

    /// `String`: copy-on-write UTF-32 code units, NUL terminated
    pub fn string(&mut self) -> TypeHandle
    {
        self.named("String", |rt, name| {
            let unit = rt.image.basic(BasicKind::Char32);
            let cow = rt.cow_data(unit);
            rt.image.define(name).field("_cowdata", cow).build()
        })
    }

    /// `CharString`: copy-on-write narrow characters, NUL terminated
    pub fn char_string(&mut self) -> TypeHandle
    {
        self.named("CharString", |rt, name| {
            let unit = rt.image.basic(BasicKind::Char);
            let cow = rt.cow_data(unit);
            rt.image.define(name).field("_cowdata", cow).build()
        })
    }

    /// `StringName`: pointer to a shared name table entry
    pub fn string_name(&mut self) -> TypeHandle
    {
        self.named("StringName", |rt, name| {
            let string = rt.string();
            let cstr = rt.image.basic(BasicKind::Char);
            let cstr = rt.ptr(cstr);
            let u32_ty = rt.uint32();
            let data = rt.image.declare("StringName::_Data");
            let data_ptr = rt.ptr(data);
            rt.image
                .complete(data)
                .field("refcount", u32_ty)
                .field("static_count", u32_ty)
                .field("cname", cstr)
                .field("name", string)
                .field("idx", u32_ty)
                .field("hash", u32_ty)
                .field("prev", data_ptr)
                .field("next", data_ptr)
                .build();
            rt.image.define(name).field("_data", data_ptr).build()
        })
    }

    /// `NodePath`: pointer to shared path data
    pub fn node_path(&mut self) -> TypeHandle
    {
        self.named("NodePath", |rt, name| {
            let string_name = rt.string_name();
            let names = rt.vector(string_name);
            let (u32_ty, bool_ty) = (rt.uint32(), rt.boolean());
            let data = rt
                .image
                .define("NodePath::Data")
                .field("refcount", u32_ty)
                .field("path", names)
                .field("subpath", names)
                .field("concatenated_path", string_name)
                .field("concatenated_subpath", string_name)
                .field("absolute", bool_ty)
                .field("hash_cache_valid", bool_ty)
                .field("hash_cache", u32_ty)
                .build();
            let data_ptr = rt.ptr(data);
            rt.image.define(name).field("data", data_ptr).build()
        })
    }

    /// `Vector<T>`: a copy-on-write buffer
    pub fn vector(&mut self, element: TypeHandle) -> TypeHandle
    {
        let name = format!("Vector<{}>", self.name(element));
        self.named(&name, |rt, name| {
            let cow = rt.cow_data(element);
            rt.image.define(name).field("_cowdata", cow).template_arg(element).build()
        })
    }

    /// `LocalVector<T>`: count, capacity and an owned buffer
    pub fn local_vector(&mut self, element: TypeHandle) -> TypeHandle
    {
        let name = format!("LocalVector<{}>", self.name(element));
        self.named(&name, |rt, name| {
            let u32_ty = rt.uint32();
            let data = rt.ptr(element);
            rt.image
                .define(name)
                .field("count", u32_ty)
                .field("capacity", u32_ty)
                .field("data", data)
                .template_arg(element)
                .build()
        })
    }

    /// `List<T>`: nodes linked through `next_ptr` and `prev_ptr`
    pub fn list(&mut self, element: TypeHandle) -> TypeHandle
    {
        let name = format!("List<{}>", self.name(element));
        self.named(&name, |rt, name| {
            let node = rt.image.declare(&format!("{name}::Element"));
            let data = rt.image.declare(&format!("{name}::_Data"));
            let (node_ptr, data_ptr, int) = (rt.ptr(node), rt.ptr(data), rt.int());
            rt.image
                .complete(node)
                .field("value", element)
                .field("next_ptr", node_ptr)
                .field("prev_ptr", node_ptr)
                .field("data", data_ptr)
                .build();
            rt.image
                .complete(data)
                .field("first", node_ptr)
                .field("last", node_ptr)
                .field("size_cache", int)
                .build();
            rt.image.define(name).field("_data", data_ptr).template_arg(element).build()
        })
    }

    /// `KeyValue<K, V>`
    pub fn key_value(&mut self, key: TypeHandle, value: TypeHandle) -> TypeHandle
    {
        let name = format!("KeyValue<{}, {}>", self.name(key), self.name(value));
        self.named(&name, |rt, name| {
            rt.image
                .define(name)
                .field("key", key)
                .field("value", value)
                .template_arg(key)
                .template_arg(value)
                .build()
        })
    }

    /// `HashMap<K, V>`: insertion-ordered elements threaded through a list
    pub fn hash_map(&mut self, key: TypeHandle, value: TypeHandle) -> TypeHandle
    {
        let args = format!("{}, {}", self.name(key), self.name(value));
        let name = format!("HashMap<{args}>");
        self.named(&name, |rt, name| {
            let pair = rt.key_value(key, value);
            let element = rt.image.declare(&format!("HashMapElement<{args}>"));
            let element_ptr = rt.ptr(element);
            rt.image
                .complete(element)
                .field("next", element_ptr)
                .field("prev", element_ptr)
                .field("data", pair)
                .template_arg(key)
                .template_arg(value)
                .build();
            let table = rt.ptr(element_ptr);
            let u32_ty = rt.uint32();
            let hashes = rt.ptr(u32_ty);
            rt.image
                .define(name)
                .field("elements", table)
                .field("hashes", hashes)
                .field("head_element", element_ptr)
                .field("tail_element", element_ptr)
                .field("capacity_index", u32_ty)
                .field("num_elements", u32_ty)
                .template_arg(key)
                .template_arg(value)
                .build()
        })
    }

    /// `RBMap<K, V>`: a threaded red-black tree with root and nil sentinels
    pub fn rb_map(&mut self, key: TypeHandle, value: TypeHandle) -> TypeHandle
    {
        let name = format!("RBMap<{}, {}>", self.name(key), self.name(value));
        self.named(&name, |rt, name| {
            let pair = rt.key_value(key, value);
            let element = rt.image.declare(&format!("{name}::Element"));
            let (element_ptr, int) = (rt.ptr(element), rt.int());
            rt.image
                .complete(element)
                .field("color", int)
                .field("right", element_ptr)
                .field("left", element_ptr)
                .field("parent", element_ptr)
                .field("_next", element_ptr)
                .field("_prev", element_ptr)
                .field("_data", pair)
                .build();
            let data = rt
                .image
                .define(&format!("{name}::_Data"))
                .field("_root", element_ptr)
                .field("_nil", element_ptr)
                .field("size_cache", int)
                .build();
            rt.image.define(name).field("_data", data).template_arg(key).template_arg(value).build()
        })
    }

    /// `VMap<K, V>`: sorted pairs in a copy-on-write buffer
    pub fn vmap(&mut self, key: TypeHandle, value: TypeHandle) -> TypeHandle
    {
        let name = format!("VMap<{}, {}>", self.name(key), self.name(value));
        self.named(&name, |rt, name| {
            let pair = rt.image.define(&format!("{name}::Pair")).field("key", key).field("value", value).build();
            let cow = rt.cow_data(pair);
            rt.image.define(name).field("_cowdata", cow).template_arg(key).template_arg(value).build()
        })
    }

    /// `HashSet<T>`: dense key array plus hash side tables
    pub fn hash_set(&mut self, element: TypeHandle) -> TypeHandle
    {
        let name = format!("HashSet<{}>", self.name(element));
        self.named(&name, |rt, name| {
            let keys = rt.ptr(element);
            let u32_ty = rt.uint32();
            let table = rt.ptr(u32_ty);
            rt.image
                .define(name)
                .field("keys", keys)
                .field("hash_to_key", table)
                .field("key_to_hash", table)
                .field("hashes", table)
                .field("capacity_index", u32_ty)
                .field("num_elements", u32_ty)
                .template_arg(element)
                .build()
        })
    }

    /// `PagedArray<T>`: fixed-size pages drawn from a shared pool
    pub fn paged_array(&mut self, element: TypeHandle) -> TypeHandle
    {
        let name = format!("PagedArray<{}>", self.name(element));
        self.named(&name, |rt, name| {
            let page = rt.ptr(element);
            let pages = rt.ptr(page);
            let (u32_ty, u64_ty) = (rt.uint32(), rt.uint64());
            let ids = rt.ptr(u32_ty);
            let pool_name = format!("PagedArrayPool<{}>", rt.name(element));
            let pool = rt
                .image
                .define(&pool_name)
                .field("page_pool", pages)
                .field("available_page_pool", ids)
                .field("pages_allocated", u32_ty)
                .field("pages_available", u32_ty)
                .field("page_size", u32_ty)
                .template_arg(element)
                .build();
            let pool_ptr = rt.ptr(pool);
            rt.image
                .define(name)
                .field("page_pool", pool_ptr)
                .field("page_data", pages)
                .field("page_ids", ids)
                .field("max_pages_used", u32_ty)
                .field("count", u64_ty)
                .field("page_size_shift", u32_ty)
                .field("page_size_mask", u32_ty)
                .template_arg(element)
                .build()
        })
    }

    /// `RingBuffer<T>`: a power-of-two `Vector<T>` with two cursors
    pub fn ring_buffer(&mut self, element: TypeHandle) -> TypeHandle
    {
        let name = format!("RingBuffer<{}>", self.name(element));
        self.named(&name, |rt, name| {
            let data = rt.vector(element);
            let int = rt.int();
            rt.image
                .define(name)
                .field("data", data)
                .field("read_pos", int)
                .field("write_pos", int)
                .field("size_mask", int)
                .template_arg(element)
                .build()
        })
    }

    /// `VSet<T>`: a sorted `Vector<T>`
    pub fn vset(&mut self, element: TypeHandle) -> TypeHandle
    {
        let name = format!("VSet<{}>", self.name(element));
        self.named(&name, |rt, name| {
            let data = rt.vector(element);
            rt.image.define(name).field("_data", data).template_arg(element).build()
        })
    }

    /// `Object`, the root of the class hierarchy
    pub fn object(&mut self) -> TypeHandle
    {
        self.named("Object", |rt, name| {
            let id = rt.object_id();
            rt.image.define(name).field("_instance_id", id).build()
        })
    }

    /// `RefCounted`, an `Object` with a reference count
    pub fn ref_counted(&mut self) -> TypeHandle
    {
        self.named("RefCounted", |rt, name| {
            let object = rt.object();
            let u32_ty = rt.uint32();
            rt.image.define(name).base(object).field("refcount", u32_ty).build()
        })
    }

    /// `Ref<T>`: a counted pointer to a `RefCounted` subclass
    pub fn reference(&mut self, target: TypeHandle) -> TypeHandle
    {
        let name = format!("Ref<{}>", self.name(target));
        self.named(&name, |rt, name| {
            let ptr = rt.ptr(target);
            rt.image.define(name).field("reference", ptr).template_arg(target).build()
        })
    }

    /// `ObjectID`
    pub fn object_id(&mut self) -> TypeHandle
    {
        self.named("ObjectID", |rt, name| {
            let u64_ty = rt.uint64();
            rt.image.define(name).field("id", u64_ty).build()
        })
    }

    /// `RID`
    pub fn rid(&mut self) -> TypeHandle
    {
        self.named("RID", |rt, name| {
            let u64_ty = rt.uint64();
            rt.image.define(name).field("_id", u64_ty).build()
        })
    }

    /// `Signal`: a name on an object
    pub fn signal(&mut self) -> TypeHandle
    {
        self.named("Signal", |rt, name| {
            let (string_name, id) = (rt.string_name(), rt.object_id());
            rt.image.define(name).field("name", string_name).field("object", id).build()
        })
    }

    /// `Callable`: a method name plus an object id or a custom callable
    ///
    /// The object id and the custom pointer share storage.
    pub fn callable(&mut self) -> TypeHandle
    {
        self.named("Callable", |rt, name| {
            let custom = rt.image.declare("CallableCustom");
            let custom = rt.ptr(custom);
            let u64_ty = rt.uint64();
            let target = rt
                .image
                .define("Callable::Target")
                .field("object", u64_ty)
                .field("custom", custom)
                .union()
                .build();
            let string_name = rt.string_name();
            rt.image.define(name).base(target).field("method", string_name).build()
        })
    }

    /// A math value type by name (`Vector2`, `Rect2i`, `Transform3D`, ...)
    ///
    /// ## Errors
    ///
    /// Returns [`InspectError::UnknownType`] for names that are not math
    /// types.
    pub fn math(&mut self, name: &str) -> Result<TypeHandle>
    {
        if let Some(handle) = self.image.by_name.get(name) {
            return Ok(*handle);
        }
        let (real, int) = (self.real(), self.int());
        let handle = match name {
            "Vector2" => self.flat(name, real, &["x", "y"]),
            "Vector2i" => self.flat(name, int, &["x", "y"]),
            "Vector3" => self.flat(name, real, &["x", "y", "z"]),
            "Vector3i" => self.flat(name, int, &["x", "y", "z"]),
            "Vector4" => self.flat(name, real, &["x", "y", "z", "w"]),
            "Vector4i" => self.flat(name, int, &["x", "y", "z", "w"]),
            "Quaternion" => self.flat(name, real, &["x", "y", "z", "w"]),
            "Color" => self.flat(name, real, &["r", "g", "b", "a"]),
            "Rect2" => self.pair_of(name, "Vector2")?,
            "Rect2i" => self.pair_of(name, "Vector2i")?,
            "AABB" => self.pair_of(name, "Vector3")?,
            "Transform2D" => self.columns(name, "columns", "Vector2", 3)?,
            "Basis" => self.columns(name, "rows", "Vector3", 3)?,
            "Projection" => self.columns(name, "columns", "Vector4", 4)?,
            "Transform3D" => {
                let (basis, origin) = (self.math("Basis")?, self.math("Vector3")?);
                self.image.define(name).field("basis", basis).field("origin", origin).build()
            }
            "Plane" => {
                let normal = self.math("Vector3")?;
                self.image.define(name).field("normal", normal).field("d", real).build()
            }
            _ => return Err(InspectError::UnknownType(name.to_string())),
        };
        Ok(handle)
    }

    fn flat(&mut self, name: &str, leaf: TypeHandle, members: &[&str]) -> TypeHandle
    {
        members.iter().fold(self.image.define(name), |def, member| def.field(member, leaf)).build()
    }

    fn pair_of(&mut self, name: &str, vector: &str) -> Result<TypeHandle>
    {
        let vector = self.math(vector)?;
        Ok(self.image.define(name).field("position", vector).field("size", vector).build())
    }

    fn columns(&mut self, name: &str, member: &str, vector: &str, count: u64) -> Result<TypeHandle>
    {
        let vector = self.math(vector)?;
        let array = self.image.array_of(vector, count);
        Ok(self.image.define(name).field(member, array).build())
    }

    /// `Variant`: a `Type` discriminant and a 16-byte payload union
    pub fn variant(&mut self) -> TypeHandle
    {
        self.named("Variant", |rt, name| {
            let variant = rt.image.declare(name);
            let members: Vec<(&str, i64)> = VARIANT_TYPES.iter().zip(0..).map(|(n, v)| (*n, v)).collect();
            let kind = rt.image.define_enum("Variant::Type", BasicKind::UnsignedInt, &members);

            // Payload types that live in `_mem` must be known for casts
            for math in ["Vector2", "Color", "Transform2D", "AABB", "Basis", "Transform3D", "Projection"] {
                let _ = rt.math(math);
            }
            rt.string();
            rt.string_name();
            let id = rt.object_id();
            let object = rt.object();
            let object_ptr = rt.ptr(object);
            rt.image.define("Variant::ObjData").field("id", id).field("obj", object_ptr).build();

            let u32_ty = rt.uint32();
            let ref_base = rt.image.define("Variant::PackedArrayRefBase").field("refcount", u32_ty).build();
            let ref_base_ptr = rt.ptr(ref_base);
            let byte = rt.image.basic(BasicKind::UnsignedChar);
            let mem = rt.image.array_of(byte, 16);
            let (bool_ty, int64, double) = (rt.boolean(), rt.int64(), rt.double());
            let void = rt.image.basic(BasicKind::Void);
            let void_ptr = rt.ptr(void);
            let mut payload = rt
                .image
                .define("Variant::_Data")
                .field("_bool", bool_ty)
                .field("_int", int64)
                .field("_float", double)
                .field("packed_array", ref_base_ptr)
                .field("_ptr", void_ptr)
                .field("_mem", mem);
            let boxed = [
                ("_transform2d", "Transform2D"),
                ("_aabb", "AABB"),
                ("_basis", "Basis"),
                ("_transform3d", "Transform3D"),
                ("_projection", "Projection"),
            ];
            let boxed: Vec<(&str, TypeHandle)> = boxed
                .iter()
                .filter_map(|(member, ty)| payload.image.by_name.get(*ty).map(|t| (*member, *t)))
                .collect();
            for (member, ty) in boxed {
                let ptr = payload.image.pointer_to(ty);
                payload = payload.field(member, ptr);
            }
            let payload = payload.union().build();
            rt.image.complete(variant).field("type", kind).field("_data", payload).build()
        })
    }

    /// `Variant::PackedArrayRef<T>` holding a `Vector<T>`
    pub fn packed_array_ref(&mut self, element: TypeHandle) -> TypeHandle
    {
        let name = format!("Variant::PackedArrayRef<{}>", self.name(element));
        self.named(&name, |rt, name| {
            rt.variant();
            let base = rt.image.by_name.get("Variant::PackedArrayRefBase").copied();
            let array = rt.vector(element);
            let def = rt.image.define(name);
            let def = match base {
                Some(base) => def.base(base),
                None => def,
            };
            def.field("array", array).template_arg(element).build()
        })
    }

    /// `Array`: pointer to a private block owning a `Vector<Variant>`
    pub fn array(&mut self) -> TypeHandle
    {
        self.named("Array", |rt, name| {
            let variant = rt.variant();
            let values = rt.vector(variant);
            let (u32_ty, variant_ptr) = (rt.uint32(), rt.ptr(variant));
            let private = rt
                .image
                .define("ArrayPrivate")
                .field("refcount", u32_ty)
                .field("array", values)
                .field("read_only", variant_ptr)
                .build();
            let private = rt.ptr(private);
            rt.image.define(name).field("_p", private).build()
        })
    }

    /// `Dictionary`: pointer to a private block owning a `HashMap<Variant, Variant>`
    pub fn dictionary(&mut self) -> TypeHandle
    {
        self.named("Dictionary", |rt, name| {
            let variant = rt.variant();
            let map = rt.hash_map(variant, variant);
            let (u32_ty, variant_ptr) = (rt.uint32(), rt.ptr(variant));
            let private = rt
                .image
                .define("DictionaryPrivate")
                .field("refcount", u32_ty)
                .field("variant_map", map)
                .field("read_only", variant_ptr)
                .build();
            let private = rt.ptr(private);
            rt.image.define(name).field("_p", private).build()
        })
    }

    // ---- storing values ---------------------------------------------------

    fn pointee(&self, pointer: TypeHandle) -> Result<TypeHandle>
    {
        self.image
            .type_info(pointer)
            .and_then(|info| info.pointee())
            .ok_or_else(|| InspectError::NotAPointer(self.image.name_of(pointer).to_string()))
    }

    fn pointee_of(&self, value: &RemoteValue, member: &str) -> Result<TypeHandle>
    {
        let member = self.image.member(value, member)?;
        self.pointee(member.type_handle())
    }

    fn node(&mut self, ty: TypeHandle) -> Result<RemoteValue>
    {
        self.image.new_value("node", ty)
    }

    /// A NUL-terminated narrow string in its own region
    ///
    /// ## Errors
    ///
    /// Never fails for a freshly mapped region; the signature follows the
    /// other writers.
    pub fn c_string(&mut self, text: &str) -> Result<Address>
    {
        let address = self.image.alloc(text.len() as u64 + 1, 1);
        self.image.write(address, text.as_bytes())?;
        Ok(address)
    }

    /// A copy-on-write buffer of `count` elements of `element`
    ///
    /// Returns the address of the first element; the refcount and size
    /// words sit just before it.
    ///
    /// ## Errors
    ///
    /// Fails if the header cannot be written.
    pub fn cow_buffer(&mut self, element: TypeHandle, count: u64) -> Result<Address>
    {
        let size = self.image.size_of(element).saturating_mul(count);
        let start = self.image.alloc(COW_HEADER + size, self.image.align_of(element));
        self.image.write_unsigned(start, 1, 8)?;
        self.image.write_unsigned(start + 8, count, 8)?;
        Ok(start + COW_HEADER)
    }

    /// Allocate `count` elements behind the `_ptr` of a `CowData` value
    fn cow_elements(&mut self, cow: &RemoteValue, count: usize) -> Result<Vec<RemoteValue>>
    {
        if count == 0 {
            return Ok(Vec::new());
        }
        let element = self.pointee_of(cow, "_ptr")?;
        let base = self.cow_buffer(element, count as u64)?;
        self.image.set_pointer(cow, "_ptr", base)?;
        Ok(self.elements_at(base, element, count))
    }

    fn elements_at(&self, base: Address, element: TypeHandle, count: usize) -> Vec<RemoteValue>
    {
        let stride = self.image.size_of(element);
        (0..count)
            .map(|i| RemoteValue::new(format!("[{i}]"), base + i as u64 * stride, element))
            .collect()
    }

    /// Store `item` into the location `dest`, encoded for its type
    ///
    /// ## Errors
    ///
    /// Fails when the item does not fit the destination type or a write
    /// lands outside mapped memory.
    pub fn put(&mut self, dest: &RemoteValue, item: &Item) -> Result<()>
    {
        let info = self
            .image
            .type_info(dest.type_handle())
            .cloned()
            .ok_or(InspectError::UnknownTypeHandle(dest.type_handle().0))?;
        match &info.kind {
            TypeKind::Basic(kind) if kind.is_float() => {
                self.image.write_float(dest.address(), item.as_float()?, info.byte_size)
            }
            #[allow(clippy::cast_sign_loss)]
            TypeKind::Basic(_) | TypeKind::Enumeration { .. } => {
                self.image.write_unsigned(dest.address(), item.as_int()? as u64, info.byte_size)
            }
            TypeKind::Pointer { .. } => match item {
                Item::Nil => self.image.write_pointer(dest.address(), Address::ZERO),
                Item::Object(target) => self.image.write_pointer(dest.address(), *target),
                _ => Err(item.mismatch("a pointer")),
            },
            TypeKind::Struct { .. } => match info.name.as_str() {
                "Variant" => self.put_variant(dest, item),
                "String" | "CharString" => self.put_text(dest, item.as_text()?),
                "StringName" => self.put_string_name(dest, item),
                "NodePath" => self.put_node_path(dest, item.as_text()?),
                "Array" => match item {
                    Item::Array(items) => self.put_array(dest, items),
                    _ => Err(item.mismatch("an array")),
                },
                "Dictionary" => match item {
                    Item::Dictionary(pairs) => self.put_dictionary(dest, pairs),
                    _ => Err(item.mismatch("a dictionary")),
                },
                _ => self.put_leaves(dest, &item.leaves()?),
            },
            TypeKind::Array { .. } => self.put_leaves(dest, &item.leaves()?),
        }
    }

    /// Leaf offsets and types of a plain aggregate, depth first
    fn leaves(&self, ty: TypeHandle, offset: u64, out: &mut Vec<(u64, TypeHandle)>)
    {
        let Some(info) = self.image.type_info(ty) else {
            return;
        };
        match &info.kind {
            TypeKind::Struct { fields, .. } => {
                for field in fields {
                    self.leaves(field.ty, offset + field.offset, out);
                }
            }
            TypeKind::Array { element, len } => {
                let stride = self.image.size_of(*element);
                for i in 0..*len {
                    self.leaves(*element, offset + i * stride, out);
                }
            }
            _ => out.push((offset, ty)),
        }
    }

    fn put_leaves(&mut self, dest: &RemoteValue, values: &[f64]) -> Result<()>
    {
        let mut leaves = Vec::new();
        self.leaves(dest.type_handle(), 0, &mut leaves);
        if leaves.len() != values.len() {
            return Err(InspectError::Corrupt(format!(
                "{} has {} components, got {}",
                self.image.name_of(dest.type_handle()),
                leaves.len(),
                values.len()
            )));
        }
        for ((offset, ty), value) in leaves.into_iter().zip(values) {
            let leaf = RemoteValue::new("leaf", dest.address() + offset, ty);
            let is_float = self.image.type_info(ty).and_then(|info| info.basic_kind()).is_some_and(BasicKind::is_float);
            #[allow(clippy::cast_possible_truncation)]
            let item = if is_float { Item::Float(*value) } else { Item::Int(value.round() as i64) };
            self.put(&leaf, &item)?;
        }
        Ok(())
    }

    /// `String`/`CharString` text, NUL terminated; empty text stays null
    fn put_text(&mut self, dest: &RemoteValue, text: &str) -> Result<()>
    {
        let cow = self.image.member(dest, "_cowdata")?;
        if text.is_empty() {
            return Ok(());
        }
        let unit = self.pointee_of(&cow, "_ptr")?;
        let units: Vec<u64> = if self.image.size_of(unit) == 1 {
            text.bytes().map(u64::from).chain([0]).collect()
        } else {
            text.chars().map(|c| u64::from(u32::from(c))).chain([0]).collect()
        };
        for (element, code) in self.cow_elements(&cow, units.len())?.iter().zip(units) {
            self.image.write_unsigned(element.address(), code, self.image.size_of(unit))?;
        }
        Ok(())
    }

    /// Interned names; empty names stay null
    fn put_string_name(&mut self, dest: &RemoteValue, item: &Item) -> Result<()>
    {
        let text = item.as_text()?;
        if text.is_empty() {
            return Ok(());
        }
        let data_ty = self.pointee_of(dest, "_data")?;
        let data = self.node(data_ty)?;
        self.image.set_unsigned(&data, "refcount", 1)?;
        if let Item::StaticName(text) = item {
            let cname = self.c_string(text)?;
            self.image.set_pointer(&data, "cname", cname)?;
        } else {
            let name = self.image.member(&data, "name")?;
            self.put(&name, &Item::Str(text.to_string()))?;
        }
        self.image.set_pointer(dest, "_data", data.address())
    }

    /// `/a/b:c:d` style paths; empty paths stay null
    fn put_node_path(&mut self, dest: &RemoteValue, text: &str) -> Result<()>
    {
        if text.is_empty() {
            return Ok(());
        }
        let absolute = text.starts_with('/');
        let (path, subpath) = text.trim_start_matches('/').split_once(':').unwrap_or((text.trim_start_matches('/'), ""));
        let path: Vec<Item> = path.split('/').filter(|p| !p.is_empty()).map(|p| Item::Name(p.to_string())).collect();
        let subpath: Vec<Item> =
            subpath.split(':').filter(|p| !p.is_empty()).map(|p| Item::Name(p.to_string())).collect();

        let data_ty = self.pointee_of(dest, "data")?;
        let data = self.node(data_ty)?;
        self.image.set_unsigned(&data, "refcount", 1)?;
        self.image.set_unsigned(&data, "absolute", u64::from(absolute))?;
        for (member, parts) in [("path._cowdata", path), ("subpath._cowdata", subpath)] {
            let cow = self.image.member(&data, member)?;
            for (element, part) in self.cow_elements(&cow, parts.len())?.iter().zip(&parts) {
                self.put(element, part)?;
            }
        }
        self.image.set_pointer(dest, "data", data.address())
    }

    fn put_variant(&mut self, dest: &RemoteValue, item: &Item) -> Result<()>
    {
        let mem = self.image.member(dest, "_data._mem")?;
        let (tag, payload) = match item {
            Item::Nil => (tag::NIL, None),
            Item::Bool(_) => (tag::BOOL, Some(self.image.member(dest, "_data._bool")?)),
            Item::Int(_) => (tag::INT, Some(self.image.member(dest, "_data._int")?)),
            Item::Float(_) => (tag::FLOAT, Some(self.image.member(dest, "_data._float")?)),
            Item::Str(_) => (tag::STRING, Some(RemoteValue::new("_mem", mem.address(), self.string()))),
            Item::Name(_) | Item::StaticName(_) => {
                (tag::STRING_NAME, Some(RemoteValue::new("_mem", mem.address(), self.string_name())))
            }
            Item::Vector2(_) => (tag::VECTOR2, Some(RemoteValue::new("_mem", mem.address(), self.math("Vector2")?))),
            Item::Color(_) => (tag::COLOR, Some(RemoteValue::new("_mem", mem.address(), self.math("Color")?))),
            Item::Array(_) => (tag::ARRAY, Some(RemoteValue::new("_mem", mem.address(), self.array()))),
            Item::Dictionary(_) => (tag::DICTIONARY, Some(RemoteValue::new("_mem", mem.address(), self.dictionary()))),
            Item::Object(target) => {
                let obj_data = self.image.by_name.get("Variant::ObjData").copied();
                let obj_data = obj_data.ok_or_else(|| InspectError::UnknownType("Variant::ObjData".to_string()))?;
                let data = RemoteValue::new("_mem", mem.address(), obj_data);
                self.image.set_unsigned(&data, "id.id", u64::from(!target.is_null()))?;
                self.image.set_pointer(&data, "obj", *target)?;
                (tag::OBJECT, None)
            }
            Item::PackedInt32(values) => {
                let int = self.int();
                let ref_ty = self.packed_array_ref(int);
                let reference = self.node(ref_ty)?;
                self.image.set_unsigned(&reference, "refcount", 1)?;
                let cow = self.image.member(&reference, "array._cowdata")?;
                for (element, value) in self.cow_elements(&cow, values.len())?.iter().zip(values) {
                    self.put(element, &Item::Int(i64::from(*value)))?;
                }
                self.image.set_pointer(dest, "_data.packed_array", reference.address())?;
                (tag::PACKED_INT32_ARRAY, None)
            }
            Item::Floats(_) => return Err(item.mismatch("a variant payload")),
        };
        self.image.set_unsigned(dest, "type", tag)?;
        match payload {
            Some(payload) => self.put(&payload, item),
            None => Ok(()),
        }
    }

    fn put_array(&mut self, dest: &RemoteValue, items: &[Item]) -> Result<()>
    {
        let private_ty = self.pointee_of(dest, "_p")?;
        let private = self.node(private_ty)?;
        self.image.set_unsigned(&private, "refcount", 1)?;
        let cow = self.image.member(&private, "array._cowdata")?;
        for (element, item) in self.cow_elements(&cow, items.len())?.iter().zip(items) {
            self.put(element, item)?;
        }
        self.image.set_pointer(dest, "_p", private.address())
    }

    fn put_dictionary(&mut self, dest: &RemoteValue, pairs: &[(Item, Item)]) -> Result<()>
    {
        let private_ty = self.pointee_of(dest, "_p")?;
        let private = self.node(private_ty)?;
        self.image.set_unsigned(&private, "refcount", 1)?;
        let map = self.image.member(&private, "variant_map")?;
        self.fill_hash_map(&map, pairs)?;
        self.image.set_pointer(dest, "_p", private.address())
    }

    // ---- filling containers -----------------------------------------------

    fn fill_list(&mut self, list: &RemoteValue, items: &[Item]) -> Result<()>
    {
        if items.is_empty() {
            return Ok(());
        }
        let data_ty = self.pointee_of(list, "_data")?;
        let data = self.node(data_ty)?;
        let node_ty = self.pointee_of(&data, "first")?;
        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            let node = self.node(node_ty)?;
            let value = self.image.member(&node, "value")?;
            self.put(&value, item)?;
            self.image.set_pointer(&node, "data", data.address())?;
            nodes.push(node);
        }
        self.link(&nodes, "next_ptr", "prev_ptr")?;
        self.image.set_pointer(&data, "first", nodes[0].address())?;
        self.image.set_pointer(&data, "last", nodes[nodes.len() - 1].address())?;
        self.image.set_unsigned(&data, "size_cache", nodes.len() as u64)?;
        self.image.set_pointer(list, "_data", data.address())
    }

    /// Doubly link `nodes` in order; the ends keep null links
    fn link(&mut self, nodes: &[RemoteValue], next: &str, prev: &str) -> Result<()>
    {
        for pair in nodes.windows(2) {
            self.image.set_pointer(&pair[0], next, pair[1].address())?;
            self.image.set_pointer(&pair[1], prev, pair[0].address())?;
        }
        Ok(())
    }

    fn fill_hash_map(&mut self, map: &RemoteValue, pairs: &[(Item, Item)]) -> Result<()>
    {
        if pairs.is_empty() {
            return Ok(());
        }
        let element_ty = self.pointee_of(map, "head_element")?;
        let mut nodes = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let node = self.node(element_ty)?;
            self.put(&self.image.member(&node, "data.key")?, key)?;
            self.put(&self.image.member(&node, "data.value")?, value)?;
            nodes.push(node);
        }
        self.link(&nodes, "next", "prev")?;

        let capacity = (pairs.len() as u64).next_power_of_two().max(4);
        let table = self.image.alloc(capacity * 8, 8);
        for (slot, node) in nodes.iter().enumerate() {
            self.image.write_pointer(table + slot as u64 * 8, node.address())?;
        }
        let hashes = self.image.alloc(capacity * 4, 4);
        self.image.set_pointer(map, "elements", table)?;
        self.image.set_pointer(map, "hashes", hashes)?;
        self.image.set_pointer(map, "head_element", nodes[0].address())?;
        self.image.set_pointer(map, "tail_element", nodes[nodes.len() - 1].address())?;
        self.image.set_unsigned(map, "num_elements", nodes.len() as u64)
    }

    fn fill_rb_map(&mut self, map: &RemoteValue, pairs: &[(Item, Item)]) -> Result<()>
    {
        let element_ty = self.pointee_of(map, "_data._root")?;
        let root = self.node(element_ty)?;
        let nil = self.node(element_ty)?;
        for link in ["left", "right", "parent"] {
            self.image.set_pointer(&nil, link, nil.address())?;
            self.image.set_pointer(&root, link, nil.address())?;
        }
        let mut nodes = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let node = self.node(element_ty)?;
            self.put(&self.image.member(&node, "_data.key")?, key)?;
            self.put(&self.image.member(&node, "_data.value")?, value)?;
            nodes.push(node);
        }
        self.link(&nodes, "_next", "_prev")?;
        let top = self.build_tree(&nodes, root.address(), nil.address())?;
        self.image.set_pointer(&root, "left", top)?;
        self.image.set_pointer(map, "_data._root", root.address())?;
        self.image.set_pointer(map, "_data._nil", nil.address())?;
        self.image.set_unsigned(map, "_data.size_cache", nodes.len() as u64)
    }

    /// Balanced tree over in-order `nodes`, returning the subtree root
    fn build_tree(&mut self, nodes: &[RemoteValue], parent: Address, nil: Address) -> Result<Address>
    {
        if nodes.is_empty() {
            return Ok(nil);
        }
        let mid = nodes.len() / 2;
        let node = nodes[mid].clone();
        self.image.set_pointer(&node, "parent", parent)?;
        let left = self.build_tree(&nodes[..mid], node.address(), nil)?;
        let right = self.build_tree(&nodes[mid + 1..], node.address(), nil)?;
        self.image.set_pointer(&node, "left", left)?;
        self.image.set_pointer(&node, "right", right)?;
        Ok(node.address())
    }

    // ---- values -----------------------------------------------------------

    /// Allocate a value of type `ty` holding `item`
    ///
    /// ## Errors
    ///
    /// See [`RuntimeBuilder::put`].
    pub fn new_item(&mut self, name: &str, ty: TypeHandle, item: &Item) -> Result<RemoteValue>
    {
        let value = self.image.new_value(name, ty)?;
        self.put(&value, item)?;
        Ok(value)
    }

    /// A `String`
    ///
    /// ## Errors
    ///
    /// See [`RuntimeBuilder::put`].
    pub fn new_string(&mut self, name: &str, text: &str) -> Result<RemoteValue>
    {
        let ty = self.string();
        self.new_item(name, ty, &Item::Str(text.to_string()))
    }

    /// A `StringName` whose text lives in the name table entry
    ///
    /// ## Errors
    ///
    /// See [`RuntimeBuilder::put`].
    pub fn new_string_name(&mut self, name: &str, text: &str) -> Result<RemoteValue>
    {
        let ty = self.string_name();
        self.new_item(name, ty, &Item::Name(text.to_string()))
    }

    /// A `NodePath` parsed from `/absolute/path:sub:names`
    ///
    /// ## Errors
    ///
    /// See [`RuntimeBuilder::put`].
    pub fn new_node_path(&mut self, name: &str, path: &str) -> Result<RemoteValue>
    {
        let ty = self.node_path();
        self.new_item(name, ty, &Item::Str(path.to_string()))
    }

    /// A `Variant`
    ///
    /// ## Errors
    ///
    /// See [`RuntimeBuilder::put`].
    pub fn new_variant(&mut self, name: &str, item: impl Into<Item>) -> Result<RemoteValue>
    {
        let ty = self.variant();
        self.new_item(name, ty, &item.into())
    }

    /// A math value from its leaf components in declaration order
    ///
    /// ## Errors
    ///
    /// Fails for unknown math types and wrong component counts.
    pub fn new_math(&mut self, name: &str, type_name: &str, components: &[f64]) -> Result<RemoteValue>
    {
        let ty = self.math(type_name)?;
        self.new_item(name, ty, &Item::Floats(components.to_vec()))
    }

    /// An `Object` with an instance id
    ///
    /// ## Errors
    ///
    /// See [`MemoryImage::set_unsigned`].
    pub fn new_object(&mut self, name: &str, instance_id: u64) -> Result<RemoteValue>
    {
        let ty = self.object();
        let object = self.image.new_value(name, ty)?;
        self.image.set_unsigned(&object, "_instance_id.id", instance_id)?;
        Ok(object)
    }

    /// A `Vector<T>`
    ///
    /// ## Errors
    ///
    /// Fails when an item does not fit the element type.
    pub fn new_vector<I: Into<Item>>(
        &mut self,
        name: &str,
        element: TypeHandle,
        items: impl IntoIterator<Item = I>,
    ) -> Result<RemoteValue>
    {
        let items = collect(items);
        let ty = self.vector(element);
        let value = self.image.new_value(name, ty)?;
        let cow = self.image.member(&value, "_cowdata")?;
        for (slot, item) in self.cow_elements(&cow, items.len())?.iter().zip(&items) {
            self.put(slot, item)?;
        }
        Ok(value)
    }

    /// A `LocalVector<T>` with `spare` unused slots after the elements
    ///
    /// ## Errors
    ///
    /// Fails when an item does not fit the element type.
    pub fn new_local_vector<I: Into<Item>>(
        &mut self,
        name: &str,
        element: TypeHandle,
        items: impl IntoIterator<Item = I>,
        spare: u64,
    ) -> Result<RemoteValue>
    {
        let items = collect(items);
        let ty = self.local_vector(element);
        let value = self.image.new_value(name, ty)?;
        let capacity = items.len() as u64 + spare;
        if capacity > 0 {
            let base = self.image.alloc_array(element, capacity);
            for (slot, item) in self.elements_at(base, element, items.len()).iter().zip(&items) {
                self.put(slot, item)?;
            }
            self.image.set_pointer(&value, "data", base)?;
        }
        self.image.set_unsigned(&value, "count", items.len() as u64)?;
        self.image.set_unsigned(&value, "capacity", capacity)?;
        Ok(value)
    }

    /// A `List<T>`
    ///
    /// ## Errors
    ///
    /// Fails when an item does not fit the element type.
    pub fn new_list<I: Into<Item>>(
        &mut self,
        name: &str,
        element: TypeHandle,
        items: impl IntoIterator<Item = I>,
    ) -> Result<RemoteValue>
    {
        let items = collect(items);
        let ty = self.list(element);
        let value = self.image.new_value(name, ty)?;
        self.fill_list(&value, &items)?;
        Ok(value)
    }

    /// A `HashMap<K, V>` in insertion order
    ///
    /// ## Errors
    ///
    /// Fails when a key or value does not fit its type.
    pub fn new_hash_map<K: Into<Item>, V: Into<Item>>(
        &mut self,
        name: &str,
        key: TypeHandle,
        value: TypeHandle,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<RemoteValue>
    {
        let pairs = collect_pairs(pairs);
        let ty = self.hash_map(key, value);
        let map = self.image.new_value(name, ty)?;
        self.fill_hash_map(&map, &pairs)?;
        Ok(map)
    }

    /// An `RBMap<K, V>`; `pairs` must already be in key order
    ///
    /// ## Errors
    ///
    /// Fails when a key or value does not fit its type.
    pub fn new_rb_map<K: Into<Item>, V: Into<Item>>(
        &mut self,
        name: &str,
        key: TypeHandle,
        value: TypeHandle,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<RemoteValue>
    {
        let pairs = collect_pairs(pairs);
        let ty = self.rb_map(key, value);
        let map = self.image.new_value(name, ty)?;
        self.fill_rb_map(&map, &pairs)?;
        Ok(map)
    }

    /// A `VMap<K, V>`; `pairs` must already be in key order
    ///
    /// ## Errors
    ///
    /// Fails when a key or value does not fit its type.
    pub fn new_vmap<K: Into<Item>, V: Into<Item>>(
        &mut self,
        name: &str,
        key: TypeHandle,
        value: TypeHandle,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<RemoteValue>
    {
        let pairs = collect_pairs(pairs);
        let ty = self.vmap(key, value);
        let map = self.image.new_value(name, ty)?;
        let cow = self.image.member(&map, "_cowdata")?;
        for (slot, (k, v)) in self.cow_elements(&cow, pairs.len())?.iter().zip(&pairs) {
            self.put(&self.image.member(slot, "key")?, k)?;
            self.put(&self.image.member(slot, "value")?, v)?;
        }
        Ok(map)
    }

    /// A `HashSet<T>`
    ///
    /// ## Errors
    ///
    /// Fails when an item does not fit the element type.
    pub fn new_hash_set<I: Into<Item>>(
        &mut self,
        name: &str,
        element: TypeHandle,
        items: impl IntoIterator<Item = I>,
    ) -> Result<RemoteValue>
    {
        let items = collect(items);
        let ty = self.hash_set(element);
        let set = self.image.new_value(name, ty)?;
        if !items.is_empty() {
            let capacity = (items.len() as u64).next_power_of_two().max(4);
            let keys = self.image.alloc_array(element, capacity);
            for (slot, item) in self.elements_at(keys, element, items.len()).iter().zip(&items) {
                self.put(slot, item)?;
            }
            self.image.set_pointer(&set, "keys", keys)?;
        }
        self.image.set_unsigned(&set, "num_elements", items.len() as u64)?;
        Ok(set)
    }

    /// A `PagedArray<T>` with pages of `1 << page_shift` elements
    ///
    /// ## Errors
    ///
    /// Fails when an item does not fit the element type.
    pub fn new_paged_array<I: Into<Item>>(
        &mut self,
        name: &str,
        element: TypeHandle,
        items: impl IntoIterator<Item = I>,
        page_shift: u32,
    ) -> Result<RemoteValue>
    {
        let items = collect(items);
        let ty = self.paged_array(element);
        let array = self.image.new_value(name, ty)?;
        let page_size = 1usize << page_shift;
        let pages = items.len().div_ceil(page_size);

        let pool_ty = self.pointee_of(&array, "page_pool")?;
        let pool = self.node(pool_ty)?;
        self.image.set_unsigned(&pool, "pages_allocated", pages as u64)?;
        self.image.set_unsigned(&pool, "pages_available", 0)?;
        self.image.set_unsigned(&pool, "page_size", page_size as u64)?;
        self.image.set_pointer(&array, "page_pool", pool.address())?;

        let table = self.image.alloc(pages.max(1) as u64 * 8, 8);
        for (page, chunk) in items.chunks(page_size).enumerate() {
            let base = self.image.alloc_array(element, page_size as u64);
            for (slot, item) in self.elements_at(base, element, chunk.len()).iter().zip(chunk) {
                self.put(slot, item)?;
            }
            self.image.write_pointer(table + page as u64 * 8, base)?;
        }
        self.image.set_pointer(&array, "page_data", table)?;
        self.image.set_unsigned(&array, "max_pages_used", pages as u64)?;
        self.image.set_unsigned(&array, "count", items.len() as u64)?;
        self.image.set_unsigned(&array, "page_size_shift", u64::from(page_shift))?;
        self.image.set_unsigned(&array, "page_size_mask", page_size as u64 - 1)?;
        Ok(array)
    }

    /// A `RingBuffer<T>` over `items`; the item count should be a power of two
    ///
    /// ## Errors
    ///
    /// Fails when an item does not fit the element type.
    pub fn new_ring_buffer<I: Into<Item>>(
        &mut self,
        name: &str,
        element: TypeHandle,
        items: impl IntoIterator<Item = I>,
        read_pos: i64,
        write_pos: i64,
    ) -> Result<RemoteValue>
    {
        let items = collect(items);
        let ty = self.ring_buffer(element);
        let ring = self.image.new_value(name, ty)?;
        let cow = self.image.member(&ring, "data._cowdata")?;
        for (slot, item) in self.cow_elements(&cow, items.len())?.iter().zip(&items) {
            self.put(slot, item)?;
        }
        self.image.set_signed(&ring, "read_pos", read_pos)?;
        self.image.set_signed(&ring, "write_pos", write_pos)?;
        self.image.set_unsigned(&ring, "size_mask", (items.len() as u64).saturating_sub(1))?;
        Ok(ring)
    }

    /// A `VSet<T>`; `items` must already be sorted
    ///
    /// ## Errors
    ///
    /// Fails when an item does not fit the element type.
    pub fn new_vset<I: Into<Item>>(
        &mut self,
        name: &str,
        element: TypeHandle,
        items: impl IntoIterator<Item = I>,
    ) -> Result<RemoteValue>
    {
        let items = collect(items);
        let ty = self.vset(element);
        let set = self.image.new_value(name, ty)?;
        let cow = self.image.member(&set, "_data._cowdata")?;
        for (slot, item) in self.cow_elements(&cow, items.len())?.iter().zip(&items) {
            self.put(slot, item)?;
        }
        Ok(set)
    }

    /// An `Array` of variants
    ///
    /// ## Errors
    ///
    /// Fails when an item cannot be stored in a variant.
    pub fn new_array<I: Into<Item>>(&mut self, name: &str, items: impl IntoIterator<Item = I>) -> Result<RemoteValue>
    {
        let ty = self.array();
        self.new_item(name, ty, &Item::Array(collect(items)))
    }

    /// A `Dictionary` in insertion order
    ///
    /// ## Errors
    ///
    /// Fails when a key or value cannot be stored in a variant.
    pub fn new_dictionary<K: Into<Item>, V: Into<Item>>(
        &mut self,
        name: &str,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<RemoteValue>
    {
        let ty = self.dictionary();
        self.new_item(name, ty, &Item::Dictionary(collect_pairs(pairs)))
    }

    /// Publish the `named_colors` table, terminated by a null name
    ///
    /// ## Errors
    ///
    /// Fails if a color cannot be written.
    pub fn define_named_colors(&mut self, colors: &[(&str, [f64; 4])]) -> Result<RemoteValue>
    {
        let color = self.math("Color")?;
        let cstr = self.image.basic(BasicKind::Char);
        let cstr = self.ptr(cstr);
        let existing = self.image.by_name.get("NamedColor").copied();
        let entry = match existing {
            Some(entry) => entry,
            None => self.image.define("NamedColor").field("name", cstr).field("color", color).build(),
        };
        let table_ty = self.image.array_of(entry, colors.len() as u64 + 1);
        let table = self.image.new_value("named_colors", table_ty)?;
        for (i, (name, channels)) in colors.iter().enumerate() {
            let text = self.c_string(name)?;
            self.image.set_pointer(&table, &format!("{i}.name"), text)?;
            let slot = self.image.member(&table, &format!("{i}.color"))?;
            self.put(&slot, &Item::Color(*channels))?;
        }
        self.image.define_global("named_colors", table.clone());
        Ok(table)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_type_constructors_are_memoized()
    {
        let mut image = MemoryImage::new();
        let mut rt = RuntimeBuilder::new(&mut image);
        let int = rt.int();
        let first = rt.vector(int);
        let second = rt.vector(int);
        assert_eq!(first, second);
        assert_eq!(image.name_of(first), "Vector<int>");
    }

    #[test]
    fn test_variant_is_24_bytes_with_payload_at_8()
    {
        let mut image = MemoryImage::new();
        let variant = RuntimeBuilder::new(&mut image).variant();
        assert_eq!(image.size_of(variant), 24);
        assert_eq!(image.offset_of(variant, "_data").unwrap().0, 8);
    }

    #[test]
    fn test_cow_header_holds_size_before_elements()
    {
        let mut image = MemoryImage::new();
        let mut rt = RuntimeBuilder::new(&mut image);
        let int = rt.int();
        let value = rt.new_vector("v", int, [7, 8, 9]).unwrap();
        let base = {
            let ptr = image.member(&value, "_cowdata._ptr").unwrap();
            let mut buf = [0u8; 8];
            image.read_memory(ptr.address(), &mut buf).unwrap();
            Address::new(u64::from_le_bytes(buf))
        };
        let mut size = [0u8; 8];
        image.read_memory(base - 8, &mut size).unwrap();
        assert_eq!(u64::from_le_bytes(size), 3);
    }

    #[test]
    fn test_item_mismatch_is_reported()
    {
        let mut image = MemoryImage::new();
        let mut rt = RuntimeBuilder::new(&mut image);
        let int = rt.int();
        assert!(rt.new_vector("v", int, ["text"]).is_err());
    }
}
