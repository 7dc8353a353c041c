use std::cmp::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;

/// The value kinds.
///
/// The variant order defines the cross-kind total order used by
/// [`Value::compare`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ValueType {
    /// The null value.
    Null,
    /// A boolean.
    Bool,
    /// A signed 32-bit integer.
    Int32,
    /// An unsigned 32-bit integer.
    UInt32,
    /// A signed 64-bit integer.
    Int64,
    /// An unsigned 64-bit integer.
    UInt64,
    /// A double-precision float.
    Double,
    /// A UTF-8 string.
    String,
    /// An ordered array of values.
    Array,
    /// An ordered mapping from string keys to values.
    Object,
}

impl ValueType {
    /// A short name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Int32 => "int32",
            ValueType::UInt32 => "uint32",
            ValueType::Int64 => "int64",
            ValueType::UInt64 => "uint64",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Array => "array",
            ValueType::Object => "object",
        }
    }
}

/// A polymorphic configuration value.
///
/// String and array payloads are immutable and structurally shared between
/// clones. Object payloads are exclusively owned: cloning a value of object
/// kind deep-copies the member table, so mutations never leak between
/// clones.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// The null value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed 32-bit integer.
    Int32(i32),
    /// An unsigned 32-bit integer.
    UInt32(u32),
    /// A signed 64-bit integer.
    Int64(i64),
    /// An unsigned 64-bit integer.
    UInt64(u64),
    /// A double-precision float.
    Double(f64),
    /// A shared immutable string payload.
    String(Arc<str>),
    /// A shared immutable array payload, fixed in size. Mutating an element
    /// through [`Value::update_member_path`] first replaces a shared
    /// payload with an exclusive copy.
    Array(Arc<[Value]>),
    /// A mutable object payload.
    Object(Object),
}

/// The object payload: an insertion-ordered mapping from string keys to
/// values, carrying a monotonic modification counter.
#[derive(Clone, Debug, Default)]
pub struct Object {
    members: IndexMap<Arc<str>, Value>,
    mod_count: u32,
}

impl Object {
    /// Create an empty object.
    pub fn new() -> Object {
        Object::default()
    }

    /// The number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The modification counter, incremented on every structural change.
    ///
    /// The counter is an observation token for change detection; it takes no
    /// part in equality or ordering.
    pub fn mod_count(&self) -> u32 {
        self.mod_count
    }

    /// Look up a member by key.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.members.get(key)
    }

    /// Look up a member by key, mutably.
    pub fn lookup_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.members.get_mut(key)
    }

    /// Get a member slot, inserting null when the key is absent.
    pub fn upsert(&mut self, key: &str) -> &mut Value {
        let index = match self.members.get_index_of(key) {
            Some(index) => index,
            None => {
                self.mod_count = self.mod_count.wrapping_add(1);
                self.members.insert_full(Arc::from(key), Value::Null).0
            }
        };
        &mut self.members[index]
    }

    /// Insert a member, replacing any existing value without changing its
    /// position.
    pub fn insert(&mut self, key: impl Into<Arc<str>>, value: Value) {
        self.mod_count = self.mod_count.wrapping_add(1);
        self.members.insert(key.into(), value);
    }

    /// Remove a member. Returns whether the key was present.
    pub fn remove(&mut self, key: &str) -> bool {
        if self.members.shift_remove(key).is_some() {
            self.mod_count = self.mod_count.wrapping_add(1);
            true
        } else {
            false
        }
    }

    /// Merge `other` into this object.
    ///
    /// Object-typed members merge recursively; a null member in `other`
    /// removes the key; any other member replaces.
    pub fn merge(&mut self, other: &Object) {
        for (key, value) in &other.members {
            if value.is_null() {
                self.remove(key);
                continue;
            }
            if let Value::Object(src) = value {
                if let Some(Value::Object(dst)) = self.members.get_mut(key.as_ref()) {
                    dst.merge(src);
                    continue;
                }
            }
            self.insert(key.clone(), value.clone());
        }
    }

    /// The key of the i-th member.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.members.get_index(index).map(|(key, _)| key.as_ref())
    }

    /// The value of the i-th member.
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.members.get_index(index).map(|(_, value)| value)
    }

    /// Iterate members in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.members.iter().map(|(key, value)| (key.as_ref(), value))
    }

    /// Iterate member values in order, mutably. Rewriting a value in place
    /// is not a structural change and leaves the counter alone.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.members.values_mut()
    }

    /// Three-way comparison: member count first, then the i-th key and the
    /// i-th value for every index.
    pub fn compare(&self, other: &Object) -> Ordering {
        let ordering = self.members.len().cmp(&other.members.len());
        if ordering != Ordering::Equal {
            return ordering;
        }
        for index in 0..self.members.len() {
            let (key_a, value_a) = self.members.get_index(index).expect("index in range");
            let (key_b, value_b) = other.members.get_index(index).expect("index in range");
            let ordering = key_a.as_bytes().cmp(key_b.as_bytes());
            if ordering != Ordering::Equal {
                return ordering;
            }
            let ordering = value_a.compare(value_b);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Object) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Object {}

enum PathSegment<'a> {
    Member(&'a str),
    Index(usize),
}

/// Split a dotted path expression with optional bracketed indices
/// (`"a.b[2].c"`) into segments. Returns `None` on malformed input.
fn path_segments(path: &str) -> Option<Vec<PathSegment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']')?;
            let index = after[..close].parse::<usize>().ok()?;
            segments.push(PathSegment::Index(index));
            rest = &after[close + 1..];
        } else {
            if rest.starts_with('.') {
                return None;
            }
            let end = rest
                .find(|ch: char| ch == '.' || ch == '[')
                .unwrap_or(rest.len());
            segments.push(PathSegment::Member(&rest[..end]));
            rest = &rest[end..];
        }
        if let Some(after) = rest.strip_prefix('.') {
            if after.is_empty() {
                return None;
            }
            rest = after;
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// Hand out the elements of an array payload for mutation, replacing a
/// shared payload with an exclusively owned copy first. The slice itself is
/// fixed in size; only the elements can be rewritten.
pub(crate) fn exclusive_elts(elts: &mut Arc<[Value]>) -> &mut [Value] {
    if Arc::get_mut(elts).is_none() {
        *elts = elts.iter().cloned().collect();
    }
    Arc::get_mut(elts).expect("payload is exclusively owned after copy")
}

fn fnv1a_lower(text: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in text.bytes() {
        hash ^= u32::from(byte.to_ascii_lowercase());
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

impl Value {
    /// Create a value of the given kind with a zero-initialised payload.
    pub fn new(value_type: ValueType) -> Value {
        match value_type {
            ValueType::Null => Value::Null,
            ValueType::Bool => Value::Bool(false),
            ValueType::Int32 => Value::Int32(0),
            ValueType::UInt32 => Value::UInt32(0),
            ValueType::Int64 => Value::Int64(0),
            ValueType::UInt64 => Value::UInt64(0),
            ValueType::Double => Value::Double(0.0),
            ValueType::String => Value::String(Arc::from("")),
            ValueType::Array => Value::Array(Arc::from(Vec::new())),
            ValueType::Object => Value::Object(Object::new()),
        }
    }

    /// The kind of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int32(_) => ValueType::Int32,
            Value::UInt32(_) => ValueType::UInt32,
            Value::Int64(_) => ValueType::Int64,
            Value::UInt64(_) => ValueType::UInt64,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::Object(_) => ValueType::Object,
        }
    }

    /// A short kind name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Whether the kind is one of the six numeric kinds (bool included).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Bool(_)
                | Value::Int32(_)
                | Value::UInt32(_)
                | Value::Int64(_)
                | Value::UInt64(_)
                | Value::Double(_)
        )
    }

    /// Whether the kind is one of the four integer kinds.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::UInt32(_) | Value::Int64(_) | Value::UInt64(_)
        )
    }

    /// Whether this value converts to `target` without loss.
    ///
    /// Doubles convert to integer kinds on a range check alone; fractions
    /// truncate on conversion. Strings convert to bool only for the exact
    /// texts `"true"` and `"false"`.
    pub fn is_convertible_to(&self, target: ValueType) -> bool {
        if self.value_type() == target {
            return true;
        }
        match *self {
            Value::Bool(_) => matches!(
                target,
                ValueType::Int32
                    | ValueType::UInt32
                    | ValueType::Int64
                    | ValueType::UInt64
                    | ValueType::Double
            ),
            Value::Int32(v) => match target {
                ValueType::Bool | ValueType::Int64 | ValueType::Double => true,
                ValueType::UInt32 | ValueType::UInt64 => v >= 0,
                _ => false,
            },
            Value::UInt32(v) => match target {
                ValueType::Bool | ValueType::Int64 | ValueType::UInt64 | ValueType::Double => true,
                ValueType::Int32 => v <= i32::MAX as u32,
                _ => false,
            },
            Value::Int64(v) => match target {
                ValueType::Bool | ValueType::Double => true,
                ValueType::Int32 => v >= i64::from(i32::MIN) && v <= i64::from(i32::MAX),
                ValueType::UInt32 => v >= 0 && v <= i64::from(u32::MAX),
                ValueType::UInt64 => v >= 0,
                _ => false,
            },
            Value::UInt64(v) => match target {
                ValueType::Bool | ValueType::Double => true,
                ValueType::Int32 => v <= i32::MAX as u64,
                ValueType::UInt32 => v <= u64::from(u32::MAX),
                ValueType::Int64 => v <= i64::MAX as u64,
                _ => false,
            },
            Value::Double(v) => match target {
                ValueType::Bool => true,
                ValueType::Int32 => v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX),
                ValueType::UInt32 => v >= 0.0 && v <= f64::from(u32::MAX),
                ValueType::Int64 => v >= i64::MIN as f64 && v <= i64::MAX as f64,
                ValueType::UInt64 => v >= 0.0 && v <= u64::MAX as f64,
                _ => false,
            },
            Value::String(ref s) => target == ValueType::Bool && (&**s == "true" || &**s == "false"),
            _ => false,
        }
    }

    /// Coerce to bool. Numbers map to `value != 0`; strings accept exactly
    /// `"true"` and `"false"`; anything else yields `default`.
    pub fn as_bool(&self, default: bool) -> bool {
        match *self {
            Value::Bool(v) => v,
            Value::Int32(v) => v != 0,
            Value::UInt32(v) => v != 0,
            Value::Int64(v) => v != 0,
            Value::UInt64(v) => v != 0,
            Value::Double(v) => v != 0.0,
            Value::String(ref s) => match &**s {
                "true" => true,
                "false" => false,
                _ => default,
            },
            _ => default,
        }
    }

    /// Coerce to i32, saturating at the destination bounds.
    pub fn as_i32(&self, default: i32) -> i32 {
        match *self {
            Value::Bool(v) => i32::from(v),
            Value::Int32(v) => v,
            Value::UInt32(v) => v.min(i32::MAX as u32) as i32,
            Value::Int64(v) => v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            Value::UInt64(v) => v.min(i32::MAX as u64) as i32,
            Value::Double(v) => v as i32,
            _ => default,
        }
    }

    /// Coerce to u32, saturating at the destination bounds.
    pub fn as_u32(&self, default: u32) -> u32 {
        match *self {
            Value::Bool(v) => u32::from(v),
            Value::Int32(v) => v.max(0) as u32,
            Value::UInt32(v) => v,
            Value::Int64(v) => v.clamp(0, i64::from(u32::MAX)) as u32,
            Value::UInt64(v) => v.min(u64::from(u32::MAX)) as u32,
            Value::Double(v) => v as u32,
            _ => default,
        }
    }

    /// Coerce to i64, saturating at the destination bounds.
    pub fn as_i64(&self, default: i64) -> i64 {
        match *self {
            Value::Bool(v) => i64::from(v),
            Value::Int32(v) => i64::from(v),
            Value::UInt32(v) => i64::from(v),
            Value::Int64(v) => v,
            Value::UInt64(v) => v.min(i64::MAX as u64) as i64,
            Value::Double(v) => v as i64,
            _ => default,
        }
    }

    /// Coerce to u64, saturating at the destination bounds.
    pub fn as_u64(&self, default: u64) -> u64 {
        match *self {
            Value::Bool(v) => u64::from(v),
            Value::Int32(v) => v.max(0) as u64,
            Value::UInt32(v) => u64::from(v),
            Value::Int64(v) => v.max(0) as u64,
            Value::UInt64(v) => v,
            Value::Double(v) => v as u64,
            _ => default,
        }
    }

    /// Coerce to f32.
    pub fn as_f32(&self, default: f32) -> f32 {
        match *self {
            Value::Bool(v) => f32::from(u8::from(v)),
            Value::Int32(v) => v as f32,
            Value::UInt32(v) => v as f32,
            Value::Int64(v) => v as f32,
            Value::UInt64(v) => v as f32,
            Value::Double(v) => v as f32,
            _ => default,
        }
    }

    /// Coerce to f64.
    pub fn as_f64(&self, default: f64) -> f64 {
        match *self {
            Value::Bool(v) => f64::from(u8::from(v)),
            Value::Int32(v) => f64::from(v),
            Value::UInt32(v) => f64::from(v),
            Value::Int64(v) => v as f64,
            Value::UInt64(v) => v as f64,
            Value::Double(v) => v,
            _ => default,
        }
    }

    /// The string payload, or `default` for any other kind.
    pub fn as_str<'a>(&'a self, default: &'a str) -> &'a str {
        match self {
            Value::String(s) => s,
            _ => default,
        }
    }

    /// A 32-bit identifier for the value.
    ///
    /// Strings hash with 32-bit FNV-1a over the ASCII-lowercased bytes, with
    /// the high bit forced so that a hash is never mistaken for a small
    /// index. Integer kinds clamp their numeric value to `[0, u32::MAX]`.
    pub fn as_id(&self, default: u32) -> u32 {
        match *self {
            Value::String(ref s) => fnv1a_lower(s) | 0x8000_0000,
            Value::Bool(v) => u32::from(v),
            Value::Int32(v) => v.max(0) as u32,
            Value::UInt32(v) => v,
            Value::Int64(v) => v.clamp(0, i64::from(u32::MAX)) as u32,
            Value::UInt64(v) => v.min(u64::from(u32::MAX)) as u32,
            _ => default,
        }
    }

    /// The i-th array element, or the null sentinel when this is not an
    /// array or the index is out of range.
    pub fn elt(&self, index: usize) -> &Value {
        match self {
            Value::Array(elts) => elts.get(index).unwrap_or(&Value::Null),
            _ => &Value::Null,
        }
    }

    /// The i-th array element, mutably. Replaces a shared array payload with
    /// an exclusive copy before handing out the reference.
    pub fn elt_mut(&mut self, index: usize) -> Option<&mut Value> {
        match self {
            Value::Array(elts) if index < elts.len() => Some(&mut exclusive_elts(elts)[index]),
            _ => None,
        }
    }

    /// The number of array elements; zero for any other kind.
    pub fn num_elts(&self) -> usize {
        match self {
            Value::Array(elts) => elts.len(),
            _ => 0,
        }
    }

    /// A member by key, or the null sentinel when this is not an object or
    /// the key is absent.
    pub fn member(&self, key: &str) -> &Value {
        match self {
            Value::Object(object) => object.lookup(key).unwrap_or(&Value::Null),
            _ => &Value::Null,
        }
    }

    /// A mutable member slot, inserting null when absent.
    ///
    /// A null value converts itself to an empty object first. Returns `None`
    /// when the value is any other non-object kind.
    pub fn update_member(&mut self, key: &str) -> Option<&mut Value> {
        if self.is_null() {
            *self = Value::Object(Object::new());
        }
        match self {
            Value::Object(object) => Some(object.upsert(key)),
            _ => None,
        }
    }

    /// Set a member, converting a null value to an object first. Silently
    /// does nothing on any other non-object kind.
    pub fn set_member(&mut self, key: &str, value: Value) {
        if let Some(slot) = self.update_member(key) {
            *slot = value;
        }
    }

    /// Remove a member. Returns whether the key was present.
    pub fn remove_member(&mut self, key: &str) -> bool {
        match self {
            Value::Object(object) => object.remove(key),
            _ => false,
        }
    }

    pub fn has_member(&self, key: &str) -> bool {
        match self {
            Value::Object(object) => object.lookup(key).is_some(),
            _ => false,
        }
    }

    /// The number of object members; zero for any other kind.
    pub fn num_members(&self) -> usize {
        match self {
            Value::Object(object) => object.len(),
            _ => 0,
        }
    }

    /// The key of the i-th member, or `""` when out of range or not an
    /// object.
    pub fn member_name(&self, index: usize) -> &str {
        match self {
            Value::Object(object) => object.name_at(index).unwrap_or(""),
            _ => "",
        }
    }

    /// The value of the i-th member, or the null sentinel.
    pub fn member_value(&self, index: usize) -> &Value {
        match self {
            Value::Object(object) => object.value_at(index).unwrap_or(&Value::Null),
            _ => &Value::Null,
        }
    }

    /// Look up a dotted path with optional bracketed array indices
    /// (`"a.b[2].c"`). Any missing segment yields the null sentinel.
    pub fn member_path(&self, path: &str) -> &Value {
        let Some(segments) = path_segments(path) else {
            return &Value::Null;
        };
        let mut current = self;
        for segment in segments {
            current = match segment {
                PathSegment::Member(key) => current.member(key),
                PathSegment::Index(index) => current.elt(index),
            };
        }
        current
    }

    /// A mutable slot at a dotted path, creating intermediate objects for
    /// member segments. Array segments must already exist; a failed segment
    /// yields `None`.
    pub fn update_member_path(&mut self, path: &str) -> Option<&mut Value> {
        let segments = path_segments(path)?;
        let mut current = self;
        for segment in segments {
            current = match segment {
                PathSegment::Member(key) => current.update_member(key)?,
                PathSegment::Index(index) => current.elt_mut(index)?,
            };
        }
        Some(current)
    }

    /// Merge `overrides` into this value.
    ///
    /// A null override is a no-op; two objects merge recursively per
    /// [`Object::merge`]; anything else replaces this value.
    pub fn merge(&mut self, overrides: &Value) {
        match (&mut *self, overrides) {
            (_, Value::Null) => {}
            (Value::Object(dst), Value::Object(src)) => dst.merge(src),
            _ => *self = overrides.clone(),
        }
    }

    /// Exchange payloads. Two objects swap their member tables so that each
    /// object's modification counter increments.
    pub fn swap(&mut self, other: &mut Value) {
        if let (Value::Object(a), Value::Object(b)) = (&mut *self, &mut *other) {
            std::mem::swap(&mut a.members, &mut b.members);
            a.mod_count = a.mod_count.wrapping_add(1);
            b.mod_count = b.mod_count.wrapping_add(1);
        } else {
            std::mem::swap(self, other);
        }
    }

    /// Three-way comparison by `(kind, payload)`.
    ///
    /// Doubles order by `total_cmp`, strings and keys byte-wise, arrays and
    /// objects by length first and then element-wise.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::UInt32(a), Value::UInt32(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::UInt64(a), Value::UInt64(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Array(a), Value::Array(b)) => {
                let ordering = a.len().cmp(&b.len());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                for (elt_a, elt_b) in a.iter().zip(b.iter()) {
                    let ordering = elt_a.compare(elt_b);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            }
            (Value::Object(a), Value::Object(b)) => a.compare(b),
            _ => self.value_type().cmp(&other.value_type()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Value) -> Ordering {
        self.compare(other)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Value {
        Value::UInt32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Value {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::Double(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(Arc::from(v))
    }
}

impl From<Arc<str>> for Value {
    fn from(v: Arc<str>) -> Value {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::Array(Arc::from(v))
    }
}

impl From<Arc<[Value]>> for Value {
    fn from(v: Arc<[Value]>) -> Value {
        Value::Array(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Value {
        Value::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn object_of(pairs: &[(&str, Value)]) -> Value {
        let mut object = Object::new();
        for (key, value) in pairs {
            object.insert(*key, value.clone());
        }
        Value::Object(object)
    }

    #[test]
    fn numeric_roundtrip() {
        assert_eq!(Value::from(-37i32).as_i32(0), -37);
        assert_eq!(Value::from(u32::MAX).as_u32(0), u32::MAX);
        assert_eq!(Value::from(i64::MIN).as_i64(0), i64::MIN);
        assert_eq!(Value::from(u64::MAX).as_u64(0), u64::MAX);
        assert_eq!(Value::from(0.25f64).as_f64(0.0), 0.25);
        let nan = Value::from(f64::NAN);
        assert!(nan.is_double());
        assert!(nan.as_f64(0.0).is_nan());
    }

    #[test]
    fn saturating_coercions() {
        assert_eq!(Value::from(1e30f64).as_i32(0), i32::MAX);
        assert_eq!(Value::from(-1.0f64).as_u32(7), 0);
        assert_eq!(Value::from(u64::MAX).as_i64(0), i64::MAX);
        assert_eq!(Value::from(-5i64).as_u64(0), 0);
        assert_eq!(Value::from(u32::MAX).as_i32(0), i32::MAX);
        assert_eq!(Value::from(f64::NAN).as_i32(-1), 0);
    }

    #[test]
    fn convertibility_table() {
        use ValueType as T;
        assert!(Value::from(true).is_convertible_to(T::UInt64));
        assert!(Value::from(1i32).is_convertible_to(T::UInt32));
        assert!(!Value::from(-1i32).is_convertible_to(T::UInt32));
        assert!(Value::from(u32::MAX).is_convertible_to(T::Int64));
        assert!(!Value::from(u32::MAX).is_convertible_to(T::Int32));
        assert!(Value::from(i64::from(i32::MAX)).is_convertible_to(T::Int32));
        assert!(!Value::from(i64::from(i32::MAX) + 1).is_convertible_to(T::Int32));
        assert!(!Value::from(u64::MAX).is_convertible_to(T::Int64));
        assert!(Value::from(3.0f64).is_convertible_to(T::Int32));
        assert!(!Value::from(1e30f64).is_convertible_to(T::Int32));
        assert!(!Value::from(f64::NAN).is_convertible_to(T::Int32));
        assert!(Value::from("true").is_convertible_to(T::Bool));
        assert!(!Value::from("yes").is_convertible_to(T::Bool));
        assert!(!Value::Null.is_convertible_to(T::Bool));
    }

    #[test]
    fn string_coercions() {
        assert_eq!(Value::from("true").as_bool(false), true);
        assert_eq!(Value::from("false").as_bool(true), false);
        assert_eq!(Value::from("maybe").as_bool(true), true);
        assert_eq!(Value::from("hello").as_str("-"), "hello");
        assert_eq!(Value::from(3i32).as_str("-"), "-");
    }

    #[test]
    fn id_hashing() {
        let id = Value::from("Model").as_id(0);
        assert_eq!(id, Value::from("model").as_id(0));
        assert_ne!(id, Value::from("models").as_id(0));
        assert!(id & 0x8000_0000 != 0);
        assert_eq!(Value::from(12u32).as_id(0), 12);
        assert_eq!(Value::from(-3i32).as_id(0), 0);
        assert_eq!(Value::from(u64::MAX).as_id(0), u32::MAX);
        assert_eq!(Value::Null.as_id(99), 99);
    }

    #[test]
    fn object_copy_is_deep() {
        let mut original = object_of(&[("a", Value::from(1i32))]);
        let Value::Object(original_object) = &original else {
            unreachable!()
        };
        let count_before = original_object.mod_count();

        let mut copy = original.clone();
        copy.set_member("a", Value::from(2i32));
        copy.set_member("b", Value::from(3i32));

        assert_eq!(original.member("a").as_i32(0), 1);
        assert!(!original.has_member("b"));
        let Value::Object(original_object) = &original else {
            unreachable!()
        };
        assert_eq!(original_object.mod_count(), count_before);

        original.set_member("c", Value::Null);
        let Value::Object(original_object) = &original else {
            unreachable!()
        };
        assert_eq!(original_object.mod_count(), count_before + 1);
    }

    #[test]
    fn array_payload_is_shared() {
        let array = Value::from(vec![Value::from(1i32), Value::from(2i32)]);
        let copy = array.clone();
        let (Value::Array(a), Value::Array(b)) = (&array, &copy) else {
            unreachable!()
        };
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn shared_array_mutation_copies_the_payload() {
        let mut array = Value::from(vec![Value::from(1i32), Value::from(2i32)]);
        let copy = array.clone();
        *array.elt_mut(0).expect("index exists") = Value::from(9i32);
        assert_eq!(array.elt(0).as_i32(0), 9);
        assert_eq!(copy.elt(0).as_i32(0), 1);
        let (Value::Array(a), Value::Array(b)) = (&array, &copy) else {
            unreachable!()
        };
        assert!(!Arc::ptr_eq(a, b));
    }

    #[test]
    fn merge_semantics() {
        let mut base = object_of(&[
            ("keep", Value::from("left")),
            ("replace", Value::from(1i32)),
            ("drop", Value::from(2i32)),
            (
                "nested",
                object_of(&[("x", Value::from(1i32)), ("y", Value::from(2i32))]),
            ),
        ]);
        let overrides = object_of(&[
            ("replace", Value::from("right")),
            ("drop", Value::Null),
            ("nested", object_of(&[("y", Value::from(20i32))])),
            ("added", Value::from(true)),
        ]);
        base.merge(&overrides);

        assert_eq!(base.member("keep").as_str(""), "left");
        assert_eq!(base.member("replace").as_str(""), "right");
        assert!(!base.has_member("drop"));
        assert_eq!(base.member_path("nested.x").as_i32(0), 1);
        assert_eq!(base.member_path("nested.y").as_i32(0), 20);
        assert_eq!(base.member("added").as_bool(false), true);
    }

    #[test]
    fn merge_null_and_scalar() {
        let mut value = Value::from(1i32);
        value.merge(&Value::Null);
        assert_eq!(value, Value::from(1i32));
        value.merge(&Value::from("text"));
        assert_eq!(value.as_str(""), "text");
    }

    #[test]
    fn path_lookup() {
        let config = object_of(&[(
            "a",
            object_of(&[(
                "b",
                Value::from(vec![
                    Value::from(10i32),
                    Value::from(11i32),
                    object_of(&[("c", Value::from("deep"))]),
                ]),
            )]),
        )]);
        assert_eq!(config.member_path("a.b[0]").as_i32(0), 10);
        assert_eq!(config.member_path("a.b[2].c").as_str(""), "deep");
        assert!(config.member_path("a.b[9]").is_null());
        assert!(config.member_path("a.missing.c").is_null());
        assert!(config.member_path("").is_null());
        assert!(config.member_path("a..b").is_null());
    }

    #[test]
    fn path_update() {
        let mut config = Value::Null;
        *config.update_member_path("a.b.c").expect("creates objects") = Value::from(5i32);
        assert_eq!(config.member_path("a.b.c").as_i32(0), 5);

        // Array holes are not created.
        assert!(config.update_member_path("a.list[0]").is_none());

        config.set_member("list", Value::from(vec![Value::from(1i32)]));
        *config.update_member_path("list[0]").expect("index exists") = Value::from(9i32);
        assert_eq!(config.member_path("list[0]").as_i32(0), 9);

        // Wrong-kind segment fails instead of clobbering.
        assert!(config.update_member_path("list.a").is_none());
    }

    #[test]
    fn equality_and_ordering() {
        assert_ne!(Value::from(0i32), Value::from(0.0f64));
        assert_eq!(Value::from(0i32), Value::from(0i32));
        assert_eq!(
            Value::from(f64::NAN).compare(&Value::from(f64::NAN)),
            Ordering::Equal
        );
        assert!(Value::Null < Value::from(false));
        assert!(Value::from("a") < Value::from("b"));
        assert!(Value::from(i64::MAX) < Value::from(0.0f64));

        let small = object_of(&[("a", Value::from(1i32))]);
        let large = object_of(&[("a", Value::from(1i32)), ("b", Value::from(2i32))]);
        assert!(small < large);
    }

    #[test]
    fn swap_bumps_both_counters() {
        let mut a = object_of(&[("x", Value::from(1i32))]);
        let mut b = object_of(&[("y", Value::from(2i32))]);
        let (Value::Object(oa), Value::Object(ob)) = (&a, &b) else {
            unreachable!()
        };
        let (ca, cb) = (oa.mod_count(), ob.mod_count());
        a.swap(&mut b);
        assert!(a.has_member("y"));
        assert!(b.has_member("x"));
        let (Value::Object(oa), Value::Object(ob)) = (&a, &b) else {
            unreachable!()
        };
        assert_eq!(oa.mod_count(), ca + 1);
        assert_eq!(ob.mod_count(), cb + 1);
    }

    #[test]
    fn sentinel_access() {
        let scalar = Value::from(5i32);
        assert!(scalar.elt(0).is_null());
        assert!(scalar.member("x").is_null());
        assert_eq!(scalar.member_name(0), "");
        assert_eq!(scalar.num_elts(), 0);
        assert_eq!(scalar.num_members(), 0);
    }

    #[test]
    fn update_member_converts_null() {
        let mut value = Value::Null;
        value.update_member("key").expect("null becomes object");
        assert!(value.is_object());
        assert!(value.member("key").is_null());

        let mut scalar = Value::from(1i32);
        assert!(scalar.update_member("key").is_none());
    }
}
