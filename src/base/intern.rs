//! Name interning for declarations, packages and import paths.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::fmt;

/// An interned identifier.
///
/// Tower lookups compare names on every step of a scope walk, so names are
/// 4-byte handles into an [`Interner`] instead of strings.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Name(u32);

impl Name {
    #[inline]
    pub(crate) const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// Thread-safe string interner shared by the declaration tree and the
/// resolvers.
///
/// Resolvers running on different threads intern names of import paths
/// and type references concurrently, so the table sits behind a read/write
/// lock with a read-only fast path.
#[derive(Default)]
pub struct Interner {
    inner: RwLock<InternerInner>,
}

#[derive(Default)]
struct InternerInner {
    map: FxHashMap<SmolStr, u32>,
    strings: Vec<SmolStr>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the existing handle when it was seen before.
    pub fn intern(&self, s: &str) -> Name {
        if let Some(name) = self.find(s) {
            return name;
        }

        let mut inner = self.inner.write();
        // Another thread may have inserted it between the two locks.
        if let Some(&index) = inner.map.get(s) {
            return Name::from_raw(index);
        }

        let smol = SmolStr::new(s);
        let index = inner.strings.len() as u32;
        inner.strings.push(smol.clone());
        inner.map.insert(smol, index);
        Name::from_raw(index)
    }

    /// Look a string up without interning it.
    ///
    /// A name nobody declared cannot resolve to anything, so lookups of
    /// user-written references use this instead of [`Interner::intern`].
    pub fn find(&self, s: &str) -> Option<Name> {
        self.inner.read().map.get(s).map(|&index| Name::from_raw(index))
    }

    /// Intern every segment of a dotted path such as `geometry.shapes.Circle`.
    pub fn intern_path(&self, path: &str) -> Vec<Name> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .map(|segment| self.intern(segment))
            .collect()
    }

    /// The string behind a `Name`, or `None` for a handle from another interner.
    pub fn lookup(&self, name: Name) -> Option<SmolStr> {
        self.inner.read().strings.get(name.0 as usize).cloned()
    }

    /// The string behind a `Name`.
    ///
    /// # Panics
    /// Panics if the `Name` was not created by this interner.
    pub fn get(&self, name: Name) -> SmolStr {
        self.lookup(name).expect("name not created by this interner")
    }

    /// Render a path of names joined with `.`.
    pub fn display_path(&self, path: &[Name]) -> String {
        path.iter()
            .map(|&name| self.lookup(name).unwrap_or_else(|| SmolStr::new("<?>")))
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn len(&self) -> usize {
        self.inner.read().strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner").field("count", &self.len()).finish()
    }
}
