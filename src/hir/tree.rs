//! The declaration arena.
//!
//! Declarations live in index-addressable slots. The tree's shape (headers,
//! parent/child links, the module graph) is fixed when [`TreeBuilder::build`]
//! runs; afterwards only three things change, all inside a slot:
//!
//! - the phase marker, an atomic that only ever grows (`fetch_max`),
//! - the [`DeclData`] payload, behind a read/write lock that resolvers only
//!   write while holding the container lock from the lock provider,
//! - write-once published facts (supertypes, alias expansion, parameter and
//!   return types) that other declarations' resolvers read without taking
//!   the payload lock.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use text_size::TextRange;

use crate::base::{FileId, Interner, Name};
use super::decl::{
    DeclData, DeclHeader, DeclKind, Deprecation, FileData, Import, Visibility,
};
use super::expr::{Lazy, RawExpr};
use super::ids::DeclId;
use super::input::{FileEntry, ModuleGraph};
use super::phase::Phase;
use super::types::{Type, TypeRef};

// ============================================================================
// SLOTS
// ============================================================================

/// Facts a declaration publishes once they are final.
///
/// They are set after the phase that computes them succeeded and passed its
/// checks, so a published value is never rolled back.
#[derive(Debug, Default)]
pub struct Published {
    supertypes: OnceLock<Vec<DeclId>>,
    expanded: OnceLock<Type>,
    parameters: OnceLock<Vec<Type>>,
    return_type: OnceLock<Type>,
}

impl Published {
    /// Resolved class supertypes, after [`Phase::Supertypes`].
    pub fn supertypes(&self) -> Option<&[DeclId]> {
        self.supertypes.get().map(Vec::as_slice)
    }

    /// The expansion of a type alias, after [`Phase::Supertypes`].
    pub fn expanded(&self) -> Option<&Type> {
        self.expanded.get()
    }

    /// Parameter types of a callable, after [`Phase::Signatures`].
    pub fn parameters(&self) -> Option<&[Type]> {
        self.parameters.get().map(Vec::as_slice)
    }

    /// The value type of a callable, property or variable: after
    /// [`Phase::Signatures`] when written explicitly, after [`Phase::Body`]
    /// when inferred.
    pub fn return_type(&self) -> Option<&Type> {
        self.return_type.get()
    }

    pub(crate) fn publish_supertypes(&self, supertypes: Vec<DeclId>) {
        let _ = self.supertypes.set(supertypes);
    }

    pub(crate) fn publish_expanded(&self, ty: Type) {
        let _ = self.expanded.set(ty);
    }

    pub(crate) fn publish_parameters(&self, parameters: Vec<Type>) {
        let _ = self.parameters.set(parameters);
    }

    pub(crate) fn publish_return_type(&self, ty: Type) {
        let _ = self.return_type.set(ty);
    }
}

#[derive(Debug)]
struct DeclSlot {
    header: DeclHeader,
    children: Vec<DeclId>,
    phase: AtomicU8,
    data: RwLock<DeclData>,
    published: Published,
}

// ============================================================================
// TREE
// ============================================================================

/// The resolved-on-demand declaration graph of a project.
#[derive(Debug)]
pub struct DeclTree {
    slots: Vec<DeclSlot>,
    modules: ModuleGraph,
    /// Top-level declarations by (package, name).
    top_level: FxHashMap<(Vec<Name>, Name), Vec<DeclId>>,
    interner: Arc<Interner>,
}

impl DeclTree {
    fn slot(&self, id: DeclId) -> Option<&DeclSlot> {
        self.slots.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: DeclId) -> bool {
        id.index() < self.slots.len()
    }

    /// Every declaration id, in construction order.
    pub fn ids(&self) -> impl Iterator<Item = DeclId> + '_ {
        (0..self.slots.len() as u32).map(DeclId::new)
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn modules(&self) -> &ModuleGraph {
        &self.modules
    }

    pub fn header(&self, id: DeclId) -> Option<&DeclHeader> {
        self.slot(id).map(|slot| &slot.header)
    }

    pub fn kind(&self, id: DeclId) -> Option<DeclKind> {
        self.header(id).map(|header| header.kind)
    }

    /// The declaration's name as a string.
    pub fn name_of(&self, id: DeclId) -> Option<smol_str::SmolStr> {
        self.header(id).and_then(|header| self.interner.lookup(header.name))
    }

    /// Child declarations (file members, class members), in source order.
    pub fn children(&self, id: DeclId) -> &[DeclId] {
        self.slot(id).map(|slot| slot.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: DeclId) -> Option<DeclId> {
        self.header(id).and_then(|header| header.parent)
    }

    pub fn published(&self, id: DeclId) -> Option<&Published> {
        self.slot(id).map(|slot| &slot.published)
    }

    // ------------------------------------------------------------------------
    // Phase markers
    // ------------------------------------------------------------------------

    pub fn phase(&self, id: DeclId) -> Option<Phase> {
        self.slot(id)
            .map(|slot| Phase::from_raw(slot.phase.load(Ordering::Acquire)))
    }

    /// Whether `id` has reached at least `phase`. Unknown ids never have.
    pub fn is_at_least(&self, id: DeclId, phase: Phase) -> bool {
        self.phase(id).is_some_and(|current| current >= phase)
    }

    /// Raise the marker to `phase`; lower values are ignored, so the marker
    /// can never decrease. Returns the previous phase.
    pub(crate) fn advance_phase(&self, id: DeclId, phase: Phase) -> Option<Phase> {
        self.slot(id).map(|slot| {
            Phase::from_raw(slot.phase.fetch_max(phase as u8, Ordering::AcqRel))
        })
    }

    // ------------------------------------------------------------------------
    // Payload access
    // ------------------------------------------------------------------------

    /// Read a declaration's payload.
    ///
    /// The guard must be dropped before calling back into the resolution
    /// session.
    pub fn read(&self, id: DeclId) -> Option<RwLockReadGuard<'_, DeclData>> {
        self.slot(id).map(|slot| slot.data.read())
    }

    /// Write a declaration's payload. Callers hold the container lock.
    pub(crate) fn write(&self, id: DeclId) -> Option<RwLockWriteGuard<'_, DeclData>> {
        self.slot(id).map(|slot| slot.data.write())
    }

    // ------------------------------------------------------------------------
    // Structure queries
    // ------------------------------------------------------------------------

    /// The arena declaration of a file.
    pub fn file_decl(&self, file: FileId) -> Option<DeclId> {
        self.modules.get(file).map(|entry| entry.decl)
    }

    /// The file declaration enclosing `id` (itself for files).
    pub fn file_of(&self, id: DeclId) -> Option<DeclId> {
        self.header(id).and_then(|header| self.file_decl(header.file))
    }

    /// The innermost class strictly enclosing `id`.
    pub fn containing_class(&self, id: DeclId) -> Option<DeclId> {
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if self.kind(parent) == Some(DeclKind::Class) {
                return Some(parent);
            }
            current = self.parent(parent);
        }
        None
    }

    /// The container whose lock guards mutation of `id`: the declaration
    /// itself for files and classes, the innermost enclosing container
    /// otherwise.
    pub fn lock_key(&self, id: DeclId) -> Option<DeclId> {
        let mut current = Some(id);
        while let Some(candidate) = current {
            if self.kind(candidate)?.is_container() {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// Containers from the file down to `id`, ending with `id` itself.
    pub fn designation(&self, id: DeclId) -> Vec<DeclId> {
        let mut path = Vec::new();
        let mut current = self.contains(id).then_some(id);
        while let Some(decl) = current {
            path.push(decl);
            current = self.parent(decl);
        }
        path.reverse();
        path
    }

    /// Find the child of `parent` named `name`.
    pub fn child_named(&self, parent: DeclId, name: Name) -> Option<DeclId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| self.header(child).is_some_and(|h| h.name == name))
    }

    /// Top-level declarations called `name` in `package`, across files.
    pub fn top_level(&self, package: &[Name], name: Name) -> &[DeclId] {
        self.top_level
            .get(&(package.to_vec(), name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve a fully qualified path: a package prefix, a top-level
    /// declaration, then nested class members.
    pub fn lookup_qualified(&self, path: &[Name]) -> Option<DeclId> {
        for split in (0..path.len()).rev() {
            let (package, rest) = path.split_at(split);
            let Some((&first, nested)) = rest.split_first() else {
                continue;
            };
            if let Some(&top) = self.top_level(package, first).first() {
                let mut current = top;
                let mut found = true;
                for &segment in nested {
                    match self.child_named(current, segment) {
                        Some(child) => current = child,
                        None => {
                            found = false;
                            break;
                        }
                    }
                }
                if found {
                    return Some(current);
                }
            }
        }
        None
    }
}

// ============================================================================
// BUILDER
// ============================================================================

struct PendingSlot {
    header: DeclHeader,
    children: Vec<DeclId>,
    data: DeclData,
}

/// Construction API used by the parser collaborator.
///
/// Declarations must be added parent-first; ids follow insertion order.
pub struct TreeBuilder {
    slots: Vec<PendingSlot>,
    modules: ModuleGraph,
    interner: Arc<Interner>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::with_interner(Arc::new(Interner::new()))
    }

    pub fn with_interner(interner: Arc<Interner>) -> Self {
        Self {
            slots: Vec::new(),
            modules: ModuleGraph::new(),
            interner,
        }
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// A written type reference such as `Int` or `geometry.Shape`.
    pub fn type_ref(&self, path: &str) -> TypeRef {
        TypeRef::Unresolved(self.interner.intern_path(path))
    }

    /// A bare name expression.
    pub fn name_expr(&self, name: &str) -> RawExpr {
        RawExpr::Name(self.name(name))
    }

    pub fn call(&self, callee: &str, args: Vec<RawExpr>) -> RawExpr {
        RawExpr::Call {
            callee: self.name(callee),
            args,
        }
    }

    /// Register a file and create its declaration.
    pub fn file(&mut self, file: FileId, path: &str, package: &str) -> DeclId {
        let id = DeclId::new(self.slots.len() as u32);
        let package = self.interner.intern_path(package);
        let name = match path.rsplit(['/', '\\']).next() {
            Some(stem) => self.interner.intern(stem),
            None => self.interner.intern(path),
        };
        self.slots.push(PendingSlot {
            header: DeclHeader {
                name,
                kind: DeclKind::File,
                file,
                parent: None,
                range: TextRange::default(),
                visibility: Visibility::Public,
                deprecation: Deprecation::None,
            },
            children: Vec::new(),
            data: DeclData::File(FileData::default()),
        });
        self.modules.insert(
            file,
            FileEntry {
                path: Arc::from(path),
                package,
                decl: id,
            },
        );
        id
    }

    /// Add an import directive to a file; a trailing `.*` makes it a star
    /// import of the package.
    ///
    /// # Panics
    /// Panics if `file` is not a file declaration of this builder.
    pub fn import(&mut self, file: DeclId, path: &str) {
        let (path, star) = match path.strip_suffix(".*") {
            Some(package) => (package, true),
            None => (path, false),
        };
        let path = self.interner.intern_path(path);
        match self.slots.get_mut(file.index()).map(|slot| &mut slot.data) {
            Some(DeclData::File(data)) => data.imports.push(Import {
                path,
                star,
                range: TextRange::default(),
                target: Lazy::Unresolved,
            }),
            _ => panic!("imports can only be added to file declarations, got {file:?}"),
        }
    }

    /// Declare `data` as a child of `parent`.
    ///
    /// # Panics
    /// Panics if `parent` is unknown or is not a file or class.
    pub fn declare(&mut self, parent: DeclId, name: &str, data: DeclData) -> DeclId {
        self.declare_at(parent, name, data, TextRange::default())
    }

    /// Like [`TreeBuilder::declare`], with a source range.
    ///
    /// # Panics
    /// Panics if `parent` is unknown or is not a file or class.
    pub fn declare_at(
        &mut self,
        parent: DeclId,
        name: &str,
        data: DeclData,
        range: TextRange,
    ) -> DeclId {
        let id = DeclId::new(self.slots.len() as u32);
        let name = self.interner.intern(name);
        let parent_slot = match self.slots.get_mut(parent.index()) {
            Some(slot) if slot.header.kind.is_container() => slot,
            _ => panic!("{parent:?} cannot contain declarations"),
        };
        parent_slot.children.push(id);
        let file = parent_slot.header.file;
        self.slots.push(PendingSlot {
            header: DeclHeader {
                name,
                kind: data.kind(),
                file,
                parent: Some(parent),
                range,
                visibility: Visibility::Public,
                deprecation: Deprecation::None,
            },
            children: Vec::new(),
            data,
        });
        id
    }

    pub fn set_visibility(&mut self, id: DeclId, visibility: Visibility) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            slot.header.visibility = visibility;
        }
    }

    pub fn set_deprecation(&mut self, id: DeclId, deprecation: Deprecation) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            slot.header.deprecation = deprecation;
        }
    }

    pub fn build(self) -> DeclTree {
        let mut top_level: FxHashMap<(Vec<Name>, Name), Vec<DeclId>> = FxHashMap::default();
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(parent) = slot.header.parent else {
                continue;
            };
            if self.slots[parent.index()].header.kind != DeclKind::File {
                continue;
            }
            if let Some(entry) = self.modules.get(slot.header.file) {
                top_level
                    .entry((entry.package.clone(), slot.header.name))
                    .or_default()
                    .push(DeclId::new(index as u32));
            }
        }

        let slots = self
            .slots
            .into_iter()
            .map(|pending| DeclSlot {
                header: pending.header,
                children: pending.children,
                phase: AtomicU8::new(Phase::Raw as u8),
                data: RwLock::new(pending.data),
                published: Published::default(),
            })
            .collect();

        DeclTree {
            slots,
            modules: self.modules,
            top_level,
            interner: self.interner,
        }
    }
}
