//! Tower contexts: the stack of name scopes visible from a declaration.
//!
//! A tower is assembled before a transform takes its container lock, from
//! the innermost scope outwards:
//!
//! ```text
//! parameters     → the callable's own value parameters
//! class scopes   → members of each enclosing class, then inherited members
//! file           → top-level declarations of the file
//! imports        → explicitly imported declarations
//! package        → top-level declarations of the other files in the package
//! star imports   → everything brought in by `.*` imports
//! ```
//!
//! File and class scopes are memoized in a [`ScopeCache`] once the container
//! has reached the phase that fixes them.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::base::Name;
use crate::hir::{DeclData, DeclId, DeclKind, DeclTree, ImportTarget, Phase, Type, Visibility};

// ============================================================================
// SCOPES
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Members of a class, own members first, then inherited ones.
    Class(DeclId),
    File(DeclId),
    ExplicitImports(DeclId),
    Package(DeclId),
    StarImports(DeclId),
}

/// One level of a tower: names bound to candidate declarations, in the
/// order they were declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    names: IndexMap<Name, Vec<DeclId>>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            names: IndexMap::new(),
        }
    }

    pub fn bind(&mut self, name: Name, decl: DeclId) {
        let candidates = self.names.entry(name).or_default();
        if !candidates.contains(&decl) {
            candidates.push(decl);
        }
    }

    pub fn get(&self, name: Name) -> &[DeclId] {
        self.names.get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = Name> + '_ {
        self.names.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ============================================================================
// TOWER CONTEXT
// ============================================================================

/// Names visible from one declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TowerContext {
    pub owner: DeclId,
    /// Value parameter names of a callable owner, in order.
    pub parameters: Vec<Name>,
    /// Scopes from innermost to outermost.
    pub scopes: Vec<Arc<Scope>>,
}

impl TowerContext {
    /// Candidates from the innermost scope that binds `name`.
    pub fn lookup(&self, name: Name) -> &[DeclId] {
        self.scopes
            .iter()
            .map(|scope| scope.get(name))
            .find(|candidates| !candidates.is_empty())
            .unwrap_or(&[])
    }

    /// The first candidate for `name` that satisfies `accept`, searching
    /// scopes from the inside out.
    pub fn lookup_where(&self, name: Name, accept: impl Fn(DeclId) -> bool) -> Option<DeclId> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.get(name).iter().copied())
            .find(|&decl| accept(decl))
    }

    /// Every visible name, innermost first, without duplicates.
    pub fn visible_names(&self) -> Vec<Name> {
        let mut seen = IndexMap::<Name, ()>::new();
        for &name in &self.parameters {
            seen.insert(name, ());
        }
        for scope in &self.scopes {
            for name in scope.names() {
                seen.entry(name).or_insert(());
            }
        }
        seen.into_keys().collect()
    }
}

// ============================================================================
// COLLECTOR
// ============================================================================

/// Receives the tower of every declaration a resolver transforms.
///
/// Entries are keyed by declaration, so concurrent resolutions of unrelated
/// declarations never touch each other's context.
pub trait TowerDataContextCollector: Send + Sync {
    fn add_declaration_context(&self, decl: DeclId, context: Arc<TowerContext>);

    fn declaration_context(&self, decl: DeclId) -> Option<Arc<TowerContext>>;
}

/// Collector that keeps the latest tower of each declaration in memory.
#[derive(Debug, Default)]
pub struct TowerContextMap {
    contexts: RwLock<FxHashMap<DeclId, Arc<TowerContext>>>,
}

impl TowerContextMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }
}

impl TowerDataContextCollector for TowerContextMap {
    fn add_declaration_context(&self, decl: DeclId, context: Arc<TowerContext>) {
        self.contexts.write().insert(decl, context);
    }

    fn declaration_context(&self, decl: DeclId) -> Option<Arc<TowerContext>> {
        self.contexts.read().get(&decl).cloned()
    }
}

// ============================================================================
// SCOPE CACHE
// ============================================================================

/// Memoized file and class scopes, owned by a resolution session.
#[derive(Debug, Default)]
pub struct ScopeCache {
    files: RwLock<FxHashMap<DeclId, Arc<[Arc<Scope>]>>>,
    classes: RwLock<FxHashMap<DeclId, Arc<Scope>>>,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes contributed by a file: its own members, explicit imports, the
    /// rest of its package and star imports.
    ///
    /// Memoized once the file's imports are bound.
    pub fn file_scopes(&self, tree: &DeclTree, file: DeclId) -> Arc<[Arc<Scope>]> {
        if let Some(cached) = self.files.read().get(&file) {
            return Arc::clone(cached);
        }
        let scopes: Arc<[Arc<Scope>]> = build_file_scopes(tree, file).into();
        if tree.is_at_least(file, Phase::Imports) {
            self.files.write().insert(file, Arc::clone(&scopes));
        }
        scopes
    }

    /// Members of a class followed by the members it inherits.
    ///
    /// Memoized once the class's supertypes are resolved.
    pub fn class_scope(&self, tree: &DeclTree, class: DeclId) -> Arc<Scope> {
        if let Some(cached) = self.classes.read().get(&class) {
            return Arc::clone(cached);
        }
        let scope = Arc::new(build_class_scope(tree, class));
        if tree.is_at_least(class, Phase::Supertypes) {
            self.classes.write().insert(class, Arc::clone(&scope));
        }
        scope
    }

    /// The tower visible from inside `decl`.
    pub fn tower(&self, tree: &DeclTree, decl: DeclId) -> TowerContext {
        let parameters = tree
            .read(decl)
            .and_then(|data| match &*data {
                DeclData::Function(f) => Some(f.params.iter().map(|p| p.name).collect()),
                DeclData::Constructor(c) => {
                    Some(c.function.params.iter().map(|p| p.name).collect())
                }
                _ => None,
            })
            .unwrap_or_default();

        let mut scopes = Vec::new();
        let mut current = tree.parent(decl);
        while let Some(container) = current {
            match tree.kind(container) {
                Some(DeclKind::Class) => scopes.push(self.class_scope(tree, container)),
                Some(DeclKind::File) => scopes.extend(self.file_scopes(tree, container).iter().cloned()),
                _ => {}
            }
            current = tree.parent(container);
        }

        TowerContext {
            owner: decl,
            parameters,
            scopes,
        }
    }

    pub fn clear(&self) {
        self.files.write().clear();
        self.classes.write().clear();
    }
}

fn build_file_scopes(tree: &DeclTree, file: DeclId) -> Vec<Arc<Scope>> {
    let mut own = Scope::new(ScopeKind::File(file));
    for &member in tree.children(file) {
        if let Some(header) = tree.header(member) {
            own.bind(header.name, member);
        }
    }

    let mut explicit = Scope::new(ScopeKind::ExplicitImports(file));
    let mut star = Scope::new(ScopeKind::StarImports(file));
    let targets: Vec<(bool, ImportTarget)> = match tree.read(file).as_deref() {
        Some(DeclData::File(data)) => data
            .imports
            .iter()
            .filter_map(|import| import.target.resolved().map(|t| (import.star, t.clone())))
            .collect(),
        _ => Vec::new(),
    };
    for (is_star, target) in targets {
        match target {
            ImportTarget::Declaration(decl) if !is_star => {
                if let Some(header) = tree.header(decl) {
                    explicit.bind(header.name, decl);
                }
            }
            ImportTarget::Declaration(container) => bind_public_members(tree, &mut star, container),
            ImportTarget::Package(package) => {
                for &other in tree.modules().files_in_package(&package) {
                    if let Some(other_decl) = tree.file_decl(other) {
                        bind_public_members(tree, &mut star, other_decl);
                    }
                }
            }
            ImportTarget::Missing => {}
        }
    }

    let mut package = Scope::new(ScopeKind::Package(file));
    let own_file = tree.header(file).map(|h| h.file);
    if let Some(entry) = own_file.and_then(|f| tree.modules().get(f)) {
        for &other in tree.modules().files_in_package(&entry.package) {
            if Some(other) == own_file {
                continue;
            }
            if let Some(other_decl) = tree.file_decl(other) {
                bind_public_members(tree, &mut package, other_decl);
            }
        }
    }

    vec![
        Arc::new(own),
        Arc::new(explicit),
        Arc::new(package),
        Arc::new(star),
    ]
}

fn bind_public_members(tree: &DeclTree, scope: &mut Scope, container: DeclId) {
    for &member in tree.children(container) {
        if let Some(header) = tree.header(member) {
            if header.visibility == Visibility::Public {
                scope.bind(header.name, member);
            }
        }
    }
}

fn build_class_scope(tree: &DeclTree, class: DeclId) -> Scope {
    let mut scope = Scope::new(ScopeKind::Class(class));
    for &member in tree.children(class) {
        if let Some(header) = tree.header(member) {
            scope.bind(header.name, member);
        }
    }

    // Inherited members, breadth-first through published supertypes.
    let mut visited = vec![class];
    let mut queue: VecDeque<DeclId> = supertypes_of(tree, class).iter().copied().collect();
    while let Some(supertype) = queue.pop_front() {
        if visited.contains(&supertype) {
            continue;
        }
        visited.push(supertype);
        for &member in tree.children(supertype) {
            if let Some(header) = tree.header(member) {
                let inheritable = header.visibility == Visibility::Public
                    && header.kind != DeclKind::Constructor
                    && header.kind != DeclKind::Initializer;
                if inheritable {
                    scope.bind(header.name, member);
                }
            }
        }
        queue.extend(supertypes_of(tree, supertype).iter().copied());
    }
    scope
}

fn supertypes_of(tree: &DeclTree, class: DeclId) -> &[DeclId] {
    tree.published(class)
        .and_then(|published| published.supertypes())
        .unwrap_or(&[])
}

// ============================================================================
// TYPE LOOKUP
// ============================================================================

/// What a written type path names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeLookup {
    Builtin(Type),
    Class(DeclId),
    Alias(DeclId),
    /// The path names a declaration that is not a type.
    NotAType(DeclId),
    NotFound,
}

/// Resolve a written type path against a tower.
///
/// Single names are looked up in the tower, then among the builtins.
/// Longer paths start from a class visible in the tower, or are taken as
/// fully qualified.
pub fn lookup_type(tree: &DeclTree, tower: &TowerContext, path: &[Name]) -> TypeLookup {
    let Some((&first, rest)) = path.split_first() else {
        return TypeLookup::NotFound;
    };
    let is_type = |decl: DeclId| {
        matches!(tree.kind(decl), Some(DeclKind::Class | DeclKind::TypeAlias))
    };

    let found = if rest.is_empty() {
        match tower.lookup_where(first, is_type) {
            Some(decl) => Some(decl),
            None => {
                let builtin = tree
                    .interner()
                    .lookup(first)
                    .and_then(|name| Type::builtin(&name));
                if let Some(ty) = builtin {
                    return TypeLookup::Builtin(ty);
                }
                tower.lookup(first).first().copied()
            }
        }
    } else {
        let from_tower = tower.lookup_where(first, is_type).and_then(|start| {
            rest.iter()
                .try_fold(start, |current, &segment| tree.child_named(current, segment))
        });
        from_tower.or_else(|| tree.lookup_qualified(path))
    };

    match found {
        Some(decl) => match tree.kind(decl) {
            Some(DeclKind::Class) => TypeLookup::Class(decl),
            Some(DeclKind::TypeAlias) => TypeLookup::Alias(decl),
            _ => TypeLookup::NotAType(decl),
        },
        None => TypeLookup::NotFound,
    }
}
