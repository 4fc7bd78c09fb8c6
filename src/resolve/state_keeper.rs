//! Snapshot/restore of the mutable parts of a declaration.
//!
//! A [`StateKeeper`] is a declarative list of field descriptors built once
//! per declaration kind. Capturing walks the list and produces a
//! [`StateSnapshot`]: an ordered list of restore operations. Restoring
//! replays them in capture order, so a declaration rolled back after a
//! failed transform is exactly as it was before the attempt.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::trace;

type Restore<T> = Box<dyn FnOnce(&mut T) + Send>;
type Capture<T> = Box<dyn Fn(&T, &mut Vec<Restore<T>>) + Send + Sync>;

/// Declarative snapshot description for values of type `T`.
pub struct StateKeeper<T> {
    name: &'static str,
    skip_when: Option<fn(&T) -> bool>,
    fields: Vec<Capture<T>>,
}

impl<T> fmt::Debug for StateKeeper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateKeeper")
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl<T: 'static> StateKeeper<T> {
    pub fn builder(name: &'static str) -> StateKeeperBuilder<T> {
        StateKeeperBuilder {
            keeper: StateKeeper {
                name,
                skip_when: None,
                fields: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Record the current value of every described field of `target`.
    pub fn capture(&self, target: &T) -> StateSnapshot<T> {
        let mut restores = Vec::new();
        self.capture_into(target, &mut restores);
        trace!(keeper = self.name, fields = restores.len(), "state captured");
        StateSnapshot { restores }
    }

    fn capture_into(&self, target: &T, out: &mut Vec<Restore<T>>) {
        if self.skip_when.is_some_and(|skip| skip(target)) {
            return;
        }
        for field in &self.fields {
            field(target, out);
        }
    }
}

/// Builder for a [`StateKeeper`]; fields are captured in the order they are
/// added.
pub struct StateKeeperBuilder<T> {
    keeper: StateKeeper<T>,
}

impl<T: 'static> StateKeeperBuilder<T> {
    /// Record one field.
    pub fn add<V>(self, getter: fn(&T) -> V, setter: fn(&mut T, V)) -> Self
    where
        V: Send + 'static,
    {
        self.push(move |target: &T, out: &mut Vec<Restore<T>>| {
            let value = getter(target);
            out.push(Box::new(move |target: &mut T| setter(target, value)));
        })
    }

    /// Record one field, passing the captured value through `guard` first.
    ///
    /// Guards turn transient values that must never be restored, such as an
    /// in-progress placeholder, into their restorable form.
    pub fn add_guarded<V>(self, getter: fn(&T) -> V, setter: fn(&mut T, V), guard: fn(V) -> V) -> Self
    where
        V: Send + 'static,
    {
        self.push(move |target: &T, out: &mut Vec<Restore<T>>| {
            let value = guard(getter(target));
            out.push(Box::new(move |target: &mut T| setter(target, value)));
        })
    }

    /// Recurse into a child with `keeper`, when the child is present.
    ///
    /// `get` decides presence at capture time (a child past its threshold
    /// may report itself absent); `get_mut` locates it again on restore.
    pub fn entity<C: 'static>(
        self,
        get: fn(&T) -> Option<&C>,
        get_mut: fn(&mut T) -> Option<&mut C>,
        keeper: &'static StateKeeper<C>,
    ) -> Self {
        self.push_entity(get, get_mut, keeper)
    }

    /// Recurse into a child with a keeper described inline.
    pub fn entity_with<C: 'static>(
        self,
        get: fn(&T) -> Option<&C>,
        get_mut: fn(&mut T) -> Option<&mut C>,
        describe: impl FnOnce(StateKeeperBuilder<C>) -> StateKeeperBuilder<C>,
    ) -> Self {
        let keeper = Arc::new(describe(StateKeeper::builder(self.keeper.name)).build());
        self.push_entity(get, get_mut, keeper)
    }

    fn push_entity<C, K>(
        self,
        get: fn(&T) -> Option<&C>,
        get_mut: fn(&mut T) -> Option<&mut C>,
        keeper: K,
    ) -> Self
    where
        C: 'static,
        K: Deref<Target = StateKeeper<C>> + Send + Sync + 'static,
    {
        self.push(move |target: &T, out: &mut Vec<Restore<T>>| {
            let Some(child) = get(target) else {
                return;
            };
            let mut nested = Vec::new();
            keeper.capture_into(child, &mut nested);
            if nested.is_empty() {
                return;
            }
            out.push(Box::new(move |target: &mut T| {
                if let Some(child) = get_mut(target) {
                    for restore in nested {
                        restore(child);
                    }
                }
            }));
        })
    }

    /// Recurse into every element of an ordered sequence of children.
    pub fn entity_list<C: 'static>(
        self,
        get: fn(&T) -> &[C],
        get_mut: fn(&mut T) -> &mut [C],
        keeper: &'static StateKeeper<C>,
    ) -> Self {
        self.push(move |target: &T, out: &mut Vec<Restore<T>>| {
            let per_child: Vec<(usize, Vec<Restore<C>>)> = get(target)
                .iter()
                .enumerate()
                .filter_map(|(index, child)| {
                    let mut nested = Vec::new();
                    keeper.capture_into(child, &mut nested);
                    (!nested.is_empty()).then_some((index, nested))
                })
                .collect();
            if per_child.is_empty() {
                return;
            }
            out.push(Box::new(move |target: &mut T| {
                let children = get_mut(target);
                for (index, nested) in per_child {
                    if let Some(child) = children.get_mut(index) {
                        for restore in nested {
                            restore(child);
                        }
                    }
                }
            }));
        })
    }

    /// Capture nothing when `predicate` holds for the target.
    pub fn skip_when(mut self, predicate: fn(&T) -> bool) -> Self {
        self.keeper.skip_when = Some(predicate);
        self
    }

    pub fn build(self) -> StateKeeper<T> {
        self.keeper
    }

    fn push(
        mut self,
        capture: impl Fn(&T, &mut Vec<Restore<T>>) + Send + Sync + 'static,
    ) -> Self {
        self.keeper.fields.push(Box::new(capture));
        self
    }
}

/// Captured field values of one declaration, ready to be written back.
#[must_use = "a snapshot does nothing unless restored"]
pub struct StateSnapshot<T> {
    restores: Vec<Restore<T>>,
}

impl<T> StateSnapshot<T> {
    /// Number of top-level restore operations.
    pub fn len(&self) -> usize {
        self.restores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restores.is_empty()
    }

    /// Write every captured value back, in capture order.
    pub fn restore(self, target: &mut T) {
        trace!(fields = self.restores.len(), "state restored");
        for restore in self.restores {
            restore(target);
        }
    }

    /// Drop the snapshot after a successful transform.
    pub fn discard(self) {}
}

impl<T> fmt::Debug for StateSnapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSnapshot")
            .field("fields", &self.restores.len())
            .finish()
    }
}
