//! Resolution requests racing from several threads.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use stratum::hir::{ClassData, DeclData, FunctionData, PropertyData, RawExpr, TypeRef};
use stratum::resolve::{BodyTransformer, ExpressionTransformer, TransformCx, TransformError};
use stratum::{DeclId, DeclTree, FileId, Phase, ResolutionSession, TreeBuilder};

/// Parks the transform of one declaration, lock held, until released.
struct GatedTransformer {
    gated: DeclId,
    held: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
    inner: ExpressionTransformer,
}

impl BodyTransformer for GatedTransformer {
    fn transform(&self, cx: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError> {
        if cx.decl() == self.gated {
            self.held.lock().send(()).unwrap();
            self.release.lock().recv().unwrap();
        }
        self.inner.transform(cx, data)
    }
}

/// `classes` classes, each with a property and a function reading it.
fn many_classes(classes: usize) -> (Arc<DeclTree>, Vec<DeclId>) {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/many.st", "app");
    let mut members = Vec::new();
    for i in 0..classes {
        let class = builder.declare(file, &format!("C{i}"), DeclData::Class(ClassData::default()));
        members.push(builder.declare(
            class,
            "value",
            DeclData::Property(PropertyData::new(TypeRef::Implicit, Some(RawExpr::Int(i as i64)))),
        ));
        members.push(builder.declare(
            class,
            "get",
            DeclData::Function(FunctionData::new(Vec::new(), builder.type_ref("Int"), None)),
        ));
    }
    (Arc::new(builder.build()), members)
}

#[test]
fn test_distinct_containers_resolve_in_parallel() {
    let (tree, members) = many_classes(8);
    let session = ResolutionSession::new(Arc::clone(&tree));

    thread::scope(|scope| {
        for chunk in members.chunks(4) {
            let session = &session;
            scope.spawn(move || {
                for &member in chunk {
                    session.resolve_to(member, Phase::Body).unwrap();
                }
            });
        }
    });

    assert!(members.iter().all(|&m| tree.is_at_least(m, Phase::Body)));
    assert!(session.diagnostics().is_empty(), "{:?}", session.diagnostics());
}

#[test]
fn test_held_container_does_not_block_another() {
    let (tree, members) = many_classes(2);
    let (gated, other) = (members[0], members[2]);
    let gated_class = tree.parent(gated).unwrap();
    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let session = ResolutionSession::new(Arc::clone(&tree)).with_transformer(Arc::new(
        GatedTransformer {
            gated,
            held: Mutex::new(held_tx),
            release: Mutex::new(release_rx),
            inner: ExpressionTransformer::new(),
        },
    ));

    thread::scope(|scope| {
        let session = &session;
        let holder = scope.spawn(move || session.resolve_to(gated, Phase::Body).unwrap());
        held_rx.recv().unwrap();
        let locked_while_parked = session.lock_provider().is_locked(gated_class);

        let (done_tx, done_rx) = mpsc::channel();
        scope.spawn(move || {
            let reached = session.resolve_to(other, Phase::Body).unwrap();
            done_tx.send(reached).unwrap();
        });
        let reached = done_rx.recv_timeout(Duration::from_secs(10));
        // Still parked: the other container finished on its own.
        let still_locked = session.lock_provider().is_locked(gated_class);
        release_tx.send(()).unwrap();

        assert!(locked_while_parked && still_locked);
        assert_eq!(reached, Ok(Phase::Body));
        assert_eq!(holder.join().unwrap(), Phase::Body);
    });

    assert!(tree.is_at_least(gated, Phase::Body));
    assert!(tree.is_at_least(other, Phase::Body));
}

#[test]
fn test_same_declaration_requested_concurrently() {
    let (tree, members) = many_classes(1);
    let session = ResolutionSession::new(Arc::clone(&tree));
    let target = members[0];

    let reached: Vec<Phase> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let session = &session;
                scope.spawn(move || session.resolve_to(target, Phase::Body).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(reached.iter().all(|&p| p == Phase::Body));
    assert_eq!(tree.phase(target), Some(Phase::Body));
}

#[test]
fn test_resolve_all_from_threads_agrees_with_single_thread() {
    let (parallel_tree, _) = many_classes(6);
    let (serial_tree, _) = many_classes(6);
    let parallel = ResolutionSession::new(Arc::clone(&parallel_tree));
    let serial = ResolutionSession::new(Arc::clone(&serial_tree));

    thread::scope(|scope| {
        for _ in 0..3 {
            let parallel = &parallel;
            scope.spawn(move || parallel.resolve_all(Phase::Body).unwrap());
        }
    });
    serial.resolve_all(Phase::Body).unwrap();

    for id in serial_tree.ids() {
        assert_eq!(parallel_tree.phase(id), serial_tree.phase(id));
        assert_eq!(*parallel_tree.read(id).unwrap(), *serial_tree.read(id).unwrap());
    }
}
