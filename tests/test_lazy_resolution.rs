//! End-to-end behaviour of lazy, phase-gated resolution.

mod common;

use std::sync::Arc;

use rstest::rstest;
use tokio_util::sync::CancellationToken;

use stratum::hir::{
    ClassData, ConstructorData, DeclData, DelegatedConstructorCall, DelegationTarget,
    DiagnosticKind, FunctionData, LazyBlock, PropertyData, RawBlock, RawExpr, RawStmt, Type,
    TypeAliasData, TypeRef, ValueParameter, VariableData,
};
use stratum::resolve::{capture_state, ResolveTarget};
use stratum::{DeclId, DeclTree, FileId, Phase, ResolutionSession, ResolveError, TreeBuilder};

use common::{
    shared, CancellingTransformer, FailingTransformer, NoopTransformer, RecordingTransformer,
};

// ============================================================================
// FIXTURES
// ============================================================================

/// `class Box { val p2 = p1 + 1; val p1 = 1 }`
fn forward_reference() -> (Arc<DeclTree>, DeclId, DeclId, DeclId) {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/box.st", "app");
    let class = builder.declare(file, "Box", DeclData::Class(ClassData::default()));
    let p2 = builder.declare(
        class,
        "p2",
        DeclData::Property(PropertyData::new(
            TypeRef::Implicit,
            Some(RawExpr::binary(
                stratum::hir::BinaryOp::Add,
                builder.name_expr("p1"),
                RawExpr::Int(1),
            )),
        )),
    );
    let p1 = builder.declare(
        class,
        "p1",
        DeclData::Property(PropertyData::new(TypeRef::Implicit, Some(RawExpr::Int(1)))),
    );
    (Arc::new(builder.build()), class, p1, p2)
}

/// A top-level function with a body: `fun f(): Int { return 1 + 2 }`.
fn function_with_body() -> (Arc<DeclTree>, DeclId) {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/f.st", "app");
    let body = RawBlock::new(vec![RawStmt::Return(Some(RawExpr::binary(
        stratum::hir::BinaryOp::Add,
        RawExpr::Int(1),
        RawExpr::Int(2),
    )))]);
    let f = builder.declare(
        file,
        "f",
        DeclData::Function(FunctionData::new(
            Vec::new(),
            builder.type_ref("Int"),
            Some(LazyBlock::new(body)),
        )),
    );
    (Arc::new(builder.build()), f)
}

fn has(session: &ResolutionSession, kind: DiagnosticKind) -> bool {
    session.diagnostics().iter().any(|d| d.kind == kind)
}

// ============================================================================
// ORDERING AND DEPENDENCIES
// ============================================================================

#[test]
fn test_forward_reference_resolves_dependency_first() {
    let (tree, class, p1, p2) = forward_reference();
    let recorder = Arc::new(RecordingTransformer::default());
    let session = ResolutionSession::new(Arc::clone(&tree)).with_transformer(recorder.clone());

    let reached = session.resolve_to(p2, Phase::Body).unwrap();

    assert_eq!(reached, Phase::Body);
    assert_eq!(*recorder.order.lock(), vec![p1, p2]);
    assert_eq!(tree.published(p2).and_then(|p| p.return_type()), Some(&Type::Int));
    assert!(tree.is_at_least(p1, Phase::Body));
    // The class itself only needed its supertypes.
    assert_eq!(tree.phase(class), Some(Phase::Supertypes));
    assert!(session.diagnostics().is_empty(), "{:?}", session.diagnostics());
}

#[test]
fn test_class_body_builds_graph_over_members() {
    let (tree, class, p1, p2) = forward_reference();
    let recorder = Arc::new(RecordingTransformer::default());
    let session = ResolutionSession::new(Arc::clone(&tree)).with_transformer(recorder.clone());

    session.resolve_to(class, Phase::Body).unwrap();

    assert_eq!(*recorder.order.lock(), vec![p1, p2]);
    assert!(tree.is_at_least(p1, Phase::Body));
    assert!(tree.is_at_least(p2, Phase::Body));
    let data = tree.read(class).unwrap();
    let DeclData::Class(class_data) = &*data else {
        panic!("expected a class payload");
    };
    let cfg = class_data.cfg.as_ref().expect("class graph");
    assert_eq!(cfg.initialized.len(), 2);
    assert!(!has(&session, DiagnosticKind::UninitializedProperty));
}

#[test]
fn test_delegated_constructor_calls_bind() {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/shapes.st", "app");
    let base = builder.declare(file, "Base", DeclData::Class(ClassData::default()));
    let x = builder.name("x");
    let base_ctor = builder.declare(
        base,
        "<init>",
        DeclData::Constructor(ConstructorData {
            function: FunctionData::new(
                vec![ValueParameter {
                    name: x,
                    ty: builder.type_ref("Int"),
                    default_value: None,
                }],
                TypeRef::Implicit,
                None,
            ),
            delegated: None,
        }),
    );
    let derived = builder.declare(
        file,
        "Derived",
        DeclData::Class(ClassData {
            supertypes: vec![builder.type_ref("Base")],
            cfg: None,
        }),
    );
    let primary = builder.declare(
        derived,
        "<init>",
        DeclData::Constructor(ConstructorData {
            function: FunctionData::new(Vec::new(), TypeRef::Implicit, None),
            delegated: Some(DelegatedConstructorCall::Lazy {
                target: DelegationTarget::Super {
                    super_type: TypeRef::Implicit,
                },
                arguments: vec![RawExpr::Int(1)],
            }),
        }),
    );
    let secondary = builder.declare(
        derived,
        "<init>",
        DeclData::Constructor(ConstructorData {
            function: FunctionData::new(
                vec![ValueParameter {
                    name: x,
                    ty: builder.type_ref("Int"),
                    default_value: None,
                }],
                TypeRef::Implicit,
                None,
            ),
            delegated: Some(DelegatedConstructorCall::Lazy {
                target: DelegationTarget::This,
                arguments: Vec::new(),
            }),
        }),
    );
    let tree = Arc::new(builder.build());
    let session = ResolutionSession::new(Arc::clone(&tree));

    session.resolve_to(secondary, Phase::Body).unwrap();
    session.resolve_to(primary, Phase::Body).unwrap();

    let delegation_of = |ctor: DeclId| match &*tree.read(ctor).unwrap() {
        DeclData::Constructor(ConstructorData {
            delegated: Some(DelegatedConstructorCall::Resolved { callee, target, .. }),
            ..
        }) => (*callee, target.clone()),
        other => panic!("delegated call not resolved: {other:?}"),
    };
    let (super_callee, super_target) = delegation_of(primary);
    assert_eq!(super_callee, Some(base_ctor));
    assert_eq!(super_target.super_type(), Some(&TypeRef::Implicit));
    let (this_callee, this_target) = delegation_of(secondary);
    assert_eq!(this_callee, Some(primary));
    assert!(this_target.is_this());
    assert_eq!(this_target.super_type(), None);
    assert_eq!(
        tree.published(primary).and_then(|p| p.return_type()),
        Some(&Type::Class(derived))
    );
    assert!(session.blocking_diagnostics().is_empty(), "{:?}", session.diagnostics());
}

#[test]
fn test_super_call_keeps_written_super_type() {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/shapes.st", "app");
    let base = builder.declare(file, "Base", DeclData::Class(ClassData::default()));
    let base_ctor = builder.declare(
        base,
        "<init>",
        DeclData::Constructor(ConstructorData {
            function: FunctionData::new(
                vec![ValueParameter {
                    name: builder.name("x"),
                    ty: builder.type_ref("Int"),
                    default_value: None,
                }],
                TypeRef::Implicit,
                None,
            ),
            delegated: None,
        }),
    );
    let derived = builder.declare(
        file,
        "Derived",
        DeclData::Class(ClassData {
            supertypes: vec![builder.type_ref("Base")],
            cfg: None,
        }),
    );
    let ctor = builder.declare(
        derived,
        "<init>",
        DeclData::Constructor(ConstructorData {
            function: FunctionData::new(Vec::new(), TypeRef::Implicit, None),
            delegated: Some(DelegatedConstructorCall::Lazy {
                target: DelegationTarget::Super {
                    super_type: builder.type_ref("Base"),
                },
                arguments: vec![RawExpr::Int(2)],
            }),
        }),
    );
    let tree = Arc::new(builder.build());
    let session = ResolutionSession::new(Arc::clone(&tree));

    session.resolve_to(ctor, Phase::Body).unwrap();

    let data = tree.read(ctor).unwrap();
    let DeclData::Constructor(ConstructorData {
        delegated: Some(DelegatedConstructorCall::Resolved { target, callee, .. }),
        ..
    }) = &*data
    else {
        panic!("delegated call not resolved: {:?}", *data);
    };
    assert_eq!(
        *target,
        DelegationTarget::Super {
            super_type: TypeRef::Resolved(Type::Class(base)),
        }
    );
    assert_eq!(*callee, Some(base_ctor));
    assert!(session.blocking_diagnostics().is_empty(), "{:?}", session.diagnostics());
}

#[test]
fn test_function_body_becomes_concrete() {
    let (tree, f) = function_with_body();
    let session = ResolutionSession::new(Arc::clone(&tree));

    assert_eq!(session.resolve_to(f, Phase::Body).unwrap(), Phase::Body);

    let data = tree.read(f).unwrap();
    let function = data.as_function().unwrap();
    let body = function.body.as_ref().unwrap().resolved.resolved().expect("concrete body");
    assert_eq!(body.stmts.len(), 1);
    assert!(function.cfg.is_some());
}

#[test]
fn test_nested_target_designation() {
    let (tree, class, _, p2) = forward_reference();
    let session = ResolutionSession::new(Arc::clone(&tree));

    let target = ResolveTarget::nested(&tree, FileId::new(0), "Box.p2").unwrap();
    assert_eq!(target.target_declaration(), Some(p2));
    assert_eq!(target.designation_sequence(&tree), vec![class, p2]);

    assert_eq!(session.resolve_to(target, Phase::Signatures).unwrap(), Phase::Signatures);
}

#[test]
fn test_missing_nested_target_touches_nothing() {
    let (tree, ..) = forward_reference();
    let before: Vec<_> = tree.ids().map(|id| tree.phase(id)).collect();

    let err = ResolveTarget::nested(&tree, FileId::new(0), "Box.p3").unwrap_err();

    assert!(matches!(err, ResolveError::TargetNotFound { ref path, .. } if path == "Box.p3"));
    let after: Vec<_> = tree.ids().map(|id| tree.phase(id)).collect();
    assert_eq!(before, after);
}

// ============================================================================
// MONOTONICITY AND IDEMPOTENCE
// ============================================================================

#[rstest]
#[case(Phase::Imports)]
#[case(Phase::Supertypes)]
#[case(Phase::Signatures)]
#[case(Phase::Body)]
fn test_phases_only_grow(#[case] phase: Phase) {
    let (tree, _, p1, _) = forward_reference();
    let session = ResolutionSession::new(Arc::clone(&tree));

    session.resolve_to(p1, Phase::Body).unwrap();
    let reached = session.resolve_to(p1, phase).unwrap();

    assert_eq!(reached, Phase::Body);
    assert_eq!(tree.phase(p1), Some(Phase::Body));
}

#[test]
fn test_repeated_requests_are_idempotent() {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/a.st", "app");
    let v = builder.declare(
        file,
        "v",
        DeclData::Variable(VariableData::new(TypeRef::Implicit, Some(builder.name_expr("missing")))),
    );
    let tree = Arc::new(builder.build());
    let recorder = Arc::new(RecordingTransformer::default());
    let session = ResolutionSession::new(Arc::clone(&tree)).with_transformer(recorder.clone());

    session.resolve_to(v, Phase::Body).unwrap();
    let first = tree.read(v).unwrap().clone();
    session.resolve_to(v, Phase::Body).unwrap();
    session.resolve_file_to(FileId::new(0), Phase::Body).unwrap();

    assert_eq!(*tree.read(v).unwrap(), first);
    assert_eq!(recorder.order.lock().len(), 1);
    let unresolved = session
        .diagnostics()
        .iter()
        .filter(|d| d.kind == DiagnosticKind::UnresolvedReference)
        .count();
    assert_eq!(unresolved, 1);
}

#[test]
fn test_snapshot_restores_payload() {
    let (tree, f) = function_with_body();
    let original = tree.read(f).unwrap().clone();
    let session = ResolutionSession::new(Arc::clone(&tree));
    session.resolve_to(f, Phase::Body).unwrap();

    let mut resolved = tree.read(f).unwrap().clone();
    assert_ne!(resolved, original);

    let mut scratch = original.clone();
    let snapshot = capture_state(&scratch);
    scratch = resolved.clone();
    snapshot.restore(&mut scratch);
    assert_eq!(scratch.as_function().map(|f| &f.body), original.as_function().map(|f| &f.body));

    // A fully resolved body has nothing left to roll back.
    let snapshot = capture_state(&resolved);
    let before = resolved.clone();
    snapshot.restore(&mut resolved);
    assert_eq!(resolved, before);
}

// ============================================================================
// FAILURE AND CANCELLATION
// ============================================================================

#[test]
fn test_transform_that_skips_work_is_a_phase_violation() {
    let (tree, f) = function_with_body();
    let session = ResolutionSession::new(Arc::clone(&tree)).with_transformer(shared(NoopTransformer));
    let original = tree.read(f).unwrap().clone();

    let err = session.resolve_to(f, Phase::Body).unwrap_err();

    assert!(matches!(err, ResolveError::PhaseViolation { decl, phase: Phase::Body, .. } if decl == f));
    assert!(err.is_internal());
    assert_eq!(tree.phase(f), Some(Phase::Signatures));
    assert_eq!(
        tree.read(f).unwrap().as_function().map(|f| &f.body),
        original.as_function().map(|f| &f.body)
    );
}

#[test]
fn test_failed_transform_rolls_back_and_reports_once() {
    let (tree, f) = function_with_body();
    let session =
        ResolutionSession::new(Arc::clone(&tree)).with_transformer(shared(FailingTransformer));
    let original_body = tree.read(f).unwrap().as_function().unwrap().body.clone();

    let reached = session.resolve_to(f, Phase::Body).unwrap();

    assert_eq!(reached, Phase::Signatures);
    let data = tree.read(f).unwrap();
    assert_eq!(data.as_function().unwrap().body, original_body);
    drop(data);

    let failures = session.diagnostics_for_decl(f);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, DiagnosticKind::ResolutionFailed);
    assert_eq!(failures[0].kind.code(), "RESOLUTION_FAILED");
}

#[test]
fn test_cancellation_mid_transform_rolls_back() {
    let (tree, f) = function_with_body();
    let token = CancellationToken::new();
    let session = ResolutionSession::new(Arc::clone(&tree))
        .with_cancellation_token(token.clone())
        .with_transformer(shared(CancellingTransformer { token }));
    let original_body = tree.read(f).unwrap().as_function().unwrap().body.clone();

    let err = session.resolve_to(f, Phase::Body).unwrap_err();

    assert_eq!(err, ResolveError::Cancelled);
    assert_eq!(tree.phase(f), Some(Phase::Signatures));
    assert_eq!(tree.read(f).unwrap().as_function().unwrap().body, original_body);
    assert!(session.diagnostics().is_empty());
}

// ============================================================================
// RECURSION
// ============================================================================

#[test]
fn test_mutually_recursive_inference_is_reported() {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/a.st", "app");
    let a = builder.declare(
        file,
        "a",
        DeclData::Variable(VariableData::new(TypeRef::Implicit, Some(builder.name_expr("b")))),
    );
    let b = builder.declare(
        file,
        "b",
        DeclData::Variable(VariableData::new(TypeRef::Implicit, Some(builder.name_expr("a")))),
    );
    let tree = Arc::new(builder.build());
    let session = ResolutionSession::new(Arc::clone(&tree));

    assert_eq!(session.resolve_to(a, Phase::Body).unwrap(), Phase::Body);

    assert!(tree.is_at_least(b, Phase::Body));
    assert!(has(&session, DiagnosticKind::RecursiveType));
}

#[test]
fn test_cyclic_inheritance_is_reported_where_detected() {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/a.st", "app");
    let a = builder.declare(
        file,
        "A",
        DeclData::Class(ClassData {
            supertypes: vec![builder.type_ref("B")],
            cfg: None,
        }),
    );
    let b = builder.declare(
        file,
        "B",
        DeclData::Class(ClassData {
            supertypes: vec![builder.type_ref("A")],
            cfg: None,
        }),
    );
    let tree = Arc::new(builder.build());
    let session = ResolutionSession::new(Arc::clone(&tree));

    session.resolve_to(a, Phase::Supertypes).unwrap();

    assert!(tree.is_at_least(a, Phase::Supertypes));
    assert!(tree.is_at_least(b, Phase::Supertypes));
    let cycles: Vec<_> = session
        .diagnostics()
        .into_iter()
        .filter(|d| d.kind == DiagnosticKind::CyclicInheritance)
        .collect();
    assert!(!cycles.is_empty());
    assert_eq!(cycles[0].decl, Some(b));
}

/// `class A : A.B { class B }`
fn inherits_nested() -> (Arc<DeclTree>, DeclId, DeclId) {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/a.st", "app");
    let a = builder.declare(
        file,
        "A",
        DeclData::Class(ClassData {
            supertypes: vec![builder.type_ref("A.B")],
            cfg: None,
        }),
    );
    let b = builder.declare(a, "B", DeclData::Class(ClassData::default()));
    (Arc::new(builder.build()), a, b)
}

#[rstest]
#[case::outer_first(false)]
#[case::nested_first(true)]
fn test_inheriting_a_nested_class_is_not_a_cycle(#[case] nested_first: bool) {
    let (tree, a, b) = inherits_nested();
    let session = ResolutionSession::new(Arc::clone(&tree));

    let first = if nested_first { b } else { a };
    session.resolve_to(first, Phase::Supertypes).unwrap();
    session.resolve_all(Phase::Body).unwrap();

    assert!(!has(&session, DiagnosticKind::CyclicInheritance), "{:?}", session.diagnostics());
    assert_eq!(tree.published(a).and_then(|p| p.supertypes()), Some(&[b][..]));
    assert!(session.blocking_diagnostics().is_empty());
}

#[test]
fn test_request_order_does_not_change_nested_inheritance() {
    let (outer_tree, outer_a, _) = inherits_nested();
    let outer = ResolutionSession::new(Arc::clone(&outer_tree));
    outer.resolve_to(outer_a, Phase::Body).unwrap();

    let (nested_tree, _, nested_b) = inherits_nested();
    let nested = ResolutionSession::new(Arc::clone(&nested_tree));
    nested.resolve_to(nested_b, Phase::Body).unwrap();
    nested.resolve_all(Phase::Body).unwrap();
    outer.resolve_all(Phase::Body).unwrap();

    for id in outer_tree.ids() {
        assert_eq!(outer_tree.phase(id), nested_tree.phase(id));
        assert_eq!(*outer_tree.read(id).unwrap(), *nested_tree.read(id).unwrap());
    }
    assert_eq!(outer.diagnostics(), nested.diagnostics());
}

#[test]
fn test_self_inheritance_is_cyclic() {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/a.st", "app");
    let c = builder.declare(
        file,
        "C",
        DeclData::Class(ClassData {
            supertypes: vec![builder.type_ref("C")],
            cfg: None,
        }),
    );
    let tree = Arc::new(builder.build());
    let session = ResolutionSession::new(Arc::clone(&tree));

    session.resolve_to(c, Phase::Supertypes).unwrap();

    assert_eq!(session.diagnostics_for_decl(c)[0].kind, DiagnosticKind::CyclicInheritance);
    assert_eq!(tree.published(c).and_then(|p| p.supertypes()), Some(&[][..]));
}

#[test]
fn test_recursive_type_aliases_are_reported() {
    let mut builder = TreeBuilder::new();
    let file = builder.file(FileId::new(0), "/a.st", "app");
    let t = builder.declare(
        file,
        "T",
        DeclData::TypeAlias(TypeAliasData {
            aliased: builder.type_ref("U"),
        }),
    );
    builder.declare(
        file,
        "U",
        DeclData::TypeAlias(TypeAliasData {
            aliased: builder.type_ref("T"),
        }),
    );
    let tree = Arc::new(builder.build());
    let session = ResolutionSession::new(Arc::clone(&tree));

    session.resolve_to(t, Phase::Supertypes).unwrap();

    assert!(has(&session, DiagnosticKind::RecursiveTypeAlias));
    assert!(tree.is_at_least(t, Phase::Supertypes));
}
