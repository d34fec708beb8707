// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//! Tests for TypeRegistry.

use super::*;
use crate::config::{NamingConfig, ScanConfig};
use crate::diagnostics::{Category, DiagnosticsRecorder, Severity};
use crate::runtime::{
    ClassSpec, ConstructorSpec, ForeignRuntime, InMemoryRuntime, ModuleSpec, TypeHandle,
};

fn registry() -> (TypeRegistry, Arc<DiagnosticsRecorder>) {
    let recorder = Arc::new(DiagnosticsRecorder::new(100));
    let registry = TypeRegistry::new(
        NamingConvention::from_config(&NamingConfig::default()),
        ScanConfig::default(),
        Arc::clone(&recorder),
    );
    (registry, recorder)
}

fn scan(runtime: &InMemoryRuntime) -> (TypeRegistry, Arc<DiagnosticsRecorder>) {
    let (registry, recorder) = registry();
    let modules = runtime.list_modules().expect("modules");
    registry.scan(runtime, &modules);
    (registry, recorder)
}

fn game_runtime() -> InMemoryRuntime {
    InMemoryRuntime::builder()
        .module(
            ModuleSpec::new("Game.Core")
                .primary()
                .class(ClassSpec::new("Game.Commands.CmdFoo"))
                .class(ClassSpec::new("Game.Commands.BarCommand"))
                .class(ClassSpec::new("Game.Commands.CommandBase").abstract_class())
                .class(ClassSpec::new("Game.Commands.Teleport").base("Game.Commands.CommandBase"))
                .class(ClassSpec::new("Game.Commands.ICommandSink").interface())
                .class(ClassSpec::new("Game.Commands.CmdAbstract").abstract_class())
                .class(ClassSpec::new("Game.Cmd"))
                .class(ClassSpec::new("Game.Command"))
                .class(ClassSpec::new("Game.Units.Unit")),
        )
        .build()
}

#[test]
fn test_resolve_by_stripped_aliases() {
    let (registry, _) = scan(&game_runtime());

    let foo = registry.resolve("Foo").expect("Foo");
    assert_eq!(foo.canonical_name(), "Game.Commands.CmdFoo");
    let bar = registry.resolve("Bar").expect("Bar");
    assert_eq!(bar.canonical_name(), "Game.Commands.BarCommand");
}

#[test]
fn test_alias_stability() {
    let (registry, _) = scan(&game_runtime());

    let by_bare = registry.resolve("CmdFoo").expect("bare");
    let by_stripped = registry.resolve("Foo").expect("stripped");
    let by_canonical = registry.resolve("Game.Commands.CmdFoo").expect("canonical");
    assert!(Arc::ptr_eq(&by_bare, &by_stripped));
    assert!(Arc::ptr_eq(&by_bare, &by_canonical));

    let bar_bare = registry.resolve("BarCommand").expect("bare");
    let bar_stripped = registry.resolve("Bar").expect("stripped");
    assert!(Arc::ptr_eq(&bar_bare, &bar_stripped));
}

#[test]
fn test_convention_candidates_and_case_folding() {
    let (registry, _) = scan(&game_runtime());

    // "FooCommand" -> strip suffix -> "Foo"
    assert!(registry.resolve("FooCommand").is_some());
    // "CmdBar" -> strip prefix -> "Bar"
    assert!(registry.resolve("CmdBar").is_some());
    assert_eq!(
        registry.resolve("cmdfoo").map(|d| d.name().to_string()),
        Some("CmdFoo".to_string())
    );
    assert!(registry.resolve("  Foo  ").is_some());
    assert!(registry.resolve("Nope").is_none());
    assert!(registry.resolve("").is_none());
}

#[test]
fn test_qualification_rules() {
    let (registry, _) = scan(&game_runtime());

    assert_eq!(
        registry.list_names(),
        vec![
            "Game.Commands.BarCommand",
            "Game.Commands.CmdFoo",
            "Game.Commands.Teleport",
        ]
    );
    // Marker ancestry
    assert!(registry.resolve("Teleport").is_some());
    // Bare affixes, abstract and interface types never qualify
    assert!(registry.resolve("Game.Cmd").is_none());
    assert!(registry.resolve("Game.Command").is_none());
    assert!(registry.resolve("CmdAbstract").is_none());
    assert!(registry.resolve("ICommandSink").is_none());
    assert!(registry.resolve("Unit").is_none());
}

#[test]
fn test_transitive_marker_ancestry() {
    let runtime = InMemoryRuntime::builder()
        .module(
            ModuleSpec::new("Game")
                .class(ClassSpec::new("Game.CommandRoot").abstract_class())
                .class(ClassSpec::new("Game.UnitOrder").base("Game.CommandRoot").abstract_class())
                .class(ClassSpec::new("Game.Attack").base("Game.UnitOrder")),
        )
        .build();
    let (registry, _) = scan(&runtime);
    assert_eq!(registry.list_names(), vec!["Game.Attack"]);
}

#[test]
fn test_duplicate_alias_first_registration_wins() {
    let runtime = InMemoryRuntime::builder()
        .module(ModuleSpec::new("Mods.Extra").class(ClassSpec::new("Mods.CmdFoo")))
        .module(ModuleSpec::new("Game.Core").primary().class(ClassSpec::new("Game.CmdFoo")))
        .build();
    let (registry, recorder) = scan(&runtime);

    // Primary module is scanned first even though it was listed second.
    let foo = registry.resolve("Foo").expect("Foo");
    assert_eq!(foo.canonical_name(), "Game.CmdFoo");
    assert_eq!(registry.resolve("CmdFoo").expect("CmdFoo").canonical_name(), "Game.CmdFoo");

    // Canonical names stay distinct.
    assert_eq!(registry.resolve("Mods.CmdFoo").expect("mods").canonical_name(), "Mods.CmdFoo");
    assert_eq!(registry.len(), 2);

    let report = registry.report();
    assert_eq!(report.duplicate_aliases, 2);
    assert!(recorder
        .entries()
        .iter()
        .any(|e| e.category == Category::Registry && e.message.contains("Duplicate alias 'Foo'")));
}

#[test]
fn test_configured_primary_module() {
    let recorder = Arc::new(DiagnosticsRecorder::new(100));
    let config = ScanConfig {
        primary_modules: vec!["Mods.Extra".into()],
        ..ScanConfig::default()
    };
    let registry = TypeRegistry::new(NamingConvention::default(), config, recorder);
    let runtime = InMemoryRuntime::builder()
        .module(ModuleSpec::new("Game.Core").class(ClassSpec::new("Game.CmdFoo")))
        .module(ModuleSpec::new("Mods.Extra").class(ClassSpec::new("Mods.CmdFoo")))
        .build();
    registry.scan(&runtime, &runtime.list_modules().expect("modules"));

    assert_eq!(registry.resolve("Foo").expect("Foo").canonical_name(), "Mods.CmdFoo");
}

#[test]
fn test_partial_and_failed_modules_do_not_abort() {
    let runtime = InMemoryRuntime::builder()
        .module(
            ModuleSpec::new("Game.Core")
                .class(ClassSpec::new("Game.CmdGood"))
                .class(ClassSpec::new("Game.CmdBroken").broken()),
        )
        .module(ModuleSpec::new("Vendor.Net").unavailable("bad image format"))
        .module(ModuleSpec::new("System.Core").class(ClassSpec::new("System.CmdInternal")))
        .module(ModuleSpec::new("Game.Extra").class(ClassSpec::new("Game.CmdExtra")))
        .build();
    let (registry, recorder) = scan(&runtime);

    assert!(registry.resolve("Good").is_some());
    assert!(registry.resolve("Extra").is_some());
    assert!(registry.resolve("Broken").is_none());
    assert!(registry.resolve("Internal").is_none());

    let report = registry.report();
    assert_eq!(report.modules_scanned, 2);
    assert_eq!(report.modules_partial, 1);
    assert_eq!(report.modules_failed, 1);
    assert_eq!(report.modules_skipped, 1);
    assert_eq!(report.types_registered, 2);
    assert!(report.completed_at.is_some());

    let scan_entries: Vec<_> = recorder
        .entries()
        .into_iter()
        .filter(|e| e.category == Category::Scan)
        .collect();
    assert_eq!(scan_entries.len(), 2);
    assert!(scan_entries.iter().all(|e| e.severity == Severity::Warning));
}

#[test]
fn test_empty_scan_warns() {
    let runtime = InMemoryRuntime::builder()
        .module(ModuleSpec::new("Game").class(ClassSpec::new("Game.Unit")))
        .build();
    let (registry, recorder) = scan(&runtime);

    assert!(registry.is_empty());
    assert!(recorder
        .entries()
        .iter()
        .any(|e| e.severity == Severity::Warning && e.category == Category::Registry));
}

#[test]
fn test_descriptor_carries_constructors() {
    let runtime = InMemoryRuntime::builder()
        .module(
            ModuleSpec::new("Game").class(
                ClassSpec::new("Game.CmdMove")
                    .constructor(ConstructorSpec::non_public())
                    .constructor(
                        ConstructorSpec::public()
                            .param("x", TypeHandle::int())
                            .param("y", TypeHandle::int()),
                    ),
            ),
        )
        .build();
    let (registry, _) = scan(&runtime);

    let d = registry.resolve("Move").expect("Move");
    assert!(d.is_command());
    assert!(d.has_public_constructor());
    assert_eq!(d.constructors()[0].arity(), 2);
    assert_eq!(d.module().name.as_ref(), "Game");
    assert_eq!(d.aliases(), ["CmdMove", "Move", "Game.CmdMove"]);
}

#[test]
fn test_snapshot_and_aliases() {
    let (registry, _) = scan(&game_runtime());
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot.contains_key("Game.Commands.CmdFoo"));

    let aliases = registry.list_aliases();
    assert!(aliases.contains(&"Foo".to_string()));
    assert!(aliases.contains(&"Game.Commands.Teleport".to_string()));
}
