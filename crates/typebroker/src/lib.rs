// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # typebroker - Dynamic type-resolution and instantiation broker
//!
//! Discovers command types inside a reflective foreign runtime, resolves them
//! by loose name, builds instances with cached constructors and sends them
//! to a message bus through per-type specialized dispatch functions.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use typebroker::{Broker, BrokerConfig, ForeignValue};
//! use typebroker::runtime::{
//!     ClassSpec, ConstructorSpec, InMemoryBus, InMemoryRuntime, ModuleSpec, TypeHandle,
//! };
//!
//! let runtime = Arc::new(
//!     InMemoryRuntime::builder()
//!         .module(
//!             ModuleSpec::new("Game").primary().class(
//!                 ClassSpec::new("Game.CmdMove").constructor(
//!                     ConstructorSpec::public()
//!                         .param("x", TypeHandle::int())
//!                         .param("y", TypeHandle::int()),
//!                 ),
//!             ),
//!         )
//!         .build(),
//! );
//! let broker = Broker::new(runtime, BrokerConfig::default()).expect("valid config");
//!
//! let handle = broker
//!     .create("Move", &[ForeignValue::from(1), ForeignValue::from(2)])
//!     .expect("handle");
//! let bus = InMemoryBus::with_dispatch("Game.Bus");
//! assert!(broker.dispatch(&bus, &handle));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |  Broker: lifecycle, placeholders, health, diagnostic report   |
//! +---------------------------------------------------------------+
//! |  TypeRegistry  |  InstanceFactory  |  DispatchBridge          |
//! +----------------+-------------------+--------------------------+
//! |              TypeDescriptorCache (constructors, members)      |
//! +---------------------------------------------------------------+
//! |  ForeignRuntime / ForeignBus traits (in-memory reference impl)|
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Broker`] | Entry point: create, dispatch, health, reinitialize |
//! | [`CommandHandle`] | Live foreign instance or placeholder |
//! | [`TypeRegistry`] | Name to descriptor index built by a module scan |
//! | [`TypeDescriptorCache`] | Memoized constructors and members |
//! | [`DiagnosticsRecorder`] | Bounded event log and error-rate source |
//!
//! ## Modules Overview
//!
//! - [`broker`] - Lifecycle and the public facade (start here)
//! - [`registry`] - Discovery, naming conventions, descriptors
//! - [`cache`] - Constructor and member memoization
//! - [`factory`] - Validate / fast / fallback / verify construction pipeline
//! - [`dispatch`] - Generic bus entry point specialization
//! - [`diagnostics`] - Recorder, health model and text report
//! - [`runtime`] - Foreign runtime abstraction and in-memory implementation

pub mod broker;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod factory;
pub mod handle;
pub mod logging;
pub mod registry;
pub mod runtime;

pub use broker::{global, install_global, Broker, BrokerError, BrokerState};
pub use cache::{CacheStats, TypeDescriptorCache};
pub use config::{
    BrokerConfig, ConfigError, DiagnosticsConfig, DispatchConfig, NamingConfig, ScanConfig,
};
pub use diagnostics::{
    Category, ComponentHealth, DiagnosticEntry, DiagnosticsRecorder, HealthReport, HealthStatus,
    Severity,
};
pub use dispatch::{DispatchBridge, DispatchError};
pub use factory::{Confidence, ConstructionError, ConstructionPath, InstanceFactory};
pub use handle::{CommandHandle, FailureKind, FallbackCommand, HandleError};
pub use logging::{init_from_config, init_tracing};
pub use registry::{NamingConvention, ScanReport, TypeDescriptor, TypeRegistry};
pub use runtime::{
    ForeignBus, ForeignObject, ForeignRuntime, ForeignValue, RuntimeError, TypeHandle,
};
