// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: identifiers and descriptors, the planning and sequencing
//! algorithms, the stage/flow contract, and the ports implemented by
//! `crate::infrastructure`.

pub mod application;
pub mod catalog;
pub mod config;
pub mod dependency_resolver;
pub mod entitlement;
pub mod errors;
pub mod events;
pub mod flow;
pub mod interface_integrity;
pub mod module_sequencer;
pub mod repository;
pub mod stage;
pub mod transition;
pub mod version;
