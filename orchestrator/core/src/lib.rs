// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Entitlement orchestration core.
//!
//! # Architecture
//!
//! - `domain`: pure types and algorithms, repository and collaborator ports
//! - `application`: use cases, the flow engine and the concrete stages
//! - `infrastructure`: HTTP clients, repositories, event bus, database pool

pub mod domain;
pub mod application;
pub mod infrastructure;
