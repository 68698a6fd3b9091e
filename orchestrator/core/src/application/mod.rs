// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod context;
pub mod stage_lifecycle;
pub mod flow_engine;
pub mod stages;
pub mod descriptor_tree_loader;
pub mod flow_factory;
pub mod entitlement_service;
pub mod repository_factory;

// Re-export use cases for convenience
pub use entitlement_service::{
    ApplyDesiredStateUseCase, DesiredStateRequest, DesiredStateResult, StandardApplyDesiredStateUseCase,
};
pub use flow_engine::FlowEngine;
pub use flow_factory::{FlowCollaborators, FlowDescriptors, FlowFactory};
pub use descriptor_tree_loader::{ApplicationDescriptorTree, ApplicationDescriptorTreeLoader};
pub use repository_factory::Repositories;
