// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use crate::application::context::{ApplicationContext, ModuleContext, RequestContext};
use crate::domain::application::{ApplicationDescriptor, ModuleDescriptor};
use crate::domain::entitlement::{Tenant, TenantId};
use crate::domain::flow::FlowId;
use crate::domain::transition::{StateTransitionPlanner, TransitionType};
use crate::domain::version::{ApplicationId, ModuleId};

pub fn descriptor(id: &str, modules: &[&str]) -> Arc<ApplicationDescriptor> {
    let mut descriptor = ApplicationDescriptor::new(ApplicationId::parse(id).unwrap());
    descriptor.module_descriptors = modules
        .iter()
        .map(|m| ModuleDescriptor::new(ModuleId::parse(*m).unwrap()))
        .collect();
    Arc::new(descriptor)
}

pub fn request(purge: bool) -> Arc<RequestContext> {
    Arc::new(RequestContext {
        flow_id: FlowId::new(),
        tenant: Tenant {
            id: TenantId::new(),
            name: "diku".to_string(),
            description: None,
        },
        purge,
        plan: StateTransitionPlanner::plan(&[], &[]).unwrap(),
    })
}

pub fn application(
    request: Arc<RequestContext>,
    descriptor: Arc<ApplicationDescriptor>,
    transition_type: TransitionType,
    previous: Option<Arc<ApplicationDescriptor>>,
) -> Arc<ApplicationContext> {
    Arc::new(ApplicationContext {
        request,
        descriptor,
        transition_type,
        previous,
    })
}

pub fn module(application: Arc<ApplicationContext>, module_id: &str) -> ModuleContext {
    ModuleContext {
        application,
        module_id: ModuleId::parse(module_id).unwrap(),
        previous_module_id: None,
        location: "http://mod-users:8081".to_string(),
    }
}
