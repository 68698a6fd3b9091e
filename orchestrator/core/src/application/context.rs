// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Typed stage contexts.
//!
//! Each scope carries exactly what stages of that scope read. Narrower
//! contexts hold an `Arc` to the wider one, so the request and application
//! data is shared, never copied per stage.

use std::sync::Arc;

use crate::domain::application::ApplicationDescriptor;
use crate::domain::entitlement::{Entitlement, Tenant};
use crate::domain::flow::FlowId;
use crate::domain::transition::{ApplicationStateTransitionPlan, TransitionType};
use crate::domain::version::{ApplicationId, ModuleId};

/// Request scope: one per flow
#[derive(Debug)]
pub struct RequestContext {
    pub flow_id: FlowId,
    pub tenant: Tenant,
    pub purge: bool,
    pub plan: ApplicationStateTransitionPlan,
}

/// Application scope: one per application branch
#[derive(Debug)]
pub struct ApplicationContext {
    pub request: Arc<RequestContext>,
    pub descriptor: Arc<ApplicationDescriptor>,
    pub transition_type: TransitionType,
    /// Descriptor being replaced, upgrades only
    pub previous: Option<Arc<ApplicationDescriptor>>,
}

impl ApplicationContext {
    pub fn application_id(&self) -> &ApplicationId {
        &self.descriptor.id
    }

    pub fn tenant(&self) -> &Tenant {
        &self.request.tenant
    }

    pub fn entitlement(&self) -> Entitlement {
        Entitlement::new(self.request.tenant.id, self.descriptor.id.clone())
    }

    pub fn previous_entitlement(&self) -> Option<Entitlement> {
        self.previous
            .as_ref()
            .map(|previous| Entitlement::new(self.request.tenant.id, previous.id.clone()))
    }
}

/// Module scope: one per module install/uninstall call
#[derive(Debug)]
pub struct ModuleContext {
    pub application: Arc<ApplicationContext>,
    pub module_id: ModuleId,
    /// Version being replaced on upgrade
    pub previous_module_id: Option<ModuleId>,
    pub location: String,
}

impl ModuleContext {
    pub fn tenant(&self) -> &Tenant {
        self.application.tenant()
    }
}
