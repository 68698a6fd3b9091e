// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod db;
pub mod event_bus;
pub mod http;
pub mod catalog_client;
pub mod tenant_client;
pub mod module_client;

pub use catalog_client::HttpApplicationCatalog;
pub use event_bus::{BusMessage, EventBus, EventReceiver};
pub use module_client::HttpModuleTenantApi;
pub use tenant_client::HttpTenantDirectory;
