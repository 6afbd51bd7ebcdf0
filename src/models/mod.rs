// Domain models: services, containers, log records

mod container;
mod entity;
pub mod format;
mod log_record;
mod service;

pub use container::{
    ContainerFilter, ContainerList, ContainerMount, ContainerSnapshot, ContainerState,
    ContainerStatus, ContainerStatusCounts,
};
pub use entity::{EntityId, EntityKind, EntitySnapshot};
pub use log_record::{LogFormat, LogRecord, parse_export, render_export};
pub use service::{
    ServiceDetails, ServiceFilter, ServiceList, ServiceSnapshot, ServiceStatusCounts,
    is_service_running,
};
