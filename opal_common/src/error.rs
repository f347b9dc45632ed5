//! Error type shared by all Opal crates.

use ::std::fmt::Display;

use ::anyhow::anyhow;

use crate::{node::NodeId, task::TaskId};

pub type Result<T> = std::result::Result<T, OpalError>;

/// Failure classes of Opal operations. The kind decides the user-visible
/// message prefix and the gRPC status code at the RPC boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorKind {
    IllegalArgument,
    NotFound,
    NotAllowed,
    UnreachableNode,
    FailToLoadConfig,
    FailToRegisterNode,
    FailToDispatchTask,
    FailToStartCoordinator,
    FailToStartComputeNode,
    EngineFailure,
    DataStoreFailure,
}

impl ErrorKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::IllegalArgument => "Illegal argument",
            Self::NotFound => "Not found",
            Self::NotAllowed => "Not allowed",
            Self::UnreachableNode => "Unreachable node",
            Self::FailToLoadConfig => "Fail to load config",
            Self::FailToRegisterNode => "Fail to register node",
            Self::FailToDispatchTask => "Fail to dispatch task",
            Self::FailToStartCoordinator => "Fail to start coordinator",
            Self::FailToStartComputeNode => "Fail to start compute node",
            Self::EngineFailure => "Engine failure",
            Self::DataStoreFailure => "Data store failure",
        }
    }
}

#[derive(Debug)]
pub struct OpalError {
    kind: ErrorKind,
    source: anyhow::Error,
}

macro_rules! error_constructor {
    ($fn_name: ident, $kind: expr) => {
        pub fn $fn_name<E: Into<anyhow::Error>>(source: E) -> Self {
            Self {
                kind: $kind,
                source: source.into(),
            }
        }
    };
}

impl OpalError {
    error_constructor!(illegal_argument, ErrorKind::IllegalArgument);
    error_constructor!(not_found, ErrorKind::NotFound);
    error_constructor!(not_allowed, ErrorKind::NotAllowed);
    error_constructor!(unreachable_node, ErrorKind::UnreachableNode);
    error_constructor!(fail_to_load_config, ErrorKind::FailToLoadConfig);
    error_constructor!(fail_to_register_node, ErrorKind::FailToRegisterNode);
    error_constructor!(fail_to_dispatch_task, ErrorKind::FailToDispatchTask);
    error_constructor!(fail_to_start_coordinator, ErrorKind::FailToStartCoordinator);
    error_constructor!(fail_to_start_compute_node, ErrorKind::FailToStartComputeNode);
    error_constructor!(engine_failure, ErrorKind::EngineFailure);
    error_constructor!(data_store_failure, ErrorKind::DataStoreFailure);

    pub fn task_not_found(id: &TaskId) -> Self {
        Self::not_found(anyhow!("Task {} not found", id))
    }

    pub fn node_not_found(id: &NodeId) -> Self {
        Self::not_found(anyhow!("Node {} not found", id))
    }
}

impl Display for OpalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.prefix(), self.source)
    }
}

impl std::error::Error for OpalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl<T> From<OpalError> for Result<T> {
    fn from(val: OpalError) -> Self {
        Result::Err(val)
    }
}

impl From<OpalError> for tonic::Status {
    fn from(val: OpalError) -> Self {
        let message = val.to_string();
        match val.kind {
            ErrorKind::IllegalArgument => tonic::Status::invalid_argument(message),
            ErrorKind::NotFound => tonic::Status::not_found(message),
            ErrorKind::NotAllowed => tonic::Status::failed_precondition(message),
            ErrorKind::UnreachableNode => tonic::Status::unavailable(message),
            _ => tonic::Status::internal(message),
        }
    }
}
