//! PMEM-CSI Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the PMEM-CSI operator.

pub mod deployment;

pub use deployment::*;
