//! Craftfleet AWS Provider
//!
//! Reads cross-stack parameters from AWS Systems Manager

pub mod ssm;

pub use ssm::SsmParameterResolver;
