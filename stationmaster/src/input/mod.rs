//! Building stations.

pub mod builder;
pub mod layouts;
