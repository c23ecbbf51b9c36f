#![doc(hidden)]

//! Core library for catalog-compute
//!
//! This library consolidates all functionality for the catalog-compute tool,
//! which evaluates quality metrics for components registered in a central
//! component catalog and publishes the computed scores back to it.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`engine`]: The fact evaluation engine
//! - [`services`]: Catalog, monitoring, and working-tree collaborators

pub type Result<T, E = anyhow::Error> = core::result::Result<T, E>;

macro_rules! declare_modules {
    ($($mod:ident),+ $(,)?) => {
        $(
            #[cfg(debug_assertions)]
            pub mod $mod;
            #[cfg(not(debug_assertions))]
            mod $mod;
        )+
    };
}

declare_modules!(commands, engine, services);

pub use crate::commands::run;
pub use crate::engine::{Engine, EngineBuilder, Fact, FactValue, Monitoring};
