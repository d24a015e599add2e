//! Rule-driven discovery: turn raw eqLogic records into typed entity
//! descriptors and action bindings.

pub mod classify;
pub mod engine;
pub mod model;
pub mod platforms;
pub mod rules;
pub mod slug;
pub mod spec;
pub mod value;

pub use engine::DiscoveryEngine;
pub use model::{Cmd, CmdKind, CmdSubtype, EqLogic};
pub use rules::{DeviceRule, DiscoveryRules, RulesError};
pub use spec::{ActionDoc, EntityDoc, Platform};
