// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer of the Cortex: records, scoring and events.

pub mod record;
pub mod scoring;
pub mod memory;
pub mod case;
pub mod rule;
pub mod events;

pub use record::*;
pub use scoring::*;
pub use memory::*;
pub use case::*;
pub use rule::*;
pub use events::*;
