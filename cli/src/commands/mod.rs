// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the counsel CLI

pub mod config;
pub mod context;
pub mod ask;
pub mod chat;
mod render;

pub use self::ask::AskArgs;
pub use self::chat::ChatArgs;
pub use self::config::ConfigCommand;
pub use self::context::ContextArgs;
