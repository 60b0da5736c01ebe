// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for Cortex bounded context

pub mod repository;
pub mod in_memory;
pub mod file_store;
pub mod vector_index;
pub mod embedding_client;

pub use repository::PersistentStore;
pub use in_memory::InMemoryPersistentStore;
pub use file_store::JsonFileStore;
pub use vector_index::VectorIndex;
pub use embedding_client::{Embedder, EmbeddingApi, HashEmbedder, HttpEmbedder};
