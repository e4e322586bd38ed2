// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use std::fmt;

/// ECS error type
///
/// User-input kinds (`InvalidEntity`, `InvalidComponent`) are only returned
/// when debug validation is on; the remaining kinds indicate internal
/// invariant violations or resource exhaustion and always surface.
#[derive(Debug, Clone, PartialEq)]
pub enum EcsError {
    /// Handle decoded to an unknown index or a stale generation
    InvalidEntity,

    /// Component id outside the declared range
    InvalidComponent,

    /// Builder misuse, e.g. an empty required-component list
    InvalidOperation(String),

    /// Row/column bookkeeping desync inside an archetype
    ArchetypeError(String),

    /// Structural move failed mid-flight
    TransitionError(String),

    /// Malformed query composition
    QueryError(String),

    /// Entity index space exhausted
    MemoryError,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::InvalidEntity => write!(f, "Invalid entity handle"),
            EcsError::InvalidComponent => write!(f, "Component id out of range"),
            EcsError::InvalidOperation(msg) => write!(f, "Invalid operation: {msg}"),
            EcsError::ArchetypeError(msg) => write!(f, "Archetype error: {msg}"),
            EcsError::TransitionError(msg) => write!(f, "Transition error: {msg}"),
            EcsError::QueryError(msg) => write!(f, "Query error: {msg}"),
            EcsError::MemoryError => write!(f, "Entity id space exhausted"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
