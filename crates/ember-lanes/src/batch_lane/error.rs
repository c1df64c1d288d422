// Copyright 2025 eraflo
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

use ember_core::renderer::ResourceError;
use thiserror::Error;

use super::BatchId;

/// Errors raised by [`super::BatchRenderer`].
#[derive(Debug, Error)]
pub enum BatchError {
    /// The batch id does not belong to this renderer.
    #[error("unknown batch {0:?}")]
    UnknownBatch(BatchId),
    /// An update call arrived outside of `begin_update`/`end_update`.
    #[error("{operation} called outside of an update")]
    PhaseViolation {
        /// The offending call.
        operation: &'static str,
    },
    /// A batch was updated twice in the same frame.
    #[error("batch {0:?} was already updated this frame")]
    AlreadyUpdated(BatchId),
    /// Instances of one batch must carry bone palettes of the same length.
    #[error("batch {batch:?} expects {expected} bones per instance, got {found}")]
    PaletteMismatch {
        /// The batch.
        batch: BatchId,
        /// Palette length of the batch.
        expected: u32,
        /// Palette length of the rejected instance.
        found: u32,
    },
    /// Draw types must be appended to an empty culling context so that the
    /// type of batch `i` is type `i`.
    #[error("draw types must be appended to an empty culling context")]
    ContextNotEmpty,
    /// A device operation failed.
    #[error("batch buffer operation failed: {0}")]
    Resource(#[from] ResourceError),
}

impl From<BatchError> for ResourceError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Resource(inner) => inner,
            other => ResourceError::BackendError(other.to_string()),
        }
    }
}
