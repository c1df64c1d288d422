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

/// Errors raised while staging or uploading the culling set.
#[derive(Debug, Error)]
pub enum CullingError {
    /// `append_instance` was called before any `append_type`.
    #[error("an instance was appended before any draw type")]
    NoActiveType,
    /// The draw type id was never appended this frame.
    #[error("draw type {0} was not appended this frame")]
    UnknownType(u32),
    /// Creating or writing a culling buffer failed.
    #[error("culling buffer operation failed: {0}")]
    Resource(#[from] ResourceError),
}

impl From<CullingError> for ResourceError {
    fn from(err: CullingError) -> Self {
        match err {
            CullingError::Resource(inner) => inner,
            other => ResourceError::BackendError(other.to_string()),
        }
    }
}
