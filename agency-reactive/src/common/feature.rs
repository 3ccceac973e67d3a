/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use crate::common::Agency;
use crate::traits::Identifiable;

/// A pluggable agency extension with init/terminate hooks.
///
/// Features register under [`IdentifiableType::Feature`](crate::traits::IdentifiableType::Feature). The agency calls
/// [`init_feature`](Self::init_feature) when the feature is added and
/// [`terminate_feature`](Self::terminate_feature) during shutdown, in reverse
/// order of addition.
pub trait Feature: Identifiable {
    /// Prepares the feature. Returning `false` rejects it.
    fn init_feature(&self, agency: &Agency) -> bool;

    fn terminate_feature(&self, agency: &Agency);
}

