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

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::message::Pid;
use crate::traits::CourierMessage;

/// Published on the event stream whenever a message cannot be delivered.
#[derive(Debug, Clone)]
pub struct DeadLetterEvent {
    /// The unreachable target.
    pub pid: Pid,
    /// The undeliverable payload.
    pub message: Arc<dyn CourierMessage>,
    /// The original sender, if any.
    pub sender: Option<Pid>,
}

/// Sent back to the sender of an undeliverable message so pending requests fail fast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterResponse {
    /// The unreachable target.
    pub target: Pid,
}
