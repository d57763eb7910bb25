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

use tracing::trace;

use crate::common::runtime_inner::RuntimeInner;
use crate::common::config::CONFIG;
use crate::common::{ActorRuntime, CourierConfig};

/// Entry point for creating an [`ActorRuntime`].
///
/// ```no_run
/// # use courier::prelude::*;
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let runtime = CourierApp::launch();
/// // spawn actors...
/// runtime.shutdown_all().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default, Debug, Clone)]
pub struct CourierApp;

impl CourierApp {
    /// Launches a runtime configured from the XDG configuration file, read once per
    /// process.
    #[must_use]
    pub fn launch() -> ActorRuntime {
        trace!("Configuration loaded: {:?}", *CONFIG);
        Self::launch_with_config(CONFIG.clone())
    }

    /// Launches a runtime with an explicit configuration.
    #[must_use]
    pub fn launch_with_config(config: CourierConfig) -> ActorRuntime {
        trace!("Starting courier runtime");
        ActorRuntime(Arc::new(RuntimeInner::new(config)))
    }
}
