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

#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;

use courier::common::CourierConfig;
use courier::prelude::*;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub mod messages;
pub mod probes;

static INIT: Once = Once::new();

/// Installs a global subscriber writing to `courier_tests.txt` in the system temp dir.
/// Safe to call from every test.
pub fn initialize_tracing() {
    INIT.call_once(|| {
        let log_dir = std::env::temp_dir().join("courier-logs");
        std::fs::create_dir_all(&log_dir).expect("could not create log dir");

        let file_appender = RollingFileAppender::new(Rotation::NEVER, log_dir, "courier_tests.txt");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        Box::leak(Box::new(guard));

        let filter = EnvFilter::new("trace")
            .add_directive("courier::actor::managed_actor::started=trace".parse().unwrap())
            .add_directive("courier::remote=trace".parse().unwrap())
            .add_directive("courier::router=trace".parse().unwrap())
            .add_directive("tokio=info".parse().unwrap());

        let subscriber = FmtSubscriber::builder()
            .with_span_events(FmtSpan::NONE)
            .with_max_level(Level::TRACE)
            .compact()
            .with_line_number(true)
            .without_time()
            .with_target(true)
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("setting default subscriber failed");
    });
}

/// Configuration with timeouts short enough for tests.
pub fn test_config() -> CourierConfig {
    let mut config = CourierConfig::default();
    config.timeouts.actor_shutdown_ms = 2_000;
    config.timeouts.system_shutdown_ms = 5_000;
    config.timeouts.endpoint_request_ms = 2_000;
    config.timeouts.request_future_ms = 2_000;
    config.timeouts.reader_suspend_backoff_ms = 20;
    config
}

/// A runtime launched with [`test_config`].
pub fn test_runtime() -> ActorRuntime {
    initialize_tracing();
    CourierApp::launch_with_config(test_config())
}

/// How long tests wait for a message that should arrive.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);
