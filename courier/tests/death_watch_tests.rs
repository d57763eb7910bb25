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

use std::time::Duration;

use courier::prelude::*;

use crate::setup::probes::{spawn_probe, Probe};
use crate::setup::test_runtime;

mod setup;

#[tokio::test]
async fn stopping_a_watched_actor_notifies_the_watcher() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let (watcher, mut events) = spawn_probe(&runtime, Some("watcher")).await?;
    let watchee = runtime.new_actor::<Probe>().start().await;

    runtime
        .send_system(
            watchee.pid(),
            SystemMessage::Watch {
                watcher: watcher.pid().clone(),
            },
        )
        .await;
    watchee.stop().await?;

    let (terminated, _) = events.expect::<Terminated>().await?;
    assert_eq!(&terminated.who, watchee.pid());
    assert!(!terminated.address_terminated);

    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn watching_a_missing_process_terminates_immediately() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let (watcher, mut events) = spawn_probe(&runtime, None).await?;
    let ghost = runtime.registry().new_local_pid("nobody-home");

    runtime
        .send_system(
            &ghost,
            SystemMessage::Watch {
                watcher: watcher.pid().clone(),
            },
        )
        .await;

    let (terminated, _) = events.expect::<Terminated>().await?;
    assert_eq!(terminated.who, ghost);
    assert!(!terminated.address_terminated);

    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn unwatch_stops_notifications() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let (watcher, mut events) = spawn_probe(&runtime, None).await?;
    let watchee = runtime.new_actor::<Probe>().start().await;

    let watch = SystemMessage::Watch {
        watcher: watcher.pid().clone(),
    };
    let unwatch = SystemMessage::Unwatch {
        watcher: watcher.pid().clone(),
    };
    runtime.send_system(watchee.pid(), watch).await;
    runtime.send_system(watchee.pid(), unwatch).await;
    watchee.stop().await?;

    events.expect_silence(Duration::from_millis(200)).await?;

    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn remote_watch_without_remoting_reports_address_terminated() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let (watcher, mut events) = spawn_probe(&runtime, None).await?;
    let remote = Pid::new("10.0.0.1:4000", "elsewhere");

    runtime
        .send_system(
            &remote,
            SystemMessage::Watch {
                watcher: watcher.pid().clone(),
            },
        )
        .await;

    let (terminated, _) = events.expect::<Terminated>().await?;
    assert_eq!(terminated.who, remote);
    assert!(terminated.address_terminated);

    runtime.shutdown_all().await?;
    Ok(())
}
