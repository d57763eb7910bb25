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
use courier::remote::{EndpointError, EndpointTerminatedEvent, RemoteWatch};
use futures::future::join_all;

use crate::setup::probes::spawn_probe;
use crate::setup::{initialize_tracing, test_config, test_runtime, RECEIVE_TIMEOUT};

mod setup;

const LOCAL: &str = "node-a:7000";
const PEER: &str = "node-b:7000";

async fn start_node(network: &ChannelNetwork) -> anyhow::Result<(ActorRuntime, EndpointManager)> {
    start_node_at(network, LOCAL, test_runtime()).await
}

async fn start_node_at(
    network: &ChannelNetwork,
    address: &str,
    runtime: ActorRuntime,
) -> anyhow::Result<(ActorRuntime, EndpointManager)> {
    let (manager, reader) = Remote::start(&runtime, address, network.transport(address)).await?;
    network.listen(address, reader);
    Ok((runtime, manager))
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> anyhow::Result<()> {
    tokio::time::timeout(RECEIVE_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("condition not met within {RECEIVE_TIMEOUT:?}"))
}

fn is_registered(runtime: &ActorRuntime, pid: &Pid) -> bool {
    runtime.registry().get_local(pid).is_some()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_endpoint() -> anyhow::Result<()> {
    let network = ChannelNetwork::new();
    let (runtime, manager) = start_node(&network).await?;

    let calls = (0..100).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.ensure_connected(PEER).await })
    });
    let results = join_all(calls).await;

    let mut endpoints = Vec::with_capacity(results.len());
    for joined in results {
        endpoints.push(joined??);
    }
    let first = endpoints[0].clone();
    assert!(endpoints.iter().all(|endpoint| *endpoint == first));
    assert_eq!(manager.endpoints_constructed(), 1);
    assert_eq!(manager.endpoint_count(), 1);
    assert_eq!(manager.endpoint(PEER), Some(first));

    Remote::shutdown(&runtime).await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn endpoint_is_removed_exactly_once() -> anyhow::Result<()> {
    let network = ChannelNetwork::new();
    let (runtime, manager) = start_node(&network).await?;
    manager.ensure_connected(PEER).await?;

    let event = EndpointTerminatedEvent {
        address: PEER.to_string(),
    };
    let removals = (0..10).map(|_| {
        let manager = manager.clone();
        let event = event.clone();
        tokio::spawn(async move { manager.remove_endpoint(&event).await })
    });
    let mut winners = 0;
    for joined in join_all(removals).await {
        if joined? {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(manager.endpoint_count(), 0);
    assert!(!manager.remove_endpoint(&event).await);

    Remote::shutdown(&runtime).await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn removed_endpoint_is_rebuilt_on_next_use() -> anyhow::Result<()> {
    let network = ChannelNetwork::new();
    let (runtime, manager) = start_node(&network).await?;

    let before = manager.ensure_connected(PEER).await?;
    assert!(
        manager
            .remove_endpoint(&EndpointTerminatedEvent {
                address: PEER.to_string(),
            })
            .await
    );
    let after = manager.ensure_connected(PEER).await?;

    assert_ne!(before, after);
    assert_eq!(manager.endpoints_constructed(), 2);

    Remote::shutdown(&runtime).await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn stopped_manager_refuses_new_endpoints() -> anyhow::Result<()> {
    let network = ChannelNetwork::new();
    let (runtime, manager) = start_node(&network).await?;

    Remote::shutdown(&runtime).await?;
    assert_eq!(
        manager.ensure_connected(PEER).await,
        Err(EndpointError::Stopped)
    );
    assert!(runtime.endpoint_manager().is_none());

    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn watching_an_unreachable_node_reports_address_terminated() -> anyhow::Result<()> {
    let network = ChannelNetwork::new();
    let (runtime, manager) = start_node(&network).await?;
    let (watcher, mut events) = spawn_probe(&runtime, Some("watcher")).await?;
    let ghost = Pid::new("ghost:1", "nobody");

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
    assert!(terminated.address_terminated);
    assert!(manager.endpoint("ghost:1").is_none());

    Remote::shutdown(&runtime).await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn removal_stops_endpoint_actors_and_terminates_watches() -> anyhow::Result<()> {
    let network = ChannelNetwork::new();
    let (runtime, manager) = start_node(&network).await?;
    let (peer, _peer_manager) = start_node_at(&network, PEER, test_runtime()).await?;
    let (_watchee, _) = spawn_probe(&peer, Some("remote-worker")).await?;
    let (watcher, mut events) = spawn_probe(&runtime, Some("watcher")).await?;
    let watchee = Pid::new(PEER, "remote-worker");

    manager
        .remote_watch(RemoteWatch {
            watcher: watcher.pid().clone(),
            watchee: watchee.clone(),
        })
        .await?;
    let endpoint = manager
        .endpoint(PEER)
        .ok_or_else(|| anyhow::anyhow!("endpoint not built"))?;

    assert!(
        manager
            .remove_endpoint(&EndpointTerminatedEvent {
                address: PEER.to_string(),
            })
            .await
    );

    let (terminated, _) = events.expect::<Terminated>().await?;
    assert_eq!(terminated.who, watchee);
    assert!(terminated.address_terminated);
    wait_until(|| {
        !is_registered(&runtime, &endpoint.writer)
            && !is_registered(&runtime, &endpoint.watcher)
            && manager.supervisor().children().is_empty()
    })
    .await?;

    Remote::shutdown(&peer).await?;
    peer.shutdown_all().await?;
    Remote::shutdown(&runtime).await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn removal_during_construction_tears_down_the_built_endpoint() -> anyhow::Result<()> {
    let network = ChannelNetwork::new();
    let (runtime, manager) = start_node(&network).await?;

    let connecting = manager.ensure_connected(PEER);
    tokio::pin!(connecting);
    assert!(futures::poll!(connecting.as_mut()).is_pending());
    assert_eq!(manager.endpoint_count(), 1);
    assert!(manager.endpoint(PEER).is_none());

    let event = EndpointTerminatedEvent {
        address: PEER.to_string(),
    };
    let (won, built) = tokio::join!(manager.remove_endpoint(&event), connecting);
    let endpoint = built?;

    assert!(won);
    assert_eq!(manager.endpoint_count(), 0);
    wait_until(|| {
        !is_registered(&runtime, &endpoint.writer)
            && !is_registered(&runtime, &endpoint.watcher)
            && manager.supervisor().children().is_empty()
    })
    .await?;

    Remote::shutdown(&runtime).await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn silent_supervisor_times_out_and_next_call_builds_again() -> anyhow::Result<()> {
    initialize_tracing();
    let mut config = test_config();
    config.timeouts.endpoint_request_ms = 0;
    let network = ChannelNetwork::new();
    let (runtime, manager) =
        start_node_at(&network, LOCAL, CourierApp::launch_with_config(config)).await?;

    for attempt in 1..=2 {
        let outcome = manager.ensure_connected(PEER).await;
        assert!(
            matches!(
                &outcome,
                Err(EndpointError::SupervisorTimeout { address, .. }) if address == PEER
            ),
            "attempt {attempt}: {outcome:?}"
        );
        assert_eq!(manager.endpoints_constructed(), attempt);
    }
    assert!(manager.endpoint(PEER).is_none());

    Remote::shutdown(&runtime).await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn runtime_debug_output_stops_at_the_endpoint_manager() -> anyhow::Result<()> {
    let network = ChannelNetwork::new();
    let (runtime, manager) = start_node(&network).await?;
    manager.ensure_connected(PEER).await?;

    let rendered = format!("{runtime:?}");
    assert!(rendered.contains("remoting: true"), "{rendered}");
    let rendered = format!("{manager:?}");
    assert!(rendered.contains("endpoints: 1"), "{rendered}");

    Remote::shutdown(&runtime).await?;
    runtime.shutdown_all().await?;
    Ok(())
}
