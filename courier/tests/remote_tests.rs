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
use tokio::time::{sleep, timeout};

use crate::setup::messages::{greeting, register_wire_types, Greeting, Reply};
use crate::setup::probes::{spawn_echo, spawn_probe};
use crate::setup::{test_runtime, RECEIVE_TIMEOUT};

mod setup;

const NODE_A: &str = "node-a:9000";
const NODE_B: &str = "node-b:9000";

struct Cluster {
    network: ChannelNetwork,
    a: ActorRuntime,
    b: ActorRuntime,
}

impl Cluster {
    async fn start() -> anyhow::Result<Self> {
        let network = ChannelNetwork::new();
        let a = start_node(&network, NODE_A).await?;
        let b = start_node(&network, NODE_B).await?;
        Ok(Self { network, a, b })
    }

    async fn shutdown(self) -> anyhow::Result<()> {
        for runtime in [&self.a, &self.b] {
            Remote::shutdown(runtime).await?;
            runtime.shutdown_all().await?;
        }
        Ok(())
    }
}

async fn start_node(network: &ChannelNetwork, address: &str) -> anyhow::Result<ActorRuntime> {
    let runtime = test_runtime();
    register_wire_types(&runtime);
    let (_manager, reader) = Remote::start(&runtime, address, network.transport(address)).await?;
    network.listen(address, reader);
    Ok(runtime)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tell_reaches_an_actor_on_another_node() -> anyhow::Result<()> {
    let cluster = Cluster::start().await?;
    let (_probe, mut inbox) = spawn_probe(&cluster.b, Some("inbox")).await?;

    cluster
        .a
        .tell(&Pid::new(NODE_B, "inbox"), greeting("hello from a"))
        .await;

    let (received, _) = inbox.expect::<Greeting>().await?;
    assert_eq!(received.text, "hello from a");

    cluster.shutdown().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn request_future_gets_a_reply_across_nodes() -> anyhow::Result<()> {
    let cluster = Cluster::start().await?;
    spawn_echo(&cluster.b, "echo").await?;

    let reply = cluster
        .a
        .request_future(&Pid::new(NODE_B, "echo"), greeting("ping"), RECEIVE_TIMEOUT)
        .await?;
    let reply = reply
        .message()
        .as_any()
        .downcast_ref::<Reply>()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("unexpected reply {:?}", reply.message))?;
    assert_eq!(reply.text, "ping");

    let asked: Reply = cluster
        .a
        .ask(&Pid::new(NODE_B, "echo"), greeting("again"))
        .await?;
    assert_eq!(asked.text, "again");

    cluster.shutdown().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_watch_sees_a_normal_stop() -> anyhow::Result<()> {
    let cluster = Cluster::start().await?;
    let echo = spawn_echo(&cluster.b, "echo").await?;
    let remote_echo = Pid::new(NODE_B, "echo");
    let (watcher, mut events) = spawn_probe(&cluster.a, Some("watcher")).await?;

    cluster
        .a
        .send_system(
            &remote_echo,
            SystemMessage::Watch {
                watcher: watcher.pid().clone(),
            },
        )
        .await;
    sleep(Duration::from_millis(100)).await;
    let _: Reply = cluster.a.ask(&remote_echo, greeting("sync")).await?;

    echo.stop().await?;

    let (terminated, _) = events.expect::<Terminated>().await?;
    assert_eq!(terminated.who, remote_echo);
    assert!(!terminated.address_terminated);

    cluster.shutdown().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn losing_the_link_terminates_remote_watches() -> anyhow::Result<()> {
    let cluster = Cluster::start().await?;
    spawn_echo(&cluster.b, "echo").await?;
    let remote_echo = Pid::new(NODE_B, "echo");
    let (watcher, mut events) = spawn_probe(&cluster.a, Some("watcher")).await?;

    cluster
        .a
        .send_system(
            &remote_echo,
            SystemMessage::Watch {
                watcher: watcher.pid().clone(),
            },
        )
        .await;
    let _: Reply = cluster.a.ask(&remote_echo, greeting("sync")).await?;

    assert!(cluster.network.unbind(NODE_B));
    let a = cluster.a.clone();
    let target = remote_echo.clone();
    let nudger = tokio::spawn(async move {
        loop {
            a.tell(&target, greeting("anyone there?")).await;
            sleep(Duration::from_millis(25)).await;
        }
    });

    let outcome = timeout(RECEIVE_TIMEOUT, events.expect::<Terminated>()).await;
    nudger.abort();
    let (terminated, _) = outcome??;
    assert_eq!(terminated.who, remote_echo);
    assert!(terminated.address_terminated);

    cluster.shutdown().await
}
