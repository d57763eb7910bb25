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

use std::collections::HashMap;
use std::time::Duration;

use courier::prelude::*;
use courier::router::BroadcastMessage;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::{sleep, timeout, Instant};

use crate::setup::messages::Work;
use crate::setup::probes::{spawn_probe, ProbeReceiver};
use crate::setup::{test_runtime, RECEIVE_TIMEOUT};

mod setup;

async fn probes(runtime: &ActorRuntime, count: usize) -> anyhow::Result<Vec<(ActorHandle, ProbeReceiver)>> {
    let mut probes = Vec::with_capacity(count);
    for _ in 0..count {
        probes.push(spawn_probe(runtime, None).await?);
    }
    Ok(probes)
}

/// Polls the router until its routee count is `expected`.
async fn wait_for_routees(router: &RouterHandle, expected: usize) -> anyhow::Result<Vec<Pid>> {
    let deadline = Instant::now() + RECEIVE_TIMEOUT;
    loop {
        let routees = router.routees().await?;
        if routees.len() == expected {
            return Ok(routees);
        }
        if Instant::now() > deadline {
            anyhow::bail!("router has {} routees, expected {expected}", routees.len());
        }
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn membership_follows_add_and_remove() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let group = probes(&runtime, 3).await?;
    let [a, b, c] = [group[0].0.pid(), group[1].0.pid(), group[2].0.pid()];
    let router = spawn_group(&runtime, RouterKind::RoundRobin, Vec::new()).await?;

    router.add_routee(a.clone()).await?;
    router.add_routee(b.clone()).await?;
    router.add_routee(a.clone()).await?;
    assert_eq!(router.routees().await?, vec![a.clone(), b.clone()]);

    router.remove_routee(c.clone()).await?;
    assert_eq!(router.routees().await?, vec![a.clone(), b.clone()]);

    router.remove_routee(a.clone()).await?;
    assert_eq!(router.routees().await?, vec![b.clone()]);

    router.stop().await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn removed_routee_is_poisoned_once_and_skipped_by_broadcasts() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let (keeper, mut keeper_inbox) = spawn_probe(&runtime, None).await?;
    let (leaver, leaver_reply) = runtime.spawn_future();
    let router = spawn_group(
        &runtime,
        RouterKind::RoundRobin,
        vec![keeper.pid().clone(), leaver.clone()],
    )
    .await?;

    router.remove_routee(leaver.clone()).await?;
    router.remove_routee(leaver.clone()).await?;

    let pill = timeout(RECEIVE_TIMEOUT, leaver_reply).await??;
    assert!(matches!(
        pill.message().as_any().downcast_ref::<AutoReceive>(),
        Some(AutoReceive::PoisonPill)
    ));
    assert_eq!(router.routees().await?, vec![keeper.pid().clone()]);

    router.broadcast(Work(1)).await?;
    let (work, _) = keeper_inbox.expect::<Work>().await?;
    assert_eq!(work, Work(1));

    router.stop().await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn round_robin_spreads_messages_evenly() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let mut group = probes(&runtime, 3).await?;
    let pids: Vec<Pid> = group.iter().map(|(handle, _)| handle.pid().clone()).collect();
    let router = spawn_group(&runtime, RouterKind::RoundRobin, pids).await?;

    for n in 0..6 {
        router.tell(Work(n)).await;
    }

    for (_, inbox) in &mut group {
        let (first, _) = inbox.expect::<Work>().await?;
        let (second, _) = inbox.expect::<Work>().await?;
        assert_eq!(second.0, first.0 + 3);
        inbox.expect_silence(Duration::from_millis(50)).await?;
    }

    router.stop().await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn messages_sent_to_the_router_pid_are_routed() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let (probe, mut inbox) = spawn_probe(&runtime, None).await?;
    let router = spawn_group(&runtime, RouterKind::Random, vec![probe.pid().clone()]).await?;

    runtime.tell(router.pid(), Work(9)).await;

    let (work, _) = inbox.expect::<Work>().await?;
    assert_eq!(work, Work(9));

    router.stop().await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn dead_routee_leaves_the_router() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let group = probes(&runtime, 2).await?;
    let pids: Vec<Pid> = group.iter().map(|(handle, _)| handle.pid().clone()).collect();
    let router = spawn_group(&runtime, RouterKind::RoundRobin, pids.clone()).await?;

    group[0].0.stop().await?;

    let remaining = wait_for_routees(&router, 1).await?;
    assert_eq!(remaining, vec![pids[1].clone()]);

    router.stop().await?;
    runtime.shutdown_all().await?;
    Ok(())
}

#[courier_actor]
struct Worker;

#[tokio::test]
async fn pool_spawns_and_owns_its_routees() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let (tx, mut rx) = unbounded_channel();
    let router = spawn_pool::<Worker, _>(&runtime, RouterKind::RoundRobin, 3, move |worker| {
        let tx = tx.clone();
        worker.mutate_on::<Work>(move |actor, ctx| {
            let _ = tx.send((actor.pid().clone(), ctx.message().0));
            Box::pin(async {})
        });
    })
    .await?;

    let routees = router.routees().await?;
    assert_eq!(routees.len(), 3);
    assert_eq!(router.handle().children().len(), 3);

    for n in 0..6 {
        router.tell(Work(n)).await;
    }
    let mut per_worker: HashMap<Pid, usize> = HashMap::new();
    for _ in 0..6 {
        let (pid, _) = timeout(RECEIVE_TIMEOUT, rx.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("workers gone"))?;
        *per_worker.entry(pid).or_default() += 1;
    }
    assert_eq!(per_worker.len(), 3);
    assert!(per_worker.values().all(|count| *count == 2));

    router.stop().await?;
    for pid in &routees {
        assert!(runtime.registry().get_local(pid).is_none());
    }
    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn broadcast_reaches_everyone_with_the_original_sender() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let mut group = probes(&runtime, 3).await?;
    let pids: Vec<Pid> = group.iter().map(|(handle, _)| handle.pid().clone()).collect();
    let router = spawn_group(&runtime, RouterKind::RoundRobin, pids).await?;
    let asker = runtime.registry().new_local_pid("asker");

    let envelope = MessageEnvelope::new(BroadcastMessage::new(Work(42)))
        .with_sender(Some(asker.clone()));
    router.handle().send_envelope(envelope).await?;

    for (_, inbox) in &mut group {
        let (work, envelope) = inbox.expect::<Work>().await?;
        assert_eq!(work, Work(42));
        assert_eq!(envelope.sender, Some(asker.clone()));
    }

    router.stop().await?;
    runtime.shutdown_all().await?;
    Ok(())
}
