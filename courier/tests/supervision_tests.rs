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

use std::io;

use courier::actor::RestartLimiterConfig;
use courier::common::RegistryError;
use courier::prelude::*;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

use crate::setup::messages::{Crash, Work};
use crate::setup::{test_runtime, RECEIVE_TIMEOUT};

mod setup;

#[courier_actor]
struct Supervisor;

#[courier_actor]
struct Counter {
    count: u32,
    reports: Option<UnboundedSender<u32>>,
}

impl Counter {
    fn bump(&mut self) {
        self.count += 1;
        if let Some(reports) = &self.reports {
            let _ = reports.send(self.count);
        }
    }
}

fn counter(
    parent: &ManagedActor<Idle, Supervisor>,
    config: ActorConfig,
) -> anyhow::Result<(ManagedActor<Idle, Counter>, UnboundedReceiver<u32>)> {
    let (tx, rx) = unbounded_channel();
    let mut child = parent.create_child_with_config::<Counter>(config)?;
    child
        .with_producer(move || Counter {
            count: 0,
            reports: Some(tx.clone()),
        })
        .mutate_on::<Work>(|actor, _ctx| {
            actor.model.bump();
            Box::pin(async {})
        })
        .mutate_on::<Crash>(|_actor, _ctx| panic!("counter asked to crash"));
    Ok((child, rx))
}

async fn next_count(reports: &mut UnboundedReceiver<u32>) -> anyhow::Result<u32> {
    timeout(RECEIVE_TIMEOUT, reports.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("counter gone"))
}

#[tokio::test]
async fn panicking_child_restarts_with_fresh_state() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let parent = runtime.new_actor::<Supervisor>();
    let (child, mut reports) = counter(&parent, ActorConfig::default())?;
    let parent = parent.start().await;
    let child = parent.supervise(child).await?;

    child.send(Work(1)).await?;
    child.send(Work(1)).await?;
    assert_eq!(next_count(&mut reports).await?, 1);
    assert_eq!(next_count(&mut reports).await?, 2);

    child.send(Crash).await?;
    child.send(Work(1)).await?;
    assert_eq!(next_count(&mut reports).await?, 1);
    assert!(!child.is_stopped());

    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn temporary_child_is_stopped_instead_of_restarted() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let parent = runtime.new_actor::<Supervisor>();
    let config = ActorConfig::default().with_restart_policy(RestartPolicy::Temporary);
    let (child, _reports) = counter(&parent, config)?;
    let parent = parent.start().await;
    let child = parent.supervise(child).await?;

    child.send(Crash).await?;
    timeout(RECEIVE_TIMEOUT, child.tracker().wait()).await?;

    assert!(child.is_stopped());
    assert!(runtime.registry().get_local(child.pid()).is_none());

    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn exceeding_the_restart_limit_escalates() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let grandparent = runtime.new_actor::<Supervisor>();
    let limiter = RestartLimiterConfig {
        max_restarts: 1,
        ..RestartLimiterConfig::default()
    };
    let mut parent = grandparent.create_child_with_config::<Supervisor>(
        ActorConfig::default().with_restart_limiter(limiter),
    )?;
    let (restarted_tx, mut restarted) = unbounded_channel();
    parent.before_restart(move |_actor| {
        let restarted_tx = restarted_tx.clone();
        async move {
            let _ = restarted_tx.send(());
        }
    });
    let (child, mut reports) = counter(&parent, ActorConfig::default())?;

    let grandparent = grandparent.start().await;
    let parent = grandparent.supervise(parent).await?;
    let child = parent.supervise(child).await?;

    child.send(Crash).await?;
    child.send(Work(1)).await?;
    assert_eq!(next_count(&mut reports).await?, 1);

    child.send(Crash).await?;
    timeout(RECEIVE_TIMEOUT, child.tracker().wait()).await?;
    timeout(RECEIVE_TIMEOUT, restarted.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("parent was never restarted"))?;
    assert!(!parent.is_stopped());

    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn failing_fallible_handler_restarts_the_child() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let parent = runtime.new_actor::<Supervisor>();
    let (tx, mut reports) = unbounded_channel();
    let mut child = parent.create_child::<Counter>(Some("strict"))?;
    child
        .with_producer(move || Counter {
            count: 0,
            reports: Some(tx.clone()),
        })
        .try_mutate_on::<Work, io::Error>(|actor, ctx| {
            let outcome = if ctx.message().0 == 0 {
                Err(io::Error::other("zero work is not allowed"))
            } else {
                actor.model.bump();
                Ok(())
            };
            Box::pin(async move { outcome })
        });
    let parent = parent.start().await;
    let child = parent.supervise(child).await?;
    assert_eq!(child.pid().id(), format!("{}/strict", parent.pid().id()));

    child.send(Work(1)).await?;
    assert_eq!(next_count(&mut reports).await?, 1);

    child.send(Work(0)).await?;
    child.send(Work(1)).await?;
    assert_eq!(next_count(&mut reports).await?, 1);

    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn child_names_are_checked_apart_from_the_parent_id() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let parent = runtime.new_actor::<Supervisor>();
    assert!(parent.handle().pid().id().starts_with('$'));

    let child = parent.create_child::<Counter>(Some("helper"))?;
    assert_eq!(
        child.handle().pid().id(),
        format!("{}/helper", parent.handle().pid().id())
    );
    assert!(runtime.registry().get(child.handle().pid().id()).is_some());

    assert!(matches!(
        parent.create_child::<Counter>(Some("$7")),
        Err(RegistryError::ReservedName(name)) if name == "$7"
    ));
    assert!(matches!(
        parent.create_child::<Counter>(Some("helper")),
        Err(RegistryError::NameExists(_))
    ));
    assert!(matches!(
        runtime.new_actor_named::<Counter>("$8"),
        Err(RegistryError::ReservedName(_))
    ));

    runtime.shutdown_all().await?;
    Ok(())
}

#[tokio::test]
async fn rest_for_one_restarts_the_failed_child_and_later_siblings() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let parent = runtime.new_actor_with_config::<Supervisor>(
        ActorConfig::default().with_supervision_strategy(SupervisionStrategy::RestForOne),
    )?;
    let (first, mut first_reports) = counter(&parent, ActorConfig::default())?;
    let (second, mut second_reports) = counter(&parent, ActorConfig::default())?;
    let (third, mut third_reports) = counter(&parent, ActorConfig::default())?;
    let parent = parent.start().await;
    let first = parent.supervise(first).await?;
    let second = parent.supervise(second).await?;
    let third = parent.supervise(third).await?;

    for (child, reports) in [
        (&first, &mut first_reports),
        (&second, &mut second_reports),
        (&third, &mut third_reports),
    ] {
        child.send(Work(1)).await?;
        assert_eq!(next_count(reports).await?, 1);
    }

    second.send(Crash).await?;
    second.send(Work(1)).await?;
    assert_eq!(next_count(&mut second_reports).await?, 1);

    third.send(Work(1)).await?;
    assert_eq!(next_count(&mut third_reports).await?, 1);
    first.send(Work(1)).await?;
    assert_eq!(next_count(&mut first_reports).await?, 2);

    runtime.shutdown_all().await?;
    Ok(())
}
