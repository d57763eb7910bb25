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

use std::time::Duration;

use courier::prelude::*;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

use super::RECEIVE_TIMEOUT;

/// Actor state that forwards every user message it receives to the test.
#[courier_actor]
pub struct Probe {
    sink: Option<UnboundedSender<MessageEnvelope>>,
}

/// The test's end of a probe.
pub struct ProbeReceiver(UnboundedReceiver<MessageEnvelope>);

impl ProbeReceiver {
    /// Waits for the next envelope and returns it if its message is a `T`.
    pub async fn expect<T: CourierMessage + Clone>(&mut self) -> anyhow::Result<(T, MessageEnvelope)> {
        let envelope = timeout(RECEIVE_TIMEOUT, self.0.recv())
            .await
            .map_err(|_| anyhow::anyhow!("no message within {RECEIVE_TIMEOUT:?}"))?
            .ok_or_else(|| anyhow::anyhow!("probe stopped"))?;
        let message = envelope
            .message()
            .as_any()
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "expected {} but got {:?}",
                    std::any::type_name::<T>(),
                    envelope.message
                )
            })?;
        Ok((message, envelope))
    }

    /// Asserts nothing arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) -> anyhow::Result<()> {
        match timeout(window, self.0.recv()).await {
            Err(_) | Ok(None) => Ok(()),
            Ok(Some(envelope)) => Err(anyhow::anyhow!("unexpected message {:?}", envelope.message)),
        }
    }
}

/// Starts a probe actor, optionally registered under `name`.
pub async fn spawn_probe(
    runtime: &ActorRuntime,
    name: Option<&str>,
) -> anyhow::Result<(ActorHandle, ProbeReceiver)> {
    let (tx, rx) = unbounded_channel();
    let mut probe = match name {
        Some(name) => runtime.new_actor_named::<Probe>(name)?,
        None => runtime.new_actor::<Probe>(),
    };
    probe
        .with_producer(move || Probe {
            sink: Some(tx.clone()),
        })
        .on_unhandled(|actor, envelope| {
            if let Some(sink) = &actor.model.sink {
                let _ = sink.send(envelope.clone());
            }
            Box::pin(async {})
        });
    let handle = probe.start().await;
    Ok((handle, ProbeReceiver(rx)))
}

/// Starts an actor that answers every [`Greeting`](super::messages::Greeting) with a
/// [`Reply`](super::messages::Reply) carrying the same text.
pub async fn spawn_echo(runtime: &ActorRuntime, name: &str) -> anyhow::Result<ActorHandle> {
    #[courier_actor]
    struct Echo;

    let mut echo = runtime.new_actor_named::<Echo>(name)?;
    echo.mutate_on::<super::messages::Greeting>(|_actor, context| {
        let text = context.message().text.clone();
        let responder = context.responder();
        Box::pin(async move {
            responder.respond(super::messages::Reply { text }).await;
        })
    });
    Ok(echo.start().await)
}
