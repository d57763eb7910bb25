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

//! Type-name based (de)serialization of messages crossing node boundaries.
//!
//! A message type is registered once under a stable name. Outbound, the registry turns
//! a `&dyn CourierMessage` into `(type name, bytes)`; inbound, it turns
//! `(bytes, type name, serializer id)` back into a message.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::message::{AutoReceive, DeadLetterResponse, SystemMessage};
use crate::remote::SerializerError;
use crate::traits::CourierMessage;

/// Serializer id of the JSON codec.
pub const JSON_SERIALIZER_ID: i32 = 0;
/// Serializer id of the MessagePack codec.
pub const MSGPACK_SERIALIZER_ID: i32 = 1;

type DeserializerFn =
    Arc<dyn Fn(&[u8], i32) -> Result<Arc<dyn CourierMessage>, SerializerError> + Send + Sync>;

type SerializerFn =
    Arc<dyn Fn(&dyn CourierMessage, i32) -> Result<Vec<u8>, SerializerError> + Send + Sync>;

/// Registered message types and their codecs.
#[derive(Default)]
pub struct SerializerRegistry {
    deserializers: DashMap<String, DeserializerFn>,
    type_id_to_name: DashMap<TypeId, String>,
    serializers: DashMap<TypeId, SerializerFn>,
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("registered_types", &self.deserializers.len())
            .finish()
    }
}

fn codec_error(type_name: &str, reason: impl ToString) -> SerializerError {
    SerializerError::Codec {
        type_name: type_name.to_string(),
        reason: reason.to_string(),
    }
}

impl SerializerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the runtime's own wire messages registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register::<SystemMessage>("courier.SystemMessage");
        registry.register::<AutoReceive>("courier.AutoReceive");
        registry.register::<DeadLetterResponse>("courier.DeadLetterResponse");
        registry
    }

    /// Registers `M` under `name`. Re-registering a name replaces its codec.
    pub fn register<M>(&self, name: &str)
    where
        M: CourierMessage + Serialize + DeserializeOwned,
    {
        let type_name = name.to_string();
        let deserializer: DeserializerFn = Arc::new(move |bytes: &[u8], serializer_id| {
            let message: M = match serializer_id {
                JSON_SERIALIZER_ID => {
                    serde_json::from_slice(bytes).map_err(|e| codec_error(&type_name, e))?
                }
                MSGPACK_SERIALIZER_ID => {
                    rmp_serde::from_slice(bytes).map_err(|e| codec_error(&type_name, e))?
                }
                other => return Err(SerializerError::UnknownSerializer(other)),
            };
            Ok(Arc::new(message))
        });
        self.deserializers.insert(name.to_string(), deserializer);

        let type_id = TypeId::of::<M>();
        self.type_id_to_name.insert(type_id, name.to_string());

        let type_name = name.to_string();
        let serializer: SerializerFn = Arc::new(move |message: &dyn CourierMessage, serializer_id| {
            let concrete = message
                .as_any()
                .downcast_ref::<M>()
                .ok_or_else(|| codec_error(&type_name, "type mismatch during serialization"))?;
            match serializer_id {
                JSON_SERIALIZER_ID => {
                    serde_json::to_vec(concrete).map_err(|e| codec_error(&type_name, e))
                }
                MSGPACK_SERIALIZER_ID => {
                    rmp_serde::to_vec_named(concrete).map_err(|e| codec_error(&type_name, e))
                }
                other => Err(SerializerError::UnknownSerializer(other)),
            }
        });
        self.serializers.insert(type_id, serializer);
    }

    /// Registers `M` under its Rust type name.
    pub fn register_with_type_name<M>(&self)
    where
        M: CourierMessage + Serialize + DeserializeOwned,
    {
        self.register::<M>(std::any::type_name::<M>());
    }

    /// Encodes `message`, returning its registered type name and the bytes.
    pub fn serialize(
        &self,
        message: &dyn CourierMessage,
        serializer_id: i32,
    ) -> Result<(String, Vec<u8>), SerializerError> {
        let type_id = message.as_any().type_id();
        let unregistered = || SerializerError::UnregisteredType(format!("{message:?}"));
        let type_name = self
            .type_id_to_name
            .get(&type_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(unregistered)?;
        let serializer = self
            .serializers
            .get(&type_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(unregistered)?;
        let bytes = serializer(message, serializer_id)?;
        Ok((type_name, bytes))
    }

    /// Decodes a message registered as `type_name`.
    pub fn deserialize(
        &self,
        bytes: &[u8],
        type_name: &str,
        serializer_id: i32,
    ) -> Result<Arc<dyn CourierMessage>, SerializerError> {
        let deserializer = self
            .deserializers
            .get(type_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SerializerError::UnknownTypeName(type_name.to_string()))?;
        deserializer(bytes, serializer_id)
    }

    /// `true` if a type is registered as `type_name`.
    #[must_use]
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.deserializers.contains_key(type_name)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deserializers.len()
    }

    /// `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deserializers.is_empty()
    }
}
