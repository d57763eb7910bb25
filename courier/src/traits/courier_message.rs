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
use std::any::Any;
use std::fmt::Debug;

use dyn_clone::DynClone;

/// A marker trait for every value that can travel through a Courier mailbox.
///
/// The bounds make messages safe to move between tasks, clonable as trait objects
/// and downcastable back to their concrete type through [`CourierMessage::as_any`].
///
/// A blanket implementation covers every `Clone + Debug + Send + Sync + 'static` type,
/// so declaring a message is usually just a matter of deriving those traits (or using
/// `#[courier_message]`).
///
/// When holding an `Arc<dyn CourierMessage>`, call `as_any` on the dereferenced value
/// (`(*message).as_any()`); calling it on the `Arc` itself resolves to the `Arc`.
pub trait CourierMessage: DynClone + Any + Send + Sync + Debug {
    /// Returns the message as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

dyn_clone::clone_trait_object!(CourierMessage);

impl<T> CourierMessage for T
where
    T: Any + Send + Sync + Debug + DynClone + 'static,
{
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Attempts to view a type-erased message as its concrete type `T`.
#[inline]
pub fn downcast_message<T: CourierMessage>(message: &dyn CourierMessage) -> Option<&T> {
    message.as_any().downcast_ref::<T>()
}
