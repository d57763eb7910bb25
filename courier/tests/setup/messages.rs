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

use courier::prelude::*;

#[courier_message]
pub struct Ping;

#[courier_message]
#[derive(PartialEq, Eq)]
pub struct Work(pub u32);

#[courier_message(remote)]
#[derive(PartialEq, Eq)]
pub struct Greeting {
    pub text: String,
}

#[courier_message(remote)]
#[derive(PartialEq, Eq)]
pub struct Reply {
    pub text: String,
}

#[courier_message]
pub struct Crash;

pub const GREETING: &str = "tests.Greeting";
pub const REPLY: &str = "tests.Reply";

/// Registers the wire types used by the remote tests.
pub fn register_wire_types(runtime: &ActorRuntime) {
    runtime.serializers().register::<Greeting>(GREETING);
    runtime.serializers().register::<Reply>(REPLY);
}

pub fn greeting(text: &str) -> Greeting {
    Greeting {
        text: text.to_string(),
    }
}
