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
#![allow(dead_code, unused_doc_comments)]

use std::sync::Arc;
use std::time::Duration;

use agency_reactive::prelude::*;
use parking_lot::Mutex;
use serde_json::json;

use crate::setup::actors::counter::Counter;
use crate::setup::{initialize_tracing, launch_agency};

mod setup;

/// Collects every fault reported to it.
#[derive(Default)]
struct CollectingHandler {
    faults: Mutex<Vec<(Option<String>, String)>>,
}

impl FaultHandler for CollectingHandler {
    fn handle(&self, fault: &anyhow::Error, actor_id: Option<&str>) {
        self.faults
            .lock()
            .push((actor_id.map(str::to_string), fault.to_string()));
    }
}

/// A panicking routine fails its own call, reaches the fault handler, and
/// leaves the actor running.
///
/// The fault handler is process-wide, so this file holds a single test.
#[test]
fn test_actor_survives_a_panicking_routine() -> anyhow::Result<()> {
    initialize_tracing();
    let handler = Arc::new(CollectingHandler::default());
    let previous = set_fault_handler(handler.clone());

    let agency = launch_agency("panic-recovery")?;
    let counter = agency.spawn("counter", Counter::default())?;
    let wait = Duration::from_secs(5);

    agency.call(&counter, "add", vec![json!(2)])?.get_timeout(wait)?;
    let boom = agency.call(&counter, "boom", vec![])?.get_timeout(wait);
    assert_eq!(boom, Err(CallError::Panicked("counter exploded".to_string())));

    let total = agency.call(&counter, "add", vec![json!(3)])?.get_timeout(wait)?;
    assert_eq!(total, 5);
    let ActorRef::Local(local) = &counter else {
        panic!("spawned actors are local");
    };
    assert_eq!(local.state(), BodyState::Running);

    {
        let faults = handler.faults.lock();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].0.as_deref(), Some("counter"));
        assert!(faults[0].1.contains("counter exploded"));
    }

    agency.shutdown();
    set_fault_handler(previous);
    Ok(())
}
