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
use std::thread;
use std::time::{Duration, Instant};

use agency_reactive::prelude::*;
use agency_reactive::protocol::CallRequest;
use serde_json::json;

use crate::setup::actors::counter::Counter;
use crate::setup::actors::pinger::Pinger;
use crate::setup::{connected_pair, initialize_tracing};

mod setup;

const WAIT: Duration = Duration::from_secs(5);

fn pair(left: &str, right: &str) -> anyhow::Result<(Arc<MemoryNetwork>, Agency, Agency)> {
    let network = MemoryNetwork::new();
    let (left, right) = connected_pair(&network, (left, 7001), (right, 7002), Duration::from_secs(5))?;
    Ok((network, left, right))
}

/// A call crosses the memory transport and its result comes back.
///
/// **Scenario:**
/// 1. Connect two agencies on a memory network.
/// 2. Host a `Pinger` on the right agency and call it from the left one.
///
/// **Verification:**
/// - The reply arrives on the left and no remote call is left pending.
#[test]
fn test_remote_ping() -> anyhow::Result<()> {
    initialize_tracing();
    let (_network, left, right) = pair("left-ping", "right-ping")?;
    right.spawn("pinger", Pinger::default())?;

    let pinger = left.remote_actor("right-ping", IdentifiableType::Actor, "pinger")?;
    assert!(pinger.is_remote());
    assert_eq!(left.call(&pinger, "ping", vec![])?.get_timeout(WAIT)?, "pong");

    let by_uri = left.resolve("mem://127.0.0.1:7002/right-ping/actors/pinger")?;
    let echoed = left
        .call(&by_uri, "echo", vec![json!("x"), json!(3)])?
        .get_timeout(WAIT)?;
    assert_eq!(echoed, json!(["x", "x", "x"]));

    let local = right.actor_by_id("pinger").expect("hosted on the right");
    assert_eq!(local.invoke_direct("pings", &[])?, 1);
    assert_eq!(left.pending_remote_calls(), 0);

    left.shutdown();
    right.shutdown();
    Ok(())
}

/// Local-only capabilities refuse remote callers but not local ones.
#[test]
fn test_local_only_capability() -> anyhow::Result<()> {
    initialize_tracing();
    let (_network, left, right) = pair("left-local", "right-local")?;
    let local = right.spawn("pinger", Pinger::default())?;
    let remote = left.remote_actor("right-local", IdentifiableType::Actor, "pinger")?;

    assert_eq!(
        left.call(&remote, "reset", vec![json!(7)])?.get_timeout(WAIT),
        Err(CallError::LocalOnly("reset".to_string()))
    );
    right.call(&local, "reset", vec![json!(7)])?.get_timeout(WAIT)?;
    assert_eq!(local.invoke_direct("pings", &[])?, 7);

    left.shutdown();
    right.shutdown();
    Ok(())
}

/// Calls to missing objects or agencies fail instead of hanging.
#[test]
fn test_unknown_targets() -> anyhow::Result<()> {
    initialize_tracing();
    let (_network, left, right) = pair("left-unknown", "right-unknown")?;

    let ghost = left.remote_actor("right-unknown", IdentifiableType::Actor, "ghost")?;
    let result = left.call(&ghost, "ping", vec![])?.get_timeout(WAIT);
    assert!(matches!(result, Err(CallError::NotFound(_))), "got {result:?}");

    assert!(matches!(
        left.remote_actor("nobody", IdentifiableType::Actor, "pinger"),
        Err(AddressingError::AgencyNotFound(_))
    ));

    left.shutdown();
    right.shutdown();
    Ok(())
}

/// Results for unknown futures and malformed frames are dropped without harm.
#[test]
fn test_stray_frames_are_dropped() -> anyhow::Result<()> {
    initialize_tracing();
    let (network, left, right) = pair("left-stray", "right-stray")?;
    right.spawn("pinger", Pinger::default())?;

    let result: CallResult = Ok(json!("late"));
    let stray = FutureRequest::from_wire(
        "no-such-future",
        CodingMethod::Json,
        CodingMethod::Json.encode(&result)?,
        "mem://127.0.0.1:7001/left-stray/agencies/left-stray",
    );
    left.dispatch(Request::Future(stray.clone()))?;
    network.deliver("127.0.0.1", 7001, Request::Future(stray).to_bytes(CodingMethod::Json)?)?;
    network.deliver("127.0.0.1", 7001, vec![0xff, 0x00])?;

    let pinger = left.remote_actor("right-stray", IdentifiableType::Actor, "pinger")?;
    assert_eq!(left.call(&pinger, "ping", vec![])?.get_timeout(WAIT)?, "pong");

    left.shutdown();
    right.shutdown();
    Ok(())
}

/// A call request for a missing actor is refused, and the receiving side keeps serving.
///
/// **Scenario:**
/// 1. Dispatch a call to `actors/ghost` straight into the right agency.
/// 2. Deliver the same request as a frame to the right agency's port.
/// 3. Ping a real actor on the right agency from the left one.
///
/// **Verification:**
/// - Dispatch reports `TargetNotFound`.
/// - The frame after the failed one is still served.
#[test]
fn test_call_to_missing_actor_is_refused() -> anyhow::Result<()> {
    initialize_tracing();
    let (network, left, right) = pair("left-ghost", "right-ghost")?;
    right.spawn("pinger", Pinger::default())?;

    let request = CallRequest::new(
        "ghost-call",
        "mem://127.0.0.1:7001/left-ghost/agencies/left-ghost",
        "mem://127.0.0.1:7002/right-ghost/actors/ghost",
        "ping",
        &[],
        CodingMethod::Json,
    )?;
    let dispatched = right.dispatch(Request::Call(request.clone()));
    assert!(
        matches!(dispatched, Err(AddressingError::TargetNotFound(_))),
        "got {dispatched:?}"
    );

    network.deliver("127.0.0.1", 7002, Request::Call(request).to_bytes(CodingMethod::Json)?)?;
    let pinger = left.remote_actor("right-ghost", IdentifiableType::Actor, "pinger")?;
    assert_eq!(left.call(&pinger, "ping", vec![])?.get_timeout(WAIT)?, "pong");
    assert_eq!(left.pending_remote_calls(), 0);

    left.shutdown();
    right.shutdown();
    Ok(())
}

/// Remote calls without an answer are timed out by the agency's sweep.
#[test]
fn test_remote_call_times_out() -> anyhow::Result<()> {
    initialize_tracing();
    let network = MemoryNetwork::new();
    let (left, right) = connected_pair(
        &network,
        ("left-timeout", 7001),
        ("right-timeout", 7002),
        Duration::from_millis(100),
    )?;
    right.spawn("counter", Counter::default())?;
    let counter = left.remote_actor("right-timeout", IdentifiableType::Actor, "counter")?;

    let started = Instant::now();
    let slow = left.call(&counter, "slow_add", vec![json!(1), json!(600)])?;
    assert_eq!(left.pending_remote_calls(), 1);
    assert_eq!(slow.get_timeout(WAIT), Err(CallError::Timeout));
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(left.pending_remote_calls(), 0);

    // The late result is dropped; later calls are unaffected.
    thread::sleep(Duration::from_millis(700));
    let total = left.call(&counter, "total", vec![])?.get_timeout(WAIT)?;
    assert_eq!(total, 1);

    left.shutdown();
    right.shutdown();
    Ok(())
}

/// Announcements reconcile the known ports of a peer.
#[test]
fn test_announcements_reconcile_ports() -> anyhow::Result<()> {
    initialize_tracing();
    let (_network, left, right) = pair("left-ports", "right-ports")?;

    let first = Announcement::new(
        "far",
        "10.0.0.9",
        &[PortEntry::new("mem", 80), PortEntry::new("tcp", 81)],
        "d1",
    );
    let far = left
        .handle_announcement(&first)?
        .expect("a peer announcement is recorded");
    let kept = far.port(81).expect("port 81 announced");

    let second = Announcement::new(
        "far",
        "10.0.0.9",
        &[PortEntry::new("tcp", 81), PortEntry::new("udp", 82)],
        "d2",
    );
    left.handle_announcement(&second)?;

    let numbers: Vec<u16> = far.ports().iter().map(|port| port.port()).collect();
    assert_eq!(numbers, vec![81, 82]);
    assert!(Arc::ptr_eq(&kept, &far.port(81).expect("port 81 kept")));
    assert!(far.port(81).is_some_and(|port| port.is_transmitter()));
    assert!(far.port(82).is_some_and(|port| !port.is_transmitter()));
    assert_eq!(far.digest(), "d2");

    assert!(left.handle_announcement(&left.announcement())?.is_none());
    let agency = left.actor().expect("agency body running");
    assert_eq!(
        agency.invoke_direct("remote_agencies", &[])?,
        json!(["far", "right-ports"])
    );

    left.shutdown();
    right.shutdown();
    Ok(())
}

/// A peer agency answers its own capabilities remotely, including announcements.
#[test]
fn test_remote_agency_capabilities() -> anyhow::Result<()> {
    initialize_tracing();
    let (_network, left, right) = pair("left-agency", "right-agency")?;
    right.spawn("pinger", Pinger::default())?;

    let peer = left
        .remote_agencies()
        .get("right-agency")
        .expect("introduced by the setup");
    let remote = peer.as_remote_actor()?;
    assert_eq!(remote.kind(), IdentifiableType::Agency);

    assert_eq!(left.call(&remote, "id", vec![])?.get_timeout(WAIT)?, "right-agency");
    assert_eq!(
        left.call(&remote, "digest", vec![])?.get_timeout(WAIT)?,
        json!(right.registry().digest())
    );

    let announced = left
        .call(
            &remote,
            "announce",
            vec![json!("third"), json!("10.0.0.3"), json!("mem:9000"), json!("d")],
        )?
        .get_timeout(WAIT)?;
    assert_eq!(announced, true);
    assert!(right.remote_agencies().get("third").is_some());

    left.shutdown();
    right.shutdown();
    Ok(())
}
