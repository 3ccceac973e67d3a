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

use agency_reactive::prelude::*;

// actor state types use the handy macro for Debug and the thread-safety check
#[agency_actor]
#[derive(Default)]
struct Ponger {
    pings: u64,
}

#[callables]
impl Ponger {
    #[callable("ping")]
    fn ping(&mut self, from: String) -> String {
        self.pings += 1;
        println!("Pinged by {from} ({} so far)", self.pings);
        format!("pong #{}", self.pings)
    }

    // direct capabilities run on the caller's thread, no queueing
    #[callable("pings")]
    #[direct]
    fn pings(&self) -> u64 {
        self.pings
    }
}

impl Actor for Ponger {
    fn declare(builder: &mut CapabilityTableBuilder<Self>) {
        Self::declare_callables(builder);
    }

    fn on_stop(&mut self) {
        println!("Ponger stopped after {} pings", self.pings);
    }
}

fn agency(id: &str) -> anyhow::Result<Agency> {
    let mut config = AgencyConfig::default();
    config.defaults.agency_id = id.to_string();
    Ok(Agency::launch_with_config(config)?)
}

fn main() -> anyhow::Result<()> {
    // two agencies sharing an in-process network stand in for two hosts
    let network = MemoryNetwork::new();
    let home = agency("home")?;
    let away = agency("away")?;
    home.add_protocol(MemoryProtocol::new(network.clone(), "127.0.0.1", 7100))?;
    away.add_protocol(MemoryProtocol::new(network.clone(), "127.0.0.1", 7200))?;

    // agencies learn about each other from announcements
    home.handle_announcement(&away.announcement())?;
    away.handle_announcement(&home.announcement())?;

    away.spawn("ponger", Ponger::default())?;

    let ponger = home.remote_actor("away", IdentifiableType::Actor, "ponger")?;
    for _ in 0..3 {
        let reply = home
            .call(&ponger, "ping", vec![home.id().into()])?
            .get_timeout(Duration::from_secs(5))?;
        println!("Reply: {reply}");
    }

    let local = away
        .actor_by_id("ponger")
        .ok_or_else(|| anyhow::anyhow!("ponger is gone"))?;
    println!("Ponger counted {} pings", local.invoke_direct("pings", &[])?);

    home.shutdown();
    away.shutdown();
    Ok(())
}
