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
use std::sync::Once;
use std::time::Duration;

use agency_reactive::prelude::*;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Declare the submodules.
pub mod actors;

// Ensures tracing initialization happens only once across all tests.
static INIT: Once = Once::new();

/// Initializes the global tracing subscriber for tests.
///
/// Logs go to `logs/agency_tests.txt` through a non-blocking writer. Uses
/// `std::sync::Once` so repeated calls from different tests are harmless.
pub fn initialize_tracing() {
    INIT.call_once(|| {
        std::fs::create_dir_all("logs").expect("could not create logs dir");

        let file_appender = RollingFileAppender::new(Rotation::NEVER, "logs", "agency_tests.txt");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leak the guard so the non-blocking writer is not dropped before process exit
        Box::leak(Box::new(guard));

        let filter = EnvFilter::new("debug")
            .add_directive("agency_reactive::actor=trace".parse().unwrap())
            .add_directive("agency_reactive::common::agency_core=trace".parse().unwrap())
            .add_directive("agency_reactive::protocol=trace".parse().unwrap())
            .add_directive(tracing_subscriber::filter::LevelFilter::TRACE.into());

        let subscriber = FmtSubscriber::builder()
            .with_span_events(FmtSpan::NONE)
            .with_max_level(Level::TRACE)
            .compact()
            .with_line_number(true)
            .without_time()
            .with_target(true)
            .with_thread_names(true)
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("setting default subscriber failed");
    });
}

/// Test configuration: short timeouts so failures surface quickly.
pub fn test_config(agency_id: &str) -> AgencyConfig {
    let mut config = AgencyConfig::default();
    config.defaults.agency_id = agency_id.to_string();
    config.timeouts.actor_shutdown_timeout_ms = 2_000;
    config.timeouts.state_recheck_ms = 50;
    config.timeouts.direct_call_timeout_ms = 300;
    config.scheduling.pending_sweep_interval_ms = 20;
    config
}

/// Launches an agency with [`test_config`].
pub fn launch_agency(agency_id: &str) -> anyhow::Result<Agency> {
    Ok(Agency::launch_with_config(test_config(agency_id))?)
}

/// Launches two agencies on a shared memory network and introduces them to each other.
pub fn connected_pair(
    network: &std::sync::Arc<MemoryNetwork>,
    left: (&str, u16),
    right: (&str, u16),
    call_timeout: Duration,
) -> anyhow::Result<(Agency, Agency)> {
    let mut agencies = Vec::new();
    for (id, port) in [left, right] {
        let mut config = test_config(id);
        config.timeouts.call_timeout_ms = u64::try_from(call_timeout.as_millis())?;
        let agency = Agency::launch_with_config(config)?;
        agency.add_protocol(MemoryProtocol::new(network.clone(), "127.0.0.1", port))?;
        agencies.push(agency);
    }
    let right_agency = agencies.pop().expect("two agencies launched");
    let left_agency = agencies.pop().expect("two agencies launched");

    left_agency.handle_announcement(&right_agency.announcement())?;
    right_agency.handle_announcement(&left_agency.announcement())?;
    Ok((left_agency, right_agency))
}
