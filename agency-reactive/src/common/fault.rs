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

use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use tracing::error;

/// Receives panics escaping actor routines and steps.
///
/// There is one handler per process. The body loop keeps running after the
/// handler returns.
pub trait FaultHandler: Send + Sync {
    fn handle(&self, fault: &anyhow::Error, actor_id: Option<&str>);
}

/// Default handler: logs the fault and carries on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFaultHandler;

impl FaultHandler for LogFaultHandler {
    fn handle(&self, fault: &anyhow::Error, actor_id: Option<&str>) {
        error!(actor_id = actor_id.unwrap_or("-"), "Uncaught fault: {:#}", fault);
    }
}

lazy_static! {
    static ref FAULT_HANDLER: RwLock<Arc<dyn FaultHandler>> = RwLock::new(Arc::new(LogFaultHandler));
}

/// Replaces the process-wide fault handler, returning the previous one.
pub fn set_fault_handler(handler: Arc<dyn FaultHandler>) -> Arc<dyn FaultHandler> {
    std::mem::replace(&mut *FAULT_HANDLER.write(), handler)
}

pub(crate) fn report_fault(fault: &anyhow::Error, actor_id: Option<&str>) {
    let handler = FAULT_HANDLER.read().clone();
    handler.handle(fault, actor_id);
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
