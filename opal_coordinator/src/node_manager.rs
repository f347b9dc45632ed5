//! Registry of compute nodes and their live status.

use ::std::collections::HashMap;
use ::std::sync::{Mutex, MutexGuard, PoisonError};
use ::std::time::Duration;

use ::opal_common::{
    client::ComputeClient,
    error::{OpalError, Result},
    node::{NodeId, NodeInfo, NodeRecord, NodeStatus},
    timestamp::Timestamp,
    tracing::{debug, info, warn},
};

struct NodeEntry<C> {
    record: NodeRecord,
    client: C,
}

/// Owns the node registry and one RPC client per registered node.
///
/// All mutations go through a single lock, held only for the in-memory part
/// of an operation. The probe step of [`NodeManager::health_sweep`] runs
/// without the lock so a slow or unreachable node cannot block registration
/// or reservation of the others.
pub struct NodeManager<C: ComputeClient> {
    registry: Mutex<HashMap<NodeId, NodeEntry<C>>>,
    max_tasks_per_node: u32,
    rpc_timeout: Duration,
}

impl<C: ComputeClient> NodeManager<C> {
    pub fn new(max_tasks_per_node: u32, rpc_timeout: Duration) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            max_tasks_per_node,
            rpc_timeout,
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<NodeId, NodeEntry<C>>> {
        // A poisoned lock only means another thread panicked between plain
        // in-memory mutations; the map itself is still consistent.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new node and open a client channel to it.
    ///
    /// # Return
    /// - `Ok(true)` if the node was registered.
    /// - `Ok(false)` if the id is already taken; registration is not an
    ///   upsert and the registry is left untouched.
    /// - `Err(_)` if the channel cannot be opened. No partially-registered
    ///   node is left behind in that case.
    pub async fn register(&self, info: NodeInfo) -> Result<bool> {
        if self.registry().contains_key(&info.id) {
            warn!("Node {} is already registered", info.id);
            return Ok(false);
        }
        // Open the channel before touching the registry, so the entry and
        // the client handle commit together or not at all.
        let client = C::connect(&info.address, self.rpc_timeout)
            .await
            .map_err(OpalError::fail_to_register_node)?;
        let mut registry = self.registry();
        if registry.contains_key(&info.id) {
            // Lost a race with a concurrent registration of the same id;
            // the first one wins and the new channel is dropped.
            warn!("Node {} is already registered", info.id);
            return Ok(false);
        }
        info!("Node {} registered at {}", info.id, info.address);
        registry.insert(
            info.id.clone(),
            NodeEntry {
                record: NodeRecord::connected(info),
                client,
            },
        );
        Ok(true)
    }

    /// Ids of nodes that can take another task: CONNECTED and below the
    /// per-node limit. Sorted by id, so the order is reproducible for a
    /// given registry snapshot; fairness is the caller's concern.
    pub fn list_available(&self) -> Vec<NodeId> {
        let registry = self.registry();
        let mut ids: Vec<NodeId> = registry
            .iter()
            .filter(|(_, entry)| {
                entry.record.status == NodeStatus::Connected
                    && entry.record.active_tasks < self.max_tasks_per_node
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Atomically take one in-flight slot on `id`. Fails when the node is
    /// unknown, not CONNECTED, or already at the per-node limit.
    pub fn reserve(&self, id: &NodeId) -> bool {
        let mut registry = self.registry();
        match registry.get_mut(id) {
            Some(entry)
                if entry.record.status == NodeStatus::Connected
                    && entry.record.active_tasks < self.max_tasks_per_node =>
            {
                entry.record.active_tasks += 1;
                true
            }
            _ => false,
        }
    }

    /// Give back an in-flight slot. Floored at zero; an unmatched release
    /// is a counter bug and is logged as such.
    pub fn release(&self, id: &NodeId) {
        let mut registry = self.registry();
        if let Some(entry) = registry.get_mut(id) {
            if entry.record.active_tasks == 0 {
                warn!("Release on node {} with no active tasks", id);
            } else {
                entry.record.active_tasks -= 1;
            }
        }
    }

    /// Clone of the client handle for `id`, if the node is registered.
    pub fn client(&self, id: &NodeId) -> Option<C> {
        self.registry().get(id).map(|entry| entry.client.clone())
    }

    /// Snapshot of the registry entry for `id`.
    pub fn get_node(&self, id: &NodeId) -> Option<NodeRecord> {
        self.registry().get(id).map(|entry| entry.record.clone())
    }

    pub fn node_count(&self) -> usize {
        self.registry().len()
    }

    /// Reconcile node liveness and load counters.
    ///
    /// Nodes unseen for longer than `offline_threshold` are marked
    /// DISCONNECTED first; then every node is probed and its registry entry
    /// updated from the reply. The node's own count is ground truth for its
    /// load. A failed probe leaves the node DISCONNECTED.
    pub async fn health_sweep(&self, offline_threshold: Duration) {
        let probes: Vec<(NodeId, C)> = {
            let mut registry = self.registry();
            for (id, entry) in registry.iter_mut() {
                if entry.record.last_seen.elapsed() > offline_threshold {
                    warn!(
                        "Node {} unseen for more than {:?}, marking DISCONNECTED",
                        id, offline_threshold
                    );
                    entry.record.status = NodeStatus::Disconnected;
                }
            }
            registry
                .iter()
                .map(|(id, entry)| (id.clone(), entry.client.clone()))
                .collect()
        };

        for (id, client) in probes {
            // Probe without the lock; a network round trip must never hold
            // up the registry.
            let outcome = client.get_node_status(&id).await;
            let mut registry = self.registry();
            let Some(entry) = registry.get_mut(&id) else {
                continue;
            };
            match outcome {
                Ok(reply) => {
                    // A reachable node is CONNECTED unless it reports itself
                    // at capacity.
                    entry.record.status = match reply.status {
                        NodeStatus::Busy => NodeStatus::Busy,
                        _ => NodeStatus::Connected,
                    };
                    entry.record.active_tasks = reply.active_tasks;
                    entry.record.last_seen = Timestamp::now();
                    debug!(
                        "Node {} probe: {} with {} active tasks",
                        id, entry.record.status, entry.record.active_tasks
                    );
                }
                Err(e) => {
                    warn!("Probe of node {} failed: {}", id, e);
                    entry.record.status = NodeStatus::Disconnected;
                }
            }
        }
    }

    /// Close every client channel and clear the registry. Idempotent.
    pub fn shutdown(&self) {
        let mut registry = self.registry();
        if !registry.is_empty() {
            info!("Closing {} node clients", registry.len());
        }
        // Dropping a client closes its channel.
        registry.clear();
    }
}
