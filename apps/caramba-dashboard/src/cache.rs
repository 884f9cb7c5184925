use std::collections::BTreeMap;

use caramba_shared::api::Client;

/// Previous `enabled` value of one cached client, kept to undo an optimistic toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledPatch {
    pub inbound_id: i64,
    pub client_id: i64,
    pub previous: bool,
}

/// Latest client snapshot per inbound.
///
/// Snapshots are replaced wholesale; the only in-place edit is the
/// `enabled` flip used by optimistic toggles. Nothing is evicted.
#[derive(Debug, Default)]
pub struct ClientCache {
    snapshots: BTreeMap<i64, Vec<Client>>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, inbound_id: i64, clients: Vec<Client>) {
        self.snapshots.insert(inbound_id, clients);
    }

    pub fn get(&self, inbound_id: i64) -> Option<&[Client]> {
        self.snapshots.get(&inbound_id).map(Vec::as_slice)
    }

    pub fn find_client(&self, inbound_id: i64, client_id: i64) -> Option<&Client> {
        self.get(inbound_id)?.iter().find(|c| c.id == client_id)
    }

    /// First client with `client_id` in ascending inbound order, with its owning inbound.
    pub fn find_client_across_all(&self, client_id: i64) -> Option<(i64, &Client)> {
        self.snapshots.iter().find_map(|(inbound_id, clients)| {
            clients
                .iter()
                .find(|c| c.id == client_id)
                .map(|c| (*inbound_id, c))
        })
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Set `enabled` on a client and on every cached copy sharing its
    /// subscription remark. Returns the prior values of everything touched,
    /// or an empty list when the client is not cached.
    pub fn set_client_enabled(
        &mut self,
        inbound_id: i64,
        client_id: i64,
        enabled: bool,
    ) -> Vec<EnabledPatch> {
        let Some(sub_remark) = self
            .find_client(inbound_id, client_id)
            .map(|c| c.sub_remark.clone())
        else {
            return Vec::new();
        };

        let mut patches = Vec::new();
        for (owner, clients) in self.snapshots.iter_mut() {
            for client in clients.iter_mut() {
                let is_target = *owner == inbound_id && client.id == client_id;
                let is_copy = !sub_remark.is_empty() && client.sub_remark == sub_remark;
                if is_target || is_copy {
                    patches.push(EnabledPatch {
                        inbound_id: *owner,
                        client_id: client.id,
                        previous: client.enabled,
                    });
                    client.enabled = enabled;
                }
            }
        }
        patches
    }

    /// Undo [`set_client_enabled`](Self::set_client_enabled). Clients that
    /// have since left the cache are skipped.
    pub fn revert(&mut self, patches: &[EnabledPatch]) {
        for patch in patches {
            if let Some(client) = self
                .snapshots
                .get_mut(&patch.inbound_id)
                .and_then(|clients| clients.iter_mut().find(|c| c.id == patch.client_id))
            {
                client.enabled = patch.previous;
            }
        }
    }
}
