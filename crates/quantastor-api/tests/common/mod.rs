//! In-memory array used by the facade scenarios.
//!
//! Every mutating endpoint applies its change immediately and answers with a
//! task that is already complete, so the facade's wait and re-fetch paths run
//! exactly as they would against a live array.

#![allow(dead_code)]

use async_trait::async_trait;
use quantastor_api::transport::check_rest_error;
use quantastor_api::{
    QuantastorClient, QueryParams, Result, RetryPolicy, TaskPoller, Transport,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct VolumeRow {
    id: String,
    name: String,
    size: u64,
}

#[derive(Debug, Clone)]
struct HostRow {
    id: String,
    name: String,
    iqn: String,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    volumes: BTreeMap<String, VolumeRow>,
    hosts: BTreeMap<String, HostRow>,
    groups: BTreeMap<String, (String, Vec<String>)>,
    acls: BTreeSet<(String, String)>,
    tasks: BTreeMap<String, String>,
    calls: Vec<String>,
}

impl State {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn complete_task(&mut self, custom_id: &str) -> Value {
        let task = self.allocate("task");
        self.tasks.insert(task.clone(), custom_id.to_string());
        json!({ "task": { "id": task }, "obj": {} })
    }

    fn find_volume(&self, key: &str) -> Option<&VolumeRow> {
        self.volumes
            .values()
            .find(|row| row.id == key || row.name == key)
    }

    fn find_host(&self, key: &str) -> Option<&HostRow> {
        self.hosts.values().find(|row| row.id == key || row.name == key)
    }

    fn add_volume(&mut self, name: &str, size: u64) -> String {
        let id = self.allocate("vol");
        self.volumes.insert(
            id.clone(),
            VolumeRow {
                id: id.clone(),
                name: name.to_string(),
                size,
            },
        );
        id
    }
}

fn rest_error(message: impl Into<String>) -> Value {
    json!({ "RestError": message.into() })
}

fn volume_json(row: &VolumeRow) -> Value {
    json!({
        "name": row.name,
        "id": row.id,
        "size": row.size,
        "iqn": format!("iqn.2009-10.com.osnexus:fake:{}", row.name),
    })
}

fn host_json(row: &HostRow) -> Value {
    json!({
        "name": row.name,
        "id": row.id,
        "initiatorPortList": [{ "iqn": row.iqn }],
    })
}

/// A QuantaStor array held in memory.
#[derive(Debug, Default)]
pub struct FakeArray {
    state: Mutex<State>,
}

impl FakeArray {
    /// Create an empty array.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Endpoints called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls made to `endpoint`.
    pub fn count(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|call| *call == endpoint).count()
    }

    /// Number of volumes on the array.
    pub fn volume_count(&self) -> usize {
        self.state.lock().unwrap().volumes.len()
    }

    fn respond(&self, endpoint: &str, params: &QueryParams) -> Value {
        let arg = |key: &str| params.get(key).unwrap_or_default().to_string();
        let mut state = self.state.lock().unwrap();
        state.calls.push(endpoint.to_string());

        match endpoint {
            "taskGet" => match state.tasks.get(&arg("id")) {
                Some(custom_id) => json!({
                    "id": arg("id"),
                    "taskState": 5,
                    "customId": custom_id,
                }),
                None => rest_error(format!("Unknown task '{}'", arg("id"))),
            },
            "storageSystemGet" => json!({ "name": "fake-array", "id": "sys-1" }),
            "storageVolumeCreate" => {
                let size = arg("size").parse().unwrap_or(0);
                let id = state.add_volume(&arg("name"), size);
                state.complete_task(&id)
            }
            "storageVolumeClone" | "storageVolumeSnapshot" => {
                let new_name = if endpoint == "storageVolumeClone" {
                    arg("cloneName")
                } else {
                    arg("snapshotName")
                };
                let Some(size) = state.find_volume(&arg("storageVolume")).map(|row| row.size)
                else {
                    return rest_error(format!(
                        "Unable to locate storage volume '{}'",
                        arg("storageVolume")
                    ));
                };
                let id = state.add_volume(&new_name, size);
                state.complete_task(&id)
            }
            "storageVolumeResize" => {
                let new_size = arg("newSizeInBytes").parse().unwrap_or(0);
                let Some(id) = state.find_volume(&arg("storageVolume")).map(|row| row.id.clone())
                else {
                    return rest_error("Unable to locate storage volume");
                };
                let row = state.volumes.get_mut(&id).unwrap();
                if new_size < row.size {
                    return rest_error("Volumes cannot be reduced in size");
                }
                row.size = new_size;
                state.complete_task(&id)
            }
            "storageVolumeDeleteEx" => {
                let id = arg("storageVolume");
                if state.volumes.remove(&id).is_none() {
                    return rest_error(format!("Unable to locate storage volume '{id}'"));
                }
                state.acls.retain(|(volume, _)| *volume != id);
                state.complete_task(&id)
            }
            "storageVolumeGet" => match state.find_volume(&arg("storageVolume")) {
                Some(row) => json!({ "obj": volume_json(row) }),
                None => rest_error("Unable to locate storage volume"),
            },
            "storageVolumeEnum" => {
                if state.volumes.is_empty() {
                    json!(0)
                } else {
                    Value::Array(state.volumes.values().map(volume_json).collect())
                }
            }
            "storageVolumeAclAddRemove" => {
                let volume = state.find_volume(&arg("storageVolume")).map(|row| row.id.clone());
                let host = state.find_host(&arg("hostList")).map(|row| row.id.clone());
                let (Some(volume), Some(host)) = (volume, host) else {
                    return rest_error("Unable to locate volume or host");
                };
                if arg("modType") == "0" {
                    state.acls.insert((volume.clone(), host));
                } else {
                    state.acls.remove(&(volume.clone(), host));
                }
                state.complete_task(&volume)
            }
            "storageVolumeAclGet" => {
                let volume = state.find_volume(&arg("storageVolume")).map(|row| row.id.clone());
                let host = state.find_host(&arg("host")).map(|row| row.id.clone());
                match (volume, host) {
                    (Some(volume), Some(host))
                        if state.acls.contains(&(volume.clone(), host.clone())) =>
                    {
                        json!({ "storageVolumeId": volume, "hostId": host })
                    }
                    _ => rest_error("No ACL entry"),
                }
            }
            "storageVolumeAclEnum" => {
                let volume = arg("storageVolume");
                let entries: Vec<Value> = state
                    .acls
                    .iter()
                    .filter(|(v, _)| *v == volume)
                    .map(|(_, host)| json!({ "hostId": host }))
                    .collect();
                if entries.is_empty() {
                    json!(0)
                } else {
                    Value::Array(entries)
                }
            }
            "hostAdd" => {
                let id = state.allocate("host");
                let row = HostRow {
                    id: id.clone(),
                    name: arg("hostname"),
                    iqn: arg("iqn"),
                };
                state.hosts.insert(id.clone(), row);
                state.complete_task(&id)
            }
            "hostGet" => match state.find_host(&arg("host")) {
                Some(row) => json!({ "obj": host_json(row) }),
                None => rest_error("Unable to locate host"),
            },
            "hostInitiatorGet" => {
                let iqn = arg("initiator");
                match state.hosts.values().find(|row| row.iqn == iqn) {
                    Some(row) => json!({
                        "hostId": row.id,
                        "hostName": row.name,
                        "list": [row.iqn],
                    }),
                    None => rest_error("Unable to locate initiator"),
                }
            }
            "hostGroupCreate" => {
                let id = state.allocate("group");
                let members = arg("hostList")
                    .split(',')
                    .filter_map(|key| state.find_host(key).map(|row| row.id.clone()))
                    .collect();
                state.groups.insert(id.clone(), (arg("name"), members));
                state.complete_task(&id)
            }
            "hostGroupGet" => {
                let key = arg("hostGroup");
                let found = state
                    .groups
                    .iter()
                    .find(|(id, (name, _))| **id == key || *name == key);
                match found {
                    Some((id, (name, members))) => {
                        let hosts: Vec<Value> = members
                            .iter()
                            .filter_map(|member| state.hosts.get(member).map(host_json))
                            .collect();
                        json!({ "name": name, "id": id, "hostList": hosts })
                    }
                    None => rest_error("Unable to locate host group"),
                }
            }
            "hostGroupDelete" => {
                let key = arg("hostGroup");
                let before = state.groups.len();
                state.groups.retain(|id, (name, _)| *id != key && *name != key);
                if state.groups.len() == before {
                    rest_error("Unable to locate host group")
                } else {
                    json!({ "task": null })
                }
            }
            other => rest_error(format!("Unsupported endpoint '{other}'")),
        }
    }
}

#[async_trait]
impl Transport for FakeArray {
    async fn call(&self, endpoint: &str, params: &QueryParams) -> Result<Value> {
        let body = self.respond(endpoint, params);
        check_rest_error(endpoint, params, body)
    }
}

/// Build a client over `array` without settle or retry delays.
pub fn client_for(array: &Arc<FakeArray>) -> QuantastorClient {
    let transport: Arc<dyn Transport> = array.clone();
    QuantastorClient::with_transport(transport)
        .with_settle_delay(Duration::ZERO)
        .with_task_poller(TaskPoller::new().with_retry_policy(RetryPolicy::no_retry()))
}
