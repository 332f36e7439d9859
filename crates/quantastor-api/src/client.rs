//! High-level QuantaStor storage operations.
//!
//! Each operation is a fixed recipe: one management call, an optional wait on
//! the task it started, and a re-fetch of the object the task produced. The
//! client holds no cache; every read goes to the array.

use crate::models::{
    parse, parse_list, parse_optional, AclEntry, Host, HostGroup, InitiatorOwner, Pool, Record,
    StorageSystem, Tier, Volume, VolumeAcl,
};
use crate::task::{task_id, TaskPoller};
use crate::transport::{HttpTransport, HttpTransportBuilder, Transport};
use crate::Result;
use quantastor_core::client::ClientConfig;
use quantastor_core::config::QuantastorConfig;
use quantastor_core::{Error, QueryParams};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Default pause between a task-creating call and its first status query.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// `hostType` sent when registering hosts.
const HOST_TYPE: u32 = 3;

/// ACL modification direction (`modType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AclModification {
    Add = 0,
    Remove = 1,
}

/// Builder for [`QuantastorClient`].
#[derive(Debug, Clone)]
pub struct QuantastorClientBuilder {
    inner: HttpTransportBuilder,
    poller: TaskPoller,
    settle_delay: Duration,
}

impl QuantastorClientBuilder {
    /// Create a builder for the specified API base URL and credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if `base_url` cannot be parsed.
    pub fn new(
        base_url: impl AsRef<str>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            inner: HttpTransportBuilder::new(base_url, username, password)?,
            poller: TaskPoller::new(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        })
    }

    /// Create a builder from a validated array configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured hostname does not form a valid URL.
    pub fn from_config(config: &QuantastorConfig) -> Result<Self> {
        Ok(Self {
            inner: HttpTransportBuilder::from_config(config)?,
            poller: TaskPoller::from_config(config),
            settle_delay: config.settle_delay(),
        })
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.inner = self.inner.with_http_config(config);
        self
    }

    /// Set whether to verify the array's TLS certificate.
    #[must_use]
    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.inner = self.inner.with_tls_verify(verify);
        self
    }

    /// Override the task poller.
    #[must_use]
    pub const fn with_task_poller(mut self, poller: TaskPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Override the settle delay.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be built.
    pub fn build(self) -> Result<QuantastorClient> {
        let transport: HttpTransport = self.inner.build()?;
        Ok(QuantastorClient {
            transport: Arc::new(transport),
            poller: self.poller,
            settle_delay: self.settle_delay,
        })
    }
}

/// Asynchronous QuantaStor client.
///
/// Cloning is cheap and clones share the transport, so one client can serve
/// many concurrent operations. Retry and poll state is local to each call.
#[derive(Clone)]
pub struct QuantastorClient {
    transport: Arc<dyn Transport>,
    poller: TaskPoller,
    settle_delay: Duration,
}

impl QuantastorClient {
    /// Construct a client for a configured array.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built.
    pub fn from_config(config: &QuantastorConfig) -> Result<Self> {
        QuantastorClientBuilder::from_config(config)?.build()
    }

    /// Start a builder for the given API base URL and credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if `base_url` cannot be parsed.
    pub fn builder(
        base_url: impl AsRef<str>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<QuantastorClientBuilder> {
        QuantastorClientBuilder::new(base_url, username, password)
    }

    /// Construct a client over a custom transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            poller: TaskPoller::new(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Replace the task poller.
    #[must_use]
    pub const fn with_task_poller(mut self, poller: TaskPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Replace the settle delay.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    // Storage system

    /// Fetch the managed storage system.
    pub async fn get_storage_system(&self) -> Result<StorageSystem> {
        let response = self
            .call("storageSystemGet", QueryParams::new().with("flags", 0))
            .await?;
        parse(&response)
    }

    // Hosts

    /// Register a host with one iSCSI initiator and return it.
    pub async fn add_host(&self, hostname: &str, iqn: &str) -> Result<Host> {
        let params = QueryParams::new()
            .with("hostname", hostname)
            .with("iqn", iqn)
            .with("hostType", HOST_TYPE)
            .with("flags", 1);
        let response = self.call("hostAdd", params).await?;
        self.settle().await;
        self.wait_if_task(&response).await?;

        self.get_host(hostname)
            .await?
            .ok_or_else(|| refetch_missing("host", hostname, "hostAdd"))
    }

    /// Remove a host, returning it when the array echoes the removed record.
    pub async fn remove_host(&self, host: &str) -> Result<Option<Host>> {
        let params = QueryParams::new().with("host", host).with("flags", 1);
        let response = self.call("hostRemove", params).await?;
        self.wait_if_task(&response).await?;
        parse_optional(&response)
    }

    /// Look up a host by name or id.
    pub async fn get_host(&self, host: &str) -> Result<Option<Host>> {
        let params = QueryParams::new().with("host", host).with("flags", 0);
        self.lookup("hostGet", params).await
    }

    /// Look up the host owning an initiator.
    pub async fn get_host_by_initiator(&self, initiator: &str) -> Result<Option<Host>> {
        let params = QueryParams::new().with("initiator", initiator);
        let owner: Option<InitiatorOwner> = self.lookup("hostInitiatorGet", params).await?;
        Ok(owner.map(InitiatorOwner::into_host))
    }

    /// Add an initiator to a host.
    pub async fn add_host_initiator(&self, host: &str, iqn: &str) -> Result<Option<Host>> {
        let params = QueryParams::new().with("host", host).with("iqn", iqn);
        let response = self.call("hostInitiatorAdd", params).await?;
        parse_optional(&response)
    }

    /// Remove an initiator from a host.
    pub async fn remove_host_initiator(&self, host: &str, iqn: &str) -> Result<Option<Host>> {
        let params = QueryParams::new().with("host", host).with("iqn", iqn);
        let response = self.call("hostInitiatorRemove", params).await?;
        parse_optional(&response)
    }

    // Host groups

    /// Look up a host group by name or id.
    pub async fn get_host_group(&self, host_group: &str) -> Result<Option<HostGroup>> {
        let params = QueryParams::new().with("hostGroup", host_group);
        self.lookup("hostGroupGet", params).await
    }

    /// Create a host group from existing hosts and return it.
    pub async fn create_host_group(&self, name: &str, hosts: &[&str]) -> Result<HostGroup> {
        let params = QueryParams::new()
            .with("name", name)
            .with("hostList", hosts.join(","))
            .with("flags", 1);
        let response = self.call("hostGroupCreate", params).await?;
        self.wait_if_task(&response).await?;

        self.get_host_group(name)
            .await?
            .ok_or_else(|| refetch_missing("host group", name, "hostGroupCreate"))
    }

    /// Delete a host group, returning it when the array echoes the removed record.
    pub async fn delete_host_group(&self, name: &str) -> Result<Option<HostGroup>> {
        let params = QueryParams::new().with("hostGroup", name).with("flags", 1);
        let response = self.call("hostGroupDelete", params).await?;
        self.wait_if_task(&response).await?;
        parse_optional(&response)
    }

    // Storage volumes

    /// List every volume on the array.
    pub async fn list_volumes(&self) -> Result<Vec<Volume>> {
        let response = self.call("storageVolumeEnum", QueryParams::new()).await?;
        parse_list(&response)
    }

    /// Look up a volume by name or id.
    pub async fn get_volume(&self, volume: &str) -> Result<Option<Volume>> {
        let params = QueryParams::new().with("storageVolume", volume);
        self.lookup("storageVolumeGet", params).await
    }

    /// Create a thin-provisioned volume of `size` bytes in `pool_id`.
    ///
    /// Not retried: a failed create may still have produced a volume.
    pub async fn create_volume(
        &self,
        name: &str,
        size: u64,
        description: &str,
        pool_id: &str,
    ) -> Result<Volume> {
        let params = QueryParams::new()
            .with("count", 1)
            .with("name", name)
            .with("description", description)
            .with("accessMode", 0)
            .with("flags", 1)
            .with("thinProvisioned", true)
            .with("size", size)
            .with("provisionableId", pool_id);
        let response = self.call("storageVolumeCreate", params).await?;
        self.settle().await;
        let custom_id = self.wait(&response).await?;
        self.fetch_volume(&custom_id, "storageVolumeCreate").await
    }

    /// Clone `source` into a new volume named `new_name`.
    pub async fn clone_volume(
        &self,
        source: &str,
        new_name: &str,
        pool_id: &str,
    ) -> Result<Volume> {
        let params = QueryParams::new()
            .with("storageVolume", source)
            .with("cloneName", new_name)
            .with("accessMode", 0)
            .with("flags", 0)
            .with("provisionableId", pool_id);
        let response = self.call("storageVolumeClone", params).await?;
        let custom_id = self.wait(&response).await?;
        self.fetch_volume(&custom_id, "storageVolumeClone").await
    }

    /// Snapshot `source` into a new volume named `snapshot_name`.
    pub async fn snapshot_volume(
        &self,
        source: &str,
        snapshot_name: &str,
        pool_id: &str,
    ) -> Result<Volume> {
        let params = QueryParams::new()
            .with("storageVolume", source)
            .with("snapshotName", snapshot_name)
            .with("accessMode", 0)
            .with("flags", 0)
            .with("provisionableId", pool_id);
        let response = self.call("storageVolumeSnapshot", params).await?;
        let custom_id = self.wait(&response).await?;
        self.fetch_volume(&custom_id, "storageVolumeSnapshot").await
    }

    /// Grow a volume to `new_size` bytes. The array rejects shrinking.
    pub async fn extend_volume(
        &self,
        volume: &str,
        pool_id: &str,
        new_size: u64,
    ) -> Result<Volume> {
        let params = QueryParams::new()
            .with("storageVolume", volume)
            .with("provisionableId", pool_id)
            .with("newSizeInBytes", new_size);
        let response = self.call("storageVolumeResize", params).await?;
        self.settle().await;
        let custom_id = self.wait(&response).await?;
        self.fetch_volume(&custom_id, "storageVolumeResize").await
    }

    /// Delete a volume and wait for the deletion task.
    pub async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        let params = QueryParams::new()
            .with("storageVolume", volume_id)
            .with("flags", 3);
        let response = self.call("storageVolumeDeleteEx", params).await?;
        self.settle().await;
        self.wait(&response).await?;
        Ok(())
    }

    // Volume ACLs

    /// Look up the grant of `volume` to `host`.
    pub async fn get_volume_acl(&self, volume: &str, host: &str) -> Result<Option<VolumeAcl>> {
        let params = QueryParams::new()
            .with("storageVolume", volume)
            .with("host", host);
        self.lookup("storageVolumeAclGet", params).await
    }

    /// List the grants of `volume`.
    pub async fn list_volume_acls(&self, volume: &str) -> Result<Vec<VolumeAcl>> {
        let params = QueryParams::new().with("storageVolume", volume);
        let response = self.call("storageVolumeAclEnum", params).await?;
        let entries: Vec<AclEntry> = parse_list(&response)?;
        Ok(entries
            .into_iter()
            .map(|entry| VolumeAcl {
                volume_id: entry.volume_id.unwrap_or_else(|| volume.to_string()),
                host_id: entry.host_id,
            })
            .collect())
    }

    /// Grant `host` access to `volume_id` and return the new ACL.
    pub async fn attach_acl(&self, volume_id: &str, host: &str) -> Result<VolumeAcl> {
        self.modify_acl(volume_id, host, AclModification::Add).await?;
        self.get_volume_acl(volume_id, host).await?.ok_or_else(|| {
            refetch_missing("storage volume ACL", volume_id, "storageVolumeAclAddRemove")
        })
    }

    /// Revoke `host`'s access to `volume_id`.
    pub async fn detach_acl(&self, volume_id: &str, host: &str) -> Result<()> {
        self.modify_acl(volume_id, host, AclModification::Remove).await
    }

    async fn modify_acl(
        &self,
        volume_id: &str,
        host: &str,
        modification: AclModification,
    ) -> Result<()> {
        let params = QueryParams::new()
            .with("storageVolume", volume_id)
            .with("modType", modification as u8)
            .with("hostList", host)
            .with("flags", 1);
        let response = self.call("storageVolumeAclAddRemove", params).await?;
        self.settle().await;
        self.wait(&response).await?;
        Ok(())
    }

    // Pools and tiers

    /// Look up a storage pool by name or id.
    pub async fn get_pool(&self, pool: &str) -> Result<Option<Pool>> {
        let params = QueryParams::new().with("storagePool", pool);
        self.lookup("storagePoolGet", params).await
    }

    /// Look up a storage tier by name or id.
    pub async fn get_tier(&self, tier: &str) -> Result<Option<Tier>> {
        let params = QueryParams::new().with("storageTier", tier);
        self.lookup("storageTierGet", params).await
    }

    // Plumbing

    async fn call(&self, endpoint: &str, params: QueryParams) -> Result<Value> {
        self.transport.call(endpoint, &params).await
    }

    /// Existence lookup: "no such object" errors and empty bodies read as absent.
    ///
    /// The array does not tag `RestError`s with a reason code. Any API error
    /// whose message does not report an access or authorization failure is
    /// taken as "not found" (see [`Error::is_not_found`]).
    async fn lookup<T: Record>(&self, endpoint: &str, params: QueryParams) -> Result<Option<T>> {
        match self.call(endpoint, params).await {
            Ok(response) => parse_optional(&response),
            Err(err) if err.is_not_found() => {
                debug!(endpoint, error = %err, "Lookup found nothing");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn wait(&self, response: &Value) -> Result<String> {
        self.poller
            .wait_on_task(self.transport.as_ref(), response)
            .await
    }

    async fn wait_if_task(&self, response: &Value) -> Result<Option<String>> {
        if task_id(response).is_none() {
            return Ok(None);
        }
        self.wait(response).await.map(Some)
    }

    async fn fetch_volume(&self, custom_id: &str, operation: &str) -> Result<Volume> {
        self.get_volume(custom_id)
            .await?
            .ok_or_else(|| refetch_missing("storage volume", custom_id, operation))
    }

    async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            sleep(self.settle_delay).await;
        }
    }
}

fn refetch_missing(kind: &str, key: &str, operation: &str) -> Error {
    Error::MalformedResponse(format!(
        "{kind} `{key}` not found after successful {operation}"
    ))
}
