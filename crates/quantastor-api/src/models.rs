//! QuantaStor domain records and the response parser.
//!
//! The array answers either with the record's fields at the top level or with
//! the same fields nested under an `obj` key. [`parse`] accepts both shapes.

use quantastor_core::{Error, Result};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key under which the array nests a record in envelope responses.
pub const ENVELOPE_KEY: &str = "obj";

/// A record that can be parsed out of a management API response.
pub trait Record: DeserializeOwned {
    /// Name used in parse error messages.
    const KIND: &'static str;

    /// Field whose presence marks a response as carrying this record.
    const KEY: &'static str = "id";
}

/// A block volume exported by the array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume name, unique per array.
    pub name: String,
    /// Opaque volume identifier.
    pub id: String,
    /// Provisioned size in bytes.
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub size: u64,
    /// iSCSI qualified name of the volume target.
    pub iqn: String,
}

impl Record for Volume {
    const KIND: &'static str = "storage volume";
}

/// A host known to the array, with the initiators it logs in with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HostRecord")]
pub struct Host {
    /// Host name.
    pub name: String,
    /// Host identifier.
    pub id: String,
    /// Initiator identifiers (IQN or WWPN), in array order.
    pub initiators: Vec<String>,
}

impl Record for Host {
    const KIND: &'static str = "host";
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostRecord {
    name: String,
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    initiator_port_list: Vec<InitiatorPort>,
}

#[derive(Deserialize)]
struct InitiatorPort {
    #[serde(default)]
    iqn: Option<String>,
    #[serde(default)]
    wwpn: Option<String>,
}

impl InitiatorPort {
    fn into_identifier(self) -> Option<String> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        non_empty(self.iqn).or_else(|| non_empty(self.wwpn))
    }
}

impl From<HostRecord> for Host {
    fn from(record: HostRecord) -> Self {
        Self {
            name: record.name,
            id: record.id,
            initiators: record
                .initiator_port_list
                .into_iter()
                .filter_map(InitiatorPort::into_identifier)
                .collect(),
        }
    }
}

/// Host as reported by an initiator lookup (`hostInitiatorGet`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitiatorOwner {
    host_id: String,
    host_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    list: Vec<String>,
}

impl Record for InitiatorOwner {
    const KIND: &'static str = "host initiator";
    const KEY: &'static str = "hostId";
}

impl InitiatorOwner {
    pub(crate) fn into_host(self) -> Host {
        Host {
            name: self.host_name,
            id: self.host_id,
            initiators: self.list,
        }
    }
}

/// A named group of hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostGroup {
    /// Group name.
    pub name: String,
    /// Group identifier.
    pub id: String,
    /// Member hosts.
    #[serde(
        rename = "hostList",
        default,
        deserialize_with = "null_as_default"
    )]
    pub hosts: Vec<Host>,
}

impl Record for HostGroup {
    const KIND: &'static str = "host group";
}

/// Grant of access to a volume for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAcl {
    /// Volume the grant applies to.
    #[serde(rename = "storageVolumeId")]
    pub volume_id: String,
    /// Host that may address the volume.
    pub host_id: String,
}

impl Record for VolumeAcl {
    const KIND: &'static str = "storage volume ACL";
    const KEY: &'static str = "hostId";
}

/// ACL entry as listed by `storageVolumeAclEnum`, where the volume id may be omitted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AclEntry {
    #[serde(rename = "storageVolumeId", default)]
    pub(crate) volume_id: Option<String>,
    pub(crate) host_id: String,
}

impl Record for AclEntry {
    const KIND: &'static str = "storage volume ACL entry";
    const KEY: &'static str = "hostId";
}

/// Storage pool volumes are provisioned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Pool name.
    pub name: String,
    /// Pool identifier.
    pub id: String,
    /// Free space in bytes.
    #[serde(rename = "freeSpace", deserialize_with = "u64_from_number_or_string")]
    pub free_space: u64,
    /// Total size in bytes.
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub size: u64,
}

impl Pool {
    /// Bytes currently allocated from the pool.
    #[must_use]
    pub const fn used_space(&self) -> u64 {
        self.size.saturating_sub(self.free_space)
    }
}

impl Record for Pool {
    const KIND: &'static str = "storage pool";
}

/// Storage class grouping pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Tier name.
    pub name: String,
    /// Tier identifier.
    pub id: String,
}

impl Record for Tier {
    const KIND: &'static str = "storage tier";
}

/// The managed array itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSystem {
    /// System name.
    pub name: String,
    /// System identifier.
    pub id: String,
}

impl Record for StorageSystem {
    const KIND: &'static str = "storage system";
}

/// Strip the `obj` envelope when it carries a non-null `key` field.
///
/// Mutating calls answer with an empty `obj` next to flat fields, so an
/// envelope without the key is not a record body.
#[must_use]
pub fn unwrap_envelope<'a>(value: &'a Value, key: &str) -> &'a Value {
    match value.get(ENVELOPE_KEY) {
        Some(inner) if has_field(inner, key) => inner,
        _ => value,
    }
}

fn has_field(value: &Value, key: &str) -> bool {
    value.get(key).is_some_and(|field| !field.is_null())
}

/// Return the record body of a response, or `None` when it carries no `T`.
///
/// `null`, `{}` and objects without the record's key field count as absent.
#[must_use]
pub fn record_body<T: Record>(value: &Value) -> Option<&Value> {
    let body = unwrap_envelope(value, T::KEY);
    has_field(body, T::KEY).then_some(body)
}

/// Parse a record from a flat or `obj`-wrapped response.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] when required fields are missing or
/// have the wrong type.
pub fn parse<T: Record>(value: &Value) -> Result<T> {
    T::deserialize(unwrap_envelope(value, T::KEY))
        .map_err(|err| Error::MalformedResponse(format!("Invalid {} record: {err}", T::KIND)))
}

/// Parse a record, mapping an absent body to `None`.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] when a present record is incomplete.
pub fn parse_optional<T: Record>(value: &Value) -> Result<Option<T>> {
    record_body::<T>(value).map(parse::<T>).transpose()
}

/// Parse an enumeration response (a bare list of records).
///
/// `null` and `0` bodies are read as an empty list.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the body is not a list or an item
/// is incomplete.
pub fn parse_list<T: Record>(value: &Value) -> Result<Vec<T>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(parse::<T>).collect(),
        other => Err(Error::MalformedResponse(format!(
            "Expected a list of {} records, got {other}",
            T::KIND
        ))),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn u64_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}
