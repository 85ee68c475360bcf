//! Identity and presence record for one simulation peer.

use crate::id::MachineId;
use crate::message::Message;
use crate::param::ParamValue;

/// Identity of one game manager instance, local or remote.
///
/// Equality and hashing consider only [`id`](Self::id); the remaining
/// fields are descriptive and change over the lifetime of a peer.
#[derive(Clone, Debug)]
pub struct MachineInfo {
    /// Globally unique machine id.
    pub id: MachineId,
    /// Human-readable machine name.
    pub name: String,
    /// Host name the peer reported.
    pub host_name: String,
    /// IP address the peer reported.
    pub ip_address: String,
    /// Listening port, or 0 when not listening.
    pub port: u16,
    /// Last estimated round-trip time in milliseconds.
    pub ping_ms: Option<u32>,
    /// Local sim time (seconds) at which this record was last refreshed.
    pub last_update: f64,
}

impl MachineInfo {
    /// New record with the given id and name and empty network fields.
    pub fn new(id: MachineId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            host_name: String::new(),
            ip_address: String::new(),
            port: 0,
            ping_ms: None,
            last_update: 0.0,
        }
    }

    /// Refresh the presence timestamp.
    pub fn touch(&mut self, now: f64) {
        self.last_update = now;
    }

    /// Record a new round-trip estimate.
    pub fn update_ping(&mut self, ping_ms: u32, now: f64) {
        self.ping_ms = Some(ping_ms);
        self.last_update = now;
    }

    /// Whether nothing has been heard from this peer for longer than
    /// `timeout` seconds.
    pub fn is_stale(&self, now: f64, timeout: f64) -> bool {
        now - self.last_update > timeout
    }

    /// Write this record into the machine-info parameters of `msg`
    /// (`Name`, `UniqueId`, `HostName`, `IpAddress`, `Port`, `Ping`).
    ///
    /// Parameters the message does not declare are skipped, so the same
    /// helper serves every connection-management message type.
    pub fn write_to(&self, msg: &mut Message) {
        let fields: [(&str, ParamValue); 6] = [
            ("Name", self.name.clone().into()),
            ("UniqueId", self.id.to_string().into()),
            ("HostName", self.host_name.clone().into()),
            ("IpAddress", self.ip_address.clone().into()),
            ("Port", u32::from(self.port).into()),
            ("Ping", self.ping_ms.unwrap_or(0).into()),
        ];
        for (name, value) in fields {
            if let Some(p) = msg.param_mut(name) {
                // The built-in schemas declare these types; a mismatch means a
                // custom type reused the names and is left alone.
                let _ = p.set(value);
            }
        }
    }

    /// Rebuild a record from the machine-info parameters of `msg`.
    ///
    /// Returns `None` when `UniqueId` is missing or not a GUID.
    pub fn read_from(msg: &Message) -> Option<MachineInfo> {
        let id: MachineId = msg.get("UniqueId")?.as_str()?.parse().ok()?;
        let text = |name: &str| {
            msg.get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let port = msg
            .get("Port")
            .and_then(|v| v.as_u32())
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(0);
        let ping = msg.get("Ping").and_then(|v| v.as_u32()).filter(|p| *p > 0);
        Some(MachineInfo {
            id,
            name: text("Name"),
            host_name: text("HostName"),
            ip_address: text("IpAddress"),
            port,
            ping_ms: ping,
            last_update: 0.0,
        })
    }
}

impl PartialEq for MachineInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MachineInfo {}

impl std::hash::Hash for MachineInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_id() {
        let a = MachineInfo::new(MachineId(5), "alpha");
        let mut b = MachineInfo::new(MachineId(5), "renamed");
        b.port = 9000;
        assert_eq!(a, b);
        assert_ne!(a, MachineInfo::new(MachineId(6), "alpha"));
    }

    #[test]
    fn staleness() {
        let mut m = MachineInfo::new(MachineId(1), "peer");
        m.touch(10.0);
        assert!(!m.is_stale(14.0, 5.0));
        assert!(m.is_stale(15.5, 5.0));
        m.update_ping(40, 15.0);
        assert_eq!(m.ping_ms, Some(40));
        assert!(!m.is_stale(15.5, 5.0));
    }
}
