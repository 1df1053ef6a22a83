//! Named-instance registry.
//!
//! A small JSON file at `$HOME/.br/instances.json` maps instance names to
//! `{port, pid}`. It is the single source of truth for which daemons
//! exist on this host: every read probes each pid and silently drops the
//! dead ones, so a crashed daemon disappears on the next `list`/`start`.
//!
//! Writes go through a temp file and an atomic rename; a torn or
//! malformed file reads as an empty registry, same as a missing one.

use std::collections::BTreeMap;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Lowest port the allocator will hand out. The default instance gets
/// exactly this port when it is free.
pub const BASE_PORT: u16 = 3030;

/// Name used when the caller does not pick one.
pub const DEFAULT_INSTANCE: &str = "default";

/// One registered daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
	pub port: u16,
	pub pid: u32,
}

/// Handle to the on-disk registry directory.
#[derive(Debug, Clone)]
pub struct Registry {
	dir: PathBuf,
}

impl Registry {
	/// Registry under an explicit directory (tests point this at a tempdir).
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	/// The standard location, `$HOME/.br`.
	pub fn open_default() -> Result<Self> {
		let home = dirs::home_dir()
			.ok_or_else(|| crate::error::BrError::InvalidInput("cannot resolve home directory".into()))?;
		Ok(Self::new(home.join(".br")))
	}

	fn file(&self) -> PathBuf {
		self.dir.join("instances.json")
	}

	/// Read the registry, pruning entries whose pid no longer responds to
	/// a liveness probe. Rewrites the file when anything was dropped.
	pub fn read(&self) -> Result<BTreeMap<String, InstanceRecord>> {
		let raw = load_map(&self.file());
		let live: BTreeMap<String, InstanceRecord> =
			raw.iter().filter(|(_, rec)| pid_alive(rec.pid)).map(|(k, v)| (k.clone(), *v)).collect();

		if live.len() != raw.len() {
			self.write(&live)?;
		}
		Ok(live)
	}

	/// Add or replace one entry.
	pub fn register(&self, name: &str, port: u16, pid: u32) -> Result<()> {
		let mut map = self.read()?;
		map.insert(name.to_string(), InstanceRecord { port, pid });
		self.write(&map)
	}

	/// Remove one entry. Missing names are fine.
	pub fn unregister(&self, name: &str) -> Result<()> {
		let mut map = self.read()?;
		if map.remove(name).is_some() {
			self.write(&map)?;
		}
		Ok(())
	}

	/// Pick a port for `name`: the lowest free port at or above
	/// [`BASE_PORT`] that is not claimed in the registry and passes a
	/// bind probe. The default instance prefers [`BASE_PORT`] itself.
	pub fn allocate_port(&self, name: &str) -> Result<u16> {
		let used: Vec<u16> = self.read()?.values().map(|rec| rec.port).collect();

		if name == DEFAULT_INSTANCE && !used.contains(&BASE_PORT) && port_available(BASE_PORT) {
			return Ok(BASE_PORT);
		}

		(BASE_PORT..=u16::MAX)
			.find(|port| !used.contains(port) && port_available(*port))
			.ok_or_else(|| crate::error::BrError::InvalidInput("no free port at or above 3030".into()))
	}

	fn write(&self, map: &BTreeMap<String, InstanceRecord>) -> Result<()> {
		fs::create_dir_all(&self.dir)?;
		let tmp = self.dir.join(".instances.json.tmp");
		fs::write(&tmp, serde_json::to_string_pretty(map)?)?;
		fs::rename(&tmp, self.file())?;
		Ok(())
	}
}

fn load_map(path: &Path) -> BTreeMap<String, InstanceRecord> {
	fs::read_to_string(path)
		.ok()
		.and_then(|content| serde_json::from_str(&content).ok())
		.unwrap_or_default()
}

/// Signal-0 probe: does the process still exist?
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
	// SAFETY: kill with signal 0 performs no action beyond the existence
	// and permission checks.
	unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
	true
}

pub fn port_available(port: u16) -> bool {
	TcpListener::bind(("127.0.0.1", port)).is_ok()
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn scratch() -> (TempDir, Registry) {
		let tmp = TempDir::new().unwrap();
		let registry = Registry::new(tmp.path());
		(tmp, registry)
	}

	#[test]
	fn missing_file_reads_empty() {
		let (_tmp, registry) = scratch();
		assert!(registry.read().unwrap().is_empty());
	}

	#[test]
	fn malformed_file_reads_empty() {
		let (tmp, registry) = scratch();
		fs::write(tmp.path().join("instances.json"), "{not json").unwrap();
		assert!(registry.read().unwrap().is_empty());
	}

	#[test]
	fn register_and_unregister_round_trip() {
		let (_tmp, registry) = scratch();
		let pid = std::process::id();
		registry.register("default", 3030, pid).unwrap();
		registry.register("work", 3031, pid).unwrap();

		let map = registry.read().unwrap();
		assert_eq!(map.len(), 2);
		assert_eq!(map["default"], InstanceRecord { port: 3030, pid });

		registry.unregister("default").unwrap();
		let map = registry.read().unwrap();
		assert!(!map.contains_key("default"));
		assert!(map.contains_key("work"));
	}

	#[test]
	fn dead_pids_are_pruned_from_file_and_result() {
		let (tmp, registry) = scratch();
		let live = std::process::id();
		// Huge pid that cannot exist on any reasonable system.
		let dead = 4_000_000;
		let content = serde_json::json!({
			"default": { "port": 3030, "pid": live },
			"stale": { "port": 3031, "pid": dead },
		});
		fs::write(tmp.path().join("instances.json"), content.to_string()).unwrap();

		let map = registry.read().unwrap();
		assert!(map.contains_key("default"));
		assert!(!map.contains_key("stale"));

		// The file itself was rewritten without the dead entry.
		let on_disk = fs::read_to_string(tmp.path().join("instances.json")).unwrap();
		assert!(!on_disk.contains("stale"));
	}

	#[test]
	fn allocator_fills_the_lowest_gap() {
		let (_tmp, registry) = scratch();
		let pid = std::process::id();
		registry.register("a", 3030, pid).unwrap();
		registry.register("b", 3031, pid).unwrap();
		registry.register("c", 3033, pid).unwrap();

		let port = registry.allocate_port("d").unwrap();
		assert_eq!(port, 3032);
	}

	#[test]
	fn default_instance_prefers_base_port() {
		let (_tmp, registry) = scratch();
		let port = registry.allocate_port(DEFAULT_INSTANCE).unwrap();
		// 3030 unless something else on this host is squatting on it.
		if port_available(BASE_PORT) || port == BASE_PORT {
			assert_eq!(port, BASE_PORT);
		}
	}

	#[test]
	fn own_pid_is_alive() {
		assert!(pid_alive(std::process::id()));
	}
}
