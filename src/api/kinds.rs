//! The data kinds the backend serves and how to fetch each of them.

use serde_json::Value;

use super::client::ApiClient;
use crate::config::FetchConfig;
use crate::fetch::FetchRegistry;

/// One REST collection exposed as a fetchable kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
  pub kind: &'static str,
  /// Collection path below the API root
  pub path: &'static str,
  pub title: &'static str,
  /// Whether the endpoint honours query parameters
  pub filterable: bool,
}

pub const USERS: &str = "users";
pub const TOOLS: &str = "tools";
pub const SENSOR_DATA: &str = "sensor-data";
pub const PROCESSING_TASKS: &str = "processing-tasks";
pub const COMPOSITE_MATERIALS: &str = "composite-materials";
pub const TASK_GROUPS: &str = "task-groups";

pub const RESOURCES: &[Resource] = &[
  Resource {
    kind: USERS,
    path: "users",
    title: "Users",
    filterable: false,
  },
  Resource {
    kind: TOOLS,
    path: "tools",
    title: "Tools",
    filterable: false,
  },
  Resource {
    kind: SENSOR_DATA,
    path: "sensor-data",
    title: "Sensor Data",
    filterable: true,
  },
  Resource {
    kind: PROCESSING_TASKS,
    path: "processing-tasks",
    title: "Processing Tasks",
    filterable: true,
  },
  Resource {
    kind: COMPOSITE_MATERIALS,
    path: "composite-materials",
    title: "Composite Materials",
    filterable: false,
  },
  Resource {
    kind: TASK_GROUPS,
    path: "task-groups",
    title: "Task Groups",
    filterable: false,
  },
];

pub fn resource(kind: &str) -> Option<&'static Resource> {
  RESOURCES.iter().find(|r| r.kind == kind)
}

/// Register every resource with a fetch registry backed by `client`.
///
/// Parameters are forwarded only to filterable endpoints. Per-kind timeouts
/// come from the fetch configuration.
pub fn registry(client: &ApiClient, config: &FetchConfig) -> FetchRegistry<Value> {
  RESOURCES.iter().fold(FetchRegistry::new(), |registry, resource| {
    let client = client.clone();
    let registry = registry.register(resource.kind, move |params: Option<Value>| {
      let client = client.clone();
      let params = params.filter(|_| resource.filterable);
      async move { client.list(resource.path, params.as_ref()).await }
    });
    match config.timeout_for(resource.kind) {
      Some(timeout) => registry.with_timeout(resource.kind, timeout),
      None => registry,
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use std::time::Duration;

  #[test]
  fn test_resource_lookup() {
    assert_eq!(resource(TOOLS).map(|r| r.path), Some("tools"));
    assert!(resource("nonexistent").is_none());
  }

  #[test]
  fn test_registry_covers_every_resource() {
    let client = ApiClient::new("http://127.0.0.1:8000/api").unwrap();
    let registry = registry(&client, &FetchConfig::default());

    let mut expected: Vec<&str> = RESOURCES.iter().map(|r| r.kind).collect();
    expected.sort();
    assert_eq!(registry.kinds(), expected);
  }

  #[test]
  fn test_per_kind_timeouts() {
    let client = ApiClient::new("http://127.0.0.1:8000/api").unwrap();
    let config = FetchConfig {
      timeout_secs: 0,
      timeouts: BTreeMap::from([(SENSOR_DATA.to_string(), 90)]),
    };
    let registry = registry(&client, &config);

    let timeout = |kind| registry.resolve(kind).and_then(|r| r.timeout);
    assert_eq!(timeout(SENSOR_DATA), Some(Duration::from_secs(90)));
    assert_eq!(timeout(TOOLS), None);
  }
}
