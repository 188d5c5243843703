//! Well-known names shared by synthesis, status and admission.

pub const DEFAULT_REPLICAS: i32 = 3;
pub const DEFAULT_JOB_REPLICAS: i32 = 1;

pub const DISCOVERY_SERVICE_SUFFIX: &str = "-wka";
pub const HEADLESS_SERVICE_SUFFIX: &str = "-sts";
/// Platform-internal DNS suffix appended after the namespace.
pub const CLUSTER_DNS_SUFFIX: &str = "svc.cluster.local";

// ---- labels ----
pub const LABEL_WORKLOAD: &str = "gridWorkload";
pub const LABEL_CLUSTER: &str = "gridCluster";
pub const LABEL_ROLE: &str = "gridRole";
pub const LABEL_COMPONENT: &str = "gridComponent";
pub const LABEL_PORT: &str = "gridPort";
pub const LABEL_WKA_MEMBER: &str = "gridWkaMember";
pub const LABEL_APP: &str = "app";
pub const LABEL_VERSION: &str = "version";
pub const LABEL_HASH: &str = "grid-hash";

pub const COMPONENT_STATEFUL_SET: &str = "grid";
pub const COMPONENT_JOB: &str = "grid-job";
pub const COMPONENT_HEADLESS: &str = "grid-headless";
pub const COMPONENT_POD: &str = "gridPod";
pub const COMPONENT_PVC: &str = "grid-volume";
pub const COMPONENT_PORT_SERVICE: &str = "grid-service";
pub const COMPONENT_WKA: &str = "gridWkaService";

// ---- annotations ----
pub const ANNOTATION_TOLERATE_UNREADY: &str = "service.alpha.kubernetes.io/tolerate-unready-endpoints";
pub const ANNOTATION_OPERATOR_VERSION: &str = "grid.skelops.io/version";

// ---- containers, volumes, ports ----
pub const CONTAINER_NAME_GRID: &str = "grid";
pub const CONTAINER_NAME_UTILS: &str = "grid-k8s-utils";

pub const VOLUME_NAME_PERSISTENCE: &str = "persistence-volume";
pub const VOLUME_NAME_SNAPSHOTS: &str = "snapshot-volume";
pub const VOLUME_NAME_UTILS: &str = "grid-utils";

pub const VOLUME_MOUNT_ROOT: &str = "/grid-operator";
pub const VOLUME_MOUNT_PATH_PERSISTENCE: &str = "/grid-operator/persistence";
pub const VOLUME_MOUNT_PATH_SNAPSHOTS: &str = "/grid-operator/snapshot";
pub const VOLUME_MOUNT_PATH_UTILS: &str = "/grid-operator/utils";

pub const RUNNER_COMMAND: &str = "/grid-operator/utils/runner";
pub const UTILS_INIT_COMMAND: &str = "/files/runner";

pub const PORT_NAME_GRID: &str = "grid";
pub const PORT_NAME_HEALTH: &str = "health";
pub const PORT_NAME_METRICS: &str = "metrics";
pub const PORT_NAME_MANAGEMENT: &str = "management";
/// Port used by discovery and headless services.
pub const DISCOVERY_PORT: i32 = 7;

pub const DEFAULT_HEALTH_PORT: i32 = 6676;
pub const DEFAULT_METRICS_PORT: i32 = 9612;
pub const DEFAULT_MANAGEMENT_PORT: i32 = 30000;
pub const DEFAULT_UNICAST_PORT: i32 = 7575;
pub const DEFAULT_UNICAST_PORT_ADJUST: i32 = 7576;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: i32 = 120;

pub const NODE_PORT_MIN: i32 = 30000;
pub const NODE_PORT_MAX: i32 = 32767;

// ---- environment variables injected into pods ----
pub const ENV_MACHINE_NAME: &str = "GRID_MACHINE_NAME";
pub const ENV_MEMBER_NAME: &str = "GRID_MEMBER_NAME";
pub const ENV_POD_UID: &str = "GRID_POD_UID";
pub const ENV_CLUSTER_NAME: &str = "GRID_CLUSTER_NAME";
pub const ENV_ROLE: &str = "GRID_ROLE";
pub const ENV_WKA: &str = "GRID_WKA";
pub const ENV_UTIL_DIR: &str = "GRID_UTIL_DIR";
pub const ENV_HEALTH_PORT: &str = "GRID_HEALTH_PORT";
pub const ENV_REQUEST_TIMEOUT: &str = "OPERATOR_REQUEST_TIMEOUT";
pub const ENV_CACHE_CONFIG: &str = "GRID_CACHE_CONFIG";
pub const ENV_OVERRIDE_CONFIG: &str = "GRID_OVERRIDE_CONFIG";
pub const ENV_LOCAL_PORT: &str = "GRID_LOCALPORT";
pub const ENV_LOCAL_PORT_ADJUST: &str = "GRID_LOCALPORT_ADJUST";
pub const ENV_LOG_LEVEL: &str = "GRID_LOG_LEVEL";
pub const ENV_STORAGE_ENABLED: &str = "GRID_STORAGE_ENABLED";
pub const ENV_SKIP_VERSION_CHECK: &str = "GRID_SKIP_VERSION_CHECK";
pub const ENV_TRACING_RATIO: &str = "GRID_TRACING_RATIO";
pub const ENV_ALLOW_ENDANGERED: &str = "GRID_ALLOW_ENDANGERED";
pub const ENV_ENABLE_IP_MONITOR: &str = "GRID_ENABLE_IPMONITOR";
pub const ENV_METRICS_PREFIX: &str = "GRID_METRICS";
pub const ENV_MGMT_PREFIX: &str = "GRID_MGMT";
pub const ENV_ENABLED_SUFFIX: &str = "_ENABLED";
pub const ENV_PORT_SUFFIX: &str = "_PORT";
pub const ENV_PERSISTENCE_MODE: &str = "GRID_PERSISTENCE_MODE";
pub const ENV_PERSISTENCE_DIR: &str = "GRID_PERSISTENCE_DIR";
pub const ENV_SNAPSHOT_DIR: &str = "GRID_SNAPSHOT_DIR";
