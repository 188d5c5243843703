//! Port/service resolution: service names, selectors, DNS names and the
//! service objects derived from them.

use std::collections::BTreeMap;

use grid_core::constants::*;
use grid_core::model::NamedPort;
use grid_core::Workload;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Name of the service exposing `port`, or `None` when its service is disabled.
pub fn port_service_name<W: Workload>(w: &W, port: &NamedPort) -> Option<String> {
    if !port.is_service_enabled() {
        return None;
    }
    match port.service.as_ref().and_then(|s| s.name.as_deref()) {
        Some(n) if !n.is_empty() => Some(n.to_string()),
        _ => Some(format!("{}-{}", w.name(), port.name)),
    }
}

/// Service name of the named port, if it is declared and exposed.
pub fn find_port_service_name<W: Workload>(w: &W, port_name: &str) -> Option<String> {
    w.common_spec().ports.iter().find(|p| p.name == port_name).and_then(|p| port_service_name(w, p))
}

/// Port name to service name for every exposed port, plus the discovery
/// service under `wka`.
pub fn port_service_names<W: Workload>(w: &W) -> BTreeMap<String, String> {
    let mut m: BTreeMap<String, String> = w
        .common_spec()
        .ports
        .iter()
        .filter_map(|p| port_service_name(w, p).map(|s| (p.name.clone(), s)))
        .collect();
    m.insert("wka".into(), w.discovery_service_name());
    m
}

pub fn fully_qualified(w: &impl Workload, service: &str) -> String {
    format!("{}.{}.{}", service, w.namespace(), CLUSTER_DNS_SUFFIX)
}

pub fn fully_qualified_port_service_names<W: Workload>(w: &W) -> BTreeMap<String, String> {
    port_service_names(w).into_iter().map(|(k, v)| { let fq = fully_qualified(w, &v); (k, fq) }).collect()
}

/// Container port of a declared port; `metrics` and `management` fall back
/// to the runtime's ports when unset.
pub fn container_port<W: Workload>(w: &W, port: &NamedPort) -> i32 {
    if port.port != 0 {
        return port.port;
    }
    match port.name.to_ascii_lowercase().as_str() {
        PORT_NAME_METRICS => w.common_spec().metrics_port(),
        PORT_NAME_MANAGEMENT => w.common_spec().management_port(),
        _ => 0,
    }
}

pub fn service_port<W: Workload>(w: &W, port: &NamedPort) -> i32 {
    port.service.as_ref().and_then(|s| s.port).unwrap_or_else(|| container_port(w, port))
}

/// Numeric target unless another declared port shares the number with a
/// different protocol; then the port is addressed by name.
pub fn target_port<W: Workload>(w: &W, port: &NamedPort) -> IntOrString {
    let number = container_port(w, port);
    let ambiguous = w
        .common_spec()
        .ports
        .iter()
        .any(|other| other.name != port.name && container_port(w, other) == number && other.protocol() != port.protocol());
    if ambiguous { IntOrString::String(port.name.clone()) } else { IntOrString::Int(number) }
}

fn discovery_port() -> ServicePort {
    ServicePort {
        name: Some(format!("tcp-{}", PORT_NAME_GRID)),
        protocol: Some("TCP".into()),
        port: DISCOVERY_PORT,
        target_port: Some(IntOrString::Int(DISCOVERY_PORT)),
        ..Default::default()
    }
}

/// Cluster-wide membership discovery service: headless and publishing
/// not-ready members.
pub fn discovery_service<W: Workload>(w: &W) -> Service {
    let mut labels = w.common_labels();
    labels.insert(LABEL_COMPONENT.into(), COMPONENT_WKA.into());

    let mut selector = BTreeMap::new();
    selector.insert(LABEL_CLUSTER.to_string(), w.cluster_name());
    selector.insert(LABEL_COMPONENT.to_string(), COMPONENT_POD.to_string());
    selector.insert(LABEL_WKA_MEMBER.to_string(), "true".to_string());

    let mut annotations = BTreeMap::new();
    annotations.insert(ANNOTATION_TOLERATE_UNREADY.to_string(), "true".to_string());

    Service {
        metadata: ObjectMeta {
            name: Some(w.discovery_service_name()),
            namespace: Some(w.namespace().to_string()),
            labels: Some(labels),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".into()),
            publish_not_ready_addresses: Some(true),
            ports: Some(vec![discovery_port()]),
            selector: Some(selector),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Headless service governing the StatefulSet's pod identities.
pub fn headless_service<W: Workload>(w: &W) -> Service {
    let mut labels = w.common_labels();
    labels.insert(LABEL_COMPONENT.into(), COMPONENT_HEADLESS.into());

    Service {
        metadata: ObjectMeta {
            name: Some(w.headless_service_name()),
            namespace: Some(w.namespace().to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".into()),
            publish_not_ready_addresses: Some(true),
            ports: Some(vec![discovery_port()]),
            selector: Some(w.pod_selector_labels()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service exposing one declared port, `None` when disabled.
pub fn port_service<W: Workload>(w: &W, port: &NamedPort) -> Option<Service> {
    let name = port_service_name(w, port)?;
    let svc = port.service.clone().unwrap_or_default();

    let mut labels = w.common_labels();
    labels.insert(LABEL_COMPONENT.into(), COMPONENT_PORT_SERVICE.into());
    labels.insert(LABEL_PORT.into(), port.name.clone());
    labels.extend(svc.labels.clone());

    let service_port = ServicePort {
        name: Some(svc.port_name.clone().unwrap_or_else(|| port.name.clone())),
        protocol: Some(port.protocol().to_string()),
        port: service_port(w, port),
        target_port: Some(target_port(w, port)),
        node_port: port.node_port,
        app_protocol: port.app_protocol.clone(),
    };

    Some(Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(w.namespace().to_string()),
            labels: Some(labels),
            annotations: Some(svc.annotations.clone()).filter(|a| !a.is_empty()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: svc.type_.clone(),
            cluster_ip: svc.cluster_ip.clone(),
            publish_not_ready_addresses: svc.publish_not_ready_addresses,
            session_affinity: svc.session_affinity.clone(),
            external_traffic_policy: svc.external_traffic_policy.clone(),
            load_balancer_ip: svc.load_balancer_ip.clone(),
            ports: Some(vec![service_port]),
            selector: Some(w.pod_selector_labels()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Services for all exposed ports, ordered by service name.
pub fn port_services<W: Workload>(w: &W) -> Vec<Service> {
    let mut out: Vec<Service> = w.common_spec().ports.iter().filter_map(|p| port_service(w, p)).collect();
    out.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_core::model::{GridCluster, PortService};

    fn cluster_with_ports(ports: Vec<NamedPort>) -> GridCluster {
        let mut c = GridCluster::default();
        c.metadata.name = Some("storage".into());
        c.metadata.namespace = Some("grid".into());
        c.spec.common.ports = ports;
        c
    }

    #[test]
    fn service_names_and_fqdn() {
        let c = cluster_with_ports(vec![
            NamedPort { name: "rest".into(), port: 8080, ..Default::default() },
            NamedPort {
                name: "extend".into(),
                port: 20000,
                service: Some(PortService { name: Some("extend-lb".into()), ..Default::default() }),
                ..Default::default()
            },
            NamedPort {
                name: "hidden".into(),
                port: 1,
                service: Some(PortService { enabled: Some(false), ..Default::default() }),
                ..Default::default()
            },
        ]);
        let names = port_service_names(&c);
        assert_eq!(names.get("rest").map(String::as_str), Some("storage-rest"));
        assert_eq!(names.get("extend").map(String::as_str), Some("extend-lb"));
        assert_eq!(names.get("wka").map(String::as_str), Some("storage-wka"));
        assert!(!names.contains_key("hidden"));
        assert_eq!(find_port_service_name(&c, "hidden"), None);
        let fq = fully_qualified_port_service_names(&c);
        assert_eq!(fq.get("rest").map(String::as_str), Some("storage-rest.grid.svc.cluster.local"));
    }

    #[test]
    fn well_known_ports_default() {
        let c = cluster_with_ports(vec![
            NamedPort { name: "metrics".into(), ..Default::default() },
            NamedPort { name: "management".into(), ..Default::default() },
        ]);
        assert_eq!(container_port(&c, &c.spec.common.ports[0]), DEFAULT_METRICS_PORT);
        assert_eq!(container_port(&c, &c.spec.common.ports[1]), DEFAULT_MANAGEMENT_PORT);
    }

    #[test]
    fn shared_number_across_protocols_targets_by_name() {
        let c = cluster_with_ports(vec![
            NamedPort { name: "dns-tcp".into(), port: 53, ..Default::default() },
            NamedPort { name: "dns-udp".into(), port: 53, protocol: Some("UDP".into()), ..Default::default() },
            NamedPort { name: "web".into(), port: 80, ..Default::default() },
        ]);
        let p = &c.spec.common.ports;
        assert_eq!(target_port(&c, &p[0]), IntOrString::String("dns-tcp".into()));
        assert_eq!(target_port(&c, &p[1]), IntOrString::String("dns-udp".into()));
        assert_eq!(target_port(&c, &p[2]), IntOrString::Int(80));
    }

    #[test]
    fn port_service_fields() {
        let c = cluster_with_ports(vec![NamedPort {
            name: "rest".into(),
            port: 8080,
            node_port: Some(30080),
            service: Some(PortService { port: Some(80), port_name: Some("http".into()), type_: Some("NodePort".into()), ..Default::default() }),
            ..Default::default()
        }]);
        let svc = port_service(&c, &c.spec.common.ports[0]).unwrap();
        let spec = svc.spec.unwrap();
        let sp = &spec.ports.unwrap()[0];
        assert_eq!(sp.name.as_deref(), Some("http"));
        assert_eq!(sp.port, 80);
        assert_eq!(sp.target_port, Some(IntOrString::Int(8080)));
        assert_eq!(sp.node_port, Some(30080));
        assert_eq!(sp.protocol.as_deref(), Some("TCP"));
        assert_eq!(spec.type_.as_deref(), Some("NodePort"));
        assert_eq!(spec.selector, Some(c.pod_selector_labels()));
        let labels = svc.metadata.labels.unwrap();
        assert_eq!(labels.get(LABEL_PORT).map(String::as_str), Some("rest"));
    }

    #[test]
    fn discovery_service_is_headless_and_tolerant() {
        let c = cluster_with_ports(vec![]);
        let svc = discovery_service(&c);
        assert_eq!(svc.metadata.name.as_deref(), Some("storage-wka"));
        let ann = svc.metadata.annotations.unwrap();
        assert_eq!(ann.get(ANNOTATION_TOLERATE_UNREADY).map(String::as_str), Some("true"));
        let spec = svc.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.publish_not_ready_addresses, Some(true));
        let sel = spec.selector.unwrap();
        assert_eq!(sel.get(LABEL_WKA_MEMBER).map(String::as_str), Some("true"));
        assert_eq!(sel.get(LABEL_CLUSTER).map(String::as_str), Some("storage"));
        assert!(!sel.contains_key(LABEL_WORKLOAD));
    }
}
