use std::sync::{Arc, Mutex};

use topology_lens::graph::pos;
use topology_lens::layout::{GridConfig, HierarchyConfig, LayoutCallback, Positions};
use topology_lens::{
    Edge, GraphEvent, GraphSnapshot, LayoutJob, LayoutKind, LayoutProvider, Node, RunStatus,
    Settings, Topology, TypeToggle,
};
use tracing::Level;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::DEBUG)
        .try_init();
}

/// Places every node at the origin unless told to hold callbacks back.
#[derive(Clone, Default)]
struct ScriptedProvider {
    hold: bool,
    jobs: Arc<Mutex<Vec<LayoutJob>>>,
    parked: Arc<Mutex<Vec<LayoutCallback>>>,
}

impl ScriptedProvider {
    fn holding() -> Self {
        Self {
            hold: true,
            ..Self::default()
        }
    }

    fn release_all(&self) {
        let parked = std::mem::take(&mut *self.parked.lock().expect("parked"));
        for callback in parked {
            callback(Ok(Positions::new()));
        }
    }

    fn job_count(&self) -> usize {
        self.jobs.lock().expect("jobs").len()
    }
}

impl LayoutProvider for ScriptedProvider {
    fn run(&mut self, job: LayoutJob, on_complete: LayoutCallback) {
        let positions = job
            .nodes
            .iter()
            .map(|node| (node.id.clone(), pos(0.0, 0.0)))
            .collect::<Positions>();
        self.jobs.lock().expect("jobs").push(job);
        if self.hold {
            self.parked.lock().expect("parked").push(on_complete);
        } else {
            on_complete(Ok(positions));
        }
    }
}

fn meta_edge_snapshot() -> GraphSnapshot {
    GraphSnapshot {
        nodes: vec![
            Node::new("n1", "Server", "web-1"),
            Node::new("n2", "Server", "web-2"),
            Node::new("n3", "Database", "db"),
            Node::new("n4", "User", "alice"),
        ],
        edges: vec![
            Edge::new("e1", "n1", "n3", "CONNECTS_TO"),
            Edge::new("e2", "n2", "n3", "CONNECTS_TO"),
            Edge::new("e3", "n1", "n4", "OWNED_BY"),
        ],
    }
}

fn tree_snapshot() -> GraphSnapshot {
    GraphSnapshot {
        nodes: (1..=5)
            .map(|i| Node::new(format!("n{i}"), "Host", format!("host-{i}")))
            .collect(),
        edges: vec![
            Edge::new("e12", "n1", "n2", "LINK"),
            Edge::new("e13", "n1", "n3", "LINK"),
            Edge::new("e24", "n2", "n4", "LINK"),
            Edge::new("e35", "n3", "n5", "LINK"),
        ],
    }
}

fn topology_with(provider: ScriptedProvider, settings: &Settings, snapshot: GraphSnapshot) -> Topology {
    let mut topology = Topology::new(Box::new(provider), settings);
    topology.load(snapshot);
    topology
}

#[test]
fn server_group_collapses_and_restores_through_the_facade() {
    init_tracing();
    let provider = ScriptedProvider::default();
    let mut topology = topology_with(provider.clone(), &Settings::default(), meta_edge_snapshot());
    let before = topology.graph().edge_ids();

    let TypeToggle::Created(group_id) = topology.toggle_by_type("Server").expect("toggle") else {
        panic!("expected a new group");
    };

    let visible_edges = topology.graph().visible_edge_ids();
    assert_eq!(
        visible_edges.into_iter().collect::<Vec<_>>(),
        vec![format!("meta:{group_id}:n3"), format!("meta:{group_id}:n4")]
    );
    let to_db = topology
        .graph()
        .edge(&format!("meta:{group_id}:n3"))
        .expect("meta-edge to n3");
    assert_eq!(to_db.label, "2 connections");
    assert_eq!(to_db.source, group_id);

    topology.run_layout(LayoutKind::Grid(GridConfig::default()));
    assert_eq!(topology.poll_layout(), 1);
    let jobs = provider.jobs.lock().expect("jobs");
    let laid_out = jobs[0].nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>();
    assert_eq!(laid_out, vec![group_id.as_str(), "n3", "n4"]);
    drop(jobs);

    assert!(topology.toggle_expansion(&group_id).expect("expand"));
    assert!(topology.graph().is_node_visible("n1"));
    assert!(!topology.graph().is_node_visible(&group_id));
    assert!(!topology.toggle_expansion(&group_id).expect("collapse"));

    let TypeToggle::Deleted(_, report) = topology.toggle_by_type("Server").expect("toggle") else {
        panic!("expected the group to be deleted");
    };
    assert_eq!(report.restored, 3);
    assert!(report.skipped.is_empty());
    assert_eq!(topology.graph().edge_ids(), before);
    assert_eq!(topology.graph().visible_node_ids().len(), 4);
}

#[test]
fn hierarchy_levels_follow_bfs_distance_from_the_root() {
    init_tracing();
    let provider = ScriptedProvider::default();
    let mut topology = topology_with(provider.clone(), &Settings::default(), tree_snapshot());

    let kind = LayoutKind::HierarchicalTree(HierarchyConfig {
        root: Some("n1".to_owned()),
        ..HierarchyConfig::default()
    });
    assert!(matches!(topology.run_layout(kind), RunStatus::Completed(_)));
    assert_eq!(provider.job_count(), 0);

    let graph = topology.graph();
    let y = |id: &str| graph.position(id).expect("positioned").y;
    assert_eq!(y("n1"), 0.0);
    assert_eq!(y("n2"), y("n3"));
    assert_eq!(y("n4"), y("n5"));
    assert!(y("n2") > y("n1"));
    assert!(y("n4") > y("n2"));
    assert_eq!(graph.position("n1").map(|p| p.x), Some(600.0));
    assert!(graph.position("n2").expect("n2").x < graph.position("n3").expect("n3").x);
}

#[test]
fn requests_during_a_run_collapse_into_one_follow_up() {
    init_tracing();
    let provider = ScriptedProvider::holding();
    let mut topology = topology_with(provider.clone(), &Settings::default(), meta_edge_snapshot());

    assert_eq!(topology.run_layout(LayoutKind::default()), RunStatus::Started);
    assert_eq!(
        topology.run_layout(LayoutKind::Grid(GridConfig::default())),
        RunStatus::Deferred
    );
    assert_eq!(
        topology.run_layout(LayoutKind::from_name("circle").expect("circle")),
        RunStatus::Deferred
    );
    assert_eq!(topology.poll_layout(), 0);

    provider.release_all();
    assert_eq!(topology.poll_layout(), 1);
    assert!(topology.layout_running());
    assert_eq!(provider.job_count(), 2);
    assert_eq!(provider.jobs.lock().expect("jobs")[1].kind.name(), "circle");

    provider.release_all();
    assert_eq!(topology.poll_layout(), 1);
    assert!(!topology.layout_running());

    let kinds = topology
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            GraphEvent::LayoutCompleted { kind, .. } => Some(kind),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec!["cose", "circle"]);
}

#[test]
fn a_silent_provider_times_out_and_groups_stay_collapsed() {
    init_tracing();
    let mut settings = Settings::default();
    settings.layout.timeout_ms = 20;
    let provider = ScriptedProvider::holding();
    let mut topology = topology_with(provider.clone(), &settings, meta_edge_snapshot());
    topology.toggle_by_type("Server").expect("group");
    topology.drain_events();

    topology.run_layout(LayoutKind::default());
    assert_eq!(topology.wait_for_layout(), 1);

    let events = topology.drain_events();
    let [GraphEvent::LayoutFailed { kind, reason }] = events.as_slice() else {
        panic!("expected a timeout, got {events:?}");
    };
    assert_eq!(*kind, "cose");
    assert!(reason.contains("20 ms"));
    assert!(!topology.layout_running());
    assert!(!topology.graph().is_node_visible("n1"));
    assert!(!topology.graph().is_node_visible("n2"));

    // a late callback from the abandoned run goes nowhere
    provider.release_all();
    assert_eq!(topology.poll_layout(), 0);
    assert!(topology.graph().positions().is_empty());
}

#[test]
fn reset_restores_every_group() {
    init_tracing();
    let mut topology = topology_with(ScriptedProvider::default(), &Settings::default(), meta_edge_snapshot());
    let before = topology.graph().edge_ids();

    topology.toggle_by_type("Server").expect("servers");
    topology
        .create_group(
            ["n3".to_owned(), "n4".to_owned()],
            "Backend",
            topology_lens::GroupKind::Manual,
            None,
        )
        .expect("backend");
    assert_eq!(topology.groups().len(), 2);

    assert_eq!(topology.reset_groups(), 2);
    assert!(topology.groups().is_empty());
    assert_eq!(topology.graph().edge_ids(), before);
    assert_eq!(topology.graph().visible_node_ids().len(), 4);
}

#[test]
fn neighbouring_groups_keep_a_visible_link_through_every_step() {
    init_tracing();
    let mut topology = topology_with(ScriptedProvider::default(), &Settings::default(), meta_edge_snapshot());
    let touching = |topology: &Topology, node: &str| {
        let graph = topology.graph();
        graph
            .visible_edge_ids()
            .into_iter()
            .filter(|id| graph.edge(id).is_some_and(|edge| edge.touches(node)))
            .count()
    };

    let TypeToggle::Created(servers) = topology.toggle_by_type("Server").expect("servers") else {
        panic!("expected a server group");
    };
    topology.toggle_expansion(&servers).expect("expand");
    let backend = topology
        .create_group(
            ["n3".to_owned(), "n4".to_owned()],
            "Backend",
            topology_lens::GroupKind::Manual,
            None,
        )
        .expect("backend");
    assert_eq!(touching(&topology, &backend), 2);

    topology.toggle_expansion(&servers).expect("collapse");
    assert_eq!(touching(&topology, &servers), 1);
    assert_eq!(touching(&topology, &backend), 1);

    topology.delete_group(&servers).expect("delete servers");
    assert_eq!(touching(&topology, &backend), 2);
    assert!(topology.graph().is_node_visible("n1"));

    topology.delete_group(&backend).expect("delete backend");
    assert_eq!(topology.graph().visible_edge_ids().len(), 3);
}
