use labgraph_core::db::{open_db, open_db_in_memory};
use labgraph_core::{
    AttachError, ContainmentGraph, Edge, EdgeKey, GraphNode, GraphRepoError, GraphRepoResult,
    GraphRepository, GraphService, GraphServiceError, LabUnit, MoveError, NodeId,
    SqliteGraphRepository, UnitKind, UserId,
};
use std::cell::Cell;
use std::thread;
use uuid::Uuid;

/// In-memory repository whose writes can be switched to fail.
#[derive(Default)]
struct FlakyRepo {
    fail_writes: Cell<bool>,
    writes: Cell<usize>,
}

impl FlakyRepo {
    fn write(&self) -> GraphRepoResult<()> {
        if self.fail_writes.get() {
            return Err(GraphRepoError::InvalidData("disk full".to_string()));
        }
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

impl GraphRepository for FlakyRepo {
    fn load_graph(&self) -> GraphRepoResult<ContainmentGraph<LabUnit>> {
        Ok(ContainmentGraph::new())
    }
    fn insert_node(&self, _node: &GraphNode<LabUnit>) -> GraphRepoResult<()> {
        self.write()
    }
    fn delete_node(&self, _node_uuid: NodeId) -> GraphRepoResult<()> {
        self.write()
    }
    fn set_root_owner(&self, _node_uuid: NodeId, _owner: Option<UserId>) -> GraphRepoResult<()> {
        self.write()
    }
    fn insert_edge(&self, _edge: &Edge) -> GraphRepoResult<()> {
        self.write()
    }
    fn delete_edge(&self, _key: EdgeKey) -> GraphRepoResult<bool> {
        self.write().map(|()| true)
    }
    fn set_edge_deleted(&self, _key: EdgeKey, _deleted: bool) -> GraphRepoResult<()> {
        self.write()
    }
    fn move_edge(&self, _removed: Option<EdgeKey>, _added: &Edge) -> GraphRepoResult<()> {
        self.write()
    }
}

fn folder(service: &GraphService<FlakyRepo>, name: &str) -> NodeId {
    service.create_unit(UnitKind::Folder, name).unwrap()
}

#[test]
fn create_unit_rejects_blank_names() {
    let service = GraphService::load(FlakyRepo::default()).unwrap();
    let err = service.create_unit(UnitKind::Folder, "   ").unwrap_err();
    assert!(matches!(err, GraphServiceError::InvalidName));
}

#[test]
fn create_unit_trims_name_and_picks_capability() {
    let service = GraphService::load(FlakyRepo::default()).unwrap();
    let doc = service.create_unit(UnitKind::Document, "  Assay  ").unwrap();
    let graph = service.graph().snapshot();
    let node = graph.node(doc).unwrap();
    assert_eq!(node.payload().name, "Assay");
    assert!(!node.is_container());
    assert_eq!(service.repo().writes.get(), 1);
}

#[test]
fn failed_node_write_leaves_no_node_behind() {
    let repo = FlakyRepo::default();
    repo.fail_writes.set(true);
    let service = GraphService::load(repo).unwrap();

    let err = service.create_unit(UnitKind::Folder, "Lost").unwrap_err();
    assert!(matches!(err, GraphServiceError::Repo(_)));
    assert_eq!(service.graph().read(|graph| graph.node_count()), 0);
}

#[test]
fn failed_edge_write_reverts_attach() {
    let user = Uuid::new_v4();
    let service = GraphService::load(FlakyRepo::default()).unwrap();
    let parent = folder(&service, "Parent");
    let child = folder(&service, "Child");

    set_failing(&service, true);
    let err = service.attach_child(parent, child, user).unwrap_err();
    set_failing(&service, false);
    assert!(matches!(err, GraphServiceError::Repo(_)));
    assert!(service.graph().read(|graph| graph.edge(parent, child).is_none()));

    service.attach_child(parent, child, user).unwrap();
    assert!(service.graph().read(|graph| graph.edge(parent, child).is_some()));
}

#[test]
fn failed_move_write_restores_previous_parent() {
    let owner = Uuid::new_v4();
    let service = GraphService::load(FlakyRepo::default()).unwrap();
    let old_parent = folder(&service, "Old");
    let new_parent = folder(&service, "New");
    let node = folder(&service, "Node");
    let sibling = folder(&service, "Sibling");
    service.attach_child(old_parent, node, owner).unwrap();
    service.attach_child(old_parent, sibling, owner).unwrap();
    service.set_deleted(old_parent, node, true).unwrap();

    set_failing(&service, true);
    let err = service
        .move_node(node, Some(old_parent), new_parent, Uuid::new_v4())
        .unwrap_err();
    set_failing(&service, false);
    assert!(matches!(err, GraphServiceError::Repo(_)));

    let graph = service.graph().snapshot();
    assert_eq!(graph.node(node).unwrap().parent_ids(), &[old_parent]);
    assert_eq!(graph.node(old_parent).unwrap().child_ids(), &[node, sibling]);
    assert!(graph.node(new_parent).unwrap().child_ids().is_empty());
    let edge = graph.edge(old_parent, node).unwrap();
    assert_eq!(edge.owner(), owner);
    assert!(edge.is_deleted());
}

#[test]
fn mark_root_reverts_when_write_fails() {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let service = GraphService::load(FlakyRepo::default()).unwrap();
    let home = service.create_user_root(alice, "Home").unwrap();

    set_failing(&service, true);
    let err = service.mark_root(home, Some(bob)).unwrap_err();
    set_failing(&service, false);
    assert!(matches!(err, GraphServiceError::Repo(_)));
    assert!(service.graph().read(|graph| graph.node(home).unwrap().is_root_for(alice)));

    assert_eq!(service.mark_root(home, None).unwrap(), Some(alice));
    assert!(service.graph().read(|graph| graph.roots_for(alice).is_empty()));
    assert!(matches!(
        service.mark_root(Uuid::new_v4(), Some(bob)).unwrap_err(),
        GraphServiceError::NodeNotFound(_)
    ));
}

#[test]
fn structural_refusals_come_back_as_errors() {
    let user = Uuid::new_v4();
    let service = GraphService::load(FlakyRepo::default()).unwrap();
    let parent = folder(&service, "Parent");
    let child = folder(&service, "Child");
    service.attach_child(parent, child, user).unwrap();

    assert!(matches!(
        service.attach_child(child, parent, user).unwrap_err(),
        GraphServiceError::Attach(AttachError::CycleDetected { .. })
    ));
    assert!(matches!(
        service.attach_child(parent, child, Uuid::new_v4()).unwrap_err(),
        GraphServiceError::Attach(AttachError::DuplicateEdge { .. })
    ));
    assert!(matches!(
        service.move_node(parent, Some(child), child, user).unwrap_err(),
        GraphServiceError::Move(MoveError::NotDirectParent { .. })
    ));
    assert!(matches!(
        service.set_deleted(child, parent, true).unwrap_err(),
        GraphServiceError::EdgeNotFound(key) if key == EdgeKey::new(child, parent)
    ));
    assert!(!service.detach_child(child, parent).unwrap());
}

#[test]
fn remove_unit_requires_detached_node() {
    let user = Uuid::new_v4();
    let service = GraphService::load(FlakyRepo::default()).unwrap();
    let parent = folder(&service, "Parent");
    let child = folder(&service, "Child");
    service.attach_child(parent, child, user).unwrap();

    assert!(matches!(
        service.remove_unit(child).unwrap_err(),
        GraphServiceError::Graph(_)
    ));
    assert!(service.detach_child(parent, child).unwrap());
    assert_eq!(service.remove_unit(child).unwrap().name, "Child");
    assert!(matches!(
        service.remove_unit(child).unwrap_err(),
        GraphServiceError::NodeNotFound(id) if id == child
    ));
}

#[test]
fn breadcrumb_and_via_skip_binned_edges() {
    let alice = Uuid::new_v4();
    let service = GraphService::load(FlakyRepo::default()).unwrap();
    let home = service.create_user_root(alice, "Alice").unwrap();
    let shared = service.create_unit(UnitKind::SharedFolder, "Shared").unwrap();
    let group = service.create_unit(UnitKind::SharedFolder, "Group").unwrap();
    let notebook = service.create_unit(UnitKind::Notebook, "Notebook").unwrap();
    service.attach_child(home, shared, alice).unwrap();
    service.attach_child(shared, group, alice).unwrap();
    service.attach_child(group, notebook, alice).unwrap();
    service.attach_child(home, notebook, alice).unwrap();

    assert_eq!(service.breadcrumb(notebook, alice).nodes(), &[home, notebook]);
    assert_eq!(service.resolve_via(notebook, home, group).len(), 4);

    service.set_deleted(home, notebook, true).unwrap();
    assert_eq!(service.breadcrumb(notebook, alice).len(), 4);
    assert_eq!(service.list_children(home, false).unwrap().len(), 1);
    assert_eq!(service.list_children(home, true).unwrap().len(), 2);

    service.set_deleted(shared, group, true).unwrap();
    assert!(service.breadcrumb(notebook, alice).is_empty());
    assert!(service.resolve_via(notebook, home, group).is_empty());
}

#[test]
fn sqlite_backed_service_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labgraph.db");
    let alice = Uuid::new_v4();

    let (home, notebook) = {
        let conn = open_db(&path).unwrap();
        let service = GraphService::load(SqliteGraphRepository::try_new(&conn).unwrap()).unwrap();
        let home = service.create_user_root(alice, "Alice").unwrap();
        let scratch = service.create_unit(UnitKind::Folder, "Scratch").unwrap();
        let notebook = service.create_unit(UnitKind::Notebook, "Notebook").unwrap();
        service.attach_child(home, scratch, alice).unwrap();
        service.attach_child(scratch, notebook, alice).unwrap();
        service
            .move_node(notebook, Some(scratch), home, alice)
            .unwrap();
        (home, notebook)
    };

    let conn = open_db(&path).unwrap();
    let service = GraphService::load(SqliteGraphRepository::try_new(&conn).unwrap()).unwrap();
    assert_eq!(service.breadcrumb(notebook, alice).nodes(), &[home, notebook]);
}

#[test]
fn marked_root_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labgraph.db");
    let alice = Uuid::new_v4();

    let (lab, notebook) = {
        let conn = open_db(&path).unwrap();
        let service = GraphService::load(SqliteGraphRepository::try_new(&conn).unwrap()).unwrap();
        let lab = service.create_unit(UnitKind::Folder, "Lab").unwrap();
        let notebook = service.create_unit(UnitKind::Notebook, "Notebook").unwrap();
        service.attach_child(lab, notebook, alice).unwrap();
        assert_eq!(service.mark_root(lab, Some(alice)).unwrap(), None);
        (lab, notebook)
    };

    let conn = open_db(&path).unwrap();
    let service = GraphService::load(SqliteGraphRepository::try_new(&conn).unwrap()).unwrap();
    assert_eq!(service.breadcrumb(notebook, alice).nodes(), &[lab, notebook]);
}

#[test]
fn working_set_changes_only_through_the_service() {
    let conn = open_db_in_memory().unwrap();
    let service = GraphService::load(SqliteGraphRepository::try_new(&conn).unwrap()).unwrap();
    let user = Uuid::new_v4();
    let a = service.create_unit(UnitKind::Folder, "A").unwrap();
    let b = service.create_unit(UnitKind::Folder, "B").unwrap();

    let mut copy = service.graph().snapshot();
    copy.attach_child(a, b, user).unwrap();
    assert_eq!(service.graph().read(|graph| graph.edge_count()), 0);
    assert_eq!(service.repo().load_graph().unwrap().edge_count(), 0);

    service.attach_child(a, b, user).unwrap();
    let stored = service.repo().load_graph().unwrap();
    assert_eq!(service.graph().read(|graph| graph.edge_count()), stored.edge_count());
    assert!(service.detach_child(a, b).unwrap());
    assert_eq!(service.repo().load_graph().unwrap().edge_count(), 0);
}

#[test]
fn second_working_set_cannot_commit_a_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labgraph.db");
    let user = Uuid::new_v4();

    let first_conn = open_db(&path).unwrap();
    let first = GraphService::load(SqliteGraphRepository::try_new(&first_conn).unwrap()).unwrap();
    let a = first.create_unit(UnitKind::Folder, "A").unwrap();
    let b = first.create_unit(UnitKind::Folder, "B").unwrap();

    let second_conn = open_db(&path).unwrap();
    let second =
        GraphService::load(SqliteGraphRepository::try_new(&second_conn).unwrap()).unwrap();

    first.attach_child(a, b, user).unwrap();
    let err = second.attach_child(b, a, user).unwrap_err();
    assert!(matches!(
        err,
        GraphServiceError::Repo(GraphRepoError::CycleDetected(_))
    ));
    assert!(second.graph().read(|graph| graph.edge_count() == 0));
}

#[test]
fn readers_on_other_threads_see_committed_edges() {
    let user = Uuid::new_v4();
    let service = GraphService::load(FlakyRepo::default()).unwrap();
    let parent = folder(&service, "Parent");
    let child = folder(&service, "Child");
    service.attach_child(parent, child, user).unwrap();

    let reader = service.graph();
    let path = thread::spawn(move || reader.shortest_path_to_ancestor(child, parent))
        .join()
        .unwrap();
    assert_eq!(path.nodes(), &[parent, child]);
}

fn set_failing(service: &GraphService<FlakyRepo>, failing: bool) {
    service.repo().fail_writes.set(failing);
}
