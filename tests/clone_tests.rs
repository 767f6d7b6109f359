//! Integration tests for the cloning engine.
//!
//! These cover both clone directions against an in-memory SQLite
//! database: structural round trips, cardinality, name scoping,
//! dangling-reference handling, and rollback on mid-pass failure.

use template_graph::db::clone::InstantiateOutcome;
use template_graph::db::Database;
use template_graph::error::ErrorCode;
use template_graph::types::{
    DependencyType, NewTask, Project, ProjectId, Task, TaskId, TemplateId, UserId,
};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn make_project(db: &Database, name: &str) -> Project {
    db.create_project(name, None, None).expect("create project")
}

fn make_task(db: &Database, project: ProjectId, name: &str, parent: Option<TaskId>, order: i64) -> Task {
    db.create_task(
        project,
        &NewTask {
            name: name.to_string(),
            parent_task_id: parent,
            planned_duration_days: Some(5),
            task_order: order,
            ..Default::default()
        },
    )
    .expect("create task")
}

/// The canonical three-task fixture: A (root), B (child of A),
/// C (root, depends on A with FS lag 2).
fn abc_project(db: &Database) -> (Project, Task, Task, Task) {
    let project = make_project(db, "ABC");
    let a = make_task(db, project.id, "A", None, 0);
    let b = make_task(db, project.id, "B", Some(a.id), 0);
    let c = make_task(db, project.id, "C", None, 1);
    db.add_dependency(project.id, c.id, a.id, DependencyType::FinishToStart, 2)
        .expect("add dependency");
    (project, a, b, c)
}

mod forward_clone_tests {
    use super::*;

    #[test]
    fn clone_preserves_hierarchy_and_encodes_dependencies() {
        let db = setup_db();
        let (project, a, b, c) = abc_project(&db);

        let template_id = db
            .save_project_as_template(project.id, "T1", Some("fixture"), Some(UserId(1)))
            .unwrap();

        let rows = db.template_graph(template_id).unwrap();
        assert_eq!(rows.len(), 3);

        let row_a = rows.iter().find(|r| r.original_task_id == a.id).unwrap();
        let row_b = rows.iter().find(|r| r.original_task_id == b.id).unwrap();
        let row_c = rows.iter().find(|r| r.original_task_id == c.id).unwrap();

        // B's parent pointer was translated into the template's id space.
        assert_eq!(row_a.parent_template_task_id, None);
        assert_eq!(row_b.parent_template_task_id, Some(row_a.id));

        // C's dependency kept the predecessor in the source id space.
        assert_eq!(row_c.depends_on_original_id, Some(a.id));
        assert_eq!(row_c.dep_type, Some(DependencyType::FinishToStart));
        assert_eq!(row_c.dep_lag_days, Some(2));
        assert_eq!(row_a.depends_on_original_id, None);
        assert_eq!(row_b.depends_on_original_id, None);
    }

    #[test]
    fn cardinality_is_preserved() {
        let db = setup_db();
        let project = make_project(&db, "Wide");
        let tasks: Vec<Task> = (0..8)
            .map(|i| make_task(&db, project.id, &format!("t{}", i), None, i))
            .collect();
        for pair in tasks.windows(2) {
            db.add_dependency(
                project.id,
                pair[1].id,
                pair[0].id,
                DependencyType::FinishToStart,
                0,
            )
            .unwrap();
        }

        let template_id = db
            .save_project_as_template(project.id, "Wide", None, Some(UserId(1)))
            .unwrap();

        let rows = db.template_graph(template_id).unwrap();
        assert_eq!(rows.len(), 8);
        let encoded_edges = rows
            .iter()
            .filter(|r| r.depends_on_original_id.is_some())
            .count();
        assert_eq!(encoded_edges, 7);
    }

    #[test]
    fn source_tasks_are_left_untouched() {
        let db = setup_db();
        let (project, _, _, _) = abc_project(&db);
        let before = db.project_graph(project.id).unwrap();

        db.save_project_as_template(project.id, "T1", None, Some(UserId(1)))
            .unwrap();

        let after = db.project_graph(project.id).unwrap();
        assert_eq!(before.0.len(), after.0.len());
        assert_eq!(before.1.len(), after.1.len());
        for (b, a) in before.0.iter().zip(after.0.iter()) {
            assert_eq!(b.id, a.id);
            assert_eq!(b.parent_task_id, a.parent_task_id);
        }
    }

    #[test]
    fn duplicate_name_for_same_owner_fails_and_creates_nothing() {
        let db = setup_db();
        let (project, ..) = abc_project(&db);

        db.save_project_as_template(project.id, "Mine", None, Some(UserId(7)))
            .unwrap();
        let err = db
            .save_project_as_template(project.id, "Mine", None, Some(UserId(7)))
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::DuplicateName);
        assert_eq!(db.list_templates(Some(UserId(7))).unwrap().len(), 1);
    }

    #[test]
    fn same_name_for_different_owners_is_allowed() {
        let db = setup_db();
        let (project, ..) = abc_project(&db);

        db.save_project_as_template(project.id, "Shared name", None, Some(UserId(1)))
            .unwrap();
        db.save_project_as_template(project.id, "Shared name", None, Some(UserId(2)))
            .unwrap();

        assert_eq!(db.list_templates(Some(UserId(1))).unwrap().len(), 1);
        assert_eq!(db.list_templates(Some(UserId(2))).unwrap().len(), 1);
    }

    #[test]
    fn system_template_names_are_globally_unique() {
        let db = setup_db();
        let (project, ..) = abc_project(&db);

        // No owner: saved as a system template.
        db.save_project_as_template(project.id, "Standard rollout", None, None)
            .unwrap();
        let err = db
            .save_project_as_template(project.id, "Standard rollout", None, None)
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::DuplicateName);
    }

    #[test]
    fn mid_pass_failure_rolls_back_the_template_row() {
        let db = setup_db();
        let (project, ..) = abc_project(&db);

        // Force a storage failure in pass 2 (the hierarchy fix-up).
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER boom BEFORE UPDATE OF parent_template_task_id ON template_tasks
                 BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        let err = db
            .save_project_as_template(project.id, "Doomed", None, Some(UserId(1)))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::StorageFailure);

        // Nothing observable remains: no template row, no template tasks.
        assert!(db.list_templates(Some(UserId(1))).unwrap().is_empty());
        let orphans: i64 = db
            .with_conn(|conn| {
                let n = conn.query_row("SELECT COUNT(*) FROM template_tasks", [], |row| row.get(0))?;
                Ok(n)
            })
            .unwrap();
        assert_eq!(orphans, 0);
    }
}

mod reverse_clone_tests {
    use super::*;

    #[test]
    fn round_trip_preserves_structure() {
        let db = setup_db();
        let (project, a, b, c) = abc_project(&db);

        let template_id = db
            .save_project_as_template(project.id, "T1", None, Some(UserId(1)))
            .unwrap();
        let target = make_project(&db, "Q");

        let outcome = db.instantiate_template(template_id, target.id).unwrap();

        assert_eq!(
            outcome,
            InstantiateOutcome {
                tasks_created: 3,
                dependencies_created: 1,
                dangling_parents: 0,
                dangling_dependencies: 0,
            }
        );

        let (tasks, deps) = db.project_graph(target.id).unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(deps.len(), 1);

        // New ids live in a fresh space.
        for task in &tasks {
            assert!(![a.id, b.id, c.id].contains(&task.id));
            assert_eq!(task.project_id, target.id);
            // Dates are deliberately unset; scheduling is downstream.
            assert!(task.start_date.is_none());
            assert!(task.end_date.is_none());
        }

        let new_a = tasks.iter().find(|t| t.name == "A").unwrap();
        let new_b = tasks.iter().find(|t| t.name == "B").unwrap();
        let new_c = tasks.iter().find(|t| t.name == "C").unwrap();

        // Same parent shape: child-of-A became child-of-A-equivalent.
        assert_eq!(new_a.parent_task_id, None);
        assert_eq!(new_b.parent_task_id, Some(new_a.id));
        assert_eq!(new_c.parent_task_id, None);

        // Exactly one dependency row: C' -> A', type FS, lag 2.
        let edge = &deps[0];
        assert_eq!(edge.task_id, new_c.id);
        assert_eq!(edge.depends_on_task_id, new_a.id);
        assert_eq!(edge.dep_type, DependencyType::FinishToStart);
        assert_eq!(edge.lag_days, 2);
    }

    #[test]
    fn no_dangling_parent_after_instantiation() {
        let db = setup_db();
        let project = make_project(&db, "Deep");
        let root = make_task(&db, project.id, "root", None, 0);
        let mid = make_task(&db, project.id, "mid", Some(root.id), 0);
        make_task(&db, project.id, "leaf", Some(mid.id), 0);

        let template_id = db
            .save_project_as_template(project.id, "Deep", None, Some(UserId(1)))
            .unwrap();
        let target = make_project(&db, "Target");
        db.instantiate_template(template_id, target.id).unwrap();

        let tasks = db.list_tasks(target.id).unwrap();
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        for task in &tasks {
            if let Some(parent) = task.parent_task_id {
                assert!(ids.contains(&parent), "parent of {} must exist", task.name);
            }
        }
    }

    #[test]
    fn acyclicity_is_preserved() {
        let db = setup_db();
        let project = make_project(&db, "Chain");
        let a = make_task(&db, project.id, "a", None, 0);
        let b = make_task(&db, project.id, "b", None, 1);
        let c = make_task(&db, project.id, "c", None, 2);
        db.add_dependency(project.id, b.id, a.id, DependencyType::FinishToStart, 0)
            .unwrap();
        db.add_dependency(project.id, c.id, b.id, DependencyType::FinishToStart, 0)
            .unwrap();

        let template_id = db
            .save_project_as_template(project.id, "Chain", None, Some(UserId(1)))
            .unwrap();
        let target = make_project(&db, "Out");
        db.instantiate_template(template_id, target.id).unwrap();

        let (tasks, deps) = db.project_graph(target.id).unwrap();
        assert_eq!(deps.len(), 2);

        // Walk predecessor edges from every node; a revisit of the
        // start node would be a cycle.
        for start in &tasks {
            let mut stack = vec![start.id];
            let mut seen = std::collections::HashSet::new();
            while let Some(current) = stack.pop() {
                for dep in deps.iter().filter(|d| d.task_id == current) {
                    assert_ne!(dep.depends_on_task_id, start.id, "cycle through {}", start.name);
                    if seen.insert(dep.depends_on_task_id) {
                        stack.push(dep.depends_on_task_id);
                    }
                }
            }
        }
    }

    #[test]
    fn dangling_dependency_is_skipped_and_counted() {
        let db = setup_db();
        let (project, ..) = abc_project(&db);
        let template_id = db
            .save_project_as_template(project.id, "Edited", None, Some(UserId(1)))
            .unwrap();

        // Hand-edit the template: point the one encoded dependency at a
        // source id that was never captured in this template.
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE template_tasks SET depends_on_original_id = 99999
                 WHERE template_id = ?1 AND depends_on_original_id IS NOT NULL",
                (template_id,),
            )?;
            Ok(())
        })
        .unwrap();

        let target = make_project(&db, "Target");
        let outcome = db.instantiate_template(template_id, target.id).unwrap();

        assert_eq!(outcome.tasks_created, 3);
        assert_eq!(outcome.dependencies_created, 0);
        assert_eq!(outcome.dangling_dependencies, 1);
        assert!(db.list_dependencies(target.id).unwrap().is_empty());
    }

    #[test]
    fn dangling_parent_pointer_leaves_task_as_root() {
        let db = setup_db();
        let (project, ..) = abc_project(&db);
        let template_id = db
            .save_project_as_template(project.id, "First", None, Some(UserId(1)))
            .unwrap();
        let other_template_id = db
            .save_project_as_template(project.id, "Second", None, Some(UserId(1)))
            .unwrap();

        // Hand-edit: re-point a child's parent at a template task that
        // belongs to a different template.
        let foreign_row = db.template_graph(other_template_id).unwrap()[0].id;
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE template_tasks SET parent_template_task_id = ?1
                 WHERE template_id = ?2 AND parent_template_task_id IS NOT NULL",
                (foreign_row, template_id),
            )?;
            Ok(())
        })
        .unwrap();

        let target = make_project(&db, "Target");
        let outcome = db.instantiate_template(template_id, target.id).unwrap();

        assert_eq!(outcome.dangling_parents, 1);
        let tasks = db.list_tasks(target.id).unwrap();
        assert!(tasks.iter().all(|t| t.parent_task_id.is_none()));
    }

    #[test]
    fn mid_pass_failure_leaves_target_project_empty() {
        let db = setup_db();
        let (project, ..) = abc_project(&db);
        let template_id = db
            .save_project_as_template(project.id, "T1", None, Some(UserId(1)))
            .unwrap();
        let target = make_project(&db, "Target");

        // Force a storage failure in pass 3 (dependency materialization).
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER boom BEFORE INSERT ON task_dependencies
                 BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        let err = db.instantiate_template(template_id, target.id).unwrap_err();
        assert_eq!(err.code, ErrorCode::StorageFailure);

        // Full rollback: the tasks materialized in pass 1 are gone too.
        assert!(db.list_tasks(target.id).unwrap().is_empty());
        assert!(db.list_dependencies(target.id).unwrap().is_empty());
    }

    #[test]
    fn two_instantiations_produce_disjoint_task_sets() {
        let db = setup_db();
        let (project, ..) = abc_project(&db);
        let template_id = db
            .save_project_as_template(project.id, "T1", None, Some(UserId(1)))
            .unwrap();

        let q1 = make_project(&db, "Q1");
        let q2 = make_project(&db, "Q2");
        db.instantiate_template(template_id, q1.id).unwrap();
        db.instantiate_template(template_id, q2.id).unwrap();

        let ids1: std::collections::HashSet<TaskId> =
            db.list_tasks(q1.id).unwrap().iter().map(|t| t.id).collect();
        let ids2: std::collections::HashSet<TaskId> =
            db.list_tasks(q2.id).unwrap().iter().map(|t| t.id).collect();

        assert_eq!(ids1.len(), 3);
        assert_eq!(ids2.len(), 3);
        assert!(ids1.is_disjoint(&ids2));
    }
}

mod graph_reader_tests {
    use super::*;

    #[test]
    fn missing_owner_is_not_found() {
        let db = setup_db();

        let err = db.project_graph(ProjectId(404)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ProjectNotFound);

        let err = db.template_graph(TemplateId(404)).unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateNotFound);
    }

    #[test]
    fn zero_tasks_is_empty_not_an_error() {
        let db = setup_db();
        let project = make_project(&db, "Bare");

        let (tasks, deps) = db.project_graph(project.id).unwrap();
        assert!(tasks.is_empty());
        assert!(deps.is_empty());
    }

    #[test]
    fn parents_come_back_before_their_subtrees() {
        let db = setup_db();
        let (project, a, b, _c) = abc_project(&db);

        let (tasks, _) = db.project_graph(project.id).unwrap();
        let pos = |id| tasks.iter().position(|t| t.id == id).unwrap();
        assert!(pos(a.id) < pos(b.id));
    }
}

mod dependency_rule_tests {
    use super::*;

    #[test]
    fn cycle_is_rejected() {
        let db = setup_db();
        let project = make_project(&db, "Cyclic");
        let a = make_task(&db, project.id, "a", None, 0);
        let b = make_task(&db, project.id, "b", None, 1);
        db.add_dependency(project.id, b.id, a.id, DependencyType::FinishToStart, 0)
            .unwrap();

        let err = db
            .add_dependency(project.id, a.id, b.id, DependencyType::FinishToStart, 0)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DependencyCycle);
    }

    #[test]
    fn self_dependency_is_rejected() {
        let db = setup_db();
        let project = make_project(&db, "Selfish");
        let a = make_task(&db, project.id, "a", None, 0);

        let err = db
            .add_dependency(project.id, a.id, a.id, DependencyType::FinishToStart, 0)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DependencyCycle);
    }

    #[test]
    fn cross_project_dependency_is_rejected() {
        let db = setup_db();
        let p1 = make_project(&db, "P1");
        let p2 = make_project(&db, "P2");
        let a = make_task(&db, p1.id, "a", None, 0);
        let b = make_task(&db, p2.id, "b", None, 0);

        let err = db
            .add_dependency(p1.id, a.id, b.id, DependencyType::FinishToStart, 0)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CrossProjectReference);
    }

    #[test]
    fn cross_project_parent_is_rejected() {
        let db = setup_db();
        let p1 = make_project(&db, "P1");
        let p2 = make_project(&db, "P2");
        let a = make_task(&db, p1.id, "a", None, 0);

        let err = db
            .create_task(
                p2.id,
                &NewTask {
                    name: "child".into(),
                    parent_task_id: Some(a.id),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CrossProjectReference);
    }
}

mod template_listing_tests {
    use super::*;

    #[test]
    fn listing_shows_own_and_system_templates_sorted() {
        let db = setup_db();
        let (project, ..) = abc_project(&db);

        db.save_project_as_template(project.id, "zeta", None, Some(UserId(1)))
            .unwrap();
        db.create_template("alpha", None, None, true).unwrap();
        db.save_project_as_template(project.id, "beta", None, Some(UserId(2)))
            .unwrap();

        let visible = db.list_templates(Some(UserId(1))).unwrap();
        let names: Vec<&str> = visible.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        let system_only = db.list_templates(None).unwrap();
        assert_eq!(system_only.len(), 1);
        assert!(system_only[0].is_system);
    }

    #[test]
    fn admin_created_system_template_starts_empty() {
        let db = setup_db();
        let template = db
            .create_template("Org default", Some("seeded later"), None, true)
            .unwrap();

        assert!(template.is_system);
        assert!(template.owner_user_id.is_none());
        assert!(template.source_project_id.is_none());
        assert!(db.template_graph(template.id).unwrap().is_empty());
    }
}
